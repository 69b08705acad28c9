use crate::core::reconciler::GroupRules;
use crate::domain::student_id::IdFormat;
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{self, Validate};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub groups: GroupsConfig,
    #[serde(default)]
    pub student_id: IdFormat,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Airtable,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub api_key: Option<String>,
    pub base_key: Option<String>,
    #[serde(default = "default_students_table")]
    pub students_table: String,
    #[serde(default = "default_groups_table")]
    pub groups_table: String,
    #[serde(default = "default_view")]
    pub view: String,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    pub timeout_seconds: Option<u64>,
    /// Roster CSV used to seed the memory backend.
    pub seed_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Identity provider origin; also the expected token issuer.
    pub domain: String,
    pub audience: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Cookie carrying the token.
    pub cookie: String,
    /// Header checked when the cookie is absent.
    pub header: Option<String>,
    /// Overrides `{domain}/cdn-cgi/access/certs`.
    pub jwks_url: Option<String>,
    /// Shared secret for HS* algorithms instead of a JWK set.
    pub shared_secret: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_backend() -> StoreBackend {
    StoreBackend::Airtable
}

fn default_api_url() -> String {
    "https://api.airtable.com".to_string()
}

fn default_students_table() -> String {
    "Estudiantes".to_string()
}

fn default_groups_table() -> String {
    "Grupos".to_string()
}

fn default_view() -> String {
    "Grid view".to_string()
}

fn default_max_records() -> usize {
    50
}

fn default_min_size() -> usize {
    1
}

fn default_max_size() -> usize {
    4
}

fn default_algorithm() -> String {
    "RS256".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_url: default_api_url(),
            api_key: None,
            base_key: None,
            students_table: default_students_table(),
            groups_table: default_groups_table(),
            view: default_view(),
            max_records: default_max_records(),
            timeout_seconds: None,
            seed_path: None,
        }
    }
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            max_size: default_max_size(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，先替換 ${VAR} 環境變數
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        Ok(toml::from_str(&processed)?)
    }

    /// Environment-only configuration, for hosted deployments without a config file.
    pub fn from_env() -> Result<Self> {
        let store = StoreConfig {
            backend: match env::var("STORE_BACKEND") {
                Ok(value) => parse_backend(&value)?,
                Err(_) => default_backend(),
            },
            api_url: env::var("AIRTABLE_API_URL").unwrap_or_else(|_| default_api_url()),
            api_key: env::var("AIRTABLE_API_KEY").ok(),
            base_key: env::var("AIRTABLE_BASE_KEY").ok(),
            students_table: env::var("STUDENTS_TABLE").unwrap_or_else(|_| default_students_table()),
            groups_table: env::var("GROUPS_TABLE").unwrap_or_else(|_| default_groups_table()),
            view: env::var("AIRTABLE_VIEW").unwrap_or_else(|_| default_view()),
            max_records: env_number("MAX_RECORDS", default_max_records())?,
            timeout_seconds: match env::var("STORE_TIMEOUT_SECONDS") {
                Ok(_) => Some(env_number("STORE_TIMEOUT_SECONDS", 0)?),
                Err(_) => None,
            },
            seed_path: env::var("ROSTER_SEED_PATH").ok(),
        };

        let auth = AuthConfig {
            domain: required_env("AUTH_DOMAIN")?,
            audience: required_env("AUD_TAG")?,
            algorithm: env::var("JWT_ALGORITHM").unwrap_or_else(|_| default_algorithm()),
            cookie: required_env("JWT_COOKIE")?,
            header: env::var("JWT_HEADER").ok(),
            jwks_url: env::var("JWKS_URL").ok(),
            shared_secret: env::var("JWT_SHARED_SECRET").ok(),
        };

        Ok(Self {
            server: ServerConfig {
                bind: env::var("BIND_ADDR").unwrap_or_else(|_| default_bind()),
            },
            store,
            groups: GroupsConfig {
                min_size: env_number("MIN_GROUP_SIZE", default_min_size())?,
                max_size: env_number("MAX_GROUP_SIZE", default_max_size())?,
            },
            student_id: IdFormat {
                allow_prefix: true,
                digits: env_number("STUDENT_ID_DIGITS", IdFormat::default().digits)?,
                alphanumerics: env_number(
                    "STUDENT_ID_ALPHANUMERICS",
                    IdFormat::default().alphanumerics,
                )?,
            },
            auth,
        })
    }

    pub fn group_rules(&self) -> GroupRules {
        GroupRules {
            min_size: self.groups.min_size,
            max_size: self.groups.max_size,
            id_format: self.student_id,
            snapshot_limit: self.store.max_records,
        }
    }

    pub fn jwt_algorithm(&self) -> Result<Algorithm> {
        Algorithm::from_str(&self.auth.algorithm).map_err(|_| AppError::InvalidConfigValueError {
            field: "auth.algorithm".to_string(),
            value: self.auth.algorithm.clone(),
            reason: "Unknown JWT algorithm".to_string(),
        })
    }

    pub fn jwks_url(&self) -> String {
        self.auth.jwks_url.clone().unwrap_or_else(|| {
            format!(
                "{}/cdn-cgi/access/certs",
                self.auth.domain.trim_end_matches('/')
            )
        })
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        match self.store.backend {
            StoreBackend::Airtable => {
                validation::validate_url("store.api_url", &self.store.api_url)?;
                let api_key = validation::validate_required_field("store.api_key", &self.store.api_key)?;
                validation::validate_non_empty_string("store.api_key", api_key)?;
                let base_key =
                    validation::validate_required_field("store.base_key", &self.store.base_key)?;
                validation::validate_non_empty_string("store.base_key", base_key)?;
            }
            StoreBackend::Memory => {
                if let Some(path) = &self.store.seed_path {
                    validation::validate_path("store.seed_path", path)?;
                }
            }
        }
        validation::validate_non_empty_string("store.students_table", &self.store.students_table)?;
        validation::validate_non_empty_string("store.groups_table", &self.store.groups_table)?;
        validation::validate_range("store.max_records", self.store.max_records, 1, 1000)?;

        validation::validate_positive_number("groups.min_size", self.groups.min_size, 1)?;
        if self.groups.max_size < self.groups.min_size {
            return Err(AppError::InvalidConfigValueError {
                field: "groups.max_size".to_string(),
                value: self.groups.max_size.to_string(),
                reason: format!("Must be at least groups.min_size ({})", self.groups.min_size),
            });
        }
        validation::validate_range("groups.max_size", self.groups.max_size, 1, 100)?;
        if self.groups.max_size > self.store.max_records {
            return Err(AppError::InvalidConfigValueError {
                field: "groups.max_size".to_string(),
                value: self.groups.max_size.to_string(),
                reason: "Cannot exceed store.max_records".to_string(),
            });
        }

        validation::validate_positive_number("student_id.digits", self.student_id.digits, 1)?;
        self.student_id.compile()?;

        validation::validate_url("auth.domain", &self.auth.domain)?;
        validation::validate_non_empty_string("auth.audience", &self.auth.audience)?;
        validation::validate_non_empty_string("auth.cookie", &self.auth.cookie)?;
        let algorithm = self.jwt_algorithm()?;
        let is_hmac = matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512);
        if is_hmac && self.auth.shared_secret.is_none() {
            return Err(AppError::MissingConfigError {
                field: "auth.shared_secret".to_string(),
            });
        }
        if !is_hmac {
            validation::validate_url("auth.jwks_url", &self.jwks_url())?;
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// 替換環境變數 (例如 ${AIRTABLE_API_KEY})；未設定的變數保持原樣
fn substitute_env_vars(content: &str) -> Result<String> {
    use regex::Regex;

    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AppError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

fn parse_backend(value: &str) -> Result<StoreBackend> {
    match value.to_lowercase().as_str() {
        "airtable" => Ok(StoreBackend::Airtable),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(AppError::InvalidConfigValueError {
            field: "STORE_BACKEND".to_string(),
            value: other.to_string(),
            reason: "Expected `airtable` or `memory`".to_string(),
        }),
    }
}

fn required_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| AppError::MissingConfigError {
        field: name.to_string(),
    })
}

fn env_number<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: "Expected a non-negative integer".to_string(),
            }),
        Err(_) => Ok(default),
    }
}
