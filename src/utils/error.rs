use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Record store returned {status}: {kind}: {message}")]
    StoreResponseError {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Identity key source error: {message}")]
    KeySourceError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

impl AppError {
    /// 給使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::ApiError(_) | AppError::StoreResponseError { .. } => {
                "Could not reach the record store".to_string()
            }
            AppError::KeySourceError { .. } => {
                "Could not load identity provider signing keys".to_string()
            }
            AppError::MissingConfigError { field } => {
                format!("Missing required setting `{}`", field)
            }
            AppError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting `{}` is invalid: {}", field, reason)
            }
            AppError::ConfigError { message }
            | AppError::ConfigValidationError { message, .. } => {
                format!("Configuration problem: {}", message)
            }
            AppError::IoError(e) => format!("File access failed: {}", e),
            AppError::CsvError(e) => format!("Roster CSV is malformed: {}", e),
            AppError::SerializationError(e) => format!("Unexpected data format: {}", e),
            AppError::ProcessingError { message } => message.clone(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AppError::ApiError(_) | AppError::StoreResponseError { .. } => {
                "Check the store API key, base key and network connectivity"
            }
            AppError::KeySourceError { .. } => {
                "Check auth.domain and that the JWKS endpoint is reachable"
            }
            AppError::MissingConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::ConfigError { .. }
            | AppError::ConfigValidationError { .. } => {
                "Review the configuration file or environment variables"
            }
            AppError::IoError(_) => "Check that the path exists and is readable",
            AppError::CsvError(_) => "Expected rows of code,last name,first name without a header",
            AppError::SerializationError(_) | AppError::ProcessingError { .. } => {
                "Inspect the input data and retry"
            }
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
