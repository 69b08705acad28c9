use crate::domain::ports::KeySource;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Minimum spacing between refetches triggered by unknown key ids.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

/// Signing keys published by the identity provider as a JWK set.
pub struct JwksKeySource {
    client: Client,
    url: String,
    refresh_interval: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksKeySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            cache: RwLock::new(None),
        }
    }

    /// Cloudflare Access publishes its keys under `/cdn-cgi/access/certs`.
    pub fn for_domain(domain: &str) -> Self {
        Self::new(format!("{}/cdn-cgi/access/certs", domain.trim_end_matches('/')))
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    async fn fetch(&self) -> Result<JwkSet> {
        tracing::debug!("Fetching signing keys from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::KeySourceError {
                message: format!("{} returned {}", self.url, response.status()),
            });
        }

        let set: JwkSet = response.json().await?;
        tracing::info!("🔑 Loaded {} signing keys", set.keys.len());
        Ok(set)
    }
}

fn select(set: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>> {
    let jwk = match kid {
        Some(kid) => set.find(kid),
        None => set.keys.first(),
    };

    jwk.map(|jwk| {
        DecodingKey::from_jwk(jwk).map_err(|e| AppError::KeySourceError {
            message: format!("Unusable key {:?}: {}", jwk.common.key_id, e),
        })
    })
    .transpose()
}

#[async_trait]
impl KeySource for JwksKeySource {
    async fn decoding_key(&self, kid: Option<&str>) -> Result<Option<DecodingKey>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if let Some(key) = select(&cached.set, kid)? {
                    return Ok(Some(key));
                }
                if cached.fetched_at.elapsed() < self.refresh_interval {
                    return Ok(None);
                }
            }
        }

        // 持有寫鎖再檢查一次：同時等待的請求共用同一次抓取
        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if let Some(key) = select(&cached.set, kid)? {
                return Ok(Some(key));
            }
            if cached.fetched_at.elapsed() < self.refresh_interval {
                return Ok(None);
            }
        }

        // 未知的 kid：可能是金鑰輪替，重新抓取一次
        let set = self.fetch().await?;
        let key = select(&set, kid)?;
        *cache = Some(CachedKeys {
            set,
            fetched_at: Instant::now(),
        });
        Ok(key)
    }
}
