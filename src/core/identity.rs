//! Administrative access check against tokens issued by the identity provider.

use crate::domain::ports::KeySource;
use crate::utils::error::Result;
use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The token could not be parsed at all.
    #[error("Invalid JWT token provided.")]
    MalformedToken,

    /// Parsed, but the signature, claims or key did not check out.
    #[error("Forbidden")]
    ForbiddenToken,
}

impl AuthFailure {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthFailure::MalformedToken => 400,
            AuthFailure::ForbiddenToken => 403,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated { user: serde_json::Value },
    /// No token was presented.
    Anonymous,
    Rejected(AuthFailure),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated { .. })
    }
}

pub struct IdentityGate {
    keys: Arc<dyn KeySource>,
    validation: Validation,
}

impl IdentityGate {
    pub fn new(keys: Arc<dyn KeySource>, algorithm: Algorithm, audience: &str, issuer: &str) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        Self { keys, validation }
    }

    /// Key-source transport failures are errors; anything wrong with the token itself is an
    /// [`AuthOutcome::Rejected`].
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthOutcome> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(AuthOutcome::Anonymous);
        };

        let header = match decode_header(token) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!("Token header rejected: {}", e);
                return Ok(AuthOutcome::Rejected(classify(e.kind())));
            }
        };

        let Some(key) = self.keys.decoding_key(header.kid.as_deref()).await? else {
            tracing::debug!("No signing key published for kid {:?}", header.kid);
            return Ok(AuthOutcome::Rejected(AuthFailure::ForbiddenToken));
        };

        match decode::<serde_json::Value>(token, &key, &self.validation) {
            Ok(data) => Ok(AuthOutcome::Authenticated { user: data.claims }),
            Err(e) => {
                tracing::debug!("Token rejected: {}", e);
                Ok(AuthOutcome::Rejected(classify(e.kind())))
            }
        }
    }
}

fn classify(kind: &ErrorKind) -> AuthFailure {
    match kind {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthFailure::MalformedToken
        }
        _ => AuthFailure::ForbiddenToken,
    }
}

/// A single shared-secret key, for HMAC deployments.
pub struct StaticKeySource {
    key: DecodingKey,
}

impl StaticKeySource {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
        }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn decoding_key(&self, _kid: Option<&str>) -> Result<Option<DecodingKey>> {
        Ok(Some(self.key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"unit-test-secret";
    const DOMAIN: &str = "https://team.example.com";
    const AUDIENCE: &str = "aud-tag";

    fn gate() -> IdentityGate {
        IdentityGate::new(
            Arc::new(StaticKeySource::from_secret(SECRET)),
            Algorithm::HS256,
            AUDIENCE,
            DOMAIN,
        )
    }

    fn token(secret: &[u8], claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn test_no_token_is_anonymous() {
        assert_eq!(gate().authenticate(None).await.unwrap(), AuthOutcome::Anonymous);
        assert_eq!(gate().authenticate(Some("")).await.unwrap(), AuthOutcome::Anonymous);
    }

    #[tokio::test]
    async fn test_valid_token_authenticates() {
        let jwt = token(
            SECRET,
            json!({"email": "admin@example.com", "aud": AUDIENCE, "iss": DOMAIN, "exp": future_exp()}),
        );

        match gate().authenticate(Some(&jwt)).await.unwrap() {
            AuthOutcome::Authenticated { user } => {
                assert_eq!(user["email"], "admin@example.com");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_signature_is_forbidden() {
        let jwt = token(
            b"some-other-secret",
            json!({"aud": AUDIENCE, "iss": DOMAIN, "exp": future_exp()}),
        );

        let outcome = gate().authenticate(Some(&jwt)).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Rejected(AuthFailure::ForbiddenToken));
    }

    #[tokio::test]
    async fn test_wrong_audience_and_expired_are_forbidden() {
        let wrong_aud = token(
            SECRET,
            json!({"aud": "other", "iss": DOMAIN, "exp": future_exp()}),
        );
        let expired = token(
            SECRET,
            json!({"aud": AUDIENCE, "iss": DOMAIN, "exp": chrono::Utc::now().timestamp() - 3600}),
        );

        for jwt in [wrong_aud, expired] {
            let outcome = gate().authenticate(Some(&jwt)).await.unwrap();
            assert_eq!(outcome, AuthOutcome::Rejected(AuthFailure::ForbiddenToken));
        }
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let outcome = gate().authenticate(Some("not-a-jwt")).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Rejected(AuthFailure::MalformedToken));
        assert_eq!(AuthFailure::MalformedToken.status_code(), 400);
        assert_eq!(AuthFailure::ForbiddenToken.status_code(), 403);
    }
}
