//! JSON HTTP layer over the reconciler, the group directory and the identity gate.

pub mod error;
pub mod handlers;

use crate::core::directory::GroupDirectory;
use crate::core::identity::IdentityGate;
use crate::core::reconciler::GroupReconciler;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Where the identity token is looked for on incoming requests.
#[derive(Debug, Clone)]
pub struct TokenSource {
    pub cookie: String,
    pub header: Option<String>,
}

impl TokenSource {
    /// Cookie first, then the optional header.
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        let from_cookie = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        from_cookie.or_else(|| {
            let name = self.header.as_deref()?;
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
    }
}

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<GroupReconciler>,
    pub directory: Arc<GroupDirectory>,
    pub identity: Arc<IdentityGate>,
    pub tokens: TokenSource,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/groups",
            get(handlers::list_groups)
                .post(handlers::create_group)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/students/:id",
            get(handlers::lookup_student).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/auth",
            get(handlers::auth_status).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn source() -> TokenSource {
        TokenSource {
            cookie: "CF_Authorization".to_string(),
            header: Some("Cf-Access-Jwt-Assertion".to_string()),
        }
    }

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; CF_Authorization=abc.def.ghi; other=1"),
        );
        assert_eq!(source().extract(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_token_from_header_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.insert("Cf-Access-Jwt-Assertion", HeaderValue::from_static("x.y.z"));
        assert_eq!(source().extract(&headers).as_deref(), Some("x.y.z"));
    }

    #[test]
    fn test_empty_cookie_falls_back_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("CF_Authorization=; theme=dark"));
        headers.insert("Cf-Access-Jwt-Assertion", HeaderValue::from_static("x.y.z"));
        assert_eq!(source().extract(&headers).as_deref(), Some("x.y.z"));
    }

    #[test]
    fn test_no_token() {
        assert_eq!(source().extract(&HeaderMap::new()), None);
    }
}
