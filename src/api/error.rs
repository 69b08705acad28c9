use crate::core::directory::LookupError;
use crate::core::identity::AuthFailure;
use crate::core::reconciler::ReconcileError;
use crate::utils::error::AppError;
use crate::utils::report::capture_error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Rejected(AuthFailure),
    /// Reported failure; the event id lets an operator find the log entry.
    Internal { event_id: String },
    MethodNotAllowed,
    NotFound,
}

impl ApiError {
    pub fn internal(context: &str, err: &(dyn std::error::Error + 'static)) -> Self {
        ApiError::Internal {
            event_id: capture_error(context, err),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            // 不區分「不存在」與「已分組」
            ReconcileError::IncompleteMatch { .. } => ApiError::BadRequest("Invalid group.".to_string()),
            ReconcileError::InvalidSize { .. } | ReconcileError::InvalidFormat { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            ReconcileError::StoreFailure(_) => ApiError::internal("Group registration", &e),
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::InvalidFormat { .. } => ApiError::BadRequest("Invalid user ID.".to_string()),
            LookupError::StoreFailure(_) => ApiError::internal("Student lookup", &e),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError::internal("Request", &e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            ApiError::Rejected(failure) => (
                StatusCode::from_u16(failure.status_code()).unwrap_or(StatusCode::FORBIDDEN),
                json!({ "error": failure.to_string() }),
            ),
            ApiError::Internal { event_id } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal Server Error", "eventId": event_id }),
            ),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": "Method not allowed" }),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
        };

        (status, Json(body)).into_response()
    }
}
