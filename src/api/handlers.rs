use super::error::ApiError;
use super::AppState;
use crate::core::identity::AuthOutcome;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct GroupCreationBody {
    pub students: Vec<String>,
}

/// POST /api/groups
pub async fn create_group(
    State(state): State<AppState>,
    payload: Result<Json<GroupCreationBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload.map_err(|e| {
        tracing::debug!("Rejected group body: {}", e);
        ApiError::BadRequest("Invalid body.".to_string())
    })?;

    let group = state.reconciler.reconcile(&body.students).await?;
    Ok(Json(json!({ "status": "ok", "group": group })))
}

/// GET /api/groups
///
/// Anonymous callers get the summary; a verified token adds the members of every group.
pub async fn list_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let detailed = match authenticate(&state, &headers).await? {
        AuthOutcome::Authenticated { .. } => true,
        AuthOutcome::Anonymous => false,
        AuthOutcome::Rejected(failure) => return Err(ApiError::Rejected(failure)),
    };

    let items = state.directory.list_groups(detailed).await?;
    Ok(Json(json!({ "status": "ok", "items": items })))
}

/// GET /api/students/:id
pub async fn lookup_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let items = state.directory.lookup_student(&id).await?;
    Ok(Json(json!({ "status": "ok", "items": items })))
}

/// GET /api/auth
pub async fn auth_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    match authenticate(&state, &headers).await? {
        AuthOutcome::Authenticated { user } => Ok(Json(json!({ "status": "ok", "user": user }))),
        AuthOutcome::Anonymous => Err(ApiError::Unauthorized),
        AuthOutcome::Rejected(failure) => Err(ApiError::Rejected(failure)),
    }
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthOutcome, ApiError> {
    let token = state.tokens.extract(headers);
    state
        .identity
        .authenticate(token.as_deref())
        .await
        .map_err(|e| ApiError::internal("Identity check", &e))
}
