/// Notification endpoints, all scoped to the caller
///
/// ```text
/// GET    /notifications                 latest 50, newest first
/// GET    /notifications/unread-count
/// PUT    /notifications/:id/read
/// PUT    /notifications/mark-all-read
/// DELETE /notifications/:id
/// DELETE /notifications/clear-all
/// ```
///
/// A notification that belongs to someone else is reported as not found.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use tasklane_shared::auth::middleware::AuthContext;
use tasklane_shared::models::notification::Notification;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AffectedResponse {
    pub affected: u64,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Notification not found".to_string())
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = Notification::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<UnreadCountResponse>> {
    let count = Notification::unread_count(&state.db, auth.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Notification::mark_read(&state.db, id, auth.user_id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<AffectedResponse>> {
    let affected = Notification::mark_all_read(&state.db, auth.user_id).await?;
    Ok(Json(AffectedResponse { affected }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Notification::delete(&state.db, id, auth.user_id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_all(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<AffectedResponse>> {
    let affected = Notification::clear_all(&state.db, auth.user_id).await?;
    Ok(Json(AffectedResponse { affected }))
}
