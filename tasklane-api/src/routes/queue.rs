/// Personal queue endpoints
///
/// ```text
/// GET    /users/:user_id/queue[?list_id=]
/// POST   /users/:user_id/queue            { "task_id" }
/// PUT    /users/:user_id/queue/reorder    { "list_id", "items": [{ "task_id", "position" }] }
///                                         or { "list_id", "order": [task_id, ...] }
/// DELETE /users/:user_id/queue/:task_id
/// ```
///
/// A queue belongs to exactly one user: `user_id` must be the caller. A
/// mismatch is logged as a security event and refused before any lookup.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use tasklane_shared::auth::{authorization, middleware::AuthContext};
use tasklane_shared::models::queue::{self, QueueEntry, QueueItem, ReorderItem};

use crate::{
    app::AppState,
    audit::{self, SecurityEvent},
    error::{ApiError, ApiResult},
    middleware::client_info::ClientInfo,
};

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    #[serde(alias = "listId")]
    pub list_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AddToQueueRequest {
    #[serde(alias = "taskId")]
    pub task_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    #[serde(alias = "listId")]
    pub list_id: Uuid,
    pub items: Option<Vec<ReorderItem>>,
    /// Task IDs in their new order; position is the index plus one
    pub order: Option<Vec<Uuid>>,
}

impl ReorderRequest {
    fn into_items(self) -> ApiResult<Vec<ReorderItem>> {
        match (self.items, self.order) {
            (Some(items), None) => Ok(items),
            (None, Some(order)) => Ok(order
                .into_iter()
                .zip(1..)
                .map(|(task_id, position)| ReorderItem { task_id, position })
                .collect()),
            _ => Err(ApiError::BadRequest(
                "Provide exactly one of 'items' or 'order'".to_string(),
            )),
        }
    }
}

/// Refuses access to another user's queue
fn require_own_queue(auth: &AuthContext, client: &ClientInfo, user_id: Uuid) -> ApiResult<()> {
    authorization::require_self(auth, user_id).map_err(|e| {
        audit::record(
            SecurityEvent::AccessDenied,
            client,
            Some(auth.user_id),
            &format!("queue of user {}", user_id),
        );
        ApiError::from(e)
    })
}

pub async fn get_queue(
    State(state): State<AppState>,
    auth: AuthContext,
    client: ClientInfo,
    Path(user_id): Path<Uuid>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Json<Vec<QueueItem>>> {
    require_own_queue(&auth, &client, user_id)?;

    if let Some(list_id) = query.list_id {
        authorization::require_membership(&state.db, list_id, auth.user_id).await?;
    }

    let items = queue::list_for_user(&state.db, user_id, query.list_id).await?;
    Ok(Json(items))
}

/// Appends a task to the end of the caller's queue for its list
///
/// Adding a task that is already queued leaves its position unchanged.
pub async fn add_to_queue(
    State(state): State<AppState>,
    auth: AuthContext,
    client: ClientInfo,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AddToQueueRequest>,
) -> ApiResult<(StatusCode, Json<QueueEntry>)> {
    require_own_queue(&auth, &client, user_id)?;
    authorization::require_task_membership(&state.db, req.task_id, auth.user_id).await?;

    let entry = queue::append(&state.db, user_id, req.task_id).await?;
    tracing::debug!(user_id = %user_id, task_id = %req.task_id, position = entry.position, "Task queued");

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Replaces the order of the caller's queue for one list
///
/// # Errors
///
/// - `400 Bad Request`: The items are not a permutation of the current queue
pub async fn reorder_queue(
    State(state): State<AppState>,
    auth: AuthContext,
    client: ClientInfo,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Json<Vec<QueueEntry>>> {
    require_own_queue(&auth, &client, user_id)?;

    let list_id = req.list_id;
    authorization::require_membership(&state.db, list_id, auth.user_id).await?;

    let items = req.into_items()?;
    let entries = queue::reorder(&state.db, user_id, list_id, &items).await?;
    Ok(Json(entries))
}

pub async fn remove_from_queue(
    State(state): State<AppState>,
    auth: AuthContext,
    client: ClientInfo,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_own_queue(&auth, &client, user_id)?;
    authorization::require_task_membership(&state.db, task_id, auth.user_id).await?;

    if !queue::remove(&state.db, user_id, task_id).await? {
        return Err(ApiError::NotFound("Task is not in the queue".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
