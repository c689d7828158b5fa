/// Task list and membership endpoints
///
/// ```text
/// GET    /task-lists               caller's lists with role and member count
/// POST   /task-lists               create (caller becomes owner)
/// POST   /task-lists/join          join by invite code
/// DELETE /task-lists/:id           owner only
/// GET    /task-lists/:id/members   members only
/// ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use tasklane_shared::auth::{authorization, middleware::AuthContext};
use tasklane_shared::invite::{is_valid_invite_code, normalize_invite_code};
use tasklane_shared::models::{
    membership::{ListRole, MemberDetail, Membership},
    task_list::{CreateTaskList, TaskList, TaskListSummary},
    user::User,
};
use tasklane_shared::notifications;

use crate::{
    app::AppState,
    audit::{self, SecurityEvent},
    error::{ApiError, ApiResult},
    middleware::client_info::ClientInfo,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskListRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinTaskListRequest {
    #[serde(alias = "inviteCode")]
    pub invite_code: String,
}

pub async fn list_task_lists(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<TaskListSummary>>> {
    let lists = TaskList::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(lists))
}

/// Creates a list and the owner membership in one transaction
pub async fn create_task_list(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateTaskListRequest>,
) -> ApiResult<(StatusCode, Json<TaskList>)> {
    req.validate()?;
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name", "Name is required"));
    }

    let list = TaskList::create(
        &state.db,
        CreateTaskList {
            name: req.name,
            description: req.description.filter(|d| !d.trim().is_empty()),
            owner_id: auth.user_id,
        },
    )
    .await?;

    tracing::info!(list_id = %list.id, owner_id = %auth.user_id, "Task list created");
    Ok((StatusCode::CREATED, Json(list)))
}

/// Joins a list by its invite code (case-insensitive)
///
/// # Errors
///
/// - `404 Not Found`: No list has this code
/// - `400 Bad Request`: Already a member
pub async fn join_task_list(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<JoinTaskListRequest>,
) -> ApiResult<Json<TaskList>> {
    let code = normalize_invite_code(&req.invite_code);
    let unknown = || ApiError::NotFound("Invalid invite code".to_string());

    if !is_valid_invite_code(&code) {
        return Err(unknown());
    }

    let list = TaskList::find_by_invite_code(&state.db, &code)
        .await?
        .ok_or_else(unknown)?;

    if Membership::is_member(&state.db, list.id, auth.user_id).await? {
        return Err(ApiError::Conflict(
            "Already a member of this task list".to_string(),
        ));
    }

    let mut conn = state.db.acquire().await?;
    Membership::create(&mut *conn, list.id, auth.user_id, ListRole::Member).await?;
    drop(conn);

    tracing::info!(list_id = %list.id, user_id = %auth.user_id, "Member joined task list");

    if list.owner_id != auth.user_id {
        let member_name = match User::find_by_id(&state.db, auth.user_id).await {
            Ok(Some(user)) => user.name,
            _ => "A new member".to_string(),
        };
        state
            .notifier
            .notify_best_effort(notifications::member_joined(&list, &member_name))
            .await;
    }

    Ok(Json(list))
}

/// Deletes a list with its tasks, labels, memberships and reminders
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not the owner
/// - `404 Not Found`: List does not exist
pub async fn delete_task_list(
    State(state): State<AppState>,
    auth: AuthContext,
    client: ClientInfo,
    Path(list_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorization::require_owner(&state.db, list_id, auth.user_id).await?;

    let reminder_ids = TaskList::delete(&state.db, list_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task list not found".to_string()))?;

    let cancelled = state.scheduler.cancel_many(&reminder_ids);

    audit::record(
        SecurityEvent::ListDeleted,
        &client,
        Some(auth.user_id),
        &format!("list_id={} cancelled_reminders={}", list_id, cancelled),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberDetail>>> {
    authorization::require_membership(&state.db, list_id, auth.user_id).await?;
    let members = Membership::list_members(&state.db, list_id).await?;
    Ok(Json(members))
}
