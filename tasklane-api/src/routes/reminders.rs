/// Reminder endpoints
///
/// ```text
/// GET    /tasks/:id/reminders                  caller's reminders on the task
/// POST   /tasks/:id/reminders                  one spec or an array of specs
/// DELETE /tasks/:id/reminders/:reminder_id
/// GET    /reminders/missed                     last seven days
/// ```
///
/// A reminder fires `time_value` `time_unit`s before the task's due date.
/// Rows are written first; scheduler jobs are armed only after the insert
/// commits.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use tasklane_shared::auth::{authorization, middleware::AuthContext};
use tasklane_shared::models::{
    reminder::{MissedReminder, Reminder, ReminderSpec},
    task::Task,
};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    services,
};

/// Create body: a single spec or a batch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreateRemindersRequest {
    Batch(Vec<ReminderSpec>),
    Single(ReminderSpec),
}

impl CreateRemindersRequest {
    fn into_specs(self) -> Vec<ReminderSpec> {
        match self {
            CreateRemindersRequest::Batch(specs) => specs,
            CreateRemindersRequest::Single(spec) => vec![spec],
        }
    }
}

pub async fn list_reminders(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Reminder>>> {
    authorization::require_task_membership(&state.db, task_id, auth.user_id).await?;
    let reminders = Reminder::list_for_task(&state.db, task_id, auth.user_id).await?;
    Ok(Json(reminders))
}

/// Creates reminders for the caller on a task
///
/// The whole batch is rejected if any entry is invalid, in the past or a
/// duplicate.
///
/// # Errors
///
/// - `400 Bad Request`: No due date, past fire time, duplicate, bad value or empty batch
/// - `403 Forbidden`: Caller is not a member of the task's list
/// - `404 Not Found`: Task does not exist
pub async fn create_reminders(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
    Json(req): Json<CreateRemindersRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Reminder>>)> {
    let specs = req.into_specs();
    if specs.is_empty() {
        return Err(ApiError::BadRequest("At least one reminder is required".to_string()));
    }

    authorization::require_task_membership(&state.db, task_id, auth.user_id).await?;

    let task = Task::find_by_id(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    let created = Reminder::create_batch(&state.db, task_id, auth.user_id, task.due_date, &specs).await?;
    services::reminders::schedule_created(&state.scheduler, &created);

    tracing::info!(task_id = %task_id, user_id = %auth.user_id, count = created.len(), "Reminders created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_reminder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((task_id, reminder_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    authorization::require_task_membership(&state.db, task_id, auth.user_id).await?;

    if !Reminder::delete_for_user(&state.db, reminder_id, task_id, auth.user_id).await? {
        return Err(ApiError::NotFound("Reminder not found".to_string()));
    }
    state.scheduler.cancel(reminder_id);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn missed_reminders(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<MissedReminder>>> {
    let missed = Reminder::missed_for_user(&state.db, auth.user_id, Utc::now()).await?;
    Ok(Json(missed))
}
