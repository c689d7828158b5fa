/// Task endpoints
///
/// ```text
/// GET    /task-lists/:id/tasks    list with viewer context (queue position, next reminder)
/// POST   /task-lists/:id/tasks    create
/// PUT    /tasks/:id               partial update
/// DELETE /tasks/:id               delete and renumber the list's queues
/// ```
///
/// Every handler checks list membership before touching task rows. Side
/// effects (notifications, reminder upkeep, broadcasts) run after the write
/// commits, in [`crate::services::tasks`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use tasklane_shared::auth::{authorization, middleware::AuthContext};
use tasklane_shared::models::{
    label::{Label, LabelKind},
    membership::Membership,
    task::{self, CreateTask, Task, TaskDetail, TaskPatch, TaskPriority},
};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    services,
};

/// Create request; accepts snake_case and camelCase keys
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(alias = "title")]
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    #[serde(alias = "dueDate")]
    pub due_date: Option<String>,
    #[serde(alias = "estimatedHours")]
    pub estimated_hours: Option<f64>,
    #[serde(alias = "projectId")]
    pub project_id: Option<Uuid>,
    #[serde(alias = "requesterId")]
    pub requester_id: Option<Uuid>,
    #[serde(alias = "assignedTo")]
    pub assigned_to: Option<Uuid>,
}

impl CreateTaskRequest {
    /// Validates field values that need no database access
    fn into_create(self, list_id: Uuid, created_by: Uuid) -> ApiResult<CreateTask> {
        let priority = match self.priority.as_deref().map(str::trim) {
            None | Some("") => TaskPriority::default(),
            Some(p) => p.parse::<TaskPriority>()?,
        };

        let due_date = match self.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(d) => Some(task::parse_due_date(d)?),
        };

        let estimated_hours = self
            .estimated_hours
            .map(task::validate_estimated_hours)
            .transpose()?;

        Ok(CreateTask {
            name: task::parse_name(&self.name)?,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            priority,
            due_date,
            estimated_hours,
            list_id,
            project_id: self.project_id,
            requester_id: self.requester_id,
            assigned_to: self.assigned_to,
            created_by,
        })
    }
}

/// Checks that referenced labels and the assignee belong to `list_id`
async fn check_references(
    state: &AppState,
    list_id: Uuid,
    project_id: Option<Uuid>,
    requester_id: Option<Uuid>,
    assigned_to: Option<Uuid>,
) -> ApiResult<()> {
    if let Some(id) = project_id {
        if !Label::belongs_to_list(&state.db, LabelKind::Project, id, list_id).await? {
            return Err(ApiError::validation("project_id", "Project does not belong to this task list"));
        }
    }
    if let Some(id) = requester_id {
        if !Label::belongs_to_list(&state.db, LabelKind::Requester, id, list_id).await? {
            return Err(ApiError::validation(
                "requester_id",
                "Requester does not belong to this task list",
            ));
        }
    }
    if let Some(id) = assigned_to {
        if !Membership::is_member(&state.db, list_id, id).await? {
            return Err(ApiError::validation(
                "assigned_to",
                "Assignee must be a member of this task list",
            ));
        }
    }
    Ok(())
}

pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TaskDetail>>> {
    authorization::require_membership(&state.db, list_id, auth.user_id).await?;
    let tasks = Task::list_by_list(&state.db, list_id, auth.user_id).await?;
    Ok(Json(tasks))
}

/// Creates a task in a list
///
/// # Errors
///
/// - `400 Bad Request`: Invalid field, foreign label or non-member assignee
/// - `403 Forbidden`: Caller is not a member
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(list_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskDetail>)> {
    authorization::require_membership(&state.db, list_id, auth.user_id).await?;

    let data = req.into_create(list_id, auth.user_id)?;
    check_references(&state, list_id, data.project_id, data.requester_id, data.assigned_to).await?;

    let task = Task::create(&state.db, data).await?;
    tracing::info!(task_id = %task.id, list_id = %list_id, "Task created");

    services::tasks::after_create(&state, auth.user_id, &task).await;

    let detail = Task::find_detail(&state.db, task.id, Some(auth.user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// Applies a partial update
///
/// The body is a JSON object; keys are normalized and filtered to the
/// updatable columns (`dueDate`, `done`, `assignedTo` and similar spellings
/// are accepted).
///
/// # Errors
///
/// - `400 Bad Request`: No updatable field, invalid value or foreign reference
/// - `403 Forbidden`: Caller is not a member of the task's list
/// - `404 Not Found`: Task does not exist
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
    Json(body): Json<Map<String, JsonValue>>,
) -> ApiResult<Json<TaskDetail>> {
    let list_id = authorization::require_task_membership(&state.db, task_id, auth.user_id).await?;

    let patch = TaskPatch::from_json(&body)?;
    check_references(
        &state,
        list_id,
        patch.project_id.flatten(),
        patch.requester_id.flatten(),
        patch.assigned_to.flatten(),
    )
    .await?;

    let change = Task::update(&state.db, task_id, &patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    tracing::info!(task_id = %task_id, fields = ?patch.columns(), "Task updated");

    services::tasks::after_update(&state, auth.user_id, &change).await;

    let detail = Task::find_detail(&state.db, task_id, Some(auth.user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(Json(detail))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorization::require_task_membership(&state.db, task_id, auth.user_id).await?;

    services::tasks::delete(&state, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreateTaskRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_create_defaults() {
        let list = Uuid::new_v4();
        let user = Uuid::new_v4();
        let data = request(r#"{"name":"  Buy milk  "}"#).into_create(list, user).unwrap();

        assert_eq!(data.name, "Buy milk");
        assert_eq!(data.priority, TaskPriority::Medium);
        assert!(data.due_date.is_none());
        assert_eq!(data.list_id, list);
        assert_eq!(data.created_by, user);
    }

    #[test]
    fn test_create_accepts_camel_case() {
        let data = request(r#"{"title":"Ship","dueDate":"2030-05-01","estimatedHours":2.5,"priority":"HIGH"}"#)
            .into_create(Uuid::new_v4(), Uuid::new_v4())
            .unwrap();

        assert_eq!(data.priority, TaskPriority::High);
        assert_eq!(data.estimated_hours, Some(2.5));
        assert_eq!(data.due_date.unwrap().to_rfc3339(), "2030-05-01T00:00:00+00:00");
    }

    #[test]
    fn test_create_rejects_bad_values() {
        let ids = || (Uuid::new_v4(), Uuid::new_v4());

        let (l, u) = ids();
        assert!(request(r#"{"name":"   "}"#).into_create(l, u).is_err());
        let (l, u) = ids();
        assert!(request(r#"{"name":"x","priority":"someday"}"#).into_create(l, u).is_err());
        let (l, u) = ids();
        assert!(request(r#"{"name":"x","estimated_hours":1000}"#).into_create(l, u).is_err());
        let (l, u) = ids();
        assert!(request(r#"{"name":"x","due_date":"tomorrow"}"#).into_create(l, u).is_err());
    }
}
