/// Task model and database operations
///
/// Tasks belong to exactly one list. Labels and the assignee are optional
/// references that fall back to `NULL` when their row disappears; deleting the
/// task cascades to its queue entries, reminders and notifications.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'urgent');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     status BOOLEAN NOT NULL DEFAULT FALSE,
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ,
///     estimated_hours DOUBLE PRECISION,
///     list_id UUID NOT NULL REFERENCES task_lists(id) ON DELETE CASCADE,
///     project_id UUID REFERENCES projects(id) ON DELETE SET NULL,
///     requester_id UUID REFERENCES requesters(id) ON DELETE SET NULL,
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Partial updates
///
/// `PUT /tasks/{id}` accepts an arbitrary JSON object. [`TaskPatch::from_json`]
/// normalizes its keys to column names, drops anything outside the updatable
/// whitelist and type-checks the rest. [`Task::update`] turns the patch into a
/// single `UPDATE` with a computed `SET` clause.
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::models::task::{Task, TaskPatch};
/// use serde_json::json;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, task_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let body = json!({ "dueDate": "2030-01-02T10:00:00Z", "done": true, "color": "red" });
/// let patch = TaskPatch::from_json(body.as_object().unwrap())?;
///
/// if let Some(change) = Task::update(&pool, task_id, &patch).await? {
///     assert!(change.completed());
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::{PgConnection, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use super::queue;

/// Upper bound for `estimated_hours` (matches the column CHECK)
pub const MAX_ESTIMATED_HOURS: f64 = 999.99;

/// Longest accepted task name
pub const MAX_NAME_LENGTH: usize = 255;

const TASK_COLUMNS: &str = "id, name, description, status, priority, due_date, estimated_hours, \
     list_id, project_id, requester_id, assigned_to, created_by, created_at, updated_at";

/// Errors raised while validating task input
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Validation(String),

    #[error("No updatable fields provided")]
    EmptyPatch,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            other => Err(TaskError::Validation(format!(
                "Invalid priority '{}': expected low, medium, high or urgent",
                other
            ))),
        }
    }
}

/// Task row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// Done flag
    pub status: bool,

    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub list_id: Uuid,
    pub project_id: Option<Uuid>,
    pub requester_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,

    /// Null once the creator's account is deleted
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task joined with label, people, queue and reminder context
///
/// `queue_position` and `next_reminder_at` are relative to the viewer the row
/// was loaded for; rows loaded without a viewer carry `None` for both.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,

    pub project_name: Option<String>,
    pub requester_name: Option<String>,
    pub assignee_name: Option<String>,
    pub assignee_email: Option<String>,
    pub creator_name: Option<String>,
    pub queue_position: Option<i32>,
    pub next_reminder_at: Option<DateTime<Utc>>,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub name: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub list_id: Uuid,
    pub project_id: Option<Uuid>,
    pub requester_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
}

/// Whitelisted partial update
///
/// Outer `None` means "not in the request"; for nullable columns
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<bool>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub estimated_hours: Option<Option<f64>>,
    pub project_id: Option<Option<Uuid>>,
    pub requester_id: Option<Option<Uuid>>,
    pub assigned_to: Option<Option<Uuid>>,
}

/// Converts a camelCase key to snake_case (`dueDate` → `due_date`)
fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.trim().chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '-' || ch == ' ' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Maps a request key to its column name, or None if it is not updatable
pub fn canonical_field(key: &str) -> Option<&'static str> {
    match to_snake_case(key).as_str() {
        "name" | "title" => Some("name"),
        "description" => Some("description"),
        "status" | "done" | "completed" | "is_completed" => Some("status"),
        "priority" => Some("priority"),
        "due_date" | "due" => Some("due_date"),
        "estimated_hours" | "estimate" | "estimated_time" => Some("estimated_hours"),
        "project_id" | "project" => Some("project_id"),
        "requester_id" | "requester" => Some("requester_id"),
        "assigned_to" | "assignee" | "assignee_id" | "assigned_to_id" => Some("assigned_to"),
        _ => None,
    }
}

fn invalid(field: &str, expected: &str) -> TaskError {
    TaskError::Validation(format!("Field '{}' must be {}", field, expected))
}

/// Parses a task name: non-empty after trimming, at most 255 characters
pub fn parse_name(value: &str) -> Result<String, TaskError> {
    let name = value.trim();
    if name.is_empty() {
        return Err(TaskError::Validation("Task name cannot be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(TaskError::Validation(format!(
            "Task name cannot exceed {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

/// Checks estimated hours against `[0, 999.99]`
pub fn validate_estimated_hours(hours: f64) -> Result<f64, TaskError> {
    if hours.is_finite() && (0.0..=MAX_ESTIMATED_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(TaskError::Validation(format!(
            "Estimated hours must be between 0 and {}",
            MAX_ESTIMATED_HOURS
        )))
    }
}

/// Parses a due date: RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC
pub fn parse_due_date(value: &str) -> Result<DateTime<Utc>, TaskError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| invalid("due_date", "an RFC 3339 timestamp or YYYY-MM-DD date"))
}

fn nullable_string(field: &str, value: &JsonValue) -> Result<Option<String>, TaskError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) if s.trim().is_empty() => Ok(None),
        JsonValue::String(s) => Ok(Some(s.trim().to_string())),
        _ => Err(invalid(field, "a string or null")),
    }
}

fn nullable_uuid(field: &str, value: &JsonValue) -> Result<Option<Uuid>, TaskError> {
    match nullable_string(field, value)? {
        None => Ok(None),
        Some(s) => Uuid::parse_str(&s)
            .map(Some)
            .map_err(|_| invalid(field, "a UUID or null")),
    }
}

impl TaskPatch {
    /// Builds a patch from a raw JSON object
    ///
    /// Keys outside the whitelist are ignored. When the same column is given
    /// twice under different spellings, the later key wins.
    ///
    /// # Errors
    ///
    /// - `TaskError::EmptyPatch` if no whitelisted key is present
    /// - `TaskError::Validation` if a value has the wrong type or range
    pub fn from_json(body: &Map<String, JsonValue>) -> Result<Self, TaskError> {
        let mut patch = TaskPatch::default();

        for (key, value) in body {
            let Some(field) = canonical_field(key) else {
                continue;
            };

            match field {
                "name" => {
                    let s = value.as_str().ok_or_else(|| invalid(field, "a string"))?;
                    patch.name = Some(parse_name(s)?);
                }
                "description" => patch.description = Some(nullable_string(field, value)?),
                "status" => {
                    patch.status = Some(value.as_bool().ok_or_else(|| invalid(field, "a boolean"))?)
                }
                "priority" => {
                    let s = value.as_str().ok_or_else(|| invalid(field, "a string"))?;
                    patch.priority = Some(s.parse()?);
                }
                "due_date" => {
                    patch.due_date = Some(match nullable_string(field, value)? {
                        None => None,
                        Some(s) => Some(parse_due_date(&s)?),
                    })
                }
                "estimated_hours" => {
                    patch.estimated_hours = Some(match value {
                        JsonValue::Null => None,
                        JsonValue::String(s) if s.trim().is_empty() => None,
                        JsonValue::Number(n) => {
                            let hours = n.as_f64().ok_or_else(|| invalid(field, "a number"))?;
                            Some(validate_estimated_hours(hours)?)
                        }
                        JsonValue::String(s) => {
                            let hours: f64 =
                                s.trim().parse().map_err(|_| invalid(field, "a number"))?;
                            Some(validate_estimated_hours(hours)?)
                        }
                        _ => return Err(invalid(field, "a number or null")),
                    })
                }
                "project_id" => patch.project_id = Some(nullable_uuid(field, value)?),
                "requester_id" => patch.requester_id = Some(nullable_uuid(field, value)?),
                "assigned_to" => patch.assigned_to = Some(nullable_uuid(field, value)?),
                _ => {}
            }
        }

        if patch.is_empty() {
            return Err(TaskError::EmptyPatch);
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.columns().is_empty()
    }

    /// Column names this patch writes, in bind order
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = Vec::new();
        if self.name.is_some() {
            columns.push("name");
        }
        if self.description.is_some() {
            columns.push("description");
        }
        if self.status.is_some() {
            columns.push("status");
        }
        if self.priority.is_some() {
            columns.push("priority");
        }
        if self.due_date.is_some() {
            columns.push("due_date");
        }
        if self.estimated_hours.is_some() {
            columns.push("estimated_hours");
        }
        if self.project_id.is_some() {
            columns.push("project_id");
        }
        if self.requester_id.is_some() {
            columns.push("requester_id");
        }
        if self.assigned_to.is_some() {
            columns.push("assigned_to");
        }
        columns
    }

    /// Renders `UPDATE tasks SET ...` with `$1` bound to the task id
    pub fn to_sql(&self) -> String {
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        for (i, column) in self.columns().iter().enumerate() {
            query.push_str(&format!(", {} = ${}", column, i + 2));
        }
        query.push_str(&format!(" WHERE id = $1 RETURNING {}", TASK_COLUMNS));
        query
    }
}

/// What an update means for the task's reminders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderFollowUp {
    Nothing,
    /// Delete pending reminders and cancel their jobs
    ClearPending,
    /// Move reminders to the new due date
    Recalculate,
}

/// Before and after images of an updated task
#[derive(Debug, Clone)]
pub struct TaskChange {
    pub before: Task,
    pub after: Task,
}

impl TaskChange {
    /// Status went from open to done
    pub fn completed(&self) -> bool {
        !self.before.status && self.after.status
    }

    pub fn due_date_changed(&self) -> bool {
        self.before.due_date != self.after.due_date
    }

    /// Reminders of a done task are never re-armed, so a due-date change on
    /// a done task only clears what is still pending
    pub fn reminder_follow_up(&self) -> ReminderFollowUp {
        if self.completed() || (self.after.status && self.due_date_changed()) {
            ReminderFollowUp::ClearPending
        } else if self.due_date_changed() {
            ReminderFollowUp::Recalculate
        } else {
            ReminderFollowUp::Nothing
        }
    }

    /// New assignee, if the assignment changed to a non-null user
    pub fn newly_assigned_to(&self) -> Option<Uuid> {
        match self.after.assigned_to {
            Some(user) if self.before.assigned_to != Some(user) => Some(user),
            _ => None,
        }
    }
}

/// What a task deletion left behind for the caller to clean up
#[derive(Debug, Clone)]
pub struct DeletedTask {
    pub id: Uuid,
    pub list_id: Uuid,
    /// Unsent reminders whose jobs must be cancelled
    pub reminder_ids: Vec<Uuid>,
}

const DETAIL_SELECT: &str = r#"
    SELECT t.id, t.name, t.description, t.status, t.priority, t.due_date, t.estimated_hours,
           t.list_id, t.project_id, t.requester_id, t.assigned_to, t.created_by,
           t.created_at, t.updated_at,
           p.name AS project_name,
           rq.name AS requester_name,
           a.name AS assignee_name,
           a.email AS assignee_email,
           c.name AS creator_name,
           q.position AS queue_position,
           (SELECT MIN(r.reminder_datetime) FROM reminders r
            WHERE r.task_id = t.id AND r.user_id = $2 AND r.is_sent = FALSE) AS next_reminder_at
    FROM tasks t
    LEFT JOIN projects p ON p.id = t.project_id
    LEFT JOIN requesters rq ON rq.id = t.requester_id
    LEFT JOIN users a ON a.id = t.assigned_to
    LEFT JOIN users c ON c.id = t.created_by
    LEFT JOIN queue_entries q ON q.task_id = t.id AND q.user_id = $2
"#;

impl Task {
    /// Inserts a task
    ///
    /// Callers validate label ownership and assignee membership first; the
    /// database only enforces the foreign keys and the hours range.
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (name, description, priority, due_date, estimated_hours,
                               list_id, project_id, requester_id, assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(data.name)
        .bind(data.description)
        .bind(data.priority)
        .bind(data.due_date)
        .bind(data.estimated_hours)
        .bind(data.list_id)
        .bind(data.project_id)
        .bind(data.requester_id)
        .bind(data.assigned_to)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(task)
    }

    /// Resolves the list a task belongs to, for the authorization gate
    pub async fn list_id_of(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT list_id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Loads one task with its joined context for `viewer`
    pub async fn find_detail(
        pool: &PgPool,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Option<TaskDetail>, sqlx::Error> {
        let detail = sqlx::query_as::<_, TaskDetail>(&format!("{DETAIL_SELECT} WHERE t.id = $1"))
            .bind(id)
            .bind(viewer)
            .fetch_optional(pool)
            .await?;

        Ok(detail)
    }

    /// Lists a list's tasks for `viewer`: open before done, then by due date
    /// (undated last), newest first among equals
    pub async fn list_by_list(
        pool: &PgPool,
        list_id: Uuid,
        viewer: Uuid,
    ) -> Result<Vec<TaskDetail>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, TaskDetail>(&format!(
            "{DETAIL_SELECT} WHERE t.list_id = $1 \
             ORDER BY t.status ASC, t.due_date ASC NULLS LAST, t.created_at DESC"
        ))
        .bind(list_id)
        .bind(viewer)
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Applies a patch with one `UPDATE`
    ///
    /// The prior row is locked and read in the same transaction so the
    /// returned [`TaskChange`] reflects exactly what this statement changed.
    ///
    /// # Returns
    ///
    /// None if the task doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Option<TaskChange>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let before = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(before) = before else {
            tx.rollback().await?;
            return Ok(None);
        };

        let query = patch.to_sql();
        let mut q = sqlx::query_as::<_, Task>(&query).bind(id);

        if let Some(name) = &patch.name {
            q = q.bind(name.clone());
        }
        if let Some(description) = &patch.description {
            q = q.bind(description.clone());
        }
        if let Some(status) = patch.status {
            q = q.bind(status);
        }
        if let Some(priority) = patch.priority {
            q = q.bind(priority);
        }
        if let Some(due_date) = patch.due_date {
            q = q.bind(due_date);
        }
        if let Some(hours) = patch.estimated_hours {
            q = q.bind(hours);
        }
        if let Some(project_id) = patch.project_id {
            q = q.bind(project_id);
        }
        if let Some(requester_id) = patch.requester_id {
            q = q.bind(requester_id);
        }
        if let Some(assigned_to) = patch.assigned_to {
            q = q.bind(assigned_to);
        }

        let after = q.fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(Some(TaskChange { before, after }))
    }

    /// Deletes a task and renumbers every queue in its list
    ///
    /// Runs on the caller's serializable transaction (see
    /// [`crate::db::transaction::serializable`]).
    pub async fn delete_in(conn: &mut PgConnection, id: Uuid) -> Result<Option<DeletedTask>, sqlx::Error> {
        let reminder_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM reminders WHERE task_id = $1 AND is_sent = FALSE",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let list_id: Option<Uuid> = sqlx::query_scalar("DELETE FROM tasks WHERE id = $1 RETURNING list_id")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        let Some(list_id) = list_id else {
            return Ok(None);
        };

        queue::renumber_list(conn, list_id).await?;

        Ok(Some(DeletedTask {
            id,
            list_id,
            reminder_ids,
        }))
    }
}
