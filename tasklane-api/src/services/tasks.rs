/// Side effects of task writes
///
/// Handlers commit first and then call into this module. Nothing here fails
/// the request: the write already happened, so notification, scheduling and
/// broadcast failures are logged.
///
/// ```text
/// update committed
///   ├─> assignee changed to someone else?  task_assigned notification
///   ├─> done now, or due date moved on a done task?
///   │                                      delete pending reminders, cancel jobs
///   │   else due date changed?             recalculate reminders, reschedule
///   └─> taskUpdated on list_{id}
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use tasklane_shared::db::transaction::serializable;
use tasklane_shared::events::ServerEvent;
use tasklane_shared::models::task::{DeletedTask, ReminderFollowUp, Task, TaskChange, TaskDetail};
use tasklane_shared::models::user::User;
use tasklane_shared::notifications;

use crate::app::AppState;
use crate::services::reminders;

async fn display_name(pool: &PgPool, user_id: Uuid) -> String {
    match User::find_by_id(pool, user_id).await {
        Ok(Some(user)) => user.name,
        Ok(None) => "Someone".to_string(),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to load assigner name");
            "Someone".to_string()
        }
    }
}

/// Notifies `assignee` unless they assigned the task to themselves
async fn notify_assignment(state: &AppState, task: &Task, assignee: Uuid, caller: Uuid) {
    if assignee == caller {
        return;
    }
    let assigner = display_name(&state.db, caller).await;
    state
        .notifier
        .notify_best_effort(notifications::task_assigned(task, assignee, &assigner))
        .await;
}

async fn load_detail(pool: &PgPool, task_id: Uuid) -> Option<TaskDetail> {
    match Task::find_detail(pool, task_id, None).await {
        Ok(detail) => detail,
        Err(e) => {
            tracing::warn!(task_id = %task_id, error = %e, "Failed to load task for broadcast");
            None
        }
    }
}

/// After a task insert
pub async fn after_create(state: &AppState, caller: Uuid, task: &Task) {
    if let Some(assignee) = task.assigned_to {
        notify_assignment(state, task, assignee, caller).await;
    }

    if let Some(detail) = load_detail(&state.db, task.id).await {
        state
            .hub()
            .emit_to_list(task.list_id, &ServerEvent::TaskCreated(detail))
            .await;
    }
}

/// After a task update
pub async fn after_update(state: &AppState, caller: Uuid, change: &TaskChange) {
    let task = &change.after;

    if let Some(assignee) = change.newly_assigned_to() {
        notify_assignment(state, task, assignee, caller).await;
    }

    match change.reminder_follow_up() {
        ReminderFollowUp::ClearPending => {
            if let Err(e) = reminders::clear_pending(&state.db, &state.scheduler, task.id).await {
                tracing::error!(task_id = %task.id, error = %e, "Failed to clear reminders of done task");
            }
        }
        ReminderFollowUp::Recalculate => {
            if let Err(e) =
                reminders::follow_due_date(&state.db, &state.scheduler, task.id, task.due_date).await
            {
                tracing::error!(task_id = %task.id, error = %e, "Failed to recalculate reminders");
            }
        }
        ReminderFollowUp::Nothing => {}
    }

    if let Some(detail) = load_detail(&state.db, task.id).await {
        state
            .hub()
            .emit_to_list(task.list_id, &ServerEvent::TaskUpdated(detail))
            .await;
    }
}

/// Deletes a task and renumbers its list's queues in one serializable
/// transaction, then cancels its reminder jobs and broadcasts the deletion
///
/// # Returns
///
/// None if the task did not exist
pub async fn delete(state: &AppState, task_id: Uuid) -> Result<Option<DeletedTask>, sqlx::Error> {
    let deleted = serializable(&state.db, |conn| Box::pin(Task::delete_in(conn, task_id))).await?;

    let Some(deleted) = deleted else {
        return Ok(None);
    };

    let cancelled = state.scheduler.cancel_many(&deleted.reminder_ids);
    state
        .hub()
        .emit_to_list(deleted.list_id, &ServerEvent::TaskDeleted { id: deleted.id })
        .await;

    tracing::info!(task_id = %task_id, list_id = %deleted.list_id, cancelled, "Task deleted");
    Ok(Some(deleted))
}
