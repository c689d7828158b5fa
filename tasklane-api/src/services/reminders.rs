/// Keeps scheduler jobs in step with reminder rows
///
/// Every function here runs after the database change it follows has
/// committed. A scheduling failure (the scheduler only refuses work once it
/// is shutting down) is logged; startup recovery rebuilds jobs from the rows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tasklane_shared::models::reminder::{Recalculation, Reminder};
use tasklane_worker::scheduler::ReminderScheduler;

/// Schedules freshly inserted reminders
pub fn schedule_created(scheduler: &ReminderScheduler, reminders: &[Reminder]) {
    for reminder in reminders {
        schedule_one(scheduler, reminder.id, reminder.reminder_datetime);
    }
}

fn schedule_one(scheduler: &ReminderScheduler, id: Uuid, at: DateTime<Utc>) {
    if let Err(e) = scheduler.schedule(id, at) {
        tracing::warn!(reminder_id = %id, error = %e, "Failed to schedule reminder");
    }
}

/// Applies a due-date recalculation to the scheduler
pub fn apply_recalculation(scheduler: &ReminderScheduler, outcome: &Recalculation) {
    scheduler.cancel_many(&outcome.removed);
    for (id, at) in &outcome.rescheduled {
        schedule_one(scheduler, *id, *at);
    }
}

/// Recalculates a task's reminders after its due date changed
///
/// # Returns
///
/// The recalculation, for logging and tests
pub async fn follow_due_date(
    pool: &PgPool,
    scheduler: &ReminderScheduler,
    task_id: Uuid,
    new_due: Option<DateTime<Utc>>,
) -> Result<Recalculation, sqlx::Error> {
    let outcome = Reminder::recalculate_for_task(pool, task_id, new_due, Utc::now()).await?;
    apply_recalculation(scheduler, &outcome);

    tracing::debug!(
        task_id = %task_id,
        rescheduled = outcome.rescheduled.len(),
        removed = outcome.removed.len(),
        "Reminders recalculated"
    );

    Ok(outcome)
}

/// Deletes a completed task's pending reminders and cancels their jobs
pub async fn clear_pending(
    pool: &PgPool,
    scheduler: &ReminderScheduler,
    task_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let removed = Reminder::delete_pending_for_task(pool, task_id).await?;
    let cancelled = scheduler.cancel_many(&removed);

    tracing::debug!(task_id = %task_id, removed = removed.len(), cancelled, "Pending reminders cleared");
    Ok(removed)
}
