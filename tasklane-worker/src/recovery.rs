/// Startup recovery
///
/// The scheduler lives in memory, so every start rebuilds it from the
/// `reminders` table. Only unsent reminders whose time is still ahead are
/// scheduled. Reminders that came due while the process was down are left
/// alone; users see them through `GET /reminders/missed`.

use chrono::Utc;
use sqlx::PgPool;

use tasklane_shared::models::reminder::Reminder;

use crate::scheduler::{ReminderScheduler, SchedulerError};

/// Recovery errors
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("Failed to load pending reminders: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Schedules every pending future reminder
///
/// # Returns
///
/// Number of reminders scheduled
pub async fn recover_pending(pool: &PgPool, scheduler: &ReminderScheduler) -> Result<usize, RecoveryError> {
    let now = Utc::now();
    let pending = Reminder::load_recoverable(pool, now).await?;

    for reminder in &pending {
        scheduler.schedule(reminder.id, reminder.reminder_datetime)?;
    }

    tracing::info!(scheduled = pending.len(), "Recovered pending reminders");
    Ok(pending.len())
}
