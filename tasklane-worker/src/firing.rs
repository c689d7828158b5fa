/// Reminder firing
///
/// The scheduler knows only reminder IDs and fire times. What happens when a
/// time is reached lives behind the [`ReminderFirer`] trait, so the scheduler
/// can be exercised without a database.
///
/// # Firing contract
///
/// ```text
/// NotifyingFirer::fire(id)
///   ├─> load reminder + task + list      (gone or already sent: skip)
///   ├─> insert task_reminder notification (emits newNotification on user_{id})
///   └─> mark is_sent = true, sent_at = now
/// ```
///
/// If the notification insert fails the reminder stays unsent. Delivery is
/// at-least-once: a crash between the insert and `mark_sent` can repeat the
/// notification on the next start if the fire time is still ahead.

use async_trait::async_trait;
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

use tasklane_shared::models::reminder::Reminder;
use tasklane_shared::notifications::{self, Notifier};

/// Firing errors
#[derive(Debug, thiserror::Error)]
pub enum FireError {
    #[error("Failed to load reminder: {0}")]
    Load(#[source] sqlx::Error),

    #[error("Failed to create notification: {0}")]
    Notification(#[source] sqlx::Error),

    #[error("Failed to mark reminder sent: {0}")]
    MarkSent(#[source] sqlx::Error),
}

/// Why a reminder was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Row deleted since it was scheduled
    Gone,
    AlreadySent,
    TaskDone,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Gone => write!(f, "gone"),
            SkipReason::AlreadySent => write!(f, "already_sent"),
            SkipReason::TaskDone => write!(f, "task_done"),
        }
    }
}

/// Result of a fire attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// Notification created and reminder marked sent
    Delivered { notification_id: Uuid },
    Skipped(SkipReason),
}

/// Callback run when a reminder's time is reached
#[async_trait]
pub trait ReminderFirer: Send + Sync {
    async fn fire(&self, reminder_id: Uuid) -> Result<FireOutcome, FireError>;
}

/// Production firer: persists a `task_reminder` notification and marks the
/// reminder sent
#[derive(Debug, Clone)]
pub struct NotifyingFirer {
    pool: PgPool,
    notifier: Notifier,
}

impl NotifyingFirer {
    pub fn new(pool: PgPool, notifier: Notifier) -> Self {
        Self { pool, notifier }
    }
}

#[async_trait]
impl ReminderFirer for NotifyingFirer {
    async fn fire(&self, reminder_id: Uuid) -> Result<FireOutcome, FireError> {
        let Some(ctx) = Reminder::load_context(&self.pool, reminder_id)
            .await
            .map_err(FireError::Load)?
        else {
            return Ok(FireOutcome::Skipped(SkipReason::Gone));
        };

        if ctx.is_sent {
            return Ok(FireOutcome::Skipped(SkipReason::AlreadySent));
        }
        if ctx.task_done {
            return Ok(FireOutcome::Skipped(SkipReason::TaskDone));
        }

        let notification = self
            .notifier
            .create(notifications::task_reminder(&ctx))
            .await
            .map_err(FireError::Notification)?;

        Reminder::mark_sent(&self.pool, reminder_id)
            .await
            .map_err(FireError::MarkSent)?;

        Ok(FireOutcome::Delivered {
            notification_id: notification.id,
        })
    }
}
