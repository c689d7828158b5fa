/// Persist-then-broadcast notification service
///
/// [`Notifier::create`] inserts the row and, once the insert has returned,
/// pushes a `newNotification` event to the recipient's `user_{id}` room.
/// Offline recipients simply find the row on their next
/// `GET /notifications`.
///
/// Request handlers use [`Notifier::notify_best_effort`]: a failed
/// notification is logged and never fails the operation that triggered it.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tasklane_shared::events::RealtimeHub;
/// use tasklane_shared::notifications::{self, Notifier};
/// use tasklane_shared::models::task::Task;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, task: Task) {
/// let notifier = Notifier::new(pool, Arc::new(RealtimeHub::new()));
/// if let Some(assignee) = task.assigned_to {
///     notifier
///         .notify_best_effort(notifications::task_assigned(&task, assignee, "Alice"))
///         .await;
/// }
/// # }
/// ```

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::events::{RealtimeHub, ServerEvent};
use crate::logging::sanitize;
use crate::models::notification::{NewNotification, Notification, NotificationType};
use crate::models::reminder::ReminderContext;
use crate::models::task::Task;
use crate::models::task_list::TaskList;

/// Creates notifications and fans them out
#[derive(Debug, Clone)]
pub struct Notifier {
    pool: PgPool,
    hub: Arc<RealtimeHub>,
}

impl Notifier {
    pub fn new(pool: PgPool, hub: Arc<RealtimeHub>) -> Self {
        Self { pool, hub }
    }

    pub fn hub(&self) -> &Arc<RealtimeHub> {
        &self.hub
    }

    /// Inserts a notification and emits it to the recipient
    ///
    /// # Errors
    ///
    /// Returns the insert error; nothing is emitted in that case
    pub async fn create(&self, data: NewNotification) -> Result<Notification, sqlx::Error> {
        let notification = Notification::create(&self.pool, data).await?;

        let delivered = self
            .hub
            .emit_to_user(
                notification.user_id,
                &ServerEvent::NewNotification(notification.clone()),
            )
            .await;

        tracing::debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = notification.notification_type.as_str(),
            delivered,
            "Notification created"
        );

        Ok(notification)
    }

    /// Like [`Notifier::create`] but logs failures instead of returning them
    pub async fn notify_best_effort(&self, data: NewNotification) -> Option<Notification> {
        let user_id = data.user_id;
        let kind = data.notification_type.as_str();

        match self.create(data).await {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, kind, "Failed to create notification");
                None
            }
        }
    }
}

/// Formats a due date for notification text, e.g. `Tue, Jan 1, 2030 at 10:00 UTC`
pub fn format_due(due: DateTime<Utc>) -> String {
    due.format("%a, %b %-d, %Y at %H:%M UTC").to_string()
}

/// Notification for a task newly assigned to `assignee` by someone else
pub fn task_assigned(task: &Task, assignee: Uuid, assigner_name: &str) -> NewNotification {
    NewNotification {
        user_id: assignee,
        task_id: Some(task.id),
        list_id: Some(task.list_id),
        notification_type: NotificationType::TaskAssigned,
        title: "New task assigned".to_string(),
        message: format!("{} assigned you \"{}\"", assigner_name, task.name),
    }
}

/// Notification for a fired reminder
pub fn task_reminder(ctx: &ReminderContext) -> NewNotification {
    let message = match ctx.due_date {
        Some(due) => format!(
            "\"{}\" in {} is due {} ({} from now)",
            ctx.task_name,
            ctx.list_name,
            format_due(due),
            ctx.time_unit.describe(ctx.time_value),
        ),
        None => format!("\"{}\" in {} needs your attention", ctx.task_name, ctx.list_name),
    };

    NewNotification {
        user_id: ctx.user_id,
        task_id: Some(ctx.task_id),
        list_id: Some(ctx.list_id),
        notification_type: NotificationType::TaskReminder,
        title: format!("Reminder: {}", ctx.task_name),
        message,
    }
}

/// Notification to a list owner that someone joined by invite code
pub fn member_joined(list: &TaskList, member_name: &str) -> NewNotification {
    NewNotification {
        user_id: list.owner_id,
        task_id: None,
        list_id: Some(list.id),
        notification_type: NotificationType::MemberJoined,
        title: "New member".to_string(),
        message: format!("{} joined \"{}\"", sanitize(member_name), list.name),
    }
}
