/// Notification model and database operations
///
/// Notifications are persisted per recipient and optionally tied to a task and
/// a list. Every query here is scoped by `user_id`, so one user can never read
/// or modify another user's notifications.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE notification_type AS ENUM ('task_assigned', 'task_reminder', 'member_joined');
///
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     task_id UUID REFERENCES tasks(id) ON DELETE CASCADE,
///     list_id UUID REFERENCES task_lists(id) ON DELETE CASCADE,
///     type notification_type NOT NULL,
///     title VARCHAR(255) NOT NULL,
///     message TEXT NOT NULL,
///     read BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// How many notifications `GET /notifications` returns
pub const LIST_LIMIT: i64 = 50;

/// Notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Someone else assigned a task to the recipient
    TaskAssigned,

    /// A scheduled reminder fired
    TaskReminder,

    /// A user joined one of the recipient's lists
    MemberJoined,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::TaskAssigned => "task_assigned",
            NotificationType::TaskReminder => "task_reminder",
            NotificationType::MemberJoined => "member_joined",
        }
    }
}

/// Notification row, enriched with list and task names when loaded for display
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Option<Uuid>,
    pub list_id: Option<Uuid>,

    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub list_name: Option<String>,
    pub task_name: Option<String>,
}

/// Input for creating a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub task_id: Option<Uuid>,
    pub list_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
}

const SELECT_WITH_NAMES: &str = r#"
    SELECT n.id, n.user_id, n.task_id, n.list_id, n.type, n.title, n.message, n.read,
           n.created_at, tl.name AS list_name, t.name AS task_name
    FROM notifications n
    LEFT JOIN task_lists tl ON tl.id = n.list_id
    LEFT JOIN tasks t ON t.id = n.task_id
"#;

impl Notification {
    /// Inserts a notification and returns it with list and task names
    ///
    /// # Errors
    ///
    /// Foreign-key violation `23503` if the user, task or list is gone
    pub async fn create(pool: &PgPool, data: NewNotification) -> Result<Self, sqlx::Error> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            WITH inserted AS (
                INSERT INTO notifications (user_id, task_id, list_id, type, title, message)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT n.id, n.user_id, n.task_id, n.list_id, n.type, n.title, n.message, n.read,
                   n.created_at, tl.name AS list_name, t.name AS task_name
            FROM inserted n
            LEFT JOIN task_lists tl ON tl.id = n.list_id
            LEFT JOIN tasks t ON t.id = n.task_id
            "#,
        )
        .bind(data.user_id)
        .bind(data.task_id)
        .bind(data.list_id)
        .bind(data.notification_type)
        .bind(data.title)
        .bind(data.message)
        .fetch_one(pool)
        .await?;

        Ok(notification)
    }

    /// Latest [`LIST_LIMIT`] notifications for a user, newest first
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "{SELECT_WITH_NAMES} WHERE n.user_id = $1 ORDER BY n.created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(LIST_LIMIT)
        .fetch_all(pool)
        .await
    }

    pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Marks one of the user's notifications read
    ///
    /// # Returns
    ///
    /// False if the notification doesn't exist or belongs to someone else
    pub async fn mark_read(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks all of the user's notifications read, returning how many changed
    pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every notification of the user
    pub async fn clear_all(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_type_strings() {
        assert_eq!(NotificationType::TaskAssigned.as_str(), "task_assigned");
        assert_eq!(NotificationType::TaskReminder.as_str(), "task_reminder");
        assert_eq!(
            serde_json::to_string(&NotificationType::MemberJoined).unwrap(),
            "\"member_joined\""
        );
    }

    #[test]
    fn test_notification_serializes_type_field() {
        let n = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            task_id: None,
            list_id: None,
            notification_type: NotificationType::TaskReminder,
            title: "Reminder".into(),
            message: "T1 is due soon".into(),
            read: false,
            created_at: Utc::now(),
            list_name: None,
            task_name: None,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "task_reminder");
        assert!(json.get("notification_type").is_none());
    }
}
