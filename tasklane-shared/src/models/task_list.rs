/// Task list model and database operations
///
/// A task list is the shared container that every other list-scoped row hangs
/// off: memberships, tasks, projects, requesters and list notifications all
/// cascade from it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_lists (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     description TEXT,
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     invite_code VARCHAR(8) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use super::membership::{ListRole, Membership};
use crate::invite::{generate_invite_code, normalize_invite_code};

/// How many fresh codes list creation tries before giving up
pub const MAX_INVITE_CODE_ATTEMPTS: usize = 5;

const INVITE_CODE_CONSTRAINT: &str = "task_lists_invite_code_key";

/// Task list row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskList {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

/// A list as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskListSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
    /// The caller's role in the list
    pub role: ListRole,
    pub member_count: i64,
}

/// Input for creating a list
#[derive(Debug, Clone)]
pub struct CreateTaskList {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

impl TaskList {
    /// Creates a list and its owner membership in one transaction
    ///
    /// A fresh invite code is generated per attempt; a collision on the
    /// invite-code unique constraint rolls the attempt back and tries again,
    /// up to [`MAX_INVITE_CODE_ATTEMPTS`] times.
    ///
    /// # Errors
    ///
    /// Returns the last unique-violation error if every attempt collided, or
    /// any other database error immediately.
    pub async fn create(pool: &PgPool, data: CreateTaskList) -> Result<Self, sqlx::Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = generate_invite_code();

            let mut tx = pool.begin().await?;
            match Self::insert_with_owner(&mut tx, &data, &code).await {
                Ok(list) => {
                    tx.commit().await?;
                    debug!(list_id = %list.id, attempt, "Task list created");
                    return Ok(list);
                }
                Err(e) if is_invite_code_collision(&e) && attempt < MAX_INVITE_CODE_ATTEMPTS => {
                    warn!(attempt, "Invite code collision, retrying");
                    tx.rollback().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn insert_with_owner(
        conn: &mut PgConnection,
        data: &CreateTaskList,
        invite_code: &str,
    ) -> Result<Self, sqlx::Error> {
        let list = sqlx::query_as::<_, TaskList>(
            r#"
            INSERT INTO task_lists (name, description, owner_id, invite_code)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, owner_id, invite_code, created_at
            "#,
        )
        .bind(data.name.trim())
        .bind(data.description.as_deref())
        .bind(data.owner_id)
        .bind(invite_code)
        .fetch_one(&mut *conn)
        .await?;

        Membership::create(conn, list.id, data.owner_id, ListRole::Owner).await?;

        Ok(list)
    }

    /// Finds a list by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let list = sqlx::query_as::<_, TaskList>(
            r#"
            SELECT id, name, description, owner_id, invite_code, created_at
            FROM task_lists
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(list)
    }

    /// Finds a list by invite code, case-insensitively
    pub async fn find_by_invite_code(pool: &PgPool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        let list = sqlx::query_as::<_, TaskList>(
            r#"
            SELECT id, name, description, owner_id, invite_code, created_at
            FROM task_lists
            WHERE invite_code = $1
            "#,
        )
        .bind(normalize_invite_code(code))
        .fetch_optional(pool)
        .await?;

        Ok(list)
    }

    /// Lists every list the user belongs to, newest first
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<TaskListSummary>, sqlx::Error> {
        let lists = sqlx::query_as::<_, TaskListSummary>(
            r#"
            SELECT tl.id, tl.name, tl.description, tl.owner_id, owner.name AS owner_name,
                   tl.invite_code, tl.created_at, lm.role,
                   (SELECT COUNT(*) FROM list_members m WHERE m.list_id = tl.id) AS member_count
            FROM task_lists tl
            JOIN list_members lm ON lm.list_id = tl.id AND lm.user_id = $1
            JOIN users owner ON owner.id = tl.owner_id
            ORDER BY tl.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(lists)
    }

    /// Deletes a list
    ///
    /// Members, tasks, labels, queue entries, reminders and notifications are
    /// removed by foreign-key cascades.
    ///
    /// # Returns
    ///
    /// The IDs of unsent reminders that belonged to the list's tasks, so the
    /// caller can cancel their scheduled jobs, or None if the list did not
    /// exist.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Vec<Uuid>>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let reminder_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT r.id FROM reminders r
            JOIN tasks t ON t.id = r.task_id
            WHERE t.list_id = $1 AND r.is_sent = FALSE
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM task_lists WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(reminder_ids))
    }
}

fn is_invite_code_collision(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.constraint())
        .map(|c| c == INVITE_CODE_CONSTRAINT)
        .unwrap_or(false)
}
