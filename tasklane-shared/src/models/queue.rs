/// Per-user, per-list work queue
///
/// A queue is the ordered list of tasks one user plans to work through inside
/// one task list. The list is not stored on the entry; it comes from the
/// task, so "the (user, list) queue" means the user's entries whose task
/// belongs to that list.
///
/// # Density
///
/// For every (user, list) pair the positions are exactly `{1..N}`. No
/// constraint can express that, so every mutation ends with one renumber
/// statement: `ROW_NUMBER()` over the current positions (ties broken by
/// `added_at`, then `task_id`) written back with `UPDATE ... FROM`. Relative
/// order is preserved and gaps or duplicates left by the mutation disappear.
///
/// All public mutations run inside [`serializable`], so a reorder racing a
/// task deletion is retried instead of interleaving.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE queue_entries (
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     position INTEGER NOT NULL CHECK (position >= 1),
///     added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, task_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::models::queue::{self, ReorderItem};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, alice: Uuid, list: Uuid, t2: Uuid, t3: Uuid)
/// #     -> Result<(), Box<dyn std::error::Error>> {
/// queue::append(&pool, alice, t2).await?; // position 1
/// queue::append(&pool, alice, t3).await?; // position 2
///
/// queue::reorder(&pool, alice, list, &[
///     ReorderItem { task_id: t3, position: 1 },
///     ReorderItem { task_id: t2, position: 2 },
/// ]).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::task::TaskPriority;
use crate::db::transaction::{serializable, SerializationConflict};

/// Queue errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The submitted order is not a full permutation of the queue
    #[error("Invalid reorder: {0}")]
    InvalidReorder(String),

    #[error("Task not found")]
    TaskNotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SerializationConflict for QueueError {
    fn is_serialization_conflict(&self) -> bool {
        match self {
            QueueError::Database(e) => e.is_serialization_conflict(),
            _ => false,
        }
    }
}

/// Queue entry row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub position: i32,
    pub added_at: DateTime<Utc>,
}

/// Queue entry joined with its task and list, as returned by `GET /users/{id}/queue`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueItem {
    pub task_id: Uuid,
    pub position: i32,
    pub added_at: DateTime<Utc>,
    pub list_id: Uuid,
    pub list_name: String,
    pub name: String,
    pub description: Option<String>,
    pub status: bool,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub assigned_to: Option<Uuid>,
    pub assignee_name: Option<String>,
    pub project_name: Option<String>,
}

/// One element of a reorder request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderItem {
    #[serde(alias = "taskId")]
    pub task_id: Uuid,
    pub position: i32,
}

/// Checks that `items` is a full permutation of the `current` queue
///
/// The task set must equal the current one exactly and the positions must be
/// exactly `{1..N}`.
pub fn validate_permutation(current: &[Uuid], items: &[ReorderItem]) -> Result<(), QueueError> {
    if items.len() != current.len() {
        return Err(QueueError::InvalidReorder(format!(
            "expected {} entries, got {}",
            current.len(),
            items.len()
        )));
    }

    let current: HashSet<Uuid> = current.iter().copied().collect();
    let submitted: HashSet<Uuid> = items.iter().map(|i| i.task_id).collect();
    if submitted.len() != items.len() {
        return Err(QueueError::InvalidReorder("duplicate task in order".into()));
    }
    if submitted != current {
        return Err(QueueError::InvalidReorder(
            "order must contain exactly the tasks in the queue".into(),
        ));
    }

    let n = items.len() as i32;
    let positions: HashSet<i32> = items.iter().map(|i| i.position).collect();
    if positions.len() != items.len() || !positions.iter().all(|p| (1..=n).contains(p)) {
        return Err(QueueError::InvalidReorder(format!(
            "positions must be exactly 1..={}",
            n
        )));
    }

    Ok(())
}

/// Renumbers one user's queue in one list to `{1..N}`
pub async fn renumber_user_list(
    conn: &mut PgConnection,
    user_id: Uuid,
    list_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE queue_entries q
        SET position = ranked.new_position
        FROM (
            SELECT qe.user_id, qe.task_id,
                   ROW_NUMBER() OVER (
                       PARTITION BY qe.user_id
                       ORDER BY qe.position, qe.added_at, qe.task_id
                   )::INTEGER AS new_position
            FROM queue_entries qe
            JOIN tasks t ON t.id = qe.task_id
            WHERE t.list_id = $1 AND qe.user_id = $2
        ) ranked
        WHERE q.user_id = ranked.user_id
          AND q.task_id = ranked.task_id
          AND q.position <> ranked.new_position
        "#,
    )
    .bind(list_id)
    .bind(user_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Renumbers every user's queue in one list, partitioned by user
///
/// Runs after a task deletion, which may have punched a hole into several
/// users' queues at once.
pub async fn renumber_list(conn: &mut PgConnection, list_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE queue_entries q
        SET position = ranked.new_position
        FROM (
            SELECT qe.user_id, qe.task_id,
                   ROW_NUMBER() OVER (
                       PARTITION BY qe.user_id
                       ORDER BY qe.position, qe.added_at, qe.task_id
                   )::INTEGER AS new_position
            FROM queue_entries qe
            JOIN tasks t ON t.id = qe.task_id
            WHERE t.list_id = $1
        ) ranked
        WHERE q.user_id = ranked.user_id
          AND q.task_id = ranked.task_id
          AND q.position <> ranked.new_position
        "#,
    )
    .bind(list_id)
    .execute(conn)
    .await?;

    debug!(list_id = %list_id, renumbered = result.rows_affected(), "Renumbered list queues");
    Ok(result.rows_affected())
}

async fn append_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    task_id: Uuid,
) -> Result<QueueEntry, QueueError> {
    let list_id: Uuid = sqlx::query_scalar("SELECT list_id FROM tasks WHERE id = $1")
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(QueueError::TaskNotFound)?;

    sqlx::query(
        r#"
        INSERT INTO queue_entries (user_id, task_id, position)
        SELECT $1, $2, COALESCE(MAX(qe.position), 0) + 1
        FROM queue_entries qe
        JOIN tasks t ON t.id = qe.task_id
        WHERE qe.user_id = $1 AND t.list_id = $3
        ON CONFLICT (user_id, task_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(task_id)
    .bind(list_id)
    .execute(&mut *conn)
    .await?;

    renumber_user_list(conn, user_id, list_id).await?;

    let entry = sqlx::query_as::<_, QueueEntry>(
        "SELECT user_id, task_id, position, added_at FROM queue_entries WHERE user_id = $1 AND task_id = $2",
    )
    .bind(user_id)
    .bind(task_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry)
}

/// Appends a task to the end of the user's queue for the task's list
///
/// Appending a task that is already queued is a no-op and returns the
/// existing entry.
///
/// # Errors
///
/// `QueueError::TaskNotFound` if the task doesn't exist
pub async fn append(pool: &PgPool, user_id: Uuid, task_id: Uuid) -> Result<QueueEntry, QueueError> {
    serializable(pool, |conn| Box::pin(append_in(conn, user_id, task_id))).await
}

async fn entries_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    list_id: Uuid,
) -> Result<Vec<QueueEntry>, sqlx::Error> {
    sqlx::query_as::<_, QueueEntry>(
        r#"
        SELECT qe.user_id, qe.task_id, qe.position, qe.added_at
        FROM queue_entries qe
        JOIN tasks t ON t.id = qe.task_id
        WHERE qe.user_id = $1 AND t.list_id = $2
        ORDER BY qe.position ASC
        "#,
    )
    .bind(user_id)
    .bind(list_id)
    .fetch_all(conn)
    .await
}

async fn reorder_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    list_id: Uuid,
    items: Vec<ReorderItem>,
) -> Result<Vec<QueueEntry>, QueueError> {
    let current: Vec<Uuid> = entries_in(conn, user_id, list_id)
        .await?
        .into_iter()
        .map(|e| e.task_id)
        .collect();

    validate_permutation(&current, &items)?;

    let task_ids: Vec<Uuid> = items.iter().map(|i| i.task_id).collect();
    let positions: Vec<i32> = items.iter().map(|i| i.position).collect();

    sqlx::query(
        r#"
        UPDATE queue_entries q
        SET position = v.position
        FROM UNNEST($2::UUID[], $3::INTEGER[]) AS v(task_id, position)
        WHERE q.user_id = $1 AND q.task_id = v.task_id
        "#,
    )
    .bind(user_id)
    .bind(&task_ids)
    .bind(&positions)
    .execute(&mut *conn)
    .await?;

    renumber_user_list(conn, user_id, list_id).await?;

    Ok(entries_in(conn, user_id, list_id).await?)
}

/// Rewrites the order of one (user, list) queue
///
/// `items` must name every queued task exactly once with positions `{1..N}`.
/// Applying the same order twice yields the same state.
///
/// # Errors
///
/// `QueueError::InvalidReorder` if `items` is not a full permutation
pub async fn reorder(
    pool: &PgPool,
    user_id: Uuid,
    list_id: Uuid,
    items: &[ReorderItem],
) -> Result<Vec<QueueEntry>, QueueError> {
    serializable(pool, |conn| {
        let items = items.to_vec();
        Box::pin(reorder_in(conn, user_id, list_id, items))
    })
    .await
}

async fn remove_in(conn: &mut PgConnection, user_id: Uuid, task_id: Uuid) -> Result<bool, QueueError> {
    let deleted = sqlx::query("DELETE FROM queue_entries WHERE user_id = $1 AND task_id = $2")
        .bind(user_id)
        .bind(task_id)
        .execute(&mut *conn)
        .await?;

    if deleted.rows_affected() == 0 {
        return Ok(false);
    }

    let list_id: Option<Uuid> = sqlx::query_scalar("SELECT list_id FROM tasks WHERE id = $1")
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(list_id) = list_id {
        renumber_user_list(conn, user_id, list_id).await?;
    }

    Ok(true)
}

/// Removes a task from the user's queue and closes the gap
///
/// # Returns
///
/// False if the task was not queued
pub async fn remove(pool: &PgPool, user_id: Uuid, task_id: Uuid) -> Result<bool, QueueError> {
    serializable(pool, |conn| Box::pin(remove_in(conn, user_id, task_id))).await
}

/// Lists a user's queue, optionally restricted to one list, ordered by list
/// then position
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    list_id: Option<Uuid>,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        r#"
        SELECT qe.task_id, qe.position, qe.added_at,
               t.list_id, tl.name AS list_name,
               t.name, t.description, t.status, t.priority, t.due_date, t.estimated_hours,
               t.assigned_to, a.name AS assignee_name, p.name AS project_name
        FROM queue_entries qe
        JOIN tasks t ON t.id = qe.task_id
        JOIN task_lists tl ON tl.id = t.list_id
        LEFT JOIN users a ON a.id = t.assigned_to
        LEFT JOIN projects p ON p.id = t.project_id
        WHERE qe.user_id = $1 AND ($2::UUID IS NULL OR t.list_id = $2)
        ORDER BY tl.name ASC, t.list_id, qe.position ASC
        "#,
    )
    .bind(user_id)
    .bind(list_id)
    .fetch_all(pool)
    .await
}

/// Current `(task_id, position)` pairs of one (user, list) queue, by position
pub async fn positions(
    pool: &PgPool,
    user_id: Uuid,
    list_id: Uuid,
) -> Result<Vec<(Uuid, i32)>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    Ok(entries_in(&mut conn, user_id, list_id)
        .await?
        .into_iter()
        .map(|e| (e.task_id, e.position))
        .collect())
}

/// Whether positions are exactly `{1..N}` in order
pub fn is_dense(positions: &[i32]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, p)| *p == i as i32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_full_permutation_is_accepted() {
        let current = ids(3);
        let items = vec![
            ReorderItem { task_id: current[2], position: 1 },
            ReorderItem { task_id: current[0], position: 2 },
            ReorderItem { task_id: current[1], position: 3 },
        ];
        assert!(validate_permutation(&current, &items).is_ok());
    }

    #[test]
    fn test_empty_queue_empty_order() {
        assert!(validate_permutation(&[], &[]).is_ok());
    }

    #[test]
    fn test_missing_task_rejected() {
        let current = ids(2);
        let items = vec![ReorderItem { task_id: current[0], position: 1 }];
        assert!(matches!(
            validate_permutation(&current, &items),
            Err(QueueError::InvalidReorder(_))
        ));
    }

    #[test]
    fn test_foreign_task_rejected() {
        let current = ids(2);
        let items = vec![
            ReorderItem { task_id: current[0], position: 1 },
            ReorderItem { task_id: Uuid::new_v4(), position: 2 },
        ];
        assert!(validate_permutation(&current, &items).is_err());
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let current = ids(2);
        let items = vec![
            ReorderItem { task_id: current[0], position: 1 },
            ReorderItem { task_id: current[0], position: 2 },
        ];
        assert!(validate_permutation(&current, &items).is_err());
    }

    #[test]
    fn test_gapped_or_duplicate_positions_rejected() {
        let current = ids(2);
        let gapped = vec![
            ReorderItem { task_id: current[0], position: 1 },
            ReorderItem { task_id: current[1], position: 3 },
        ];
        assert!(validate_permutation(&current, &gapped).is_err());

        let duplicated = vec![
            ReorderItem { task_id: current[0], position: 1 },
            ReorderItem { task_id: current[1], position: 1 },
        ];
        assert!(validate_permutation(&current, &duplicated).is_err());

        let zero_based = vec![
            ReorderItem { task_id: current[0], position: 0 },
            ReorderItem { task_id: current[1], position: 1 },
        ];
        assert!(validate_permutation(&current, &zero_based).is_err());
    }

    #[test]
    fn test_is_dense() {
        assert!(is_dense(&[]));
        assert!(is_dense(&[1, 2, 3]));
        assert!(is_dense(&[2, 1]));
        assert!(!is_dense(&[1, 3]));
        assert!(!is_dense(&[0, 1]));
        assert!(!is_dense(&[1, 1]));
    }

    #[test]
    fn test_reorder_item_accepts_camel_case() {
        let id = Uuid::new_v4();
        let item: ReorderItem =
            serde_json::from_value(serde_json::json!({ "taskId": id, "position": 1 })).unwrap();
        assert_eq!(item.task_id, id);
    }

    #[test]
    fn test_queue_error_conflict_detection() {
        assert!(!QueueError::TaskNotFound.is_serialization_conflict());
        assert!(!QueueError::InvalidReorder("x".into()).is_serialization_conflict());
        assert!(!QueueError::Database(sqlx::Error::RowNotFound).is_serialization_conflict());
    }
}
