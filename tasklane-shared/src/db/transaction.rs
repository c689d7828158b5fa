/// Serializable transactions with retry
///
/// Queue mutations and task deletion run at `SERIALIZABLE` isolation. Postgres
/// aborts one side of a conflicting pair with `40001` (serialization failure)
/// or `40P01` (deadlock); the whole closure is then replayed on a fresh
/// transaction, up to [`MAX_ATTEMPTS`] times.
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::db::transaction::serializable;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, list_id: Uuid) -> Result<(), sqlx::Error> {
/// let touched: u64 = serializable(&pool, |conn| {
///     Box::pin(async move {
///         let result = sqlx::query("UPDATE tasks SET updated_at = NOW() WHERE list_id = $1")
///             .bind(list_id)
///             .execute(conn)
///             .await?;
///         Ok::<_, sqlx::Error>(result.rows_affected())
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```

use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool};
use std::time::Duration;
use tracing::warn;

/// Attempts per call, including the first one
pub const MAX_ATTEMPTS: u32 = 3;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Errors that can tell whether they came from a retryable conflict
pub trait SerializationConflict {
    fn is_serialization_conflict(&self) -> bool;
}

impl SerializationConflict for sqlx::Error {
    fn is_serialization_conflict(&self) -> bool {
        self.as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED)
            .unwrap_or(false)
    }
}

/// Runs `op` inside a `SERIALIZABLE` transaction, retrying on conflicts
///
/// Any error from `op` rolls the transaction back. Conflicts raised by the
/// closure or by `COMMIT` itself are retried; everything else is returned
/// as-is.
pub async fn serializable<T, E, F>(pool: &PgPool, mut op: F) -> Result<T, E>
where
    E: From<sqlx::Error> + SerializationConflict,
    F: for<'c> FnMut(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let result = match op(&mut *tx).await {
            Ok(value) => tx.commit().await.map(|_| value).map_err(E::from),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        };

        match result {
            Err(e) if e.is_serialization_conflict() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, "Serialization conflict, retrying transaction");
                tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
