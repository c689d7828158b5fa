/// Reminder model and database operations
///
/// A reminder is a declarative offset before a task's due date, materialized
/// as an absolute `reminder_datetime`:
///
/// ```text
/// reminder_datetime = due_date - time_value * time_unit
/// ```
///
/// `minutes` and `hours` subtract elapsed time. `days` and `weeks` subtract
/// calendar days (a week is seven days). All arithmetic happens in UTC.
///
/// Rows are the durable half of the reminder engine; the in-process scheduler
/// in `tasklane-worker` is rebuilt from them on startup.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE reminders (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     reminder_type reminder_type NOT NULL,
///     time_value INTEGER NOT NULL CHECK (time_value >= 1),
///     time_unit reminder_time_unit NOT NULL,
///     reminder_datetime TIMESTAMPTZ NOT NULL,
///     is_sent BOOLEAN NOT NULL DEFAULT FALSE,
///     sent_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (task_id, user_id, reminder_datetime)
/// );
/// ```

use chrono::{DateTime, Days, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

/// Largest accepted `time_value` (ten years of minutes is far beyond any UI)
pub const MAX_TIME_VALUE: i32 = 100_000;

/// How far back `GET /reminders/missed` looks
pub const MISSED_WINDOW_DAYS: u64 = 7;

const DUPLICATE_CONSTRAINT: &str = "reminders_task_user_datetime_key";

const REMINDER_COLUMNS: &str = "id, task_id, user_id, reminder_type, time_value, time_unit, \
     reminder_datetime, is_sent, sent_at, created_at";

/// Reminder errors
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Task has no due date")]
    NoDueDate,

    #[error("Reminder time {0} is in the past")]
    InPast(DateTime<Utc>),

    #[error("A reminder for {0} already exists")]
    Duplicate(DateTime<Utc>),

    #[error("{0}")]
    InvalidValue(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Whether the reminder came from a preset button or a custom offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reminder_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReminderType {
    Predefined,
    #[default]
    Custom,
}

/// Offset unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reminder_time_unit", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
        }
    }

    /// Computes `due - value * self`
    ///
    /// Returns None on overflow or for non-positive values.
    pub fn subtract_from(&self, due: DateTime<Utc>, value: i32) -> Option<DateTime<Utc>> {
        if value < 1 {
            return None;
        }
        let value = i64::from(value);
        match self {
            TimeUnit::Minutes => due.checked_sub_signed(Duration::try_minutes(value)?),
            TimeUnit::Hours => due.checked_sub_signed(Duration::try_hours(value)?),
            TimeUnit::Days => due.checked_sub_days(Days::new(u64::try_from(value).ok()?)),
            TimeUnit::Weeks => {
                due.checked_sub_days(Days::new(u64::try_from(value).ok()?.checked_mul(7)?))
            }
        }
    }

    /// Human label for a value, singular when it is 1 (`1 hour`, `30 minutes`)
    pub fn describe(&self, value: i32) -> String {
        let unit = self.as_str();
        if value == 1 {
            format!("1 {}", &unit[..unit.len() - 1])
        } else {
            format!("{} {}", value, unit)
        }
    }
}

/// One reminder in a create request
///
/// Accepts both the column names and the short client names
/// (`type`, `value`, `unit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSpec {
    #[serde(default, alias = "type", alias = "reminderType")]
    pub reminder_type: ReminderType,

    #[serde(alias = "value", alias = "timeValue")]
    pub time_value: i32,

    #[serde(alias = "unit", alias = "timeUnit")]
    pub time_unit: TimeUnit,
}

/// Reminder row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub reminder_type: ReminderType,
    pub time_value: i32,
    pub time_unit: TimeUnit,
    pub reminder_datetime: DateTime<Utc>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Everything the firing callback needs to build its notification
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReminderContext {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub time_value: i32,
    pub time_unit: TimeUnit,
    pub reminder_datetime: DateTime<Utc>,
    pub is_sent: bool,
    pub task_name: String,
    pub task_done: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub list_id: Uuid,
    pub list_name: String,
}

/// A reminder shown by `GET /reminders/missed`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MissedReminder {
    pub id: Uuid,
    pub task_id: Uuid,
    pub task_name: String,
    pub list_id: Uuid,
    pub list_name: String,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_type: ReminderType,
    pub time_value: i32,
    pub time_unit: TimeUnit,
    pub reminder_datetime: DateTime<Utc>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Result of moving a task's due date
#[derive(Debug, Clone, Default)]
pub struct Recalculation {
    /// Reminders that moved and must be (re)scheduled at the new time
    pub rescheduled: Vec<(Uuid, DateTime<Utc>)>,

    /// Reminders deleted because their new time is past (or the due date was
    /// cleared); their jobs must be cancelled
    pub removed: Vec<Uuid>,
}

/// Computes fire times for a batch and checks them
///
/// Every time must be strictly after `now` and unique within the batch.
///
/// # Errors
///
/// - `InvalidValue` for a value outside `1..=MAX_TIME_VALUE` or an overflow
/// - `InPast` if a fire time is not after `now`
/// - `Duplicate` if two specs resolve to the same instant
pub fn plan_reminders(
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    specs: &[ReminderSpec],
) -> Result<Vec<DateTime<Utc>>, ReminderError> {
    if specs.is_empty() {
        return Err(ReminderError::InvalidValue("At least one reminder is required".into()));
    }

    let mut seen = HashSet::with_capacity(specs.len());
    let mut times = Vec::with_capacity(specs.len());

    for spec in specs {
        if !(1..=MAX_TIME_VALUE).contains(&spec.time_value) {
            return Err(ReminderError::InvalidValue(format!(
                "time_value must be between 1 and {}",
                MAX_TIME_VALUE
            )));
        }

        let at = spec
            .time_unit
            .subtract_from(due, spec.time_value)
            .ok_or_else(|| ReminderError::InvalidValue("Reminder offset is out of range".into()))?;

        if at <= now {
            return Err(ReminderError::InPast(at));
        }
        if !seen.insert(at) {
            return Err(ReminderError::Duplicate(at));
        }
        times.push(at);
    }

    Ok(times)
}

fn map_duplicate(err: sqlx::Error, at: DateTime<Utc>) -> ReminderError {
    let is_duplicate = err
        .as_database_error()
        .and_then(|db| db.constraint())
        .map(|c| c == DUPLICATE_CONSTRAINT)
        .unwrap_or(false);

    if is_duplicate {
        ReminderError::Duplicate(at)
    } else {
        ReminderError::Database(err)
    }
}

impl Reminder {
    /// Inserts a batch of reminders for one task and user atomically
    ///
    /// Any invalid spec or duplicate (within the batch or against existing
    /// rows) aborts the whole batch. Scheduling is left to the caller, after
    /// this returns.
    pub async fn create_batch(
        pool: &PgPool,
        task_id: Uuid,
        user_id: Uuid,
        due: Option<DateTime<Utc>>,
        specs: &[ReminderSpec],
    ) -> Result<Vec<Self>, ReminderError> {
        let due = due.ok_or(ReminderError::NoDueDate)?;
        let times = plan_reminders(due, Utc::now(), specs)?;

        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(specs.len());

        for (spec, at) in specs.iter().zip(times) {
            let reminder = sqlx::query_as::<_, Reminder>(&format!(
                r#"
                INSERT INTO reminders (task_id, user_id, reminder_type, time_value, time_unit, reminder_datetime)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {REMINDER_COLUMNS}
                "#
            ))
            .bind(task_id)
            .bind(user_id)
            .bind(spec.reminder_type)
            .bind(spec.time_value)
            .bind(spec.time_unit)
            .bind(at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_duplicate(e, at))?;

            created.push(reminder);
        }

        tx.commit().await?;
        Ok(created)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(&format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The user's reminders on one task, soonest first
    pub async fn list_for_task(pool: &PgPool, task_id: Uuid, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE task_id = $1 AND user_id = $2 ORDER BY reminder_datetime ASC"
        ))
        .bind(task_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Deletes one of the user's reminders on a task
    pub async fn delete_for_user(
        pool: &PgPool,
        id: Uuid,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1 AND task_id = $2 AND user_id = $3")
            .bind(id)
            .bind(task_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every unsent reminder of a task, returning their IDs
    pub async fn delete_pending_for_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("DELETE FROM reminders WHERE task_id = $1 AND is_sent = FALSE RETURNING id")
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// Moves every reminder of a task to follow a new due date
    ///
    /// Each reminder keeps its offset. If the new time is past (or `new_due`
    /// is None) the row is deleted; otherwise it is moved and re-armed
    /// (`is_sent = false`) so it fires again at the new time.
    pub async fn recalculate_for_task(
        pool: &PgPool,
        task_id: Uuid,
        new_due: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Recalculation, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut outcome = Recalculation::default();

        // Rows shift one at a time; a row may briefly take a sibling's time
        sqlx::query(&format!("SET CONSTRAINTS {DUPLICATE_CONSTRAINT} DEFERRED"))
            .execute(&mut *tx)
            .await?;

        let reminders = sqlx::query_as::<_, Reminder>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE task_id = $1 FOR UPDATE"
        ))
        .bind(task_id)
        .fetch_all(&mut *tx)
        .await?;

        for reminder in reminders {
            let next = new_due.and_then(|due| reminder.time_unit.subtract_from(due, reminder.time_value));

            match next {
                Some(at) if at > now => {
                    sqlx::query(
                        r#"
                        UPDATE reminders
                        SET reminder_datetime = $2, is_sent = FALSE, sent_at = NULL
                        WHERE id = $1
                        "#,
                    )
                    .bind(reminder.id)
                    .bind(at)
                    .execute(&mut *tx)
                    .await?;
                    outcome.rescheduled.push((reminder.id, at));
                }
                _ => {
                    sqlx::query("DELETE FROM reminders WHERE id = $1")
                        .bind(reminder.id)
                        .execute(&mut *tx)
                        .await?;
                    outcome.removed.push(reminder.id);
                }
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Unsent reminders still in the future, for startup recovery
    pub async fn load_recoverable(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE is_sent = FALSE AND reminder_datetime > $1 ORDER BY reminder_datetime ASC"
        ))
        .bind(now)
        .fetch_all(pool)
        .await
    }

    /// Loads a reminder with its task and list for firing
    pub async fn load_context(pool: &PgPool, id: Uuid) -> Result<Option<ReminderContext>, sqlx::Error> {
        sqlx::query_as::<_, ReminderContext>(
            r#"
            SELECT r.id, r.task_id, r.user_id, r.time_value, r.time_unit, r.reminder_datetime,
                   r.is_sent, t.name AS task_name, t.status AS task_done, t.due_date,
                   t.list_id, tl.name AS list_name
            FROM reminders r
            JOIN tasks t ON t.id = r.task_id
            JOIN task_lists tl ON tl.id = t.list_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Marks a reminder sent
    ///
    /// `sent_at` is never earlier than `reminder_datetime`, even if the
    /// database clock lags the process clock.
    ///
    /// # Returns
    ///
    /// False if the reminder is gone or was already marked
    pub async fn mark_sent(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET is_sent = TRUE, sent_at = GREATEST(NOW(), reminder_datetime)
            WHERE id = $1 AND is_sent = FALSE
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Reminders the user may have missed over the last seven days
    ///
    /// Sent reminders whose `sent_at` falls in the window, plus unsent ones
    /// whose time passed in the window without firing (the process was down).
    pub async fn missed_for_user(
        pool: &PgPool,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<MissedReminder>, sqlx::Error> {
        let since = now
            .checked_sub_days(Days::new(MISSED_WINDOW_DAYS))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        sqlx::query_as::<_, MissedReminder>(
            r#"
            SELECT r.id, r.task_id, t.name AS task_name, t.list_id, tl.name AS list_name,
                   t.due_date, r.reminder_type, r.time_value, r.time_unit,
                   r.reminder_datetime, r.is_sent, r.sent_at
            FROM reminders r
            JOIN tasks t ON t.id = r.task_id
            JOIN task_lists tl ON tl.id = t.list_id
            WHERE r.user_id = $1
              AND (
                    (r.is_sent = TRUE AND r.sent_at >= $2)
                 OR (r.is_sent = FALSE AND r.reminder_datetime >= $2 AND r.reminder_datetime <= $3)
              )
            ORDER BY COALESCE(r.sent_at, r.reminder_datetime) DESC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(now)
        .fetch_all(pool)
        .await
    }
}
