/// Daily database keep-alive
///
/// Runs `SELECT 1` once a day at 03:00 server local time so idle managed
/// databases that suspend on inactivity stay warm.

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use tasklane_shared::db::pool::health_check;

/// Local hour the keep-alive runs at
pub const KEEPALIVE_HOUR: u32 = 3;

/// Next 03:00 strictly after `now` in `now`'s time zone
///
/// On a day where 03:00 does not exist (a DST gap), the first valid instant
/// after it is used.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let at = NaiveTime::from_hms_opt(KEEPALIVE_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);

    let mut day = now.date_naive();
    loop {
        let candidate = day.and_time(at);
        let resolved = tz
            .from_local_datetime(&candidate)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(candidate + chrono::Duration::hours(1))).earliest());

        if let Some(run) = resolved {
            if run > *now {
                return run;
            }
        }

        day = match day.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => return now.clone(),
        };
    }
}

/// Runs the keep-alive loop until `shutdown` is cancelled
pub async fn run_keepalive(pool: PgPool, shutdown: CancellationToken) {
    loop {
        let now = Local::now();
        let next = next_run_after(&now);
        let wait = (next.clone() - now).to_std().unwrap_or_default();

        tracing::debug!(next_run = %next, "Keep-alive scheduled");

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Keep-alive stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        match health_check(&pool).await {
            Ok(()) => tracing::info!("Database keep-alive succeeded"),
            Err(e) => tracing::warn!(error = %e, "Database keep-alive failed"),
        }
    }
}
