/// In-process reminder scheduler
///
/// A process-local map from reminder ID to a pending tokio task. Each task
/// sleeps until the reminder's absolute fire time and then hands the ID to a
/// [`ReminderFirer`].
///
/// # Behavior
///
/// - **Schedule**: replaces any job already mapped to the ID. A generation
///   counter makes sure a replaced job that wakes late never fires.
/// - **Sleep**: in chunks of at most [`MAX_SLEEP_CHUNK`], re-reading the wall
///   clock between chunks so a far-future time is hit exactly even if the
///   host clock is adjusted or suspended.
/// - **Cancel**: best-effort. A job that already woke up and is firing is not
///   interrupted.
/// - **Shutdown**: cancels every job; later `schedule` calls fail.
///
/// The job map sits behind a `std::sync::Mutex` that is never held across an
/// `.await`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use chrono::{Duration, Utc};
/// use tasklane_worker::scheduler::ReminderScheduler;
/// use tasklane_worker::firing::ReminderFirer;
/// use uuid::Uuid;
///
/// # fn example(firer: Arc<dyn ReminderFirer>) -> Result<(), Box<dyn std::error::Error>> {
/// let scheduler = ReminderScheduler::new(firer);
/// let reminder_id = Uuid::new_v4();
///
/// scheduler.schedule(reminder_id, Utc::now() + Duration::minutes(30))?;
/// assert!(scheduler.is_scheduled(reminder_id));
///
/// scheduler.cancel(reminder_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::firing::{FireOutcome, ReminderFirer};

/// Longest single sleep before the wall clock is checked again
pub const MAX_SLEEP_CHUNK: Duration = Duration::from_secs(24 * 60 * 60);

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler is shut down")]
    ShutDown,
}

#[derive(Debug)]
struct ScheduledJob {
    token: CancellationToken,
    generation: u64,
    fire_at: DateTime<Utc>,
}

type JobMap = Arc<Mutex<HashMap<Uuid, ScheduledJob>>>;

fn lock(jobs: &JobMap) -> MutexGuard<'_, HashMap<Uuid, ScheduledJob>> {
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local reminder scheduler
pub struct ReminderScheduler {
    jobs: JobMap,
    firer: Arc<dyn ReminderFirer>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("pending", &self.pending_count())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl ReminderScheduler {
    pub fn new(firer: Arc<dyn ReminderFirer>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            firer,
            generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Schedules (or reschedules) a reminder at an absolute time
    ///
    /// A time in the past fires immediately.
    ///
    /// # Errors
    ///
    /// `SchedulerError::ShutDown` after [`ReminderScheduler::shutdown`]
    pub fn schedule(&self, reminder_id: Uuid, fire_at: DateTime<Utc>) -> Result<(), SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = self.shutdown.child_token();

        {
            let mut jobs = lock(&self.jobs);
            if let Some(previous) = jobs.insert(
                reminder_id,
                ScheduledJob {
                    token: token.clone(),
                    generation,
                    fire_at,
                },
            ) {
                previous.token.cancel();
            }
        }

        tokio::spawn(run_job(
            Arc::clone(&self.jobs),
            Arc::clone(&self.firer),
            reminder_id,
            fire_at,
            generation,
            token,
        ));

        tracing::debug!(reminder_id = %reminder_id, fire_at = %fire_at, "Reminder scheduled");
        Ok(())
    }

    /// Cancels a reminder's job
    ///
    /// # Returns
    ///
    /// true if a job was pending
    pub fn cancel(&self, reminder_id: Uuid) -> bool {
        match lock(&self.jobs).remove(&reminder_id) {
            Some(job) => {
                job.token.cancel();
                tracing::debug!(reminder_id = %reminder_id, "Reminder job cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels several jobs, returning how many were pending
    pub fn cancel_many<'a>(&self, reminder_ids: impl IntoIterator<Item = &'a Uuid>) -> usize {
        let mut jobs = lock(&self.jobs);
        reminder_ids
            .into_iter()
            .filter_map(|id| jobs.remove(id))
            .map(|job| job.token.cancel())
            .count()
    }

    pub fn is_scheduled(&self, reminder_id: Uuid) -> bool {
        lock(&self.jobs).contains_key(&reminder_id)
    }

    /// Fire time of a pending job
    pub fn scheduled_at(&self, reminder_id: Uuid) -> Option<DateTime<Utc>> {
        lock(&self.jobs).get(&reminder_id).map(|job| job.fire_at)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.jobs).len()
    }

    /// Cancels every job and refuses new ones
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let cancelled = {
            let mut jobs = lock(&self.jobs);
            let n = jobs.len();
            jobs.clear();
            n
        };
        tracing::info!(cancelled, "Reminder scheduler shut down");
    }
}

/// Time left until `fire_at`, capped at one chunk; None once it is due
fn next_sleep(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let remaining = (fire_at - now).to_std().ok()?;
    if remaining.is_zero() {
        None
    } else {
        Some(remaining.min(MAX_SLEEP_CHUNK))
    }
}

async fn run_job(
    jobs: JobMap,
    firer: Arc<dyn ReminderFirer>,
    reminder_id: Uuid,
    fire_at: DateTime<Utc>,
    generation: u64,
    token: CancellationToken,
) {
    while let Some(chunk) = next_sleep(fire_at, Utc::now()) {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = sleep(chunk) => {}
        }
    }

    // Claim the job. A reschedule or cancel that won the race leaves nothing
    // (or a newer generation) in the map.
    {
        let mut jobs = lock(&jobs);
        match jobs.get(&reminder_id) {
            Some(job) if job.generation == generation && !token.is_cancelled() => {
                jobs.remove(&reminder_id);
            }
            _ => return,
        }
    }

    match firer.fire(reminder_id).await {
        Ok(FireOutcome::Delivered { notification_id }) => {
            tracing::info!(
                reminder_id = %reminder_id,
                notification_id = %notification_id,
                "Reminder fired"
            );
        }
        Ok(FireOutcome::Skipped(reason)) => {
            tracing::debug!(reminder_id = %reminder_id, reason = %reason, "Reminder skipped");
        }
        Err(e) => {
            tracing::error!(error = %e, reminder_id = %reminder_id, "Reminder firing failed; left unsent");
        }
    }
}
