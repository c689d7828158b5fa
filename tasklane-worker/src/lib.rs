//! # Tasklane Worker Library
//!
//! The reminder engine's in-process half: a scheduler of pending reminder
//! jobs, the firing callback that turns a due reminder into a notification,
//! startup recovery, and the daily database keep-alive. The API server embeds
//! it through [`ReminderWorker::start`].
//!
//! ## Modules
//!
//! - `scheduler`: Process-local map of reminder ID to pending job
//! - `firing`: The `ReminderFirer` trait and the notification-backed firer
//! - `recovery`: Reschedules pending reminders on startup
//! - `keepalive`: `SELECT 1` daily at 03:00 local time
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tasklane_shared::events::RealtimeHub;
//! use tasklane_shared::notifications::Notifier;
//! use tasklane_worker::ReminderWorker;
//!
//! # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let notifier = Notifier::new(pool.clone(), Arc::new(RealtimeHub::new()));
//! let worker = ReminderWorker::start(pool, notifier).await?;
//!
//! // ... serve requests, scheduling through worker.scheduler() ...
//!
//! worker.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod firing;
pub mod keepalive;
pub mod recovery;
pub mod scheduler;

use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tasklane_shared::notifications::Notifier;

use firing::NotifyingFirer;
use recovery::{recover_pending, RecoveryError};
use scheduler::ReminderScheduler;

/// Running reminder engine
#[derive(Debug)]
pub struct ReminderWorker {
    scheduler: Arc<ReminderScheduler>,
    shutdown: CancellationToken,
    keepalive: JoinHandle<()>,
}

impl ReminderWorker {
    /// Builds the scheduler, recovers pending reminders and starts the
    /// keep-alive loop
    ///
    /// # Errors
    ///
    /// Fails if the pending reminders cannot be loaded
    pub async fn start(pool: PgPool, notifier: Notifier) -> Result<Self, RecoveryError> {
        let firer = Arc::new(NotifyingFirer::new(pool.clone(), notifier));
        let scheduler = Arc::new(ReminderScheduler::new(firer));

        recover_pending(&pool, &scheduler).await?;

        let shutdown = CancellationToken::new();
        let keepalive = tokio::spawn(keepalive::run_keepalive(pool, shutdown.clone()));

        Ok(Self {
            scheduler,
            shutdown,
            keepalive,
        })
    }

    pub fn scheduler(&self) -> Arc<ReminderScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Cancels pending jobs and stops the keep-alive loop
    pub async fn shutdown(self) {
        self.scheduler.shutdown();
        self.shutdown.cancel();
        if let Err(e) = self.keepalive.await {
            tracing::warn!(error = %e, "Keep-alive task ended abnormally");
        }
    }
}
