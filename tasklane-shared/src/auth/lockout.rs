/// Failed-login tracking and account lockout
///
/// Failures are counted per normalized email inside a sliding 15-minute
/// window. The failure that reaches [`MAX_FAILED_ATTEMPTS`] locks the email
/// for [`LOCKOUT_DURATION`]; while locked, login is refused before the
/// password is checked. A successful login clears the entry.
///
/// State is process-local and lives behind a `std::sync::Mutex`. The lock is
/// never held across an `.await`.
///
/// # Example
///
/// ```
/// use tasklane_shared::auth::lockout::{FailureOutcome, LockoutTracker};
///
/// let tracker = LockoutTracker::new();
/// for _ in 0..4 {
///     assert!(matches!(tracker.record_failure("a@example.com"), FailureOutcome::Counted { .. }));
/// }
/// assert!(matches!(tracker.record_failure("a@example.com"), FailureOutcome::Locked { .. }));
/// assert!(tracker.check("a@example.com").is_err());
/// ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Failures within the window that trigger a lock
pub const MAX_FAILED_ATTEMPTS: usize = 5;

/// Window over which failures are counted
pub const FAILURE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// How long an email stays locked
pub const LOCKOUT_DURATION: Duration = Duration::from_secs(15 * 60);

/// Returned by [`LockoutTracker::check`] while an email is locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locked {
    pub remaining: Duration,
}

impl Locked {
    /// Remaining lock time rounded up to whole minutes
    pub fn remaining_minutes(&self) -> u64 {
        (self.remaining.as_secs() + 59) / 60
    }
}

/// Result of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Failure counted; `failures` within the current window
    Counted { failures: usize },
    /// This failure locked the email
    Locked { remaining: Duration },
}

#[derive(Debug, Default)]
struct Entry {
    failures: Vec<Instant>,
    locked_until: Option<Instant>,
}

impl Entry {
    fn prune(&mut self, now: Instant, window: Duration) {
        self.failures.retain(|t| now.duration_since(*t) < window);
        if matches!(self.locked_until, Some(until) if until <= now) {
            self.locked_until = None;
        }
    }

    fn is_stale(&self) -> bool {
        self.failures.is_empty() && self.locked_until.is_none()
    }
}

/// In-memory lockout tracker keyed by email
#[derive(Debug)]
pub struct LockoutTracker {
    entries: Mutex<HashMap<String, Entry>>,
    max_failures: usize,
    window: Duration,
    lock_duration: Duration,
}

impl Default for LockoutTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LockoutTracker {
    /// Tracker with the standard policy (5 failures / 15 minutes / 15-minute lock)
    pub fn new() -> Self {
        Self::with_policy(MAX_FAILED_ATTEMPTS, FAILURE_WINDOW, LOCKOUT_DURATION)
    }

    pub fn with_policy(max_failures: usize, window: Duration, lock_duration: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_failures,
            window,
            lock_duration,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fails with [`Locked`] while the email is locked out
    pub fn check(&self, email: &str) -> Result<(), Locked> {
        self.check_at(email, Instant::now())
    }

    pub fn check_at(&self, email: &str, now: Instant) -> Result<(), Locked> {
        let entries = self.entries();
        match entries.get(email).and_then(|e| e.locked_until) {
            Some(until) if until > now => Err(Locked {
                remaining: until - now,
            }),
            _ => Ok(()),
        }
    }

    /// Records a failed attempt
    pub fn record_failure(&self, email: &str) -> FailureOutcome {
        self.record_failure_at(email, Instant::now())
    }

    pub fn record_failure_at(&self, email: &str, now: Instant) -> FailureOutcome {
        let mut entries = self.entries();
        let entry = entries.entry(email.to_string()).or_default();
        entry.prune(now, self.window);

        if let Some(until) = entry.locked_until {
            return FailureOutcome::Locked {
                remaining: until - now,
            };
        }

        entry.failures.push(now);
        if entry.failures.len() >= self.max_failures {
            entry.failures.clear();
            entry.locked_until = Some(now + self.lock_duration);
            FailureOutcome::Locked {
                remaining: self.lock_duration,
            }
        } else {
            FailureOutcome::Counted {
                failures: entry.failures.len(),
            }
        }
    }

    /// Clears failures and any lock for the email
    pub fn reset(&self, email: &str) {
        self.entries().remove(email);
    }

    /// Drops entries with no live failures and no active lock
    ///
    /// # Returns
    ///
    /// Number of entries removed
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    pub fn cleanup_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.prune(now, self.window);
            !entry.is_stale()
        });
        before - entries.len()
    }

    /// Number of tracked emails
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &str = "alice@example.com";

    #[test]
    fn test_fifth_failure_locks() {
        let tracker = LockoutTracker::new();
        let now = Instant::now();

        for i in 1..MAX_FAILED_ATTEMPTS {
            assert_eq!(
                tracker.record_failure_at(EMAIL, now),
                FailureOutcome::Counted { failures: i }
            );
            assert!(tracker.check_at(EMAIL, now).is_ok());
        }

        assert_eq!(
            tracker.record_failure_at(EMAIL, now),
            FailureOutcome::Locked {
                remaining: LOCKOUT_DURATION
            }
        );

        let locked = tracker.check_at(EMAIL, now + Duration::from_secs(60)).unwrap_err();
        assert_eq!(locked.remaining_minutes(), 14);
        assert!(locked.remaining_minutes() <= 15);
    }

    #[test]
    fn test_lock_expires() {
        let tracker = LockoutTracker::new();
        let now = Instant::now();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            tracker.record_failure_at(EMAIL, now);
        }

        assert!(tracker.check_at(EMAIL, now + LOCKOUT_DURATION).is_ok());
    }

    #[test]
    fn test_failures_outside_window_do_not_count() {
        let tracker = LockoutTracker::new();
        let start = Instant::now();
        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            tracker.record_failure_at(EMAIL, start);
        }

        let later = start + FAILURE_WINDOW + Duration::from_secs(1);
        assert_eq!(
            tracker.record_failure_at(EMAIL, later),
            FailureOutcome::Counted { failures: 1 }
        );
    }

    #[test]
    fn test_reset_clears_failures() {
        let tracker = LockoutTracker::new();
        tracker.record_failure(EMAIL);
        tracker.record_failure(EMAIL);
        tracker.reset(EMAIL);

        assert!(tracker.is_empty());
        assert_eq!(tracker.record_failure(EMAIL), FailureOutcome::Counted { failures: 1 });
    }

    #[test]
    fn test_emails_are_independent() {
        let tracker = LockoutTracker::with_policy(1, FAILURE_WINDOW, LOCKOUT_DURATION);
        tracker.record_failure("a@example.com");

        assert!(tracker.check("a@example.com").is_err());
        assert!(tracker.check("b@example.com").is_ok());
    }

    #[test]
    fn test_cleanup_drops_stale_entries() {
        let tracker = LockoutTracker::new();
        let now = Instant::now();
        tracker.record_failure_at("stale@example.com", now);
        for _ in 0..MAX_FAILED_ATTEMPTS {
            tracker.record_failure_at("locked@example.com", now + Duration::from_secs(10 * 60));
        }

        let removed = tracker.cleanup_at(now + Duration::from_secs(16 * 60));
        assert_eq!(removed, 1);
        assert_eq!(tracker.len(), 1);
        assert!(tracker
            .check_at("locked@example.com", now + Duration::from_secs(16 * 60))
            .is_err());
    }

    #[test]
    fn test_remaining_minutes_rounds_up() {
        assert_eq!(Locked { remaining: Duration::from_secs(1) }.remaining_minutes(), 1);
        assert_eq!(Locked { remaining: Duration::from_secs(900) }.remaining_minutes(), 15);
    }
}
