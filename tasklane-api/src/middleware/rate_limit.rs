/// Per-IP rate limiting
///
/// Fixed 15-minute windows kept in process memory, one counter per
/// (scope, client IP). Every request counts against the general scope;
/// `/auth/*` and queue routes also count against their own stricter scope.
///
/// # Limits per window
///
/// | Scope | Production | Development |
/// |---|---|---|
/// | General | 100 | 1000 |
/// | Auth | 5 | 50 |
/// | Queue | 50 | 500 |
///
/// # Headers
///
/// Response includes rate limit headers for the tightest scope:
/// - `X-RateLimit-Limit`: Total requests allowed per window
/// - `X-RateLimit-Remaining`: Requests remaining
/// - `Retry-After`: Seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::client_info::ClientInfo;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Window length for every scope
pub const WINDOW: Duration = Duration::from_secs(15 * 60);

/// Development multiplier applied to every limit
pub const DEVELOPMENT_MULTIPLIER: u32 = 10;

/// What a counter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    General,
    Auth,
    Queue,
}

impl LimitScope {
    /// Base limit per window
    pub fn base_limit(&self) -> u32 {
        match self {
            LimitScope::General => 100,
            LimitScope::Auth => 5,
            LimitScope::Queue => 50,
        }
    }

    /// Stricter scope for a request path, if any
    pub fn for_path(path: &str) -> Option<Self> {
        if path.starts_with("/auth/") {
            Some(LimitScope::Auth)
        } else if path.starts_with("/users/") && path.contains("/queue") {
            Some(LimitScope::Queue)
        } else {
            None
        }
    }
}

/// Rate limit entry for one (scope, client)
#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Outcome of an allowed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowance {
    pub limit: u32,
    pub remaining: u32,
}

/// Outcome of a rejected request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exceeded {
    pub limit: u32,
    /// Seconds until the window resets (at least 1)
    pub retry_after: u64,
}

/// In-memory fixed-window limiter
#[derive(Debug)]
pub struct RateLimiter {
    entries: Mutex<HashMap<(LimitScope, String), WindowEntry>>,
    multiplier: u32,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter; `development` raises every limit tenfold
    pub fn new(development: bool) -> Self {
        let multiplier = if development { DEVELOPMENT_MULTIPLIER } else { 1 };
        Self::with_window(multiplier, WINDOW)
    }

    pub fn with_window(multiplier: u32, window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            multiplier: multiplier.max(1),
            window,
        }
    }

    pub fn limit(&self, scope: LimitScope) -> u32 {
        scope.base_limit().saturating_mul(self.multiplier)
    }

    pub fn check(&self, scope: LimitScope, client: &str) -> Result<Allowance, Exceeded> {
        self.check_at(scope, client, Instant::now())
    }

    /// Counts one request at `now`
    pub fn check_at(&self, scope: LimitScope, client: &str, now: Instant) -> Result<Allowance, Exceeded> {
        let limit = self.limit(scope);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let entry = entries
            .entry((scope, client.to_string()))
            .or_insert(WindowEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= limit {
            let elapsed = now.duration_since(entry.window_start);
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            return Err(Exceeded { limit, retry_after });
        }

        entry.count += 1;
        Ok(Allowance {
            limit,
            remaining: limit - entry.count,
        })
    }

    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    /// Drops counters whose window has ended
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < self.window);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn exceeded_error(exceeded: Exceeded) -> ApiError {
    ApiError::RateLimitExceeded {
        retry_after: exceeded.retry_after,
        message: format!(
            "Too many requests. Try again in {} seconds",
            exceeded.retry_after
        ),
    }
}

/// Rate limiting middleware
///
/// # Errors
///
/// - 429 Too Many Requests: a window for this client is exhausted
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let client = ClientInfo::from_request_parts_sync(&parts);
    let path = parts.uri.path().to_string();
    let request = Request::from_parts(parts, body);

    let mut tightest = state
        .limiter
        .check(LimitScope::General, &client.ip)
        .map_err(|e| {
            tracing::warn!(ip = %client.ip, path = %path, "General rate limit exceeded");
            exceeded_error(e)
        })?;

    if let Some(scope) = LimitScope::for_path(&path) {
        tightest = state.limiter.check(scope, &client.ip).map_err(|e| {
            tracing::warn!(ip = %client.ip, path = %path, scope = ?scope, "Rate limit exceeded");
            exceeded_error(e)
        })?;
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(tightest.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(tightest.remaining));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_by_environment() {
        let prod = RateLimiter::new(false);
        assert_eq!(prod.limit(LimitScope::General), 100);
        assert_eq!(prod.limit(LimitScope::Auth), 5);
        assert_eq!(prod.limit(LimitScope::Queue), 50);

        let dev = RateLimiter::new(true);
        assert_eq!(dev.limit(LimitScope::Auth), 50);
    }

    #[test]
    fn test_scope_for_path() {
        assert_eq!(LimitScope::for_path("/auth/login"), Some(LimitScope::Auth));
        assert_eq!(
            LimitScope::for_path("/users/7b0c/queue/reorder"),
            Some(LimitScope::Queue)
        );
        assert_eq!(LimitScope::for_path("/task-lists"), None);
        assert_eq!(LimitScope::for_path("/user/profile"), None);
    }

    #[test]
    fn test_window_exhaustion_and_reset() {
        let limiter = RateLimiter::new(false);
        let start = Instant::now();

        for i in 0..5 {
            let allowance = limiter.check_at(LimitScope::Auth, "1.2.3.4", start).unwrap();
            assert_eq!(allowance.remaining, 4 - i);
        }

        let exceeded = limiter
            .check_at(LimitScope::Auth, "1.2.3.4", start + Duration::from_secs(60))
            .unwrap_err();
        assert_eq!(exceeded.retry_after, 14 * 60);

        // Other clients and scopes are independent
        assert!(limiter.check_at(LimitScope::Auth, "5.6.7.8", start).is_ok());
        assert!(limiter.check_at(LimitScope::General, "1.2.3.4", start).is_ok());

        // A new window starts after 15 minutes
        assert!(limiter
            .check_at(LimitScope::Auth, "1.2.3.4", start + WINDOW)
            .is_ok());
    }

    #[test]
    fn test_cleanup_drops_finished_windows() {
        let limiter = RateLimiter::new(false);
        let start = Instant::now();

        limiter.check_at(LimitScope::General, "a", start).unwrap();
        limiter
            .check_at(LimitScope::General, "b", start + Duration::from_secs(600))
            .unwrap();

        assert_eq!(limiter.cleanup_at(start + WINDOW), 1);
        assert_eq!(limiter.len(), 1);
    }
}
