/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "scheduled_reminders": 3
/// }
/// ```
///
/// A failing database check degrades the status to `"degraded"` with
/// `503 Service Unavailable`.

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tasklane_shared::db::pool;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    /// Reminder jobs waiting in this process
    pub scheduled_reminders: usize,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, code, database) = match pool::health_check(&state.db).await {
        Ok(()) => ("healthy", StatusCode::OK, "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unreachable");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: tasklane_shared::VERSION.to_string(),
            database: database.to_string(),
            scheduled_reminders: state.scheduler.pending_count(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_state;

    #[tokio::test]
    async fn test_unreachable_database_is_degraded() {
        let state = test_state(false);
        let (code, Json(body)) = health_check(State(state)).await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.database, "disconnected");
        assert_eq!(body.scheduled_reminders, 0);
    }
}
