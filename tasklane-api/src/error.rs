/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; library errors convert with `?`.
///
/// # Example
///
/// ```no_run
/// use tasklane_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(name: String) -> ApiResult<Json<serde_json::Value>> {
///     if name.trim().is_empty() {
///         return Err(ApiError::BadRequest("Name is required".into()));
///     }
///     Ok(Json(json!({ "name": name })))
/// }
/// ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use tasklane_shared::auth::authorization::AuthzError;
use tasklane_shared::auth::jwt::JwtError;
use tasklane_shared::auth::middleware::AuthError;
use tasklane_shared::auth::password::PasswordError;
use tasklane_shared::models::queue::QueueError;
use tasklane_shared::models::reminder::ReminderError;
use tasklane_shared::models::task::TaskError;
use tasklane_worker::scheduler::SchedulerError;

/// Postgres SQLSTATE codes surfaced to clients
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Access token expired (403, `needsRefresh: true`)
    TokenExpired,

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (400), e.g. duplicate membership or reminder time
    Conflict(String),

    /// Validation errors (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded {
        retry_after: u64,
        message: String,
    },

    /// Login blocked after repeated failures (429)
    AccountLocked { remaining_minutes: u64 },

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

impl ApiError {
    /// Shorthand for a single-field validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Conflict(_) | ApiError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::TokenExpired | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimitExceeded { .. } | ApiError::AccountLocked { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    /// Set when the client should call `/auth/refresh`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_refresh: Option<bool>,

    /// Minutes until a locked account may log in again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<u64>,
}

impl ErrorResponse {
    fn new(error: &str, message: String) -> Self {
        Self {
            error: error.to_string(),
            message,
            details: None,
            needs_refresh: None,
            remaining_minutes: None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::TokenExpired => write!(f, "Access token expired"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::AccountLocked { remaining_minutes } => {
                write!(f, "Account locked for {} more minutes", remaining_minutes)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Handle rate limit separately to add Retry-After header
        if let ApiError::RateLimitExceeded { retry_after, message } = &self {
            let body = Json(ErrorResponse::new("rate_limit_exceeded", message.clone()));
            let mut response = (status, body).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            return response;
        }

        let body = match self {
            ApiError::BadRequest(msg) => ErrorResponse::new("bad_request", msg),
            ApiError::Unauthorized(msg) => ErrorResponse::new("unauthorized", msg),
            ApiError::TokenExpired => ErrorResponse {
                needs_refresh: Some(true),
                ..ErrorResponse::new("token_expired", "Access token expired".to_string())
            },
            ApiError::Forbidden(msg) => ErrorResponse::new("forbidden", msg),
            ApiError::NotFound(msg) => ErrorResponse::new("not_found", msg),
            ApiError::Conflict(msg) => ErrorResponse::new("conflict", msg),
            ApiError::ValidationError(errors) => ErrorResponse {
                details: Some(errors),
                ..ErrorResponse::new("validation_error", "Request validation failed".to_string())
            },
            ApiError::RateLimitExceeded { message, .. } => {
                ErrorResponse::new("rate_limit_exceeded", message)
            }
            ApiError::AccountLocked { remaining_minutes } => ErrorResponse {
                remaining_minutes: Some(remaining_minutes),
                ..ErrorResponse::new(
                    "account_locked",
                    format!(
                        "Too many failed login attempts. Try again in {} minutes",
                        remaining_minutes
                    ),
                )
            },
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ErrorResponse::new("internal_error", "An internal error occurred".to_string())
            }
            ApiError::ServiceUnavailable(msg) => ErrorResponse::new("service_unavailable", msg),
        };

        (status, Json(body)).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    let constraint = db_err.constraint().unwrap_or_default();
                    if constraint.contains("email") {
                        ApiError::Conflict("Email already exists".to_string())
                    } else {
                        ApiError::Conflict("Resource already exists".to_string())
                    }
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    ApiError::BadRequest("Referenced resource does not exist".to_string())
                }
                Some(CHECK_VIOLATION) => ApiError::BadRequest("Value out of range".to_string()),
                _ => ApiError::InternalError(format!("Database error: {}", db_err)),
            },
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::TokenExpired => ApiError::TokenExpired,
            AuthError::InvalidFormat | AuthError::InvalidToken(_) => {
                ApiError::Forbidden(err.to_string())
            }
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => {
                ApiError::Forbidden("Not a member of this task list".to_string())
            }
            AuthzError::NotOwner(_) => {
                ApiError::Forbidden("Only the list owner can do this".to_string())
            }
            AuthzError::UserMismatch { .. } => {
                ApiError::Forbidden("Access denied to another user's resources".to_string())
            }
            AuthzError::ListNotFound => ApiError::NotFound("Task list not found".to_string()),
            AuthzError::TaskNotFound => ApiError::NotFound("Task not found".to_string()),
            AuthzError::DatabaseError(err) => err.into(),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(msg) => ApiError::validation("password", msg),
            other => ApiError::InternalError(format!("Password operation failed: {}", other)),
        }
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidReorder(msg) => ApiError::BadRequest(msg),
            QueueError::TaskNotFound => ApiError::NotFound("Task not found".to_string()),
            QueueError::Database(e) => e.into(),
        }
    }
}

impl From<ReminderError> for ApiError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::NoDueDate => {
                ApiError::BadRequest("Task must have a due date to set reminders".to_string())
            }
            ReminderError::InPast(_) => {
                ApiError::BadRequest("Reminder time cannot be in the past".to_string())
            }
            ReminderError::Duplicate(_) => ApiError::Conflict(err.to_string()),
            ReminderError::InvalidValue(msg) => ApiError::BadRequest(msg),
            ReminderError::Database(e) => e.into(),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Validation(msg) => ApiError::BadRequest(msg),
            TaskError::EmptyPatch => ApiError::BadRequest(err.to_string()),
            TaskError::Database(e) => e.into(),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        ApiError::ServiceUnavailable(err.to_string())
    }
}

/// Maps `validator` derive failures to per-field details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", field)),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_conflict_is_bad_request() {
        assert_eq!(
            ApiError::Conflict("dup".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_token_expired_body() {
        let (status, body) = body_json(ApiError::TokenExpired).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "token_expired");
        assert_eq!(body["needsRefresh"], true);
    }

    #[tokio::test]
    async fn test_account_locked_body() {
        let (status, body) = body_json(ApiError::AccountLocked { remaining_minutes: 15 }).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "account_locked");
        assert_eq!(body["remainingMinutes"], 15);
        assert!(body.get("needsRefresh").is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_has_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 42,
            message: "slow down".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (status, body) = body_json(ApiError::InternalError("secret detail".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(
            ApiError::from(AuthError::MissingCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert!(matches!(
            ApiError::from(AuthError::TokenExpired),
            ApiError::TokenExpired
        ));
        assert_eq!(
            ApiError::from(AuthError::InvalidToken("bad".into())).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_authz_error_mapping() {
        let caller = Uuid::new_v4();
        let err = ApiError::from(AuthzError::UserMismatch {
            caller,
            requested: Uuid::new_v4(),
        });
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(AuthzError::TaskNotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_weak_password_is_validation_error() {
        let err = ApiError::from(PasswordError::Weak("too short".into()));
        match err {
            ApiError::ValidationError(details) => assert_eq!(details[0].field, "password"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_domain_errors() {
        assert_eq!(
            ApiError::from(ReminderError::NoDueDate).status(),
            StatusCode::BAD_REQUEST
        );
        assert!(matches!(
            ApiError::from(ReminderError::Duplicate(chrono::Utc::now())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(QueueError::InvalidReorder("x".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(TaskError::EmptyPatch),
            ApiError::BadRequest(_)
        ));
        assert_eq!(
            ApiError::from(sqlx::Error::RowNotFound).status(),
            StatusCode::NOT_FOUND
        );
    }
}
