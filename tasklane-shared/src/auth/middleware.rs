/// Authentication middleware for Axum
///
/// Validates the access token from `Authorization: Bearer <token>` and stores
/// an [`AuthContext`] in the request extensions. Handlers take `AuthContext`
/// directly as an extractor.
///
/// Failures map to the statuses clients rely on:
///
/// | Failure | Status | Body |
/// |---|---|---|
/// | No `Authorization` header | 401 | `unauthorized` |
/// | Expired access token | 403 | `token_expired`, `needsRefresh: true` |
/// | Malformed, forged or wrong-type token | 403 | `forbidden` |
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use tasklane_shared::auth::middleware::{create_jwt_middleware, AuthContext};
///
/// async fn me(auth: AuthContext) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
///
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn(create_jwt_middleware("access-secret")));
/// ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// Authentication context added to request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Error type for authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header or token
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat,

    /// Access token past its expiry; the client should refresh
    TokenExpired,

    /// Signature, issuer or type check failed
    InvalidToken(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat | AuthError::TokenExpired | AuthError::InvalidToken(_) => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Authentication required"),
            AuthError::InvalidFormat => write!(f, "Expected a Bearer token"),
            AuthError::TokenExpired => write!(f, "Access token expired"),
            AuthError::InvalidToken(_) => write!(f, "Invalid access token"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AuthError::MissingCredentials => json!({
                "error": "unauthorized",
                "message": self.to_string(),
            }),
            AuthError::TokenExpired => json!({
                "error": "token_expired",
                "message": self.to_string(),
                "needsRefresh": true,
            }),
            // The validation detail stays in the logs.
            AuthError::InvalidFormat | AuthError::InvalidToken(_) => json!({
                "error": "forbidden",
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => AuthError::TokenExpired,
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

/// Validates a raw access token
pub fn authenticate_token(token: &str, secret: &str) -> Result<AuthContext, AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    let claims = validate_access_token(token, secret)?;
    Ok(AuthContext::new(claims.sub))
}

/// Extracts and validates the bearer token from request headers
pub fn authenticate_bearer(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    authenticate_token(token, secret)
}

/// JWT authentication middleware
///
/// # Errors
///
/// Short-circuits with [`AuthError`] before the handler runs.
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_context = authenticate_bearer(req.headers(), &secret).map_err(|e| {
        tracing::debug!(error = ?e, path = %req.uri().path(), "Authentication failed");
        e
    })?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Creates a JWT authentication middleware closure for `middleware::from_fn`
pub fn create_jwt_middleware(
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    let secret = secret.into();
    move |req, next| {
        let secret = secret.clone();
        Box::pin(jwt_auth_middleware(secret, req, next))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)
    }
}
