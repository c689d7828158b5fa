/// Authentication endpoints
///
/// This module implements registration, login, token refresh and logout.
///
/// Refresh tokens are single-use: only a SHA-256 digest of the latest one is
/// stored per user, and presenting any other (validly signed) refresh token is
/// treated as theft. The stored token is revoked so the holder of the stolen
/// token is logged out too.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use tasklane_shared::auth::{
    jwt::{self, TokenPair},
    lockout::FailureOutcome,
    middleware::AuthContext,
    password,
};
use tasklane_shared::models::user::{normalize_email, CreateUser, PublicUser, User};

use crate::{
    app::AppState,
    audit::{self, SecurityEvent},
    error::{ApiError, ApiResult},
    middleware::client_info::ClientInfo,
};

/// Deliberately vague so responses do not reveal which emails exist
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (strength checked separately)
    #[validate(length(max = 128, message = "Password must be at most 128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
}

/// Register and login response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

/// Issues a fresh token pair and stores the refresh digest, replacing any
/// previous one
async fn start_session(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    let tokens = jwt::issue_token_pair(user.id, &state.secrets)?;
    User::set_refresh_token_hash(&state.db, user.id, Some(&jwt::hash_token(&tokens.refresh_token)))
        .await?;
    Ok(tokens)
}

/// Registration endpoint
///
/// # Endpoint
///
/// ```text
/// POST /auth/register
/// Content-Type: application/json
///
/// {
///   "email": "alice@example.com",
///   "password": "Passw0rd!",
///   "name": "Alice"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with `{ "user": {...}, "tokens": { "access_token", "refresh_token", ... } }`
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, weak password or email taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("name", "Name is required"));
    }

    let password_hash = password::hash_password_blocking(req.password).await?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: normalize_email(&req.email),
            password_hash,
            name,
        },
    )
    .await?;

    let tokens = start_session(&state, &user).await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: user.into(),
            tokens,
        }),
    ))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /auth/login
///
/// { "email": "alice@example.com", "password": "Passw0rd!" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Unknown email or wrong password
/// - `429 Too Many Requests`: Email locked after 5 failures within 15 minutes
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let email = normalize_email(&req.email);

    if let Err(locked) = state.lockout.check(&email) {
        return Err(ApiError::AccountLocked {
            remaining_minutes: locked.remaining_minutes(),
        });
    }

    let user = match User::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => return Err(login_failed(&state, &client, &email, None)),
    };

    let valid = password::verify_password_blocking(req.password, user.password_hash.clone()).await?;
    if !valid {
        return Err(login_failed(&state, &client, &email, Some(user.id)));
    }

    state.lockout.reset(&email);
    User::update_last_login(&state.db, user.id).await?;
    let tokens = start_session(&state, &user).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(SessionResponse {
        user: user.into(),
        tokens,
    }))
}

fn login_failed(
    state: &AppState,
    client: &ClientInfo,
    email: &str,
    user_id: Option<uuid::Uuid>,
) -> ApiError {
    match state.lockout.record_failure(email) {
        FailureOutcome::Counted { failures } => {
            audit::record(
                SecurityEvent::LoginFailure,
                client,
                user_id,
                &format!("email={} failures={}", email, failures),
            );
        }
        FailureOutcome::Locked { remaining } => {
            audit::record(
                SecurityEvent::AccountLockout,
                client,
                user_id,
                &format!("email={} locked_secs={}", email, remaining.as_secs()),
            );
        }
    }

    ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())
}

/// Token refresh endpoint
///
/// # Endpoint
///
/// ```text
/// POST /auth/refresh
///
/// { "refresh_token": "eyJ..." }
/// ```
///
/// # Response
///
/// A new token pair; the submitted refresh token stops working.
///
/// # Errors
///
/// - `401 Unauthorized`: Expired or malformed refresh token
/// - `403 Forbidden`: Token was already used or revoked (session revoked)
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, &state.secrets.refresh)
        .map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            ApiError::Unauthorized("Invalid or expired refresh token".to_string())
        })?;

    let user_id = claims.sub;
    let presented = jwt::hash_token(&req.refresh_token);
    let next = jwt::issue_token_pair(user_id, &state.secrets)?;

    let rotated = User::rotate_refresh_token_hash(
        &state.db,
        user_id,
        &presented,
        &jwt::hash_token(&next.refresh_token),
    )
    .await?;

    if !rotated {
        User::set_refresh_token_hash(&state.db, user_id, None).await?;
        audit::record(
            SecurityEvent::RefreshTokenReuse,
            &client,
            Some(user_id),
            "stale refresh token presented; session revoked",
        );
        return Err(ApiError::Forbidden(
            "Refresh token is no longer valid".to_string(),
        ));
    }

    Ok(Json(next))
}

/// Logout endpoint
///
/// Revokes the caller's refresh token. Outstanding access tokens stay valid
/// until they expire.
pub async fn logout(State(state): State<AppState>, auth: AuthContext) -> ApiResult<StatusCode> {
    User::set_refresh_token_hash(&state.db, auth.user_id, None).await?;
    tracing::info!(user_id = %auth.user_id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
