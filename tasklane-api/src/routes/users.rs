/// Profile endpoints of the authenticated user
///
/// ```text
/// GET /user/profile
/// PUT /user/profile    { "name"?, "email"? }
/// PUT /user/password   { "current_password", "new_password" }
/// ```

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use validator::Validate;

use tasklane_shared::auth::{middleware::AuthContext, password};
use tasklane_shared::models::user::{PublicUser, UpdateUser, User};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[serde(alias = "currentPassword")]
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[serde(alias = "newPassword")]
    #[validate(length(max = 128, message = "Password must be at most 128 characters"))]
    pub new_password: String,
}

fn not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(user.into()))
}

/// Updates name and/or email
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to update, invalid field or email taken
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<PublicUser>> {
    req.validate()?;

    let update = UpdateUser {
        email: req.email,
        name: req.name.filter(|n| !n.trim().is_empty()),
        password_hash: None,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let user = User::update(&state.db, auth.user_id, update)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(user.into()))
}

/// Changes the password and revokes the refresh token, so other sessions
/// must log in again
///
/// # Errors
///
/// - `400 Bad Request`: New password fails the policy
/// - `401 Unauthorized`: Current password is wrong
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    req.validate()?;
    password::validate_password_strength(&req.new_password)
        .map_err(|e| ApiError::validation("new_password", e.to_string()))?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    let valid = password::verify_password_blocking(req.current_password, user.password_hash).await?;
    if !valid {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = password::hash_password_blocking(req.new_password).await?;
    User::update(
        &state.db,
        auth.user_id,
        UpdateUser {
            password_hash: Some(password_hash),
            ..Default::default()
        },
    )
    .await?;
    User::set_refresh_token_hash(&state.db, auth.user_id, None).await?;

    tracing::info!(user_id = %auth.user_id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
