/// Project and requester endpoints
///
/// Both label kinds share handlers; the public functions only pick the kind.
/// Any member of the owning list may list, create or delete labels.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use tasklane_shared::auth::{authorization, middleware::AuthContext};
use tasklane_shared::models::label::{Label, LabelKind};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLabelRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
}

async fn list(state: AppState, auth: AuthContext, kind: LabelKind, list_id: Uuid) -> ApiResult<Json<Vec<Label>>> {
    authorization::require_membership(&state.db, list_id, auth.user_id).await?;
    let labels = Label::list_by_list(&state.db, kind, list_id).await?;
    Ok(Json(labels))
}

async fn create(
    state: AppState,
    auth: AuthContext,
    kind: LabelKind,
    list_id: Uuid,
    req: CreateLabelRequest,
) -> ApiResult<(StatusCode, Json<Label>)> {
    req.validate()?;
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name", "Name is required"));
    }

    authorization::require_membership(&state.db, list_id, auth.user_id).await?;

    let label = Label::create(&state.db, kind, list_id, &req.name)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::Conflict(format!("A {} with this name already exists", kind.as_str()))
            }
            other => other,
        })?;

    tracing::debug!(label_id = %label.id, kind = kind.as_str(), list_id = %list_id, "Label created");
    Ok((StatusCode::CREATED, Json(label)))
}

async fn remove(state: AppState, auth: AuthContext, kind: LabelKind, id: Uuid) -> ApiResult<StatusCode> {
    let not_found = || ApiError::NotFound(format!("{} not found", capitalized(kind)));

    let label = Label::find_by_id(&state.db, kind, id)
        .await?
        .ok_or_else(not_found)?;

    authorization::require_membership(&state.db, label.list_id, auth.user_id).await?;

    if !Label::delete(&state.db, kind, id).await? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

fn capitalized(kind: LabelKind) -> &'static str {
    match kind {
        LabelKind::Project => "Project",
        LabelKind::Requester => "Requester",
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Label>>> {
    list(state, auth, LabelKind::Project, list_id).await
}

pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(list_id): Path<Uuid>,
    Json(req): Json<CreateLabelRequest>,
) -> ApiResult<(StatusCode, Json<Label>)> {
    create(state, auth, LabelKind::Project, list_id, req).await
}

pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    remove(state, auth, LabelKind::Project, id).await
}

pub async fn list_requesters(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Label>>> {
    list(state, auth, LabelKind::Requester, list_id).await
}

pub async fn create_requester(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(list_id): Path<Uuid>,
    Json(req): Json<CreateLabelRequest>,
) -> ApiResult<(StatusCode, Json<Label>)> {
    create(state, auth, LabelKind::Requester, list_id, req).await
}

pub async fn delete_requester(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    remove(state, auth, LabelKind::Requester, id).await
}
