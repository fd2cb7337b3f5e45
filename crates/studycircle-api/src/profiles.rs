use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use studycircle_db::models::ProfileChanges;
use studycircle_rules::policy::{Actor, Operation, Target};
use studycircle_rules::validate;
use studycircle_types::api::UpdateProfileRequest;
use studycircle_types::models::Profile;

use crate::access::{ensure, require_user};
use crate::error::ServiceError;
use crate::state::{AppState, AppStateInner};

pub async fn get_profile(state: &AppStateInner, user_id: Uuid) -> Result<Profile, ServiceError> {
    state.db.get_profile(user_id)?.ok_or(ServiceError::NotFound("profile"))
}

pub async fn update_own_profile(
    state: &AppStateInner,
    actor: Actor,
    req: UpdateProfileRequest,
) -> Result<Profile, ServiceError> {
    let user_id = require_user(actor)?;
    ensure(actor, Operation::Update, &Target::Profile { user_id })?;

    if let Some(name) = &req.full_name {
        validate::title("full_name", name)?;
    }
    if let Some(bio) = &req.bio {
        validate::required_text("bio", bio, validate::MAX_BODY_LEN)?;
    }
    validate::grade_level("grade", req.grade)?;

    let changes = ProfileChanges {
        full_name: req.full_name.map(|s| s.trim().to_string()),
        bio: req.bio,
        school: req.school,
        grade: req.grade,
        avatar_url: req.avatar_url,
    };
    state
        .db
        .update_profile(user_id, &changes)?
        .ok_or(ServiceError::NotFound("profile"))
}

// -- Handlers --

pub async fn get(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(get_profile(&state, user_id).await?))
}

pub async fn me(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> Result<impl IntoResponse, ServiceError> {
    let user_id = require_user(actor)?;
    Ok(Json(get_profile(&state, user_id).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(update_own_profile(&state, actor, req).await?))
}
