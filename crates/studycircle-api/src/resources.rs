use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use studycircle_db::models::{NewResource, ResourceChanges};
use studycircle_rules::gamification::Activity;
use studycircle_rules::notify::DomainEvent;
use studycircle_rules::policy::{Actor, Operation, Target};
use studycircle_rules::validate;
use studycircle_types::api::{
    CreateResourceRequest, DownloadResponse, RateResourceRequest, ShareResourceRequest, UpdateResourceRequest,
};
use studycircle_types::models::Resource;

use crate::access::{ensure, require_user};
use crate::badges::record_activity;
use crate::error::ServiceError;
use crate::notifications::emit;
use crate::state::{AppState, AppStateInner};
use crate::subjects::check_subject;

#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    pub subject_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn get_resource(state: &AppStateInner, id: Uuid) -> Result<Resource, ServiceError> {
    state.db.get_resource(id)?.ok_or(ServiceError::NotFound("resource"))
}

pub async fn create_resource(state: &AppStateInner, actor: Actor, req: CreateResourceRequest) -> Result<Resource, ServiceError> {
    let user_id = require_user(actor)?;
    ensure(actor, Operation::Insert, &Target::Resource { user_id })?;

    validate::title("title", &req.title)?;
    validate::required_text("file_url", &req.file_url, 2048)?;
    validate::file_size(req.file_size)?;
    check_subject(state, req.subject_id)?;

    let resource = state.db.insert_resource(&NewResource {
        id: Uuid::new_v4(),
        user_id,
        subject_id: req.subject_id,
        title: req.title.trim().to_string(),
        description: req.description,
        file_url: req.file_url.trim().to_string(),
        file_size: req.file_size,
    })?;

    record_activity(state, user_id, Activity::ResourceShared).await;
    Ok(resource)
}

pub async fn update_resource(
    state: &AppStateInner,
    actor: Actor,
    id: Uuid,
    req: UpdateResourceRequest,
) -> Result<Resource, ServiceError> {
    let existing = get_resource(state, id).await?;
    ensure(actor, Operation::Update, &Target::Resource { user_id: existing.user_id })?;

    if let Some(title) = &req.title {
        validate::title("title", title)?;
    }
    check_subject(state, req.subject_id)?;

    let changes = ResourceChanges {
        title: req.title.map(|t| t.trim().to_string()),
        description: req.description,
        subject_id: req.subject_id,
    };
    state
        .db
        .update_resource(id, &changes)?
        .ok_or(ServiceError::NotFound("resource"))
}

pub async fn download_resource(state: &AppStateInner, actor: Actor, id: Uuid) -> Result<DownloadResponse, ServiceError> {
    require_user(actor)?;
    let (file_url, download_count) = state.db.record_download(id)?.ok_or(ServiceError::NotFound("resource"))?;
    Ok(DownloadResponse { file_url, download_count })
}

/// Point another user at a resource via a `resource_shared` notification.
pub async fn share_resource(state: &AppStateInner, actor: Actor, id: Uuid, recipient_id: Uuid) -> Result<(), ServiceError> {
    let sharer_id = require_user(actor)?;
    let resource = get_resource(state, id).await?;

    if recipient_id == sharer_id {
        return Err(ServiceError::Validation {
            field: "user_id",
            message: "cannot share a resource with yourself".into(),
        });
    }
    state.db.get_user(recipient_id)?.ok_or(ServiceError::NotFound("user"))?;

    let sharer_name = state.db.display_name(sharer_id)?;
    emit(
        state,
        DomainEvent::ResourceShared {
            recipient_id,
            resource_id: resource.id,
            resource_title: resource.title,
            sharer_name,
        },
    )
    .await;
    Ok(())
}

pub async fn rate_resource(state: &AppStateInner, actor: Actor, id: Uuid, rating: i64) -> Result<Resource, ServiceError> {
    require_user(actor)?;
    validate::rating(rating)?;
    state
        .db
        .rate_resource(id, rating)?
        .ok_or(ServiceError::NotFound("resource"))
}

// -- Handlers --

pub async fn list(State(state): State<AppState>, Query(query): Query<ResourceQuery>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.db.list_resources(query.subject_id, query.limit)?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(get_resource(&state, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateResourceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let resource = create_resource(&state, actor, req).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResourceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(update_resource(&state, actor, id, req).await?))
}

pub async fn download(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(download_resource(&state, actor, id).await?))
}

pub async fn share(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ShareResourceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    share_resource(&state, actor, id, req.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rate(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<RateResourceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(rate_resource(&state, actor, id, req.rating).await?))
}
