use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::trace;
use uuid::Uuid;

use studycircle_db::models::NewMessage;
use studycircle_rules::policy::{Actor, Operation, Target};
use studycircle_rules::validate;
use studycircle_types::api::SendMessageRequest;
use studycircle_types::events::GatewayEvent;
use studycircle_types::models::Message;

use crate::access::{can_read, ensure, require_user};
use crate::error::ServiceError;
use crate::state::{AppState, AppStateInner};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

fn actor_is_member(state: &AppStateInner, actor: Actor, group_id: Uuid) -> Result<bool, ServiceError> {
    match actor.user_id() {
        Some(user_id) => Ok(state.db.is_group_member(group_id, user_id)?),
        None => Ok(false),
    }
}

/// Most recent window of a group's chat, oldest first. Non-members get an
/// empty window rather than an error.
pub async fn recent_messages(state: &AppStateInner, actor: Actor, group_id: Uuid, limit: u32) -> Result<Vec<Message>, ServiceError> {
    state.db.get_group(group_id)?.ok_or(ServiceError::NotFound("study_group"))?;
    let is_member = actor_is_member(state, actor, group_id)?;

    let messages = state.db.recent_messages(group_id, limit)?;
    Ok(messages
        .into_iter()
        .filter(|m| {
            can_read(
                actor,
                &Target::Message {
                    user_id: m.user_id,
                    actor_is_member: is_member,
                },
            )
        })
        .collect())
}

/// Append a message and publish it to the group's live subscribers.
pub async fn send_message(
    state: &AppStateInner,
    actor: Actor,
    group_id: Uuid,
    req: SendMessageRequest,
) -> Result<Message, ServiceError> {
    let user_id = require_user(actor)?;
    state.db.get_group(group_id)?.ok_or(ServiceError::NotFound("study_group"))?;
    ensure(
        actor,
        Operation::Insert,
        &Target::Message {
            user_id,
            actor_is_member: actor_is_member(state, actor, group_id)?,
        },
    )?;
    validate::message_content(&req.content)?;
    validate::user_message_type(req.message_type)?;

    let message = state.db.insert_message(&NewMessage {
        id: Uuid::new_v4(),
        group_id,
        user_id,
        content: req.content,
        message_type: req.message_type,
    })?;

    let delivered = state
        .dispatcher
        .publish(GatewayEvent::MessageCreate {
            message: message.clone(),
        })
        .await;
    trace!("Message {} delivered to {} live subscribers", message.id, delivered);

    Ok(message)
}

// -- Handlers --

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(recent_messages(&state, actor, group_id, query.limit).await?))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let message = send_message(&state, actor, group_id, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
