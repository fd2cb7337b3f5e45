use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use studycircle_db::models::NewNotification;
use studycircle_rules::notify::DomainEvent;
use studycircle_rules::policy::{Actor, Operation, Target};
use studycircle_types::api::UnreadCount;
use studycircle_types::events::GatewayEvent;
use studycircle_types::models::Notification;

use crate::access::{ensure, require_user};
use crate::error::ServiceError;
use crate::state::{AppState, AppStateInner};

/// Persist the notification for a domain event and push it to the owner's
/// live connections. Best effort: failures are logged and swallowed so the
/// triggering action still succeeds.
pub async fn emit(state: &AppStateInner, event: DomainEvent) -> Option<Notification> {
    let n = event.into_notification();
    let row = NewNotification {
        id: Uuid::new_v4(),
        user_id: n.user_id,
        kind: n.kind,
        title: n.title,
        message: n.message,
        related_id: n.related_id,
    };

    match state.db.insert_notification(&row) {
        Ok(notification) => {
            debug!("Notified {} ({})", notification.user_id, notification.kind.as_str());
            state
                .dispatcher
                .send_to_user(
                    notification.user_id,
                    GatewayEvent::NotificationCreate {
                        notification: notification.clone(),
                    },
                )
                .await;
            Some(notification)
        }
        Err(e) => {
            warn!("Failed to create {} notification for {}: {}", row.kind.as_str(), row.user_id, e);
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_notifications(
    state: &AppStateInner,
    actor: Actor,
    unread_only: bool,
    limit: u32,
) -> Result<Vec<Notification>, ServiceError> {
    let user_id = require_user(actor)?;
    Ok(state.db.list_notifications(user_id, unread_only, limit)?)
}

/// Only the owner may flip the read flag.
pub async fn mark_read(state: &AppStateInner, actor: Actor, id: Uuid) -> Result<(), ServiceError> {
    require_user(actor)?;
    let notification = state.db.get_notification(id)?.ok_or(ServiceError::NotFound("notification"))?;
    ensure(actor, Operation::Update, &Target::Notification { user_id: notification.user_id })?;
    state.db.mark_notification_read(id)?;
    Ok(())
}

pub async fn mark_all_read(state: &AppStateInner, actor: Actor) -> Result<usize, ServiceError> {
    let user_id = require_user(actor)?;
    Ok(state.db.mark_all_notifications_read(user_id)?)
}

pub async fn unread_count(state: &AppStateInner, actor: Actor) -> Result<i64, ServiceError> {
    let user_id = require_user(actor)?;
    Ok(state.db.unread_notification_count(user_id)?)
}

// -- Handlers --

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(list_notifications(&state, actor, query.unread, query.limit).await?))
}

pub async fn read_one(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    mark_read(&state, actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn read_all(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> Result<impl IntoResponse, ServiceError> {
    let updated = mark_all_read(&state, actor).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

pub async fn count_unread(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> Result<impl IntoResponse, ServiceError> {
    let count = unread_count(&state, actor).await?;
    Ok(Json(UnreadCount { count }))
}
