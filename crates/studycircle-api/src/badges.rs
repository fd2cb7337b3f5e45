use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use studycircle_rules::gamification::{self, Activity};
use studycircle_rules::notify::DomainEvent;
use studycircle_rules::policy::Actor;
use studycircle_types::api::BadgeProgress;
use studycircle_types::models::{Badge, UserBadge};

use crate::access::require_user;
use crate::error::ServiceError;
use crate::notifications::emit;
use crate::state::{AppState, AppStateInner};

/// Award every badge whose threshold the user now meets and notify them
/// once per new badge. Safe to call repeatedly.
pub async fn recompute_and_award(state: &AppStateInner, user_id: Uuid) -> Result<Vec<Badge>, ServiceError> {
    let catalog = state.db.list_badges()?;
    let earned = state.db.earned_badge_ids(user_id)?;
    let counts = state.db.activity_counts(user_id)?;

    let due: Vec<Badge> = gamification::badges_to_award(&catalog, &earned, &counts)
        .into_iter()
        .cloned()
        .collect();

    let mut awarded = Vec::with_capacity(due.len());
    for badge in due {
        // A concurrent recompute may have won the race; that is not a new award.
        if !state.db.award_badge(user_id, badge.id)? {
            continue;
        }
        info!("{} earned badge {}", user_id, badge.name);
        emit(
            state,
            DomainEvent::BadgeEarned {
                user_id,
                badge_id: badge.id,
                badge_name: badge.name.clone(),
            },
        )
        .await;
        awarded.push(badge);
    }
    Ok(awarded)
}

/// Grant the points for a counted action, then re-evaluate badges.
/// Runs after the action has committed, so failures are logged only.
pub async fn record_activity(state: &AppStateInner, user_id: Uuid, activity: Activity) {
    if let Err(e) = state.db.add_points(user_id, activity.points()) {
        error!("Failed to add {:?} points for {}: {}", activity, user_id, e);
    }
    if let Err(e) = recompute_and_award(state, user_id).await {
        error!("Badge recompute failed for {}: {}", user_id, e);
    }
}

pub async fn progress_for(state: &AppStateInner, actor: Actor) -> Result<Vec<BadgeProgress>, ServiceError> {
    let user_id = require_user(actor)?;
    let catalog = state.db.list_badges()?;
    let earned = state.db.earned_badge_ids(user_id)?;
    let counts = state.db.activity_counts(user_id)?;
    Ok(gamification::badge_progress(&catalog, &earned, &counts))
}

pub async fn earned_by(state: &AppStateInner, user_id: Uuid) -> Result<Vec<UserBadge>, ServiceError> {
    state.db.get_user(user_id)?.ok_or(ServiceError::NotFound("user"))?;
    Ok(state.db.earned_badges(user_id)?)
}

// -- Handlers --

pub async fn catalog(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.db.list_badges()?))
}

pub async fn user_badges(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(earned_by(&state, user_id).await?))
}

pub async fn my_progress(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(progress_for(&state, actor).await?))
}
