use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use studycircle_db::models::{GroupChanges, JoinOutcome, NewGroup};
use studycircle_rules::notify::DomainEvent;
use studycircle_rules::policy::{Actor, Operation, Target, join_requires_invitation};
use studycircle_rules::validate;
use studycircle_types::api::{CreateGroupRequest, InviteRequest, UpdateGroupRequest};
use studycircle_types::models::{GroupMembership, StudyGroup};

use crate::access::{can_read, ensure, require_user};
use crate::error::ServiceError;
use crate::notifications::emit;
use crate::state::{AppState, AppStateInner};
use crate::subjects::check_subject;

#[derive(Debug, Default, Deserialize)]
pub struct GroupQuery {
    pub subject_id: Option<Uuid>,
}

fn group_target(group: &StudyGroup) -> Target {
    Target::StudyGroup {
        creator_id: group.creator_id,
        privacy: group.privacy,
    }
}

/// Groups the actor may see: public ones plus those they created.
pub async fn list_groups(state: &AppStateInner, actor: Actor, subject_id: Option<Uuid>) -> Result<Vec<StudyGroup>, ServiceError> {
    let groups = state.db.list_groups(subject_id)?;
    Ok(groups
        .into_iter()
        .filter(|g| can_read(actor, &group_target(g)))
        .collect())
}

/// A group hidden from the actor is reported as missing.
pub async fn get_group(state: &AppStateInner, actor: Actor, id: Uuid) -> Result<StudyGroup, ServiceError> {
    state
        .db
        .get_group(id)?
        .filter(|g| can_read(actor, &group_target(g)))
        .ok_or(ServiceError::NotFound("study_group"))
}

pub async fn create_group(state: &AppStateInner, actor: Actor, req: CreateGroupRequest) -> Result<StudyGroup, ServiceError> {
    let creator_id = require_user(actor)?;
    ensure(
        actor,
        Operation::Insert,
        &Target::StudyGroup {
            creator_id,
            privacy: req.privacy,
        },
    )?;

    validate::title("name", &req.name)?;
    validate::max_members(req.max_members)?;
    check_subject(state, req.subject_id)?;

    let group = state.db.create_group(&NewGroup {
        id: Uuid::new_v4(),
        creator_id,
        subject_id: req.subject_id,
        name: req.name.trim().to_string(),
        description: req.description,
        privacy: req.privacy,
        max_members: req.max_members,
    })?;

    info!("{} created study group {} ({})", creator_id, group.id, group.privacy.as_str());
    Ok(group)
}

pub async fn update_group(
    state: &AppStateInner,
    actor: Actor,
    id: Uuid,
    req: UpdateGroupRequest,
) -> Result<StudyGroup, ServiceError> {
    let group = state.db.get_group(id)?.ok_or(ServiceError::NotFound("study_group"))?;
    ensure(actor, Operation::Update, &group_target(&group))?;

    if let Some(name) = &req.name {
        validate::title("name", name)?;
    }
    if let Some(max) = req.max_members {
        validate::max_members(max)?;
        if max < group.member_count {
            return Err(ServiceError::Validation {
                field: "max_members",
                message: format!("group already has {} members", group.member_count),
            });
        }
    }

    let changes = GroupChanges {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
        privacy: req.privacy,
        max_members: req.max_members,
    };
    state
        .db
        .update_group(id, &changes)?
        .ok_or(ServiceError::NotFound("study_group"))
}

/// Self-enrollment. Public groups are open; private and invite-only groups
/// require a pending invitation. Capacity is enforced by the store.
pub async fn join_group(state: &AppStateInner, actor: Actor, id: Uuid) -> Result<StudyGroup, ServiceError> {
    let user_id = require_user(actor)?;
    ensure(
        actor,
        Operation::Insert,
        &Target::GroupMembership {
            user_id,
            actor_is_member: false,
        },
    )?;

    let group = state.db.get_group(id)?.ok_or(ServiceError::NotFound("study_group"))?;
    if join_requires_invitation(group.privacy) && !state.db.has_invitation(id, user_id)? {
        debug!("{} tried to join {} group {} without an invitation", user_id, group.privacy.as_str(), id);
        return Err(ServiceError::Forbidden);
    }

    match state.db.join_group(id, user_id)? {
        JoinOutcome::Joined => {
            info!("{} joined study group {}", user_id, id);
            state.db.get_group(id)?.ok_or(ServiceError::NotFound("study_group"))
        }
        JoinOutcome::AlreadyMember => Err(ServiceError::conflict("already a member of this group")),
        JoinOutcome::GroupFull => Err(ServiceError::conflict("group is full")),
        JoinOutcome::GroupNotFound => Err(ServiceError::NotFound("study_group")),
    }
}

/// Member list, visible to members only. Outsiders get an empty list.
pub async fn list_members(state: &AppStateInner, actor: Actor, id: Uuid) -> Result<Vec<GroupMembership>, ServiceError> {
    state.db.get_group(id)?.ok_or(ServiceError::NotFound("study_group"))?;
    let actor_is_member = match actor.user_id() {
        Some(user_id) => state.db.is_group_member(id, user_id)?,
        None => false,
    };

    let members = state.db.list_members(id)?;
    Ok(members
        .into_iter()
        .filter(|m| {
            can_read(
                actor,
                &Target::GroupMembership {
                    user_id: m.user_id,
                    actor_is_member,
                },
            )
        })
        .collect())
}

/// Admins and moderators record an invitation; the invitee is notified the
/// first time only.
pub async fn invite_to_group(
    state: &AppStateInner,
    actor: Actor,
    id: Uuid,
    invitee_id: Uuid,
) -> Result<bool, ServiceError> {
    let inviter_id = require_user(actor)?;
    let group = state.db.get_group(id)?.ok_or(ServiceError::NotFound("study_group"))?;

    match state.db.member_role(id, inviter_id)? {
        Some(role) if role.can_invite() => {}
        _ => {
            debug!("{} may not invite to group {}", inviter_id, id);
            return Err(ServiceError::Forbidden);
        }
    }

    state.db.get_user(invitee_id)?.ok_or(ServiceError::NotFound("user"))?;
    if state.db.is_group_member(id, invitee_id)? {
        return Err(ServiceError::conflict("user is already a member of this group"));
    }

    let created = state.db.add_invitation(id, invitee_id, inviter_id)?;
    if created {
        let inviter_name = state.db.display_name(inviter_id)?;
        emit(
            state,
            DomainEvent::GroupInvitation {
                invitee_id,
                group_id: id,
                group_name: group.name,
                inviter_name,
            },
        )
        .await;
    }
    Ok(created)
}

// -- Handlers --

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<GroupQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(list_groups(&state, actor, query.subject_id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(get_group(&state, actor, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let group = create_group(&state, actor, req).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(update_group(&state, actor, id, req).await?))
}

pub async fn join(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(join_group(&state, actor, id).await?))
}

pub async fn members(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(list_members(&state, actor, id).await?))
}

pub async fn invite(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = invite_to_group(&state, actor, id, req.user_id).await?;
    Ok(if created { StatusCode::CREATED } else { StatusCode::OK })
}
