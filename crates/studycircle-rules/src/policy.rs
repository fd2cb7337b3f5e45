//! Row-level authorization.
//!
//! Every (entity, operation) pair resolves to a [`Decision`]. The predicate is
//! pure: facts that would need a store lookup (group membership of the actor)
//! are resolved by the caller and carried inside the [`Target`].

use std::fmt;

use uuid::Uuid;

use studycircle_types::models::PrivacyLevel;

/// The identity performing an operation. Threaded explicitly through every
/// business call; there is no ambient session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User(Uuid),
}

impl Actor {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(*id),
        }
    }

    /// True when the actor is authenticated as exactly `user_id`.
    pub fn is(&self, user_id: Uuid) -> bool {
        self.user_id() == Some(user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Insert,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Insert => write!(f, "insert"),
            Operation::Update => write!(f, "update"),
        }
    }
}

/// The row being read, or the row about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Profile { user_id: Uuid },
    Subject,
    Badge,
    UserBadge,
    Question { user_id: Uuid },
    Answer { user_id: Uuid },
    Resource { user_id: Uuid },
    StudyGroup { creator_id: Uuid, privacy: PrivacyLevel },
    /// `actor_is_member`: whether the actor already belongs to the row's group.
    GroupMembership { user_id: Uuid, actor_is_member: bool },
    Message { user_id: Uuid, actor_is_member: bool },
    Notification { user_id: Uuid },
}

impl Target {
    pub fn entity(&self) -> &'static str {
        match self {
            Target::Profile { .. } => "profile",
            Target::Subject => "subject",
            Target::Badge => "badge",
            Target::UserBadge => "user_badge",
            Target::Question { .. } => "question",
            Target::Answer { .. } => "answer",
            Target::Resource { .. } => "resource",
            Target::StudyGroup { .. } => "study_group",
            Target::GroupMembership { .. } => "group_membership",
            Target::Message { .. } => "message",
            Target::Notification { .. } => "notification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn when(condition: bool, reason: &'static str) -> Self {
        if condition { Decision::Allow } else { Decision::Deny(reason) }
    }
}

/// Decide whether `actor` may perform `op` on `target`.
pub fn authorize(actor: Actor, op: Operation, target: &Target) -> Decision {
    use Operation::*;

    match (*target, op) {
        // Public catalogs and public content.
        (Target::Profile { .. }, Read)
        | (Target::Subject, Read)
        | (Target::Badge, Read)
        | (Target::UserBadge, Read)
        | (Target::Question { .. }, Read)
        | (Target::Answer { .. }, Read)
        | (Target::Resource { .. }, Read) => Decision::Allow,

        // Awards are written by the system on the user's behalf.
        (Target::UserBadge, Insert) => Decision::Allow,

        (Target::Subject | Target::Badge | Target::UserBadge, _) => {
            Decision::Deny("catalog rows are not writable")
        }

        (Target::Profile { user_id }, Insert | Update)
        | (Target::Question { user_id }, Insert | Update)
        | (Target::Answer { user_id }, Insert | Update)
        | (Target::Resource { user_id }, Insert | Update) => {
            Decision::when(actor.is(user_id), "actor does not own this row")
        }

        (Target::StudyGroup { creator_id, privacy }, Read) => Decision::when(
            privacy == PrivacyLevel::Public || actor.is(creator_id),
            "group is not public",
        ),
        (Target::StudyGroup { creator_id, .. }, Insert | Update) => {
            Decision::when(actor.is(creator_id), "actor is not the group creator")
        }

        (Target::GroupMembership { actor_is_member, .. }, Read) => Decision::when(
            actor.user_id().is_some() && actor_is_member,
            "actor is not a member of this group",
        ),
        (Target::GroupMembership { user_id, .. }, Insert) => {
            Decision::when(actor.is(user_id), "memberships are self-enrolled")
        }
        (Target::GroupMembership { .. }, Update) => Decision::Deny("memberships are immutable"),

        (Target::Message { actor_is_member, .. }, Read) => Decision::when(
            actor.user_id().is_some() && actor_is_member,
            "actor is not a member of this group",
        ),
        (Target::Message { user_id, actor_is_member }, Insert) => Decision::when(
            actor.is(user_id) && actor_is_member,
            "sender must be the actor and a group member",
        ),
        (Target::Message { .. }, Update) => Decision::Deny("messages are append-only"),

        (Target::Notification { user_id }, Read | Update) => {
            Decision::when(actor.is(user_id), "notification belongs to another user")
        }
        (Target::Notification { .. }, Insert) => Decision::Allow,
    }
}

/// Self-enrollment is open only for public groups; private and invite-only
/// groups need a pending invitation.
pub fn join_requires_invitation(privacy: PrivacyLevel) -> bool {
    !matches!(privacy, PrivacyLevel::Public)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn test_public_reads_allow_anonymous() {
        let anon = Actor::Anonymous;
        for target in [
            Target::Profile { user_id: uid(1) },
            Target::Subject,
            Target::Badge,
            Target::UserBadge,
            Target::Question { user_id: uid(1) },
            Target::Answer { user_id: uid(1) },
            Target::Resource { user_id: uid(1) },
        ] {
            assert!(authorize(anon, Operation::Read, &target).is_allowed(), "{:?}", target);
        }
    }

    #[test]
    fn test_owned_writes_require_owner() {
        let owner = Actor::User(uid(1));
        let other = Actor::User(uid(2));
        let question = Target::Question { user_id: uid(1) };

        assert!(authorize(owner, Operation::Insert, &question).is_allowed());
        assert!(authorize(owner, Operation::Update, &question).is_allowed());
        assert!(!authorize(other, Operation::Update, &question).is_allowed());
        assert!(!authorize(Actor::Anonymous, Operation::Insert, &question).is_allowed());

        let profile = Target::Profile { user_id: uid(1) };
        assert!(!authorize(other, Operation::Update, &profile).is_allowed());
    }

    #[test]
    fn test_group_visibility() {
        let private = Target::StudyGroup { creator_id: uid(1), privacy: PrivacyLevel::Private };
        let public = Target::StudyGroup { creator_id: uid(1), privacy: PrivacyLevel::Public };

        assert!(authorize(Actor::Anonymous, Operation::Read, &public).is_allowed());
        assert!(!authorize(Actor::Anonymous, Operation::Read, &private).is_allowed());
        assert!(!authorize(Actor::User(uid(2)), Operation::Read, &private).is_allowed());
        assert!(authorize(Actor::User(uid(1)), Operation::Read, &private).is_allowed());
        assert!(!authorize(Actor::User(uid(2)), Operation::Update, &public).is_allowed());
    }

    #[test]
    fn test_messages_require_membership() {
        let reader = Actor::User(uid(2));
        let outsider_view = Target::Message { user_id: uid(1), actor_is_member: false };
        let member_view = Target::Message { user_id: uid(1), actor_is_member: true };

        assert!(!authorize(reader, Operation::Read, &outsider_view).is_allowed());
        assert!(authorize(reader, Operation::Read, &member_view).is_allowed());

        // Sending as someone else is denied even for members.
        assert!(!authorize(reader, Operation::Insert, &member_view).is_allowed());
        let own = Target::Message { user_id: uid(2), actor_is_member: true };
        assert!(authorize(reader, Operation::Insert, &own).is_allowed());
        let own_outsider = Target::Message { user_id: uid(2), actor_is_member: false };
        assert!(!authorize(reader, Operation::Insert, &own_outsider).is_allowed());
        assert!(!authorize(reader, Operation::Update, &own).is_allowed());
    }

    #[test]
    fn test_membership_rows() {
        let actor = Actor::User(uid(3));
        let self_enroll = Target::GroupMembership { user_id: uid(3), actor_is_member: false };
        let enroll_other = Target::GroupMembership { user_id: uid(4), actor_is_member: true };

        assert!(authorize(actor, Operation::Insert, &self_enroll).is_allowed());
        assert!(!authorize(actor, Operation::Insert, &enroll_other).is_allowed());
        assert!(!authorize(actor, Operation::Read, &self_enroll).is_allowed());
        assert!(authorize(actor, Operation::Read, &enroll_other).is_allowed());
        assert!(!authorize(Actor::Anonymous, Operation::Read, &enroll_other).is_allowed());
    }

    #[test]
    fn test_notifications_are_private_but_system_writable() {
        let note = Target::Notification { user_id: uid(1) };
        assert!(authorize(Actor::User(uid(1)), Operation::Update, &note).is_allowed());
        assert!(!authorize(Actor::User(uid(2)), Operation::Read, &note).is_allowed());
        assert!(authorize(Actor::Anonymous, Operation::Insert, &note).is_allowed());
    }

    #[test]
    fn test_join_privacy() {
        assert!(!join_requires_invitation(PrivacyLevel::Public));
        assert!(join_requires_invitation(PrivacyLevel::Private));
        assert!(join_requires_invitation(PrivacyLevel::InviteOnly));
    }

    #[test]
    fn test_catalogs_are_read_only() {
        let admin = Actor::User(uid(1));
        assert_eq!(
            authorize(admin, Operation::Insert, &Target::Subject),
            Decision::Deny("catalog rows are not writable")
        );
        assert!(!authorize(admin, Operation::Update, &Target::Badge).is_allowed());
        assert!(authorize(Actor::Anonymous, Operation::Insert, &Target::UserBadge).is_allowed());
    }
}
