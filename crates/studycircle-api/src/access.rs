//! Glue between the pure policy and service results.

use tracing::debug;
use uuid::Uuid;

use studycircle_rules::policy::{Actor, Decision, Operation, Target, authorize};

use crate::error::ServiceError;

/// The authenticated user behind `actor`, or 401.
pub fn require_user(actor: Actor) -> Result<Uuid, ServiceError> {
    actor.user_id().ok_or(ServiceError::Unauthenticated)
}

/// Turn a policy denial into an error. Anonymous writes report 401, all
/// other denials 403.
pub fn ensure(actor: Actor, op: Operation, target: &Target) -> Result<(), ServiceError> {
    match authorize(actor, op, target) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            debug!("Denied {} on {} for {:?}: {}", op, target.entity(), actor, reason);
            if actor == Actor::Anonymous && op != Operation::Read {
                Err(ServiceError::Unauthenticated)
            } else {
                Err(ServiceError::Forbidden)
            }
        }
    }
}

/// Read check for row filtering: denied rows are dropped, not reported.
pub fn can_read(actor: Actor, target: &Target) -> bool {
    match authorize(actor, Operation::Read, target) {
        Decision::Allow => true,
        Decision::Deny(reason) => {
            debug!("Filtered {} for {:?}: {}", target.entity(), actor, reason);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_write_is_unauthenticated() {
        let owner = Uuid::new_v4();
        let err = ensure(Actor::Anonymous, Operation::Insert, &Target::Question { user_id: owner }).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }

    #[test]
    fn test_other_users_write_is_forbidden() {
        let owner = Uuid::new_v4();
        let err = ensure(
            Actor::User(Uuid::new_v4()),
            Operation::Update,
            &Target::Resource { user_id: owner },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));
        assert!(ensure(Actor::User(owner), Operation::Update, &Target::Resource { user_id: owner }).is_ok());
    }

    #[test]
    fn test_can_read_filters_message_for_outsider() {
        let target = Target::Message {
            user_id: Uuid::new_v4(),
            actor_is_member: false,
        };
        assert!(!can_read(Actor::User(Uuid::new_v4()), &target));
    }
}
