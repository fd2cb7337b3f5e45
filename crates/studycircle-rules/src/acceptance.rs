//! Preconditions for accepting an answer.

use thiserror::Error;
use uuid::Uuid;

use crate::policy::Actor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcceptError {
    #[error("only the asker may accept an answer")]
    NotAsker,
    #[error("answer {0} does not belong to question {1}")]
    WrongQuestion(Uuid, Uuid),
    #[error("answer is already accepted")]
    AlreadyAccepted,
}

/// Minimal view of the question and answer involved in an acceptance.
#[derive(Debug, Clone, Copy)]
pub struct AcceptCandidate {
    pub question_id: Uuid,
    pub question_owner: Uuid,
    pub answer_id: Uuid,
    pub answer_question_id: Uuid,
    pub answer_is_accepted: bool,
}

/// A resolved question may move its acceptance to another answer, but
/// accepting the answer that already holds it is rejected.
pub fn check_accept(actor: Actor, candidate: &AcceptCandidate) -> Result<(), AcceptError> {
    if !actor.is(candidate.question_owner) {
        return Err(AcceptError::NotAsker);
    }
    if candidate.answer_question_id != candidate.question_id {
        return Err(AcceptError::WrongQuestion(candidate.answer_id, candidate.question_id));
    }
    if candidate.answer_is_accepted {
        return Err(AcceptError::AlreadyAccepted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> AcceptCandidate {
        AcceptCandidate {
            question_id: Uuid::from_u128(10),
            question_owner: Uuid::from_u128(1),
            answer_id: Uuid::from_u128(20),
            answer_question_id: Uuid::from_u128(10),
            answer_is_accepted: false,
        }
    }

    #[test]
    fn test_asker_may_accept() {
        assert_eq!(check_accept(Actor::User(Uuid::from_u128(1)), &candidate()), Ok(()));
    }

    #[test]
    fn test_others_may_not_accept() {
        assert_eq!(
            check_accept(Actor::User(Uuid::from_u128(2)), &candidate()),
            Err(AcceptError::NotAsker)
        );
        assert_eq!(check_accept(Actor::Anonymous, &candidate()), Err(AcceptError::NotAsker));
    }

    #[test]
    fn test_reaccepting_same_answer_is_rejected() {
        let mut c = candidate();
        c.answer_is_accepted = true;
        assert_eq!(
            check_accept(Actor::User(Uuid::from_u128(1)), &c),
            Err(AcceptError::AlreadyAccepted)
        );
    }

    #[test]
    fn test_answer_must_belong_to_question() {
        let mut c = candidate();
        c.answer_question_id = Uuid::from_u128(11);
        assert!(matches!(
            check_accept(Actor::User(Uuid::from_u128(1)), &c),
            Err(AcceptError::WrongQuestion(_, _))
        ));
    }
}
