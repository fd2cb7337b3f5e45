//! Domain event to notification mapping.

use uuid::Uuid;

use studycircle_types::models::NotificationType;

/// Events that produce exactly one notification for one user.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    QuestionAnswered {
        asker_id: Uuid,
        question_id: Uuid,
        question_title: String,
        answerer_name: String,
    },
    AnswerAccepted {
        author_id: Uuid,
        answer_id: Uuid,
        question_title: String,
    },
    GroupInvitation {
        invitee_id: Uuid,
        group_id: Uuid,
        group_name: String,
        inviter_name: String,
    },
    ResourceShared {
        recipient_id: Uuid,
        resource_id: Uuid,
        resource_title: String,
        sharer_name: String,
    },
    BadgeEarned {
        user_id: Uuid,
        badge_id: Uuid,
        badge_name: String,
    },
}

/// A notification row ready for insertion; always created unread.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
}

impl DomainEvent {
    pub fn into_notification(self) -> NewNotification {
        match self {
            DomainEvent::QuestionAnswered { asker_id, question_id, question_title, answerer_name } => {
                NewNotification {
                    user_id: asker_id,
                    kind: NotificationType::QuestionAnswered,
                    title: "New answer to your question".to_string(),
                    message: format!("{} answered \"{}\"", answerer_name, question_title),
                    related_id: Some(question_id),
                }
            }
            DomainEvent::AnswerAccepted { author_id, answer_id, question_title } => NewNotification {
                user_id: author_id,
                kind: NotificationType::AnswerAccepted,
                title: "Your answer was accepted".to_string(),
                message: format!("Your answer to \"{}\" was marked as the solution", question_title),
                related_id: Some(answer_id),
            },
            DomainEvent::GroupInvitation { invitee_id, group_id, group_name, inviter_name } => {
                NewNotification {
                    user_id: invitee_id,
                    kind: NotificationType::GroupInvitation,
                    title: "Study group invitation".to_string(),
                    message: format!("{} invited you to join \"{}\"", inviter_name, group_name),
                    related_id: Some(group_id),
                }
            }
            DomainEvent::ResourceShared { recipient_id, resource_id, resource_title, sharer_name } => {
                NewNotification {
                    user_id: recipient_id,
                    kind: NotificationType::ResourceShared,
                    title: "A resource was shared with you".to_string(),
                    message: format!("{} shared \"{}\"", sharer_name, resource_title),
                    related_id: Some(resource_id),
                }
            }
            // Badge awards reuse the points_earned notification type.
            DomainEvent::BadgeEarned { user_id, badge_id, badge_name } => NewNotification {
                user_id,
                kind: NotificationType::PointsEarned,
                title: format!("Badge earned: {}", badge_name),
                message: format!("You earned the \"{}\" badge", badge_name),
                related_id: Some(badge_id),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_answer_notifies_author() {
        let author = Uuid::from_u128(2);
        let answer = Uuid::from_u128(9);
        let n = DomainEvent::AnswerAccepted {
            author_id: author,
            answer_id: answer,
            question_title: "Quadratics".into(),
        }
        .into_notification();

        assert_eq!(n.user_id, author);
        assert_eq!(n.kind, NotificationType::AnswerAccepted);
        assert_eq!(n.related_id, Some(answer));
        assert!(n.message.contains("Quadratics"));
    }

    #[test]
    fn test_badge_maps_to_points_earned() {
        let n = DomainEvent::BadgeEarned {
            user_id: Uuid::from_u128(1),
            badge_id: Uuid::from_u128(5),
            badge_name: "Rising Star".into(),
        }
        .into_notification();
        assert_eq!(n.kind, NotificationType::PointsEarned);
        assert_eq!(n.title, "Badge earned: Rising Star");
    }

    #[test]
    fn test_invitation_targets_invitee() {
        let n = DomainEvent::GroupInvitation {
            invitee_id: Uuid::from_u128(7),
            group_id: Uuid::from_u128(3),
            group_name: "Calculus Crew".into(),
            inviter_name: "Ana".into(),
        }
        .into_notification();
        assert_eq!(n.user_id, Uuid::from_u128(7));
        assert_eq!(n.kind, NotificationType::GroupInvitation);
        assert_eq!(n.message, "Ana invited you to join \"Calculus Crew\"");
    }
}
