/// Write-side row types and query outcomes.
/// Read paths return studycircle-types models directly.
use uuid::Uuid;

use studycircle_types::models::{
    Answer, DifficultyLevel, MessageType, NotificationType, PrivacyLevel, Question,
};

pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub school: Option<String>,
    pub grade: Option<i64>,
    pub avatar_url: Option<String>,
}

pub struct NewQuestion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub difficulty: DifficultyLevel,
    pub grade_level: Option<i64>,
}

#[derive(Debug, Default)]
pub struct QuestionChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub subject_id: Option<Uuid>,
    pub difficulty: Option<DifficultyLevel>,
    pub grade_level: Option<i64>,
}

#[derive(Debug, Default, Clone)]
pub struct QuestionFilter {
    pub subject_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub resolved: Option<bool>,
    pub limit: u32,
}

pub struct NewAnswer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
}

/// Result of the acceptance transaction.
#[derive(Debug)]
pub struct AcceptedAnswer {
    pub answer: Answer,
    pub question: Question,
    /// Author of the answer that held acceptance before, if it moved.
    pub previous_author: Option<Uuid>,
    /// False when this answer held acceptance at some earlier point.
    pub first_acceptance: bool,
}

#[derive(Debug)]
pub enum AcceptOutcome {
    Accepted(AcceptedAnswer),
    AlreadyAccepted,
    NotInQuestion,
}

pub struct NewGroup {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub privacy: PrivacyLevel,
    pub max_members: i64,
}

#[derive(Debug, Default)]
pub struct GroupChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub privacy: Option<PrivacyLevel>,
    pub max_members: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    GroupFull,
    GroupNotFound,
}

pub struct NewResource {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_size: i64,
}

#[derive(Debug, Default)]
pub struct ResourceChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject_id: Option<Uuid>,
}

pub struct NewMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
}

pub struct NewNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
}
