use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a stored or submitted enum value has no matching variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// -- Enumerated types --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl FromStr for DifficultyLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(UnknownVariant { kind: "difficulty_level", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Admin,
    Moderator,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Member => "member",
        }
    }

    /// Admins and moderators may invite other users into the group.
    pub fn can_invite(&self) -> bool {
        matches!(self, Self::Admin | Self::Moderator)
    }
}

impl FromStr for GroupRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "member" => Ok(Self::Member),
            other => Err(UnknownVariant { kind: "group_role", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Public,
    Private,
    InviteOnly,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::InviteOnly => "invite_only",
        }
    }
}

impl FromStr for PrivacyLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "invite_only" => Ok(Self::InviteOnly),
            other => Err(UnknownVariant { kind: "privacy_level", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    File,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "file" => Ok(Self::File),
            "system" => Ok(Self::System),
            other => Err(UnknownVariant { kind: "message_type", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    QuestionAnswered,
    AnswerAccepted,
    GroupInvitation,
    ResourceShared,
    PointsEarned,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuestionAnswered => "question_answered",
            Self::AnswerAccepted => "answer_accepted",
            Self::GroupInvitation => "group_invitation",
            Self::ResourceShared => "resource_shared",
            Self::PointsEarned => "points_earned",
        }
    }
}

impl FromStr for NotificationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question_answered" => Ok(Self::QuestionAnswered),
            "answer_accepted" => Ok(Self::AnswerAccepted),
            "group_invitation" => Ok(Self::GroupInvitation),
            "resource_shared" => Ok(Self::ResourceShared),
            "points_earned" => Ok(Self::PointsEarned),
            other => Err(UnknownVariant { kind: "notification_type", value: other.to_string() }),
        }
    }
}

/// Which counted behavior a badge threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeRequirement {
    Points,
    QuestionsAsked,
    AnswersGiven,
    AnswersAccepted,
    ResourcesShared,
}

impl BadgeRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::QuestionsAsked => "questions_asked",
            Self::AnswersGiven => "answers_given",
            Self::AnswersAccepted => "answers_accepted",
            Self::ResourcesShared => "resources_shared",
        }
    }
}

impl FromStr for BadgeRequirement {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "points" => Ok(Self::Points),
            "questions_asked" => Ok(Self::QuestionsAsked),
            "answers_given" => Ok(Self::AnswersGiven),
            "answers_accepted" => Ok(Self::AnswersAccepted),
            "resources_shared" => Ok(Self::ResourcesShared),
            other => Err(UnknownVariant { kind: "badge_requirement_type", value: other.to_string() }),
        }
    }
}

// -- Entities --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub full_name: String,
    pub bio: Option<String>,
    pub school: Option<String>,
    pub grade: Option<i64>,
    pub points: i64,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub grade_levels: Vec<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub difficulty: DifficultyLevel,
    pub grade_level: Option<i64>,
    pub view_count: i64,
    pub upvotes: i64,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub is_accepted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyGroup {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub privacy: PrivacyLevel,
    pub max_members: i64,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_size: i64,
    pub download_count: i64,
    pub rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Chat messages are append-only; there is no update path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub requirement_type: BadgeRequirement,
    pub requirement_value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_id: Uuid,
    pub badge: Badge,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a user's counted behaviors, the input to every badge threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub points: i64,
    pub questions_asked: i64,
    pub answers_given: i64,
    pub answers_accepted: i64,
    pub resources_shared: i64,
}

impl ActivityCounts {
    pub fn metric(&self, requirement: BadgeRequirement) -> i64 {
        match requirement {
            BadgeRequirement::Points => self.points,
            BadgeRequirement::QuestionsAsked => self.questions_asked,
            BadgeRequirement::AnswersGiven => self.answers_given,
            BadgeRequirement::AnswersAccepted => self.answers_accepted,
            BadgeRequirement::ResourcesShared => self.resources_shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_strings_match_serde() {
        let json = serde_json::to_string(&PrivacyLevel::InviteOnly).unwrap();
        assert_eq!(json, format!("\"{}\"", PrivacyLevel::InviteOnly.as_str()));

        let json = serde_json::to_string(&BadgeRequirement::AnswersAccepted).unwrap();
        assert_eq!(json, "\"answers_accepted\"");
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let err = "legendary".parse::<DifficultyLevel>().unwrap_err();
        assert_eq!(err.kind, "difficulty_level");
        assert_eq!(err.to_string(), "unknown difficulty_level 'legendary'");
        assert!("invite_only".parse::<PrivacyLevel>().is_ok());
        assert!("owner".parse::<GroupRole>().is_err());
    }

    #[test]
    fn test_notification_kind_serializes_as_type() {
        let n = Notification {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            kind: NotificationType::AnswerAccepted,
            title: "t".into(),
            message: "m".into(),
            related_id: None,
            is_read: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "answer_accepted");
    }
}
