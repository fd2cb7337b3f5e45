use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Answer, Badge, DifficultyLevel, MessageType, PrivacyLevel, Question,
};

// -- JWT Claims --

/// JWT claims shared across studycircle-api (REST middleware) and
/// studycircle-gateway (WebSocket authentication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub full_name: String,
    pub token: String,
}

// -- Profiles --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub school: Option<String>,
    pub grade: Option<i64>,
    pub avatar_url: Option<String>,
}

// -- Questions & answers --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuestionRequest {
    pub title: String,
    pub content: String,
    pub subject_id: Option<Uuid>,
    #[serde(default = "default_difficulty")]
    pub difficulty: DifficultyLevel,
    pub grade_level: Option<i64>,
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Medium
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuestionRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub subject_id: Option<Uuid>,
    pub difficulty: Option<DifficultyLevel>,
    pub grade_level: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAnswerRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAnswerRequest {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptAnswerResponse {
    pub answer: Answer,
    pub question: Question,
}

// -- Study groups --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub subject_id: Option<Uuid>,
    #[serde(default = "default_privacy")]
    pub privacy: PrivacyLevel,
    #[serde(default = "default_max_members")]
    pub max_members: i64,
}

fn default_privacy() -> PrivacyLevel {
    PrivacyLevel::Public
}

fn default_max_members() -> i64 {
    10
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub privacy: Option<PrivacyLevel>,
    pub max_members: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteRequest {
    pub user_id: Uuid,
}

// -- Chat --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
}

// -- Resources --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateResourceRequest {
    pub title: String,
    pub description: Option<String>,
    pub subject_id: Option<Uuid>,
    pub file_url: String,
    #[serde(default)]
    pub file_size: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateResourceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShareResourceRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateResourceRequest {
    pub rating: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub file_url: String,
    pub download_count: i64,
}

// -- Badges & notifications --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeProgress {
    pub badge: Badge,
    pub current: i64,
    /// Fraction of the threshold reached, clamped to 1.0.
    pub progress: f64,
    pub earned: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: i64,
}

// -- Suggestions --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionKind {
    QuestionImprovement,
    AnswerHints,
    StudyPlan,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub content: String,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
