use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use studycircle_db::models::{NewQuestion, QuestionChanges, QuestionFilter};
use studycircle_rules::gamification::Activity;
use studycircle_rules::policy::{Actor, Operation, Target};
use studycircle_rules::validate;
use studycircle_types::api::{CreateQuestionRequest, UpdateQuestionRequest};
use studycircle_types::models::Question;

use crate::access::{ensure, require_user};
use crate::badges::record_activity;
use crate::error::ServiceError;
use crate::state::{AppState, AppStateInner};
use crate::subjects::check_subject;

#[derive(Debug, Default, Deserialize)]
pub struct QuestionQuery {
    pub subject_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub resolved: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_questions(state: &AppStateInner, query: QuestionQuery) -> Result<Vec<Question>, ServiceError> {
    let filter = QuestionFilter {
        subject_id: query.subject_id,
        user_id: query.user_id,
        resolved: query.resolved,
        limit: query.limit,
    };
    Ok(state.db.list_questions(&filter)?)
}

/// Fetching a question counts as a view when the reader is signed in.
pub async fn view_question(state: &AppStateInner, actor: Actor, id: Uuid) -> Result<Question, ServiceError> {
    let mut question = state.db.get_question(id)?.ok_or(ServiceError::NotFound("question"))?;
    if actor.user_id().is_some() {
        if let Some(views) = state.db.increment_question_views(id)? {
            question.view_count = views;
        }
    }
    Ok(question)
}

pub async fn create_question(
    state: &AppStateInner,
    actor: Actor,
    req: CreateQuestionRequest,
) -> Result<Question, ServiceError> {
    let user_id = require_user(actor)?;
    ensure(actor, Operation::Insert, &Target::Question { user_id })?;

    validate::title("title", &req.title)?;
    validate::body("content", &req.content)?;
    validate::grade_level("grade_level", req.grade_level)?;
    check_subject(state, req.subject_id)?;

    let question = state.db.insert_question(&NewQuestion {
        id: Uuid::new_v4(),
        user_id,
        subject_id: req.subject_id,
        title: req.title.trim().to_string(),
        content: req.content,
        difficulty: req.difficulty,
        grade_level: req.grade_level,
    })?;

    record_activity(state, user_id, Activity::QuestionAsked).await;
    Ok(question)
}

/// Owner-only edit of the content fields. Counters and the resolved flag
/// are not reachable from here.
pub async fn update_question(
    state: &AppStateInner,
    actor: Actor,
    id: Uuid,
    req: UpdateQuestionRequest,
) -> Result<Question, ServiceError> {
    let existing = state.db.get_question(id)?.ok_or(ServiceError::NotFound("question"))?;
    ensure(actor, Operation::Update, &Target::Question { user_id: existing.user_id })?;

    if let Some(title) = &req.title {
        validate::title("title", title)?;
    }
    if let Some(content) = &req.content {
        validate::body("content", content)?;
    }
    validate::grade_level("grade_level", req.grade_level)?;
    check_subject(state, req.subject_id)?;

    let changes = QuestionChanges {
        title: req.title.map(|t| t.trim().to_string()),
        content: req.content,
        subject_id: req.subject_id,
        difficulty: req.difficulty,
        grade_level: req.grade_level,
    };
    state
        .db
        .update_question(id, &changes)?
        .ok_or(ServiceError::NotFound("question"))
}

pub async fn upvote_question(state: &AppStateInner, actor: Actor, id: Uuid) -> Result<i64, ServiceError> {
    require_user(actor)?;
    state.db.upvote_question(id)?.ok_or(ServiceError::NotFound("question"))
}

// -- Handlers --

pub async fn list(State(state): State<AppState>, Query(query): Query<QuestionQuery>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(list_questions(&state, query).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(view_question(&state, actor, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let question = create_question(&state, actor, req).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(update_question(&state, actor, id, req).await?))
}

pub async fn upvote(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let upvotes = upvote_question(&state, actor, id).await?;
    Ok(Json(serde_json::json!({ "upvotes": upvotes })))
}
