use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};
use uuid::Uuid;

use studycircle_db::models::{AcceptOutcome, NewAnswer};
use studycircle_rules::acceptance::{AcceptCandidate, AcceptError, check_accept};
use studycircle_rules::gamification::Activity;
use studycircle_rules::notify::DomainEvent;
use studycircle_rules::policy::{Actor, Operation, Target};
use studycircle_rules::validate;
use studycircle_types::api::{
    AcceptAnswerResponse, CreateAnswerRequest, UpdateAnswerRequest, VoteDirection, VoteRequest,
};
use studycircle_types::models::Answer;

use crate::access::{ensure, require_user};
use crate::badges::record_activity;
use crate::error::ServiceError;
use crate::notifications::emit;
use crate::state::{AppState, AppStateInner};

pub async fn list_answers(state: &AppStateInner, question_id: Uuid) -> Result<Vec<Answer>, ServiceError> {
    state.db.get_question(question_id)?.ok_or(ServiceError::NotFound("question"))?;
    Ok(state.db.list_answers(question_id)?)
}

pub async fn create_answer(
    state: &AppStateInner,
    actor: Actor,
    question_id: Uuid,
    req: CreateAnswerRequest,
) -> Result<Answer, ServiceError> {
    let user_id = require_user(actor)?;
    ensure(actor, Operation::Insert, &Target::Answer { user_id })?;
    validate::body("content", &req.content)?;

    let question = state.db.get_question(question_id)?.ok_or(ServiceError::NotFound("question"))?;
    let answer = state.db.insert_answer(&NewAnswer {
        id: Uuid::new_v4(),
        question_id,
        user_id,
        content: req.content,
    })?;

    record_activity(state, user_id, Activity::AnswerGiven).await;

    if question.user_id != user_id {
        let answerer_name = state.db.display_name(user_id)?;
        emit(
            state,
            DomainEvent::QuestionAnswered {
                asker_id: question.user_id,
                question_id,
                question_title: question.title,
                answerer_name,
            },
        )
        .await;
    }

    Ok(answer)
}

pub async fn update_answer(
    state: &AppStateInner,
    actor: Actor,
    id: Uuid,
    req: UpdateAnswerRequest,
) -> Result<Answer, ServiceError> {
    let existing = state.db.get_answer(id)?.ok_or(ServiceError::NotFound("answer"))?;
    ensure(actor, Operation::Update, &Target::Answer { user_id: existing.user_id })?;
    validate::body("content", &req.content)?;

    state
        .db
        .update_answer_content(id, &req.content)?
        .ok_or(ServiceError::NotFound("answer"))
}

pub async fn vote_answer(
    state: &AppStateInner,
    actor: Actor,
    id: Uuid,
    direction: VoteDirection,
) -> Result<Answer, ServiceError> {
    require_user(actor)?;
    state
        .db
        .vote_answer(id, direction == VoteDirection::Up)?
        .ok_or(ServiceError::NotFound("answer"))
}

/// Mark `answer_id` as the solution to `question_id`.
///
/// Only the asker may accept. Accepting a different answer on an already
/// resolved question moves the acceptance; the store clears the previous
/// one, sets the new one and resolves the question in a single transaction.
/// The first time an answer is accepted its author gets the acceptance
/// points, a badge recompute and an `answer_accepted` notification. Moving
/// acceptance back to an answer that held it before pays nothing again.
pub async fn accept_answer(
    state: &AppStateInner,
    actor: Actor,
    question_id: Uuid,
    answer_id: Uuid,
) -> Result<AcceptAnswerResponse, ServiceError> {
    require_user(actor)?;
    let question = state.db.get_question(question_id)?.ok_or(ServiceError::NotFound("question"))?;
    let answer = state.db.get_answer(answer_id)?.ok_or(ServiceError::NotFound("answer"))?;

    check_accept(
        actor,
        &AcceptCandidate {
            question_id: question.id,
            question_owner: question.user_id,
            answer_id: answer.id,
            answer_question_id: answer.question_id,
            answer_is_accepted: answer.is_accepted,
        },
    )?;

    let accepted = match state.db.accept_answer(question_id, answer_id)? {
        AcceptOutcome::Accepted(accepted) => accepted,
        AcceptOutcome::AlreadyAccepted => return Err(AcceptError::AlreadyAccepted.into()),
        AcceptOutcome::NotInQuestion => return Err(AcceptError::WrongQuestion(answer_id, question_id).into()),
    };
    info!(
        "Question {} resolved by answer {} (previously {:?})",
        question_id, answer_id, accepted.previous_author
    );

    let author_id = accepted.answer.user_id;
    if accepted.first_acceptance {
        record_activity(state, author_id, Activity::AnswerAccepted).await;

        if !actor.is(author_id) {
            emit(
                state,
                DomainEvent::AnswerAccepted {
                    author_id,
                    answer_id,
                    question_title: accepted.question.title.clone(),
                },
            )
            .await;
        }
    } else {
        debug!("Answer {} was accepted before, no reward", answer_id);
    }

    Ok(AcceptAnswerResponse {
        answer: accepted.answer,
        question: accepted.question,
    })
}

// -- Handlers --

pub async fn list(State(state): State<AppState>, Path(question_id): Path<Uuid>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(list_answers(&state, question_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(question_id): Path<Uuid>,
    Json(req): Json<CreateAnswerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let answer = create_answer(&state, actor, question_id, req).await?;
    Ok((StatusCode::CREATED, Json(answer)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAnswerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(update_answer(&state, actor, id, req).await?))
}

pub async fn vote(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(vote_answer(&state, actor, id, req.direction).await?))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((question_id, answer_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(accept_answer(&state, actor, question_id, answer_id).await?))
}
