use axum::{Json, extract::State, response::IntoResponse};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::state::{AppState, AppStateInner};

/// Reject a subject tag that does not name an active catalog subject.
pub(crate) fn check_subject(state: &AppStateInner, subject_id: Option<Uuid>) -> Result<(), ServiceError> {
    let Some(id) = subject_id else {
        return Ok(());
    };
    match state.db.get_subject(id)? {
        Some(subject) if subject.is_active => Ok(()),
        _ => Err(ServiceError::Validation {
            field: "subject_id",
            message: "is not an active subject".into(),
        }),
    }
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.db.list_subjects(true)?))
}
