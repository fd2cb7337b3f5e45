use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use studycircle_rules::acceptance::AcceptError;
use studycircle_rules::validate::ValidationError;

/// Outcome of a failed business operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(e: ValidationError) -> Self {
        ServiceError::Validation {
            field: e.field,
            message: e.message,
        }
    }
}

impl From<AcceptError> for ServiceError {
    fn from(e: AcceptError) -> Self {
        match e {
            AcceptError::NotAsker => ServiceError::Forbidden,
            AcceptError::WrongQuestion(..) => ServiceError::Validation {
                field: "answer_id",
                message: e.to_string(),
            },
            AcceptError::AlreadyAccepted => ServiceError::Conflict(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ServiceError::Internal(e) => {
                error!("Internal error: {:#}", e);
                ErrorBody {
                    error: "internal server error".into(),
                    field: None,
                }
            }
            ServiceError::Validation { field, message } => ErrorBody {
                error: message.clone(),
                field: Some(field),
            },
            other => ErrorBody {
                error: other.to_string(),
                field: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ServiceError::NotFound("question").status(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::conflict("group is full").status(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::Upstream("timeout".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ServiceError::from(anyhow::anyhow!("disk gone")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rule_errors_convert() {
        let v: ServiceError = ValidationError::new("max_members", "must be between 2 and 500").into();
        assert!(matches!(v, ServiceError::Validation { field: "max_members", .. }));

        assert!(matches!(ServiceError::from(AcceptError::NotAsker), ServiceError::Forbidden));
        assert!(matches!(ServiceError::from(AcceptError::AlreadyAccepted), ServiceError::Conflict(_)));
        assert!(matches!(
            ServiceError::from(AcceptError::WrongQuestion(Uuid::nil(), Uuid::nil())),
            ServiceError::Validation { field: "answer_id", .. }
        ));
    }
}
