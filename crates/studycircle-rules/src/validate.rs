//! Input validation, applied before any store mutation.

use thiserror::Error;

use studycircle_types::models::MessageType;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_BODY_LEN: usize = 10_000;
pub const MAX_MESSAGE_LEN: usize = 2_000;
pub const MIN_GROUP_MEMBERS: i64 = 2;
pub const MAX_GROUP_MEMBERS: i64 = 500;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

pub fn required_text(field: &'static str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError::new(field, format!("must be at most {} characters", max_len)));
    }
    Ok(())
}

pub fn title(field: &'static str, value: &str) -> Result<(), ValidationError> {
    required_text(field, value, MAX_TITLE_LEN)
}

pub fn body(field: &'static str, value: &str) -> Result<(), ValidationError> {
    required_text(field, value, MAX_BODY_LEN)
}

pub fn message_content(value: &str) -> Result<(), ValidationError> {
    required_text("content", value, MAX_MESSAGE_LEN)
}

/// System messages are written by the server, never sent by users.
pub fn user_message_type(kind: MessageType) -> Result<(), ValidationError> {
    if kind == MessageType::System {
        return Err(ValidationError::new("message_type", "system messages cannot be sent"));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || value.len() > 254 {
        return Err(ValidationError::new("email", "is not a valid email address"));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), ValidationError> {
    if value.len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

pub fn max_members(value: i64) -> Result<(), ValidationError> {
    if !(MIN_GROUP_MEMBERS..=MAX_GROUP_MEMBERS).contains(&value) {
        return Err(ValidationError::new(
            "max_members",
            format!("must be between {} and {}", MIN_GROUP_MEMBERS, MAX_GROUP_MEMBERS),
        ));
    }
    Ok(())
}

pub fn grade_level(field: &'static str, value: Option<i64>) -> Result<(), ValidationError> {
    match value {
        Some(g) if !(1..=12).contains(&g) => Err(ValidationError::new(field, "must be between 1 and 12")),
        _ => Ok(()),
    }
}

pub fn rating(value: i64) -> Result<(), ValidationError> {
    if !(1..=5).contains(&value) {
        return Err(ValidationError::new("rating", "must be between 1 and 5"));
    }
    Ok(())
}

pub fn file_size(value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::new("file_size", "must not be negative"));
    }
    Ok(())
}

/// Derive a display name from the local part of an email address.
pub fn default_full_name(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or("Student")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert!(required_text("title", "  ", 10).is_err());
        assert!(required_text("title", "ok", 10).is_ok());
        let err = required_text("title", "this is far too long", 5).unwrap_err();
        assert_eq!(err.field, "title");
    }

    #[test]
    fn test_users_cannot_send_system_messages() {
        assert!(user_message_type(MessageType::Text).is_ok());
        assert!(user_message_type(MessageType::File).is_ok());
        assert_eq!(user_message_type(MessageType::System).unwrap_err().field, "message_type");
    }

    #[test]
    fn test_max_members_lower_bound() {
        assert_eq!(max_members(1).unwrap_err().field, "max_members");
        assert!(max_members(2).is_ok());
        assert!(max_members(501).is_err());
    }

    #[test]
    fn test_email_shape() {
        assert!(email("ana@school.edu").is_ok());
        assert!(email("ana").is_err());
        assert!(email("@school.edu").is_err());
        assert!(email("ana@localhost").is_err());
    }

    #[test]
    fn test_default_full_name() {
        assert_eq!(default_full_name("ana.lee@school.edu"), "ana.lee");
        assert_eq!(default_full_name("@x.y"), "Student");
    }

    #[test]
    fn test_ranges() {
        assert!(grade_level("grade", Some(13)).is_err());
        assert!(grade_level("grade", None).is_ok());
        assert!(rating(0).is_err());
        assert!(rating(5).is_ok());
        assert!(file_size(-1).is_err());
    }
}
