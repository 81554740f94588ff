//! Validation messages collected on records during save/delete

use std::fmt;

use serde::Serialize;

/// Category of a validation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    /// A not-null attribute is missing or empty
    PresenceOf,
    /// A virtual foreign key points at a missing row, or a dependent row blocks a delete
    ConstraintViolation,
    /// `create` was called for a record that already exists
    InvalidCreateAttempt,
    /// `update` was called for a record that does not exist
    InvalidUpdateAttempt,
    /// Message produced by a user-defined validator
    Custom(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::PresenceOf => "PresenceOf",
            MessageKind::ConstraintViolation => "ConstraintViolation",
            MessageKind::InvalidCreateAttempt => "InvalidCreateAttempt",
            MessageKind::InvalidUpdateAttempt => "InvalidUpdateAttempt",
            MessageKind::Custom(kind) => kind,
        }
    }
}

/// A structured record describing why a save/delete was rejected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub text: String,
    pub field: Option<String>,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(text: impl Into<String>, field: Option<String>, kind: MessageKind) -> Self {
        Self {
            text: text.into(),
            field,
            kind,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(MessageKind::PresenceOf.as_str(), "PresenceOf");
        assert_eq!(MessageKind::ConstraintViolation.as_str(), "ConstraintViolation");
        assert_eq!(MessageKind::InvalidCreateAttempt.as_str(), "InvalidCreateAttempt");
        assert_eq!(MessageKind::InvalidUpdateAttempt.as_str(), "InvalidUpdateAttempt");
        assert_eq!(MessageKind::Custom("Email".to_string()).as_str(), "Email");
    }

    #[test]
    fn test_message_display() {
        let message = Message::new("name is required", Some("name".to_string()), MessageKind::PresenceOf);
        assert_eq!(message.to_string(), "name is required");
        assert_eq!(message.field.as_deref(), Some("name"));
    }
}
