use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error payload the event service attaches to rejected mutations: `{"error": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Extracts the server message from an optional body, ignoring anything
    /// that does not carry a non-empty `error` string.
    pub fn message_from(body: Option<&Value>) -> Option<String> {
        let body = body?;
        let parsed = serde_json::from_value::<ErrorBody>(body.clone()).ok()?;
        parsed.error.filter(|message| !message.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} is required")]
pub struct MissingField {
    pub field: &'static str,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn server_message_requires_non_empty_error_string() {
        assert_eq!(
            ErrorBody::message_from(Some(&json!({"error": "already invited"}))),
            Some("already invited".to_string())
        );
        assert_eq!(ErrorBody::message_from(Some(&json!({"error": ""}))), None);
        assert_eq!(ErrorBody::message_from(Some(&json!({"error": 5}))), None);
        assert_eq!(ErrorBody::message_from(Some(&json!([1, 2]))), None);
        assert_eq!(ErrorBody::message_from(None), None);
    }
}
