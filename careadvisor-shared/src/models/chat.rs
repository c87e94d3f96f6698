use serde::{Deserialize, Serialize};

/// Role of a caller-supplied conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl TryFrom<&str> for ChatRole {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err("invalid chat role"),
        }
    }
}

/// A single role-tagged turn of prior conversation history.
///
/// Supplied by the caller, immutable once received; this service does not
/// persist it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request schema for `POST /api/chat`.
///
/// `message` defaults to empty when the field is absent so that a missing
/// message takes the documented 400 path instead of a deserialization
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The new user utterance.
    #[serde(default)]
    pub message: String,

    /// Prior turns, chronological, oldest first.
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

/// Error response body for every rejected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatErrorBody {
    pub error: String,

    #[serde(rename = "rateLimited", skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
}

impl ChatErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            rate_limited: None,
        }
    }

    pub fn rate_limited(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            rate_limited: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_accepts_camel_case_history() {
        let payload = json!({
            "message": "What are flu symptoms?",
            "conversationHistory": [
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" }
            ]
        });

        let request: ChatRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(request.message, "What are flu symptoms?");
        assert_eq!(request.conversation_history.len(), 2);
        assert_eq!(request.conversation_history[0].role, ChatRole::User);
        assert_eq!(request.conversation_history[1].role, ChatRole::Assistant);
    }

    #[test]
    fn chat_request_defaults_missing_fields() {
        let request: ChatRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.message.is_empty());
        assert!(request.conversation_history.is_empty());
    }

    #[test]
    fn error_body_serializes_rate_limited_flag() {
        let body = ChatErrorBody::rate_limited("slow down");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({ "error": "slow down", "rateLimited": true }));
    }

    #[test]
    fn error_body_omits_flag_when_not_rate_limited() {
        let body = ChatErrorBody::new("Unauthorized");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({ "error": "Unauthorized" }));
    }

    #[test]
    fn chat_role_round_trips_through_str() {
        assert_eq!(ChatRole::try_from("user").unwrap(), ChatRole::User);
        assert_eq!(ChatRole::try_from("assistant").unwrap(), ChatRole::Assistant);
        assert!(ChatRole::try_from("tool").is_err());
        assert_eq!(ChatRole::User.as_str(), "user");
    }
}
