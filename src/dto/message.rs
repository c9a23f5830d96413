use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{dao::models::MessageEntity, dto::validation::validate_user_id};

/// Longest accepted message body, in characters.
pub const MAX_CONTENT_CHARS: usize = 500;

/// Payload for sending a point-to-point message.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Identity of the receiving user.
    pub receiver: String,
    /// Message body, 1 to 500 characters.
    pub content: String,
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_user_id(&self.receiver) {
            errors.add("receiver", e);
        }

        let chars = self.content.chars().count();
        if chars == 0 || chars > MAX_CONTENT_CHARS {
            let mut err = validator::ValidationError::new("content_length");
            err.message =
                Some(format!("content must be 1 to {MAX_CONTENT_CHARS} characters").into());
            errors.add("content", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Acknowledgement returned after a message is accepted.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageAccepted {
    /// Surrogate key of the stored message.
    pub id: i64,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,
    /// Whether the live delivery attempt reached the receiver's connection.
    pub delivered: bool,
}

/// A stored message as returned by the fetch endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    /// Surrogate key of the message.
    pub id: i64,
    /// Identity of the sending user.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,
    /// Whether the message ever reached a live connection.
    pub delivered: bool,
}

impl From<MessageEntity> for MessageView {
    fn from(value: MessageEntity) -> Self {
        Self {
            id: value.id,
            sender: value.sender,
            content: value.content,
            created_at: value.created_at,
            delivered: value.delivered,
        }
    }
}

/// Envelope for the message fetch endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageList {
    /// Messages addressed to the caller, newest first.
    pub messages: Vec<MessageView>,
}

/// Query parameters for the message fetch endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MessagesQuery {
    /// Only messages created strictly after this timestamp are returned.
    #[serde(default)]
    pub from: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(receiver: &str, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            receiver: receiver.into(),
            content: content.into(),
        }
    }

    const RECEIVER: &str = "8f14e45f-ceea-467f-a34f-b5c1effed0fd";

    #[test]
    fn accepts_well_formed_requests() {
        assert!(request(RECEIVER, "hello").validate().is_ok());
        assert!(request(RECEIVER, &"x".repeat(500)).validate().is_ok());
    }

    #[test]
    fn rejects_malformed_receiver() {
        assert!(request("not-a-uuid", "hello").validate().is_err());
    }

    #[test]
    fn rejects_empty_and_oversize_content() {
        assert!(request(RECEIVER, "").validate().is_err());
        assert!(request(RECEIVER, &"x".repeat(501)).validate().is_err());
    }
}
