use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{Language, Message, Role, VoiceGender};

/// Body of `POST /chatbot/session`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub report_name: String,
    pub report_type: String,
    pub language: Language,
}

/// Session returned by the assistant, with whatever history it already holds
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

/// A stored message as the assistant reports it
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
    /// RFC 3339, RFC 2822, epoch millis or a `{ "_seconds": .. }` object
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl HistoryMessage {
    pub fn into_message(self) -> Message {
        let timestamp = self
            .timestamp
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        Message::new(self.role, self.content).at(timestamp)
    }
}

/// Body of `POST /chatbot/message`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub session_id: String,
    pub message: String,
    pub language: Language,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReply {
    pub response: String,
}

/// Body of `POST /voice-chatbot/voice-message`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceMessageRequest {
    pub session_id: String,
    /// Base64-encoded recording
    pub audio: String,
    pub language: Language,
    pub gender: VoiceGender,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceReply {
    /// What the assistant heard
    pub user_text: String,
    pub response_text: String,
    /// Base64-encoded synthesized speech, if any
    #[serde(default)]
    pub response_audio: Option<String>,
}

/// Success wrapper used by every endpoint: `{ success, data, message }`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Failure body: `{ error }` or `{ message }`
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_text(self) -> Option<String> {
        self.error.or(self.message).filter(|s| !s.trim().is_empty())
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_rfc2822(s))
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::Object(map) => map
            .get("_seconds")
            .or_else(|| map.get("seconds"))
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }
}
