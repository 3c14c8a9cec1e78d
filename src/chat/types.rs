use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChatError;

/// The report a conversation is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportIdentity {
    pub name: String,
    #[serde(rename = "type")]
    pub report_type: String,
}

impl ReportIdentity {
    /// Build an identity from user-facing values; both parts are trimmed and must be non-empty
    pub fn new(name: impl AsRef<str>, report_type: impl AsRef<str>) -> Result<Self, ChatError> {
        let name = name.as_ref().trim();
        let report_type = report_type.as_ref().trim();

        if name.is_empty() {
            return Err(ChatError::InvalidReport("report name is empty".to_string()));
        }
        if report_type.is_empty() {
            return Err(ChatError::InvalidReport("report type is empty".to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            report_type: report_type.to_string(),
        })
    }
}

impl std::fmt::Display for ReportIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.report_type)
    }
}

/// Conversation language (text replies, transcription and speech synthesis)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Mr,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Mr => "mr",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hi => "Hindi",
            Language::Mr => "Marathi",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "hi" | "hindi" => Ok(Language::Hi),
            "mr" | "marathi" => Ok(Language::Mr),
            other => Err(format!("unsupported language: {other} (expected en, hi or mr)")),
        }
    }
}

/// Timbre of the synthesized reply voice; independent of [`Language`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    #[default]
    Female,
    Male,
}

impl VoiceGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceGender::Female => "female",
            VoiceGender::Male => "male",
        }
    }
}

impl std::str::FromStr for VoiceGender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" => Ok(VoiceGender::Female),
            "male" => Ok(VoiceGender::Male),
            other => Err(format!("unsupported voice gender: {other} (expected female or male)")),
        }
    }
}

/// Who is talking to the assistant. The token is forwarded as a bearer credential.
#[derive(Clone)]
pub struct CallerIdentity {
    pub user_id: String,
    pub id_token: String,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            id_token: id_token.into(),
        }
    }
}

// Keep tokens out of logs
impl std::fmt::Debug for CallerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerIdentity")
            .field("user_id", &self.user_id)
            .field("id_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single entry in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Local identifier, used to retract a failed optimistic send
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Whether the message went through the voice pipeline
    pub is_voice: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_voice: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn voice(mut self) -> Self {
        self.is_voice = true;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A conversation established with the assistant for one report
#[derive(Debug, Clone)]
pub struct Session {
    /// Assigned by the assistant service, never changed afterwards
    pub session_id: String,
    pub report: ReportIdentity,
    /// Language the session was opened with. Later sends follow the current
    /// preference instead, so this can differ from what the user now reads.
    pub language: Language,
    pub messages: Vec<Message>,
}
