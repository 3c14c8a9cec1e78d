use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::types::{Language, Message, ReportIdentity, Session, VoiceGender};

/// How an initialization or conversation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retries exhausted; the next send triggers one more attempt
    Soft,
    /// The assistant reported the session as unknown; reopen the report to continue
    SessionLost,
}

/// Lifecycle of the chat session for the current report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(FailureKind),
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Failed(FailureKind::Soft) => "failed",
            SessionState::Failed(FailureKind::SessionLost) => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSeverity {
    /// Dismissible; input stays usable
    Soft,
    /// The capability is closed; recovery is outside the chat
    Hard,
}

/// The inline notice shown next to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub text: String,
}

impl Notice {
    pub fn soft(text: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Soft,
            text: text.into(),
        }
    }

    pub fn hard(text: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Hard,
            text: text.into(),
        }
    }
}

/// Everything the session, exchange and voice components share.
///
/// `generation` changes whenever the conversation is re-targeted; any async result
/// must compare the generation it captured before touching the rest of the state.
#[derive(Debug)]
pub struct ConversationState {
    pub generation: u64,
    pub report: Option<ReportIdentity>,
    pub phase: SessionState,
    pub session: Option<Session>,
    pub language: Language,
    pub voice_gender: VoiceGender,
    pub notice: Option<Notice>,
}

impl ConversationState {
    pub fn new(language: Language, voice_gender: VoiceGender) -> Self {
        Self {
            generation: 0,
            report: None,
            phase: SessionState::Uninitialized,
            session: None,
            language,
            voice_gender,
            notice: None,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// True while `report` is the open report and its session is initializing or ready
    pub fn is_active_for(&self, report: &ReportIdentity) -> bool {
        self.report.as_ref() == Some(report)
            && matches!(self.phase, SessionState::Initializing | SessionState::Ready)
    }

    pub fn messages(&self) -> &[Message] {
        self.session
            .as_ref()
            .map(|s| s.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Append to the log of the session `generation` belongs to. Returns false for stale results.
    pub fn push_message(&mut self, generation: u64, message: Message) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        match self.session.as_mut() {
            Some(session) => {
                session.messages.push(message);
                true
            }
            None => false,
        }
    }

    /// Remove exactly the message with `id`; the only permitted retraction
    pub fn retract_message(&mut self, generation: u64, id: Uuid) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.messages.iter().rposition(|m| m.id == id) {
            Some(index) => {
                session.messages.remove(index);
                true
            }
            None => false,
        }
    }
}

pub type SharedConversation = Arc<Mutex<ConversationState>>;

pub fn shared(language: Language, voice_gender: VoiceGender) -> SharedConversation {
    Arc::new(Mutex::new(ConversationState::new(language, voice_gender)))
}
