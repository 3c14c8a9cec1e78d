use thiserror::Error;

use crate::assistant::AssistantError;
use crate::voice::{MicrophoneError, PlaybackError};

/// Why a local precondition rejected a send or capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another text or voice exchange is still in flight
    Busy,
    /// Message text was empty after trimming
    EmptyMessage,
    /// Session initialization is still running
    Initializing,
    /// Voice mode is switched off
    VoiceModeOff,
    /// `stop_recording` without an active recording
    NotRecording,
    /// Capture pipeline is not idle
    CaptureBusy,
    /// The report was switched after the recording started
    ReportChanged,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            RejectReason::Busy => "another message is still being sent",
            RejectReason::EmptyMessage => "message is empty",
            RejectReason::Initializing => "chat session is still initializing",
            RejectReason::VoiceModeOff => "voice mode is off",
            RejectReason::NotRecording => "no recording in progress",
            RejectReason::CaptureBusy => "voice capture is busy",
            RejectReason::ReportChanged => "the report changed while recording",
        };
        f.write_str(reason)
    }
}

/// Errors surfaced by the chat core
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("send rejected: {0}")]
    SendRejected(RejectReason),

    /// Lazy re-initialization on send did not produce a session
    #[error("chat session could not be initialized")]
    SessionUnavailable,

    /// The assistant no longer knows this session; reopen the report from the list
    #[error("chat session not found; reopen the report from your report list")]
    SessionNotFound,

    #[error("microphone unavailable: {0}")]
    MicrophonePermission(#[from] MicrophoneError),

    #[error("no audio was captured")]
    EmptyRecording,

    #[error("no report selected")]
    NoReport,

    #[error("invalid report identity: {0}")]
    InvalidReport(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error(transparent)]
    Remote(AssistantError),
}

impl ChatError {
    /// True for failures that close the conversation instead of allowing a retry
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::SessionNotFound)
    }
}

impl From<AssistantError> for ChatError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::SessionNotFound(_) => ChatError::SessionNotFound,
            other => ChatError::Remote(other),
        }
    }
}

impl From<PlaybackError> for ChatError {
    fn from(err: PlaybackError) -> Self {
        ChatError::Audio(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
