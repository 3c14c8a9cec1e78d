pub mod assistant;
pub mod chat;
pub mod config;
pub mod controller;
pub mod error;
pub mod exchange;
pub mod session;
pub mod voice;

pub use assistant::{AssistantClient, AssistantError, HttpAssistantClient, SessionGrant, VoiceReply};
pub use chat::{
    CallerIdentity, FailureKind, Language, Message, Notice, NoticeSeverity, ReportIdentity, Role,
    SessionState, VoiceGender,
};
pub use config::Config;
pub use controller::{ChatOptions, ReportChat};
pub use error::{ChatError, ChatResult, RejectReason};
pub use session::{InitOutcome, RetryPolicy};
pub use voice::{
    AudioClip, AudioFrame, AudioOutput, CaptureConfig, CapturePhase, MicrophoneBackend,
    MicrophoneError, PlaybackError, VoiceExchange, WavDumpOutput, WavFileMicrophone,
};
