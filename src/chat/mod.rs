//! Conversation data model shared by the session, exchange and voice components

mod state;
mod types;

pub use state::{
    shared, ConversationState, FailureKind, Notice, NoticeSeverity, SessionState,
    SharedConversation,
};
pub use types::{
    CallerIdentity, Language, Message, ReportIdentity, Role, Session, VoiceGender,
};
