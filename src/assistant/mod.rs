pub mod client;
pub mod messages;

pub use client::{AssistantClient, AssistantError, HttpAssistantClient, SessionGrant};
pub use messages::VoiceReply;
