use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::messages::{
    CreateSessionRequest, Envelope, ErrorBody, MessageReply, SendMessageRequest, SessionPayload,
    VoiceMessageRequest, VoiceReply,
};
use crate::chat::{CallerIdentity, Language, Message, ReportIdentity, VoiceGender};
use crate::config::AssistantConfig;

/// Failures reported by the assistant service
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The session is unknown to the service, usually because the report is still processing
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("assistant returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A session handed out by the assistant
#[derive(Debug, Clone)]
pub struct SessionGrant {
    /// Empty when the service could not allocate a session
    pub session_id: String,
    /// Existing conversation history for the session
    pub messages: Vec<Message>,
}

/// Remote assistant the chat core talks to
///
/// Implementations:
/// - `HttpAssistantClient`: the report service's JSON API
/// - scripted doubles in tests
#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Create (or look up) the chat session for a report
    async fn create_session(
        &self,
        report: &ReportIdentity,
        language: Language,
        caller: &CallerIdentity,
    ) -> Result<SessionGrant, AssistantError>;

    /// Send a text question and return the assistant's reply
    async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        language: Language,
        caller: &CallerIdentity,
    ) -> Result<String, AssistantError>;

    /// Send a base64 recording; the reply carries the transcript, answer and optional speech
    async fn send_voice_message(
        &self,
        session_id: &str,
        audio_base64: &str,
        language: Language,
        voice_gender: VoiceGender,
        caller: &CallerIdentity,
    ) -> Result<VoiceReply, AssistantError>;

    /// Client name for logging
    fn name(&self) -> &str;
}

/// HTTP client for the report service's chatbot endpoints
#[derive(Clone)]
pub struct HttpAssistantClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpAssistantClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AssistantError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        info!("Assistant client targeting {} (timeout {:?})", base_url, timeout);

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and unwrap the `data` field of the success envelope.
    ///
    /// With `session_scoped`, a 404 means the session (or its report) is gone.
    async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        caller: &CallerIdentity,
        session_scoped: bool,
    ) -> Result<T, AssistantError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.url(path))
            .bearer_auth(&caller.id_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        debug!("POST {} -> {} ({} bytes)", path, status, bytes.len());

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(ErrorBody::into_text)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                });

            if session_scoped && status == StatusCode::NOT_FOUND {
                return Err(AssistantError::SessionNotFound(message));
            }

            return Err(AssistantError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| AssistantError::InvalidResponse(e.to_string()))?;

        if !envelope.success {
            warn!("POST {} succeeded without success flag", path);
        }

        envelope.data.ok_or_else(|| {
            AssistantError::InvalidResponse(
                envelope
                    .message
                    .unwrap_or_else(|| "response has no data".to_string()),
            )
        })
    }
}

#[async_trait]
impl AssistantClient for HttpAssistantClient {
    async fn create_session(
        &self,
        report: &ReportIdentity,
        language: Language,
        caller: &CallerIdentity,
    ) -> Result<SessionGrant, AssistantError> {
        let request = CreateSessionRequest {
            report_name: report.name.clone(),
            report_type: report.report_type.clone(),
            language,
        };

        let payload: SessionPayload = self
            .post("/chatbot/session", &request, caller, false)
            .await?;

        Ok(SessionGrant {
            session_id: payload.session_id,
            messages: payload
                .messages
                .into_iter()
                .map(|m| m.into_message())
                .collect(),
        })
    }

    async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        language: Language,
        caller: &CallerIdentity,
    ) -> Result<String, AssistantError> {
        let request = SendMessageRequest {
            session_id: session_id.to_string(),
            message: text.to_string(),
            language,
        };

        let reply: MessageReply = self
            .post("/chatbot/message", &request, caller, true)
            .await?;

        Ok(reply.response)
    }

    async fn send_voice_message(
        &self,
        session_id: &str,
        audio_base64: &str,
        language: Language,
        voice_gender: VoiceGender,
        caller: &CallerIdentity,
    ) -> Result<VoiceReply, AssistantError> {
        let request = VoiceMessageRequest {
            session_id: session_id.to_string(),
            audio: audio_base64.to_string(),
            language,
            gender: voice_gender,
        };

        self.post("/voice-chatbot/voice-message", &request, caller, true)
            .await
    }

    fn name(&self) -> &str {
        "HTTP assistant"
    }
}
