//! The chat surface handed to the presentation layer
//!
//! `ReportChat` wires the session manager, message exchange and voice
//! pipeline over one shared conversation state. Every operation is safe to
//! call in any state: calls the current state forbids are rejected, never queued.

use std::sync::Arc;

use tracing::info;

use crate::assistant::AssistantClient;
use crate::chat::{
    self, CallerIdentity, Language, Message, Notice, NoticeSeverity, ReportIdentity,
    SessionState, SharedConversation, VoiceGender,
};
use crate::config::Config;
use crate::error::ChatResult;
use crate::exchange::{ExchangeGate, MessageExchange};
use crate::session::{InitOutcome, RetryPolicy, SessionManager};
use crate::voice::{AudioOutput, CaptureConfig, CapturePhase, MicrophoneBackend, VoiceExchange, VoicePipeline};

/// Tunables for a [`ReportChat`]
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub retry: RetryPolicy,
    pub capture: CaptureConfig,
    pub language: Language,
    pub voice_gender: VoiceGender,
}

impl From<&Config> for ChatOptions {
    fn from(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from(&config.session),
            capture: CaptureConfig::from(&config.voice),
            language: config.voice.language,
            voice_gender: config.voice.voice_gender,
        }
    }
}

pub struct ReportChat {
    state: SharedConversation,
    sessions: SessionManager,
    exchange: MessageExchange,
    voice: VoicePipeline,
}

impl ReportChat {
    pub fn new(
        client: Arc<dyn AssistantClient>,
        caller: CallerIdentity,
        microphone: Box<dyn MicrophoneBackend>,
        output: Arc<dyn AudioOutput>,
        options: ChatOptions,
    ) -> Self {
        info!(
            "Report chat using {} (user {}, {} attempts)",
            client.name(),
            caller.user_id,
            options.retry.attempts()
        );

        let state = chat::shared(options.language, options.voice_gender);
        let sessions = SessionManager::new(client, caller, options.retry, Arc::clone(&state));
        let exchange = MessageExchange::new(sessions.clone(), Arc::clone(&state), ExchangeGate::new());
        let voice = VoicePipeline::new(
            exchange.clone(),
            Arc::clone(&state),
            microphone,
            output,
            options.capture,
        );

        Self {
            state,
            sessions,
            exchange,
            voice,
        }
    }

    /// Open the chat for a report using the current language preference
    /// Open the chat for `report`. Switching to another report abandons any
    /// recording in progress so it can never be sent on the new session.
    pub async fn open_report(&self, report: ReportIdentity) -> InitOutcome {
        let (language, switching) = {
            let state = self.state.lock().await;
            (state.language, !state.is_active_for(&report))
        };

        if switching {
            self.voice.cancel_recording().await;
        }
        self.sessions.begin_session(report, language).await
    }

    pub async fn session_state(&self) -> SessionState {
        self.sessions.state().await
    }

    pub async fn session_id(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.session.as_ref().map(|s| s.session_id.clone())
    }

    pub async fn report(&self) -> Option<ReportIdentity> {
        self.state.lock().await.report.clone()
    }

    /// Snapshot of the conversation log, oldest first
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages().to_vec()
    }

    pub async fn notice(&self) -> Option<Notice> {
        self.state.lock().await.notice.clone()
    }

    /// Dismiss a soft notice. Hard notices stay until the report is reopened.
    pub async fn dismiss_notice(&self) {
        let mut state = self.state.lock().await;
        if matches!(&state.notice, Some(n) if n.severity == NoticeSeverity::Soft) {
            state.notice = None;
        }
    }

    pub async fn send_text(&self, text: &str) -> ChatResult<Message> {
        self.exchange.send_text(text).await
    }

    /// True while a text or voice exchange is in flight
    pub fn is_busy(&self) -> bool {
        self.exchange.is_busy()
    }

    pub async fn start_recording(&self) -> ChatResult<()> {
        self.voice.start_recording().await
    }

    pub async fn stop_recording(&self) -> ChatResult<VoiceExchange> {
        self.voice.stop_recording().await
    }

    pub async fn cancel_recording(&self) {
        self.voice.cancel_recording().await
    }

    pub async fn capture_phase(&self) -> CapturePhase {
        self.voice.phase().await
    }

    pub async fn voice_mode(&self) -> bool {
        self.voice.voice_mode().await
    }

    pub async fn set_voice_mode(&self, enabled: bool) {
        self.voice.set_voice_mode(enabled).await
    }

    pub async fn language(&self) -> Language {
        self.state.lock().await.language
    }

    /// Language for subsequent sends; the open session is kept
    /// Language the current session was opened with, if one is open
    pub async fn session_language(&self) -> Option<Language> {
        self.state.lock().await.session.as_ref().map(|s| s.language)
    }

    pub async fn set_language(&self, language: Language) {
        let mut state = self.state.lock().await;
        if state.language != language {
            match state.session.as_ref() {
                Some(session) => info!(
                    "Language set to {} (session opened in {})",
                    language.display_name(),
                    session.language.display_name()
                ),
                None => info!("Language set to {}", language.display_name()),
            }
            state.language = language;
        }
    }

    pub async fn voice_gender(&self) -> VoiceGender {
        self.state.lock().await.voice_gender
    }

    pub async fn set_voice_gender(&self, voice_gender: VoiceGender) {
        self.state.lock().await.voice_gender = voice_gender;
    }
}
