use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::RetryPolicy;
use crate::assistant::{AssistantClient, AssistantError, SessionGrant};
use crate::chat::{
    CallerIdentity, ConversationState, FailureKind, Language, Notice, ReportIdentity, Session,
    SessionState, SharedConversation, VoiceGender,
};
use crate::error::{ChatError, ChatResult, RejectReason};

const INIT_PENDING_NOTICE: &str =
    "Chat is initializing. Please wait a moment and try sending a message.";
const INIT_RETRYING_NOTICE: &str = "Initializing chat session...";
const INIT_FAILED_NOTICE: &str = "Failed to initialize chat. Please try again.";
const SESSION_LOST_NOTICE: &str =
    "This chat is no longer available. Please reopen the report from your report list.";

/// Result of [`SessionManager::begin_session`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A session was established and is now current
    Ready { session_id: String },
    /// The same report is already initializing or ready; nothing was sent
    AlreadyActive,
    /// Another report was opened while this one was initializing; the result was dropped
    Superseded,
    /// Every attempt failed; the next send retries once
    Failed { attempts: u32 },
}

/// A Ready session as seen by a sender: the generation to validate results against,
/// plus the preferences in force when the send started
#[derive(Debug, Clone)]
pub struct LiveSession {
    pub generation: u64,
    pub session_id: String,
    pub language: Language,
    pub voice_gender: VoiceGender,
}

impl LiveSession {
    fn of(state: &ConversationState, session: &Session) -> Self {
        Self {
            generation: state.generation,
            session_id: session.session_id.clone(),
            language: state.language,
            voice_gender: state.voice_gender,
        }
    }
}

/// A session created for a report the user had already left, kept for the
/// next open of the same report that was waiting on it
struct ParkedGrant {
    language: Language,
    grant: SessionGrant,
}

/// At most one create call per report identity runs at a time
type GrantSlot = Arc<Mutex<Option<ParkedGrant>>>;

/// Establishes and tracks the chat session for the current report
#[derive(Clone)]
pub struct SessionManager {
    client: Arc<dyn AssistantClient>,
    caller: CallerIdentity,
    policy: RetryPolicy,
    state: SharedConversation,
    slots: Arc<std::sync::Mutex<HashMap<ReportIdentity, GrantSlot>>>,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn AssistantClient>,
        caller: CallerIdentity,
        policy: RetryPolicy,
        state: SharedConversation,
    ) -> Self {
        Self {
            client,
            caller,
            policy,
            state,
            slots: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.state.lock().await.phase
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn client(&self) -> &Arc<dyn AssistantClient> {
        &self.client
    }

    /// Open the chat for `report`.
    ///
    /// No-op while the same report is initializing or ready. Opening a different
    /// report discards the previous session and any result still in flight for it.
    pub async fn begin_session(&self, report: ReportIdentity, language: Language) -> InitOutcome {
        let generation = {
            let mut state = self.state.lock().await;

            if state.is_active_for(&report) {
                debug!("Session for {} already {}", report, state.phase.as_str());
                return InitOutcome::AlreadyActive;
            }

            state.generation += 1;
            state.report = Some(report.clone());
            state.session = None;
            state.phase = SessionState::Initializing;
            state.language = language;
            state.notice = None;
            state.generation
        };

        info!(
            "Creating chat session for {} (generation {}, language {})",
            report,
            generation,
            language.code()
        );

        let attempts = self.policy.attempts();
        for attempt in 1..=attempts {
            if !self.is_current(generation).await {
                debug!("Dropping initialization of {} before attempt {}", report, attempt);
                return InitOutcome::Superseded;
            }

            match self.request_session(generation, &report, language).await {
                Ok(grant) if !grant.session_id.is_empty() => {
                    let mut state = self.state.lock().await;
                    if !state.is_current(generation) {
                        info!("Discarding session for {}: report changed", report);
                        return InitOutcome::Superseded;
                    }
                    let session_id = install(&mut state, report, language, grant);
                    return InitOutcome::Ready { session_id };
                }
                Ok(_) => warn!(
                    "Attempt {}/{}: assistant returned no session id for {}",
                    attempt, attempts, report
                ),
                Err(e) => warn!(
                    "Attempt {}/{} to create session for {} failed: {}",
                    attempt, attempts, report, e
                ),
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        let mut state = self.state.lock().await;
        if !state.is_current(generation) {
            return InitOutcome::Superseded;
        }

        warn!("Giving up on session for {} after {} attempts", report, attempts);
        state.phase = SessionState::Failed(FailureKind::Soft);
        state.notice = Some(Notice::soft(INIT_PENDING_NOTICE));

        InitOutcome::Failed { attempts }
    }

    /// Return the Ready session, making one more initialization attempt after a soft failure
    pub async fn ensure_ready(&self) -> ChatResult<LiveSession> {
        let (generation, report, language) = {
            let mut state = self.state.lock().await;

            match state.phase {
                SessionState::Ready => {
                    if let Some(session) = state.session.as_ref() {
                        return Ok(LiveSession::of(&state, session));
                    }
                }
                SessionState::Initializing => {
                    return Err(ChatError::SendRejected(RejectReason::Initializing));
                }
                SessionState::Failed(FailureKind::SessionLost) => {
                    return Err(ChatError::SessionNotFound);
                }
                SessionState::Uninitialized | SessionState::Failed(FailureKind::Soft) => {}
            }

            let Some(report) = state.report.clone() else {
                return Err(ChatError::NoReport);
            };

            state.phase = SessionState::Initializing;
            state.notice = Some(Notice::soft(INIT_RETRYING_NOTICE));
            (state.generation, report, state.language)
        };

        info!("Retrying session initialization for {} before send", report);

        let result = self.request_session(generation, &report, language).await;

        let mut state = self.state.lock().await;
        if !state.is_current(generation) {
            debug!("Report changed during lazy initialization of {}", report);
            return Err(ChatError::SessionUnavailable);
        }

        match result {
            Ok(grant) if !grant.session_id.is_empty() => {
                install(&mut state, report, language, grant);
                match state.session.as_ref() {
                    Some(session) => Ok(LiveSession::of(&state, session)),
                    None => Err(ChatError::SessionUnavailable),
                }
            }
            other => {
                match other {
                    Ok(_) => warn!("Lazy initialization for {} returned no session id", report),
                    Err(e) => warn!("Lazy initialization for {} failed: {}", report, e),
                }
                state.phase = SessionState::Failed(FailureKind::Soft);
                state.notice = Some(Notice::soft(INIT_FAILED_NOTICE));
                Err(ChatError::SessionUnavailable)
            }
        }
    }

    /// Close the session after the assistant reported it unknown. Stale generations are ignored.
    pub async fn mark_lost(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if !state.is_current(generation) {
            return;
        }

        let session_id = state
            .session
            .as_ref()
            .map(|s| s.session_id.clone())
            .unwrap_or_default();
        warn!("Chat session {} was rejected by the assistant; closing", session_id);

        state.phase = SessionState::Failed(FailureKind::SessionLost);
        state.notice = Some(Notice::hard(SESSION_LOST_NOTICE));
    }

    /// Create a session for `report` on behalf of `generation`.
    ///
    /// A call still outstanding for the same report is waited on rather than
    /// duplicated. If it completes after its own open was abandoned while
    /// another open of the report waits, the waiter takes over its session.
    async fn request_session(
        &self,
        generation: u64,
        report: &ReportIdentity,
        language: Language,
    ) -> Result<SessionGrant, AssistantError> {
        let slot = self.claim_slot(report);

        let result = {
            let mut parked = slot.lock().await;

            let result = match parked.take() {
                Some(p) if p.language == language => {
                    info!("Reusing session {} already created for {}", p.grant.session_id, report);
                    Ok(p.grant)
                }
                _ => self.client.create_session(report, language, &self.caller).await,
            };

            if let Ok(grant) = &result {
                let waiting = Arc::strong_count(&slot) > 2;
                if waiting && !grant.session_id.is_empty() && !self.is_current(generation).await {
                    debug!("Holding session {} for the next open of {}", grant.session_id, report);
                    *parked = Some(ParkedGrant {
                        language,
                        grant: grant.clone(),
                    });
                }
            }

            result
        };

        self.release_slot(report, slot);
        result
    }

    fn claim_slot(&self, report: &ReportIdentity) -> GrantSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(report.clone()).or_default().clone()
    }

    fn release_slot(&self, report: &ReportIdentity, slot: GrantSlot) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map and this caller hold it: nobody is waiting
        if Arc::strong_count(&slot) == 2 {
            slots.remove(report);
        }
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.state.lock().await.is_current(generation)
    }
}

fn install(
    state: &mut ConversationState,
    report: ReportIdentity,
    language: Language,
    grant: SessionGrant,
) -> String {
    info!(
        "Chat session {} ready for {} ({} messages of history)",
        grant.session_id,
        report,
        grant.messages.len()
    );

    let session_id = grant.session_id.clone();
    state.session = Some(Session {
        session_id: grant.session_id,
        report,
        language,
        messages: grant.messages,
    });
    state.phase = SessionState::Ready;
    state.notice = None;
    session_id
}
