use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use super::gate::{ExchangeGate, ExchangeToken};
use crate::assistant::AssistantError;
use crate::chat::{Message, Notice, NoticeSeverity, SharedConversation};
use crate::error::{ChatError, ChatResult, RejectReason};
use crate::session::SessionManager;

const SEND_FAILED_NOTICE: &str = "Failed to send message. Please try again.";

/// Serializes text exchanges with the assistant and keeps the message log consistent
#[derive(Clone)]
pub struct MessageExchange {
    sessions: SessionManager,
    state: SharedConversation,
    gate: Arc<ExchangeGate>,
}

impl MessageExchange {
    pub fn new(sessions: SessionManager, state: SharedConversation, gate: Arc<ExchangeGate>) -> Self {
        Self {
            sessions,
            state,
            gate,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Take the exchange token shared by text and voice sends
    pub(crate) fn acquire(&self) -> ChatResult<ExchangeToken> {
        self.gate
            .try_acquire()
            .ok_or(ChatError::SendRejected(RejectReason::Busy))
    }

    /// Send `text` to the assistant.
    ///
    /// The user message is appended before the request goes out and removed again
    /// if it fails. Returns the assistant's reply.
    pub async fn send_text(&self, text: &str) -> ChatResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::SendRejected(RejectReason::EmptyMessage));
        }

        let _token = self.acquire()?;
        let live = self.sessions.ensure_ready().await?;

        let optimistic = Message::user(text);
        let optimistic_id = optimistic.id;
        {
            let mut state = self.state.lock().await;
            if !state.push_message(live.generation, optimistic) {
                return Err(ChatError::SessionUnavailable);
            }
            clear_soft_notice(&mut state.notice);
        }

        info!(
            "Sending message on session {} ({} chars, {})",
            live.session_id,
            text.len(),
            live.language.code()
        );

        let result = self
            .sessions
            .client()
            .send_message(
                &live.session_id,
                text,
                live.language,
                self.sessions.caller(),
            )
            .await;

        match result {
            Ok(response) => {
                let reply = Message::assistant(response);
                let mut state = self.state.lock().await;
                if !state.push_message(live.generation, reply.clone()) {
                    debug!("Dropping reply for session {}: report changed", live.session_id);
                }
                Ok(reply)
            }
            Err(e) => Err(self.fail(live.generation, Some(optimistic_id), e).await),
        }
    }

    /// Settle a failed exchange: retract its optimistic entry, then close the
    /// session or raise a soft notice depending on the failure.
    pub(crate) async fn fail(
        &self,
        generation: u64,
        optimistic: Option<Uuid>,
        err: AssistantError,
    ) -> ChatError {
        error!("Exchange failed: {}", err);

        let err = ChatError::from(err);
        {
            let mut state = self.state.lock().await;
            if let Some(id) = optimistic {
                state.retract_message(generation, id);
            }
            if state.is_current(generation) && !err.is_fatal() {
                state.notice = Some(Notice::soft(SEND_FAILED_NOTICE));
            }
        }

        if err.is_fatal() {
            self.sessions.mark_lost(generation).await;
        }

        err
    }
}

fn clear_soft_notice(notice: &mut Option<Notice>) {
    if matches!(notice, Some(n) if n.severity == NoticeSeverity::Soft) {
        *notice = None;
    }
}
