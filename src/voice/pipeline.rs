use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, CaptureConfig, MicrophoneBackend};
use super::encoder::encode_wav;
use super::playback::{AudioClip, AudioOutput, Player};
use crate::chat::{Message, SharedConversation};
use crate::error::{ChatError, ChatResult, RejectReason};
use crate::exchange::MessageExchange;

/// Where the voice pipeline is in handling one spoken message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Recording,
    Encoding,
    AwaitingResponse,
    PlayingResponse,
}

impl CapturePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapturePhase::Idle => "idle",
            CapturePhase::Recording => "recording",
            CapturePhase::Encoding => "encoding",
            CapturePhase::AwaitingResponse => "awaiting response",
            CapturePhase::PlayingResponse => "playing response",
        }
    }
}

/// Outcome of a completed voice exchange
#[derive(Debug, Clone)]
pub struct VoiceExchange {
    /// What the assistant transcribed
    pub transcript: Message,
    pub reply: Message,
    /// Whether synthesized speech started playing
    pub playing: bool,
}

struct ActiveRecording {
    /// Conversation generation the recording belongs to
    generation: u64,
    frames: mpsc::Receiver<AudioFrame>,
    started_at: Instant,
}

struct CaptureState {
    phase: CapturePhase,
    voice_mode: bool,
    recording: Option<ActiveRecording>,
}

/// Microphone → WAV → assistant → speech playback
///
/// The microphone is released on every path out of `Recording`, before any
/// encoding or network work, and before the phase returns to `Idle`.
pub struct VoicePipeline {
    exchange: MessageExchange,
    state: SharedConversation,
    microphone: Mutex<Box<dyn MicrophoneBackend>>,
    player: Player,
    capture: Mutex<CaptureState>,
    config: CaptureConfig,
}

impl VoicePipeline {
    pub fn new(
        exchange: MessageExchange,
        state: SharedConversation,
        microphone: Box<dyn MicrophoneBackend>,
        output: Arc<dyn AudioOutput>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            exchange,
            state,
            microphone: Mutex::new(microphone),
            player: Player::new(output),
            capture: Mutex::new(CaptureState {
                phase: CapturePhase::Idle,
                voice_mode: false,
                recording: None,
            }),
            config,
        }
    }

    pub async fn phase(&self) -> CapturePhase {
        let phase = self.capture.lock().await.phase;
        if phase == CapturePhase::Idle && self.player.is_playing().await {
            CapturePhase::PlayingResponse
        } else {
            phase
        }
    }

    pub async fn voice_mode(&self) -> bool {
        self.capture.lock().await.voice_mode
    }

    /// Switch voice mode. Turning it off cancels a recording in progress and stops playback.
    pub async fn set_voice_mode(&self, enabled: bool) {
        let mut capture = self.capture.lock().await;
        if capture.voice_mode == enabled {
            return;
        }

        info!("Voice mode {}", if enabled { "on" } else { "off" });
        capture.voice_mode = enabled;

        if !enabled {
            self.abort_recording(&mut capture).await;
            drop(capture);
            self.player.stop().await;
        }
    }

    /// Acquire the microphone and begin capturing
    pub async fn start_recording(&self) -> ChatResult<()> {
        let mut capture = self.capture.lock().await;

        if !capture.voice_mode {
            return Err(ChatError::SendRejected(RejectReason::VoiceModeOff));
        }
        if capture.phase != CapturePhase::Idle {
            return Err(ChatError::SendRejected(RejectReason::CaptureBusy));
        }
        if self.exchange.is_busy() {
            return Err(ChatError::SendRejected(RejectReason::Busy));
        }

        self.player.stop().await;

        let generation = self.state.lock().await.generation;
        let mut microphone = self.microphone.lock().await;
        match microphone.start(&self.config).await {
            Ok(frames) => {
                info!("Recording started on {}", microphone.name());
                capture.phase = CapturePhase::Recording;
                capture.recording = Some(ActiveRecording {
                    generation,
                    frames,
                    started_at: Instant::now(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Could not acquire {}: {}", microphone.name(), e);
                capture.phase = CapturePhase::Idle;
                Err(ChatError::MicrophonePermission(e))
            }
        }
    }

    /// Discard the current recording and release the microphone
    pub async fn cancel_recording(&self) {
        let mut capture = self.capture.lock().await;
        self.abort_recording(&mut capture).await;
    }

    /// Finish the recording and send it to the assistant
    pub async fn stop_recording(&self) -> ChatResult<VoiceExchange> {
        let recording = {
            let mut capture = self.capture.lock().await;
            if capture.phase != CapturePhase::Recording {
                return Err(ChatError::SendRejected(RejectReason::NotRecording));
            }
            capture.phase = CapturePhase::Encoding;
            capture.recording.take()
        };

        self.release_microphone().await;

        let result = match recording {
            Some(recording) => self.transmit(recording).await,
            None => Err(ChatError::EmptyRecording),
        };

        self.capture.lock().await.phase = CapturePhase::Idle;
        result
    }

    async fn transmit(&self, recording: ActiveRecording) -> ChatResult<VoiceExchange> {
        let ActiveRecording {
            generation,
            mut frames,
            started_at,
        } = recording;

        frames.close();
        if !self.state.lock().await.is_current(generation) {
            warn!("Discarding recording: report changed while recording");
            return Err(ChatError::SendRejected(RejectReason::ReportChanged));
        }

        let mut captured = Vec::new();
        while let Some(frame) = frames.recv().await {
            captured.push(frame);
        }

        let encoded = encode_wav(&captured).map_err(|e| ChatError::Audio(format!("{:#}", e)))?;
        if encoded.is_empty() {
            warn!("Recording produced no audio");
            return Err(ChatError::EmptyRecording);
        }

        info!(
            "Encoded voice message: {}ms of audio, {} bytes, recorded for {:.1}s",
            encoded.duration_ms(),
            encoded.wav.len(),
            started_at.elapsed().as_secs_f64()
        );
        let audio = encoded.to_base64();

        let _token = match self.exchange.acquire() {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    "Discarding {}ms voice message: another message is in flight",
                    encoded.duration_ms()
                );
                return Err(e);
            }
        };
        let live = self.exchange.sessions().ensure_ready().await?;
        if live.generation != generation {
            warn!("Discarding voice message: report changed before it was sent");
            return Err(ChatError::SendRejected(RejectReason::ReportChanged));
        }

        self.capture.lock().await.phase = CapturePhase::AwaitingResponse;

        let result = self
            .exchange
            .sessions()
            .client()
            .send_voice_message(
                &live.session_id,
                &audio,
                live.language,
                live.voice_gender,
                self.exchange.sessions().caller(),
            )
            .await;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => return Err(self.exchange.fail(live.generation, None, e).await),
        };

        let transcript = Message::user(reply.user_text).voice();
        let answer = Message::assistant(reply.response_text).voice();

        let applied = {
            let mut state = self.state.lock().await;
            state.push_message(live.generation, transcript.clone())
                && state.push_message(live.generation, answer.clone())
        };

        if !applied {
            debug!("Dropping voice reply for session {}: report changed", live.session_id);
        }

        let mut playing = false;
        if let Some(audio) = reply.response_audio.filter(|a| !a.trim().is_empty()) {
            if applied && self.voice_mode().await {
                playing = self.play_reply(&audio).await;
            }
        }

        Ok(VoiceExchange {
            transcript,
            reply: answer,
            playing,
        })
    }

    async fn play_reply(&self, audio_base64: &str) -> bool {
        let clip = match AudioClip::from_base64(audio_base64) {
            Ok(clip) => clip,
            Err(e) => {
                warn!("Reply audio could not be decoded: {}", e);
                return false;
            }
        };

        match self.player.play(clip).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Reply audio could not be played: {}", e);
                false
            }
        }
    }

    async fn abort_recording(&self, capture: &mut CaptureState) {
        if capture.phase != CapturePhase::Recording {
            return;
        }

        let discarded = capture.recording.take();
        self.release_microphone().await;
        drop(discarded);

        capture.phase = CapturePhase::Idle;
        info!("Recording cancelled");
    }

    async fn release_microphone(&self) {
        let mut microphone = self.microphone.lock().await;
        match microphone.stop().await {
            Ok(()) => info!("Microphone released ({})", microphone.name()),
            Err(e) => warn!("Microphone {} did not stop cleanly: {}", microphone.name(), e),
        }
    }
}
