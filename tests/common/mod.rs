// Shared test doubles: a scripted assistant, a fake microphone and a fake speaker
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use base64::Engine;
use report_chat::{
    AssistantClient, AssistantError, AudioClip, AudioFrame, AudioOutput, CallerIdentity,
    CaptureConfig, ChatOptions, Language, MicrophoneBackend, MicrophoneError, PlaybackError,
    ReportChat, ReportIdentity, RetryPolicy, SessionGrant, VoiceGender, VoiceReply,
};
use tokio::sync::{mpsc, oneshot, Notify};

/// What a scripted call answers with
pub enum Outcome<T> {
    Reply(T),
    NotFound,
    Failure,
}

impl<T> Outcome<T> {
    fn into_result(self) -> Result<T, AssistantError> {
        match self {
            Outcome::Reply(value) => Ok(value),
            Outcome::NotFound => Err(AssistantError::SessionNotFound(
                "Chat session not found".to_string(),
            )),
            Outcome::Failure => Err(AssistantError::Status {
                status: 500,
                message: "Internal server error".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub session_id: String,
    pub text: String,
    pub language: Language,
}

#[derive(Debug, Clone)]
pub struct SentVoice {
    pub session_id: String,
    pub audio: String,
    pub language: Language,
    pub voice_gender: VoiceGender,
}

/// Assistant that answers from per-operation scripts, with defaults once a script runs dry:
/// sessions are `session-N`, text replies echo the question.
#[derive(Default)]
pub struct ScriptedAssistant {
    sessions: Mutex<VecDeque<Outcome<String>>>,
    replies: Mutex<VecDeque<Outcome<String>>>,
    voice_replies: Mutex<VecDeque<Outcome<VoiceReply>>>,
    session_gates: Mutex<HashMap<String, Arc<Notify>>>,
    reply_gate: Mutex<Option<Arc<Notify>>>,
    pub create_calls: AtomicUsize,
    pub message_calls: AtomicUsize,
    pub voice_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub sent: Mutex<Vec<SentMessage>>,
    pub sent_voice: Mutex<Vec<SentVoice>>,
}

impl ScriptedAssistant {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_sessions(&self, outcomes: impl IntoIterator<Item = Outcome<String>>) {
        self.sessions.lock().unwrap().extend(outcomes);
    }

    pub fn fail_sessions(&self, count: usize) {
        self.script_sessions((0..count).map(|_| Outcome::Failure));
    }

    pub fn script_replies(&self, outcomes: impl IntoIterator<Item = Outcome<String>>) {
        self.replies.lock().unwrap().extend(outcomes);
    }

    pub fn script_voice(&self, outcomes: impl IntoIterator<Item = Outcome<VoiceReply>>) {
        self.voice_replies.lock().unwrap().extend(outcomes);
    }

    /// Hold `create_session` for `report_name` until the returned handle is notified
    pub fn hold_session(&self, report_name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.session_gates
            .lock()
            .unwrap()
            .insert(report_name.to_string(), Arc::clone(&gate));
        gate
    }

    /// Hold every text and voice reply until the returned handle is notified (once per reply)
    pub fn hold_replies(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.reply_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn messages_sent(&self) -> usize {
        self.message_calls.load(Ordering::SeqCst)
    }

    pub fn voices_sent(&self) -> usize {
        self.voice_calls.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn wait_reply_gate(&self) {
        let gate = self.reply_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl AssistantClient for ScriptedAssistant {
    async fn create_session(
        &self,
        report: &ReportIdentity,
        _language: Language,
        _caller: &CallerIdentity,
    ) -> Result<SessionGrant, AssistantError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let gate = self.session_gates.lock().unwrap().get(&report.name).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let outcome = self
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Outcome::Reply(format!("session-{}", n)));

        outcome.into_result().map(|session_id| SessionGrant {
            session_id,
            messages: Vec::new(),
        })
    }

    async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        language: Language,
        _caller: &CallerIdentity,
    ) -> Result<String, AssistantError> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(SentMessage {
            session_id: session_id.to_string(),
            text: text.to_string(),
            language,
        });

        self.enter();
        self.wait_reply_gate().await;
        self.leave();

        let outcome = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Outcome::Reply(format!("echo: {}", text)));
        outcome.into_result()
    }

    async fn send_voice_message(
        &self,
        session_id: &str,
        audio_base64: &str,
        language: Language,
        voice_gender: VoiceGender,
        _caller: &CallerIdentity,
    ) -> Result<VoiceReply, AssistantError> {
        self.voice_calls.fetch_add(1, Ordering::SeqCst);
        self.sent_voice.lock().unwrap().push(SentVoice {
            session_id: session_id.to_string(),
            audio: audio_base64.to_string(),
            language,
            voice_gender,
        });

        self.enter();
        self.wait_reply_gate().await;
        self.leave();

        let outcome = self
            .voice_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Outcome::Reply(VoiceReply {
                    user_text: "what was said".to_string(),
                    response_text: "spoken answer".to_string(),
                    response_audio: None,
                })
            });
        outcome.into_result()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
pub struct MicStats {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub capturing: AtomicBool,
    pub deny: AtomicBool,
}

impl MicStats {
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Microphone that yields `frames` frames of 100ms of 16kHz mono audio per recording
pub struct MockMicrophone {
    pub stats: Arc<MicStats>,
    frames: usize,
    sender: Option<mpsc::Sender<AudioFrame>>,
}

impl MockMicrophone {
    pub fn new(frames: usize) -> (Self, Arc<MicStats>) {
        let stats = Arc::new(MicStats::default());
        (
            Self {
                stats: Arc::clone(&stats),
                frames,
                sender: None,
            },
            stats,
        )
    }
}

#[async_trait]
impl MicrophoneBackend for MockMicrophone {
    async fn start(
        &mut self,
        config: &CaptureConfig,
    ) -> Result<mpsc::Receiver<AudioFrame>, MicrophoneError> {
        if self.stats.deny.load(Ordering::SeqCst) {
            return Err(MicrophoneError::PermissionDenied);
        }
        if self.stats.is_capturing() {
            return Err(MicrophoneError::AlreadyCapturing);
        }

        let (tx, rx) = mpsc::channel(self.frames.max(1));
        let samples_per_frame =
            (config.sample_rate as u64 * config.frame_duration_ms / 1000) as usize;
        for i in 0..self.frames {
            let frame = AudioFrame {
                samples: vec![(i as i16) * 100; samples_per_frame],
                sample_rate: config.sample_rate,
                channels: config.channels,
                timestamp_ms: i as u64 * config.frame_duration_ms,
            };
            tx.try_send(frame)
                .map_err(|e| MicrophoneError::Unavailable(e.to_string()))?;
        }

        self.sender = Some(tx);
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        self.stats.capturing.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), MicrophoneError> {
        if self.stats.capturing.swap(false, Ordering::SeqCst) {
            self.stats.stops.fetch_add(1, Ordering::SeqCst);
        }
        self.sender = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.stats.is_capturing()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct Playing {
    clip: Arc<AudioClip>,
    done: oneshot::Sender<()>,
}

/// Speaker that plays until `finish` or `stop` is called and records what it saw
#[derive(Default)]
pub struct MockOutput {
    playing: Mutex<Option<Playing>>,
    pub plays: AtomicUsize,
    pub stops: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub clips: Mutex<Vec<Weak<AudioClip>>>,
    /// Sample count of each clip, in play order
    pub lengths: Mutex<Vec<usize>>,
}

impl MockOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let the current clip run to its end
    pub fn finish(&self) {
        if let Some(playing) = self.playing.lock().unwrap().take() {
            self.active.fetch_sub(1, Ordering::SeqCst);
            let _ = playing.done.send(());
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    /// Number of clips still alive anywhere
    pub fn live_clips(&self) -> usize {
        self.clips
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.strong_count() > 0)
            .count()
    }
}

#[async_trait]
impl AudioOutput for MockOutput {
    async fn play(&self, clip: Arc<AudioClip>) -> Result<oneshot::Receiver<()>, PlaybackError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.plays.fetch_add(1, Ordering::SeqCst);

        self.clips.lock().unwrap().push(Arc::downgrade(&clip));
        self.lengths.lock().unwrap().push(clip.samples.len());

        let (done, finished) = oneshot::channel();
        *self.playing.lock().unwrap() = Some(Playing { clip, done });
        Ok(finished)
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(playing) = self.playing.lock().unwrap().take() {
            self.active.fetch_sub(1, Ordering::SeqCst);
            drop(playing.clip);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock speaker"
    }
}

/// A mono 16kHz WAV of `samples` samples, base64 encoded
pub fn wav_base64(samples: usize) -> String {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..samples {
            writer.write_sample(((i % 100) as i16) * 50).unwrap();
        }
        writer.finalize().unwrap();
    }

    base64::engine::general_purpose::STANDARD.encode(cursor.into_inner())
}

pub fn report(name: &str) -> ReportIdentity {
    ReportIdentity::new(name, "CBC").unwrap()
}

pub fn caller() -> CallerIdentity {
    CallerIdentity::new("user-1", "token-abc")
}

pub fn options() -> ChatOptions {
    ChatOptions {
        retry: RetryPolicy::default(),
        ..ChatOptions::default()
    }
}

/// Yield to spawned tasks until `condition` holds
pub async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub struct Harness {
    pub chat: Arc<ReportChat>,
    pub assistant: Arc<ScriptedAssistant>,
    pub mic: Arc<MicStats>,
    pub output: Arc<MockOutput>,
}

/// A chat over the scripted assistant with a microphone yielding `frames` frames
pub fn harness(frames: usize) -> Harness {
    let assistant = ScriptedAssistant::new();
    let (microphone, mic) = MockMicrophone::new(frames);
    let output = MockOutput::new();

    let chat = ReportChat::new(
        assistant.clone(),
        caller(),
        Box::new(microphone),
        output.clone(),
        options(),
    );

    Harness {
        chat: Arc::new(chat),
        assistant,
        mic,
        output,
    }
}
