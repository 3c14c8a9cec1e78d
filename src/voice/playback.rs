use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio payload is not valid base64: {0}")]
    InvalidPayload(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("audio output failed: {0}")]
    Output(String),
}

impl From<SymphoniaError> for PlaybackError {
    fn from(err: SymphoniaError) -> Self {
        PlaybackError::Decode(err.to_string())
    }
}

/// Decoded, playable audio (16-bit PCM, interleaved)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    /// Decode a base64 payload (MP3, WAV, OGG, ...)
    pub fn from_base64(data: &str) -> Result<Self, PlaybackError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| PlaybackError::InvalidPayload(e.to_string()))?;
        Self::decode(bytes)
    }

    /// Decode a complete audio file held in memory
    pub fn decode(bytes: Vec<u8>) -> Result<Self, PlaybackError> {
        let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let probed = symphonia::default::get_probe().format(
            &Hint::new(),
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::Decode("no audio track".to_string()))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!("Skipping corrupt audio packet: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            channels = spec.channels.count() as u16;

            let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        if samples.is_empty() {
            return Err(PlaybackError::Decode("no audio samples".to_string()));
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        Duration::from_millis(frames * 1000 / self.sample_rate as u64)
    }
}

/// Audio output device
///
/// An output plays one clip at a time and must drop its reference to the
/// clip once playback ends or `stop` is called.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Start playing `clip`; the receiver resolves when playback ends
    async fn play(&self, clip: Arc<AudioClip>) -> Result<oneshot::Receiver<()>, PlaybackError>;

    /// Stop the current clip, if any
    async fn stop(&self) -> Result<(), PlaybackError>;

    /// Get output name for logging
    fn name(&self) -> &str;
}

struct ActivePlayback {
    id: u64,
    clip: Arc<AudioClip>,
    watcher: JoinHandle<()>,
}

/// Owns the single playback slot
///
/// Starting a clip stops and releases the one before it; a clip that finishes
/// on its own is released by its watcher.
pub struct Player {
    output: Arc<dyn AudioOutput>,
    current: Arc<Mutex<Option<ActivePlayback>>>,
    next_id: AtomicU64,
}

impl Player {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            current: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Play `clip`, replacing whatever is playing. Returns the playback id.
    pub async fn play(&self, clip: AudioClip) -> Result<u64, PlaybackError> {
        let clip = Arc::new(clip);
        let mut current = self.current.lock().await;

        if let Some(previous) = current.take() {
            self.release(previous).await;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let finished = self.output.play(Arc::clone(&clip)).await?;

        info!(
            "Playing reply {} ({:.1}s) on {}",
            id,
            clip.duration().as_secs_f64(),
            self.output.name()
        );

        let slot = Arc::clone(&self.current);
        let watcher = tokio::spawn(async move {
            let _ = finished.await;
            let mut current = slot.lock().await;
            if current.as_ref().is_some_and(|p| p.id == id) {
                current.take();
                debug!("Reply {} finished, buffer released", id);
            }
        });

        *current = Some(ActivePlayback { id, clip, watcher });

        Ok(id)
    }

    /// Stop playback and release the clip
    pub async fn stop(&self) {
        let previous = self.current.lock().await.take();
        if let Some(previous) = previous {
            self.release(previous).await;
        }
    }

    pub async fn is_playing(&self) -> bool {
        self.current.lock().await.is_some()
    }

    async fn release(&self, playback: ActivePlayback) {
        playback.watcher.abort();

        if let Err(e) = self.output.stop().await {
            warn!("Failed to stop reply {}: {}", playback.id, e);
        }

        debug!(
            "Reply {} stopped, released {} samples",
            playback.id,
            playback.clip.samples.len()
        );
    }
}

/// Output that writes each reply to `<dir>/reply-NNN.wav` and finishes immediately
pub struct WavDumpOutput {
    dir: PathBuf,
    written: AtomicUsize,
}

impl WavDumpOutput {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        info!("Replies will be written to {}", dir.display());

        Ok(Self {
            dir,
            written: AtomicUsize::new(0),
        })
    }

    fn write(&self, clip: &AudioClip) -> Result<PathBuf, PlaybackError> {
        let index = self.written.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("reply-{:03}.wav", index));

        let spec = hound::WavSpec {
            channels: clip.channels,
            sample_rate: clip.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&path, spec)
            .map_err(|e| PlaybackError::Output(format!("{}: {}", path.display(), e)))?;
        for &sample in &clip.samples {
            writer
                .write_sample(sample)
                .map_err(|e| PlaybackError::Output(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        Ok(path)
    }
}

#[async_trait]
impl AudioOutput for WavDumpOutput {
    async fn play(&self, clip: Arc<AudioClip>) -> Result<oneshot::Receiver<()>, PlaybackError> {
        let path = self.write(&clip)?;
        info!("Reply audio written to {}", path.display());

        let (done_tx, done_rx) = oneshot::channel();
        let _ = done_tx.send(());
        Ok(done_rx)
    }

    async fn stop(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "WAV dump"
    }
}
