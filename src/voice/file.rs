use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::WavReader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureConfig, MicrophoneBackend, MicrophoneError};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split into frames of `frame_duration_ms`, timestamped from zero
    pub fn frames(&self, frame_duration_ms: u64) -> Vec<AudioFrame> {
        let frame_ms = frame_duration_ms.max(1);
        let samples_per_frame =
            (self.sample_rate as u64 * self.channels as u64 * frame_ms / 1000).max(1) as usize;

        self.samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Microphone backend that replays a WAV file in real time
///
/// Frames keep the file's own sample rate and channel count.
pub struct WavFileMicrophone {
    path: PathBuf,
    feeder: Option<JoinHandle<()>>,
    capturing: bool,
}

impl WavFileMicrophone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            feeder: None,
            capturing: false,
        }
    }
}

#[async_trait]
impl MicrophoneBackend for WavFileMicrophone {
    async fn start(
        &mut self,
        config: &CaptureConfig,
    ) -> Result<mpsc::Receiver<AudioFrame>, MicrophoneError> {
        if self.capturing {
            return Err(MicrophoneError::AlreadyCapturing);
        }

        let audio = AudioFile::open(&self.path)
            .map_err(|e| MicrophoneError::Unavailable(format!("{:#}", e)))?;

        if audio.sample_rate != config.sample_rate || audio.channels != config.channels {
            warn!(
                "{} is {}Hz/{}ch, capture expects {}Hz/{}ch; sending as recorded",
                audio.path, audio.sample_rate, audio.channels, config.sample_rate, config.channels
            );
        }

        let frame_ms = config.frame_duration_ms.max(1);
        let frames = audio.frames(frame_ms);
        let (tx, rx) = mpsc::channel(100);

        info!("Replaying {} as microphone input ({} frames)", audio.path, frames.len());

        let feeder = tokio::spawn(async move {
            for frame in frames {
                if tx.send(frame).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(frame_ms)).await;
            }
        });

        self.feeder = Some(feeder);
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), MicrophoneError> {
        if !self.capturing {
            return Ok(());
        }

        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        self.capturing = false;

        info!("File microphone stopped: {}", self.path.display());

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}
