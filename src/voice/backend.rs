use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::VoiceConfig;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since recording started
    pub timestamp_ms: u64,
}

/// Configuration for microphone capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate
    pub sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Frame size in milliseconds
    pub frame_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,     // Speech recognition rate
            channels: 1,            // Mono
            frame_duration_ms: 100, // 100ms frames
        }
    }
}

impl From<&VoiceConfig> for CaptureConfig {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            frame_duration_ms: config.frame_duration_ms,
        }
    }
}

#[derive(Debug, Error)]
pub enum MicrophoneError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("microphone unavailable: {0}")]
    Unavailable(String),

    #[error("microphone is already capturing")]
    AlreadyCapturing,
}

/// Microphone capture backend
///
/// A started backend exclusively owns the device until `stop` is called.
/// Implementations:
/// - `WavFileMicrophone`: replays a WAV file as live input
/// - `UnavailableMicrophone`: hosts without an input device
#[async_trait]
pub trait MicrophoneBackend: Send + Sync {
    /// Acquire the device and start capturing
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(
        &mut self,
        config: &CaptureConfig,
    ) -> Result<mpsc::Receiver<AudioFrame>, MicrophoneError>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<(), MicrophoneError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Backend for hosts with no capture device; every start fails
#[derive(Debug, Default)]
pub struct UnavailableMicrophone;

#[async_trait]
impl MicrophoneBackend for UnavailableMicrophone {
    async fn start(
        &mut self,
        _config: &CaptureConfig,
    ) -> Result<mpsc::Receiver<AudioFrame>, MicrophoneError> {
        Err(MicrophoneError::Unavailable(
            "no input device configured".to_string(),
        ))
    }

    async fn stop(&mut self) -> Result<(), MicrophoneError> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
