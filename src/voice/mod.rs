pub mod backend;
pub mod encoder;
pub mod file;
pub mod pipeline;
pub mod playback;

pub use backend::{AudioFrame, CaptureConfig, MicrophoneBackend, MicrophoneError, UnavailableMicrophone};
pub use encoder::{encode_wav, EncodedRecording};
pub use file::{AudioFile, WavFileMicrophone};
pub use pipeline::{CapturePhase, VoiceExchange, VoicePipeline};
pub use playback::{AudioClip, AudioOutput, PlaybackError, Player, WavDumpOutput};
