use std::io::Cursor;

use anyhow::{bail, Context, Result};
use base64::Engine;

use super::backend::AudioFrame;

/// A finished recording packaged as one WAV blob
#[derive(Debug, Clone)]
pub struct EncodedRecording {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_count: usize,
}

impl EncodedRecording {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        self.sample_count as u64 * 1000 / (self.sample_rate as u64 * self.channels as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.wav)
    }
}

/// Write captured frames into a single 16-bit PCM WAV file in memory
///
/// All frames must share the first frame's sample rate and channel count.
pub fn encode_wav(frames: &[AudioFrame]) -> Result<EncodedRecording> {
    let Some(first) = frames.first() else {
        return Ok(EncodedRecording {
            wav: Vec::new(),
            sample_rate: 0,
            channels: 0,
            sample_count: 0,
        });
    };

    let spec = hound::WavSpec {
        channels: first.channels,
        sample_rate: first.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut sample_count = 0;
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to start WAV encoder")?;

        for frame in frames {
            if frame.sample_rate != spec.sample_rate || frame.channels != spec.channels {
                bail!(
                    "Frame at {}ms is {}Hz/{}ch, recording is {}Hz/{}ch",
                    frame.timestamp_ms,
                    frame.sample_rate,
                    frame.channels,
                    spec.sample_rate,
                    spec.channels
                );
            }
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            sample_count += frame.samples.len();
        }

        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(EncodedRecording {
        wav: cursor.into_inner(),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        sample_count,
    })
}
