use anyhow::{Context, Result};
use serde::Deserialize;

use crate::chat::{Language, VoiceGender};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub assistant: AssistantConfig,
    pub session: SessionConfig,
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "report-chat".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Base URL of the report service, e.g. `http://localhost:8080`
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Session initialization retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Attempts before giving up with a soft failure
    pub max_attempts: u32,
    /// Delay after attempt N is `backoff_base_ms * N`
    pub backoff_base_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration of each captured frame
    pub frame_duration_ms: u64,
    pub language: Language,
    pub voice_gender: VoiceGender,
    /// Where the CLI writes synthesized replies
    pub output_dir: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 100,
            language: Language::En,
            voice_gender: VoiceGender::Female,
            output_dir: "~/.report-chat/replies".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (any extension the config crate knows, optional) and
    /// `REPORT_CHAT__SECTION__KEY` environment overrides on top of the defaults
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("REPORT_CHAT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
