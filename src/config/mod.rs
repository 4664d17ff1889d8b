//! Configuration management for the Banter gateway
//!
//! Precedence is env > TOML file > defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::chat::{DEFAULT_CHAT_MODEL, DEFAULT_OPENAI_URL};
use crate::retry::RetryPolicy;
use crate::voice::stt::DEFAULT_STT_URL;
use crate::voice::tts::DEFAULT_TTS_MODEL;
use crate::voice::PollPolicy;
use crate::{Error, Result};

use file::BanterConfigFile;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Default upper bound on an uploaded recording
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Banter gateway configuration
#[derive(Debug)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Transcription provider configuration
    pub transcription: TranscriptionConfig,

    /// Chat and speech provider configuration
    pub openai: OpenAiConfig,

    /// ffmpeg binary used for normalization
    pub ffmpeg: PathBuf,

    /// Retry policy for transient provider failures
    pub retry: RetryPolicy,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Scratch directory for uploaded and normalized audio
    pub upload_dir: PathBuf,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
}

/// Transcription provider configuration
#[derive(Debug)]
pub struct TranscriptionConfig {
    /// API key (from `ASSEMBLYAI_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Provider base URL
    pub base_url: String,

    /// Polling cadence and bound
    pub poll: PollPolicy,
}

/// `OpenAI` chat and TTS configuration
#[derive(Debug)]
pub struct OpenAiConfig {
    /// API key (from `OPENAI_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Provider base URL
    pub base_url: String,

    /// Chat completion model
    pub chat_model: String,

    /// Speech synthesis model
    pub tts_model: String,
}

/// Default upload scratch directory: `<tmp>/banter-uploads`
fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join("banter-uploads")
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a numeric setting cannot be parsed
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if a numeric setting cannot be parsed
    pub fn from_sources(fc: BanterConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server = ServerConfig {
            port: parse_env(&env, "BANTER_PORT")?
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            upload_dir: env("BANTER_UPLOAD_DIR")
                .or(fc.server.upload_dir)
                .map_or_else(default_upload_dir, PathBuf::from),
            static_dir: env("BANTER_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            max_upload_bytes: parse_env(&env, "BANTER_MAX_UPLOAD_BYTES")?
                .or(fc.server.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        let default_poll = PollPolicy::default();
        let transcription = TranscriptionConfig {
            api_key: env("ASSEMBLYAI_API_KEY")
                .or(fc.transcription.api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            base_url: env("BANTER_STT_URL")
                .or(fc.transcription.base_url)
                .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
            poll: PollPolicy {
                interval: parse_env(&env, "BANTER_POLL_INTERVAL_MS")?
                    .or(fc.transcription.poll_interval_ms)
                    .map_or(default_poll.interval, Duration::from_millis),
                max_attempts: parse_env(&env, "BANTER_POLL_MAX_ATTEMPTS")?
                    .or(fc.transcription.poll_max_attempts)
                    .unwrap_or(default_poll.max_attempts)
                    .max(1),
            },
        };

        let openai = OpenAiConfig {
            api_key: env("OPENAI_API_KEY")
                .or(fc.openai.api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            base_url: env("BANTER_OPENAI_URL")
                .or(fc.openai.base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            chat_model: env("BANTER_CHAT_MODEL")
                .or(fc.openai.chat_model)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            tts_model: env("BANTER_TTS_MODEL")
                .or(fc.openai.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
        };

        let ffmpeg = env("BANTER_FFMPEG")
            .or(fc.audio.ffmpeg)
            .map_or_else(|| PathBuf::from("ffmpeg"), PathBuf::from);

        let default_retry = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_env(&env, "BANTER_RETRY_MAX")?
                .or(fc.retry.max_retries)
                .unwrap_or(default_retry.max_retries),
            base_delay: fc
                .retry
                .base_delay_ms
                .map_or(default_retry.base_delay, Duration::from_millis),
            max_delay: default_retry.max_delay,
        };

        Ok(Self {
            server,
            transcription,
            openai,
            ffmpeg,
            retry,
        })
    }

    /// Transcription API key, required to serve
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no key is configured
    pub fn require_transcription_key(&self) -> Result<SecretString> {
        self.transcription
            .api_key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_string()))
            .ok_or_else(|| Error::Config("ASSEMBLYAI_API_KEY is not set".to_string()))
    }

    /// `OpenAI` API key, required to serve
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no key is configured
    pub fn require_openai_key(&self) -> Result<SecretString> {
        self.openai
            .api_key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_string()))
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))
    }
}

/// Read and parse a numeric env var, treating unset as `None`
fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    env(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key} has invalid value {v:?}")))
        })
        .transpose()
}
