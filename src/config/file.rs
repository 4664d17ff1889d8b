//! TOML configuration file loading
//!
//! Supports `~/.config/banter/config.toml` as a persistent config source.
//! All fields are optional: the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct BanterConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Transcription provider configuration
    #[serde(default)]
    pub transcription: TranscriptionFileConfig,

    /// Chat and speech provider configuration
    #[serde(default)]
    pub openai: OpenAiFileConfig,

    /// Audio normalization configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Retry configuration for provider calls
    #[serde(default)]
    pub retry: RetryFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub upload_dir: Option<String>,
    pub static_dir: Option<String>,
    pub max_upload_bytes: Option<usize>,
}

/// Transcription provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct TranscriptionFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub poll_max_attempts: Option<u32>,
}

/// `OpenAI` chat/TTS configuration
#[derive(Debug, Default, Deserialize)]
pub struct OpenAiFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_model: Option<String>,
    pub tts_model: Option<String>,
}

/// Audio normalization configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg: Option<String>,
}

/// Retry configuration
#[derive(Debug, Default, Deserialize)]
pub struct RetryFileConfig {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

/// Parse a config file from TOML text
///
/// # Errors
///
/// Returns error if the text is not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<BanterConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from `path`
///
/// Returns `BanterConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_from(path: &Path) -> BanterConfigFile {
    if !path.exists() {
        return BanterConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                BanterConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            BanterConfigFile::default()
        }
    }
}

/// Load the TOML config file from the standard path
pub fn load_config_file() -> BanterConfigFile {
    config_file_path().map_or_else(BanterConfigFile::default, |p| load_config_file_from(&p))
}

/// Return the config file path: `~/.config/banter/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("banter").join("config.toml"))
}
