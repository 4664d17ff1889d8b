//! Audio normalization via an external `ffmpeg` process

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{Error, Result};

/// Sample rate expected by the transcription provider
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Channel count of normalized audio
pub const TARGET_CHANNELS: u16 = 1;

/// Bit depth of normalized audio
pub const TARGET_BITS_PER_SAMPLE: u16 = 16;

/// Converts arbitrary input audio into mono 16 kHz 16-bit PCM WAV
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    /// Write a normalized copy of `source` to `dest`
    ///
    /// Writes exactly one file at `dest`; the caller owns its removal.
    ///
    /// # Errors
    ///
    /// Returns `Error::Conversion` if the source cannot be read or converted
    async fn normalize(&self, source: &Path, dest: &Path) -> Result<()>;
}

/// Normalizer backed by the `ffmpeg` command-line tool
#[derive(Debug, Clone)]
pub struct FfmpegNormalizer {
    program: PathBuf,
}

impl Default for FfmpegNormalizer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegNormalizer {
    /// Create a normalizer that runs the given `ffmpeg` binary
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Path or name of the `ffmpeg` binary
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Whether the configured binary can be found
    #[must_use]
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    async fn normalize(&self, source: &Path, dest: &Path) -> Result<()> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(Error::Conversion(format!(
                "source audio not found: {}",
                source.display()
            )));
        }

        tracing::debug!(
            source = %source.display(),
            dest = %dest.display(),
            "normalizing audio"
        );

        let sample_rate = TARGET_SAMPLE_RATE.to_string();
        let channels = TARGET_CHANNELS.to_string();

        let output = tokio::process::Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(source)
            .args(["-ac", &channels, "-ar", &sample_rate, "-acodec", "pcm_s16le", "-f", "wav"])
            .arg(dest)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::Conversion(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(
                code = ?output.status.code(),
                stderr = %stderr.trim(),
                "ffmpeg conversion failed"
            );
            return Err(Error::Conversion(format!(
                "ffmpeg exited with code {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || verify_normalized(&dest))
            .await
            .map_err(|e| Error::Conversion(format!("verification task failed: {e}")))?
    }
}

/// Check that a WAV file is mono 16 kHz 16-bit integer PCM
///
/// # Errors
///
/// Returns `Error::Conversion` if the file is not a readable WAV or its
/// header does not match the target format
pub fn verify_normalized(path: &Path) -> Result<()> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| Error::Conversion(format!("unreadable normalized audio: {e}")))?;
    let spec = reader.spec();

    if spec.channels != TARGET_CHANNELS
        || spec.sample_rate != TARGET_SAMPLE_RATE
        || spec.bits_per_sample != TARGET_BITS_PER_SAMPLE
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(Error::Conversion(format!(
            "unexpected output format: {} ch, {} Hz, {}-bit {:?}",
            spec.channels, spec.sample_rate, spec.bits_per_sample, spec.sample_format
        )));
    }

    Ok(())
}
