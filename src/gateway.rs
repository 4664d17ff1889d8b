//! Gateway assembly: provider clients, pipelines, and the HTTP server

use std::sync::Arc;

use crate::Result;
use crate::api::{ApiServer, ApiServerBuilder};
use crate::audio::{FfmpegNormalizer, UploadDir};
use crate::chat::ChatClient;
use crate::config::Config;
use crate::pipeline::{ChatPipeline, TranscribePipeline};
use crate::voice::{SpeechToText, TextToSpeech};

/// Build the normalize → transcribe pipeline from configuration
///
/// # Errors
///
/// Returns error if the transcription key is missing or the upload
/// directory cannot be created
pub fn transcribe_pipeline(config: &Config) -> Result<TranscribePipeline> {
    let normalizer = FfmpegNormalizer::new(config.ffmpeg.clone());
    if !normalizer.is_available() {
        tracing::warn!(
            ffmpeg = %normalizer.program().display(),
            "ffmpeg not found; transcription requests will fail"
        );
    }

    let stt = SpeechToText::new(
        config.require_transcription_key()?,
        config.transcription.base_url.clone(),
    )?
    .with_poll_policy(config.transcription.poll)
    .with_retry_policy(config.retry.clone());

    let uploads = UploadDir::new(&config.server.upload_dir)?;

    tracing::debug!(
        stt_url = %config.transcription.base_url,
        uploads = %uploads.path().display(),
        poll_interval_ms = config.transcription.poll.interval.as_millis(),
        poll_max_attempts = config.transcription.poll.max_attempts,
        "transcribe pipeline configured"
    );

    Ok(TranscribePipeline::new(Arc::new(normalizer), Arc::new(stt), uploads))
}

/// Build the chat → synthesize pipeline from configuration
///
/// # Errors
///
/// Returns error if the `OpenAI` key is missing
pub fn chat_pipeline(config: &Config) -> Result<ChatPipeline> {
    let chat = ChatClient::new(
        config.require_openai_key()?,
        config.openai.base_url.clone(),
        config.openai.chat_model.clone(),
    )?
    .with_retry_policy(config.retry.clone());

    let tts = TextToSpeech::new_openai_with_model(
        config.require_openai_key()?,
        config.openai.base_url.clone(),
        config.openai.tts_model.clone(),
    )?
    .with_retry_policy(config.retry.clone());

    tracing::debug!(
        openai_url = %config.openai.base_url,
        chat_model = %config.openai.chat_model,
        tts_model = %config.openai.tts_model,
        "chat pipeline configured"
    );

    Ok(ChatPipeline::new(Arc::new(chat), Arc::new(tts)))
}

/// Wired-up gateway ready to serve
pub struct Gateway {
    transcribe: TranscribePipeline,
    chat: ChatPipeline,
    config: Config,
}

impl Gateway {
    /// Build both pipelines from configuration
    ///
    /// # Errors
    ///
    /// Returns error if an API key is missing or the upload directory
    /// cannot be created
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            transcribe: transcribe_pipeline(&config)?,
            chat: chat_pipeline(&config)?,
            config,
        })
    }

    /// Build the HTTP server for this gateway
    #[must_use]
    pub fn server(&self) -> ApiServer {
        ApiServerBuilder::new(
            self.transcribe.clone(),
            self.chat.clone(),
            self.config.server.port,
        )
        .static_dir(self.config.server.static_dir.clone())
        .max_upload_bytes(self.config.server.max_upload_bytes)
        .build()
    }

    /// Serve HTTP until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        self.server().run().await
    }
}
