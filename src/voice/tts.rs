//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::persona::Persona;
use crate::retry::{RetryPolicy, send_with_retry};
use crate::{Error, Result};

/// Default TTS model
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// MIME type of synthesized audio
pub const SPEECH_MIME: &str = "audio/mp3";

/// Turns reply text into speech in a persona's voice
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::SynthesisProvider` if synthesis fails
    async fn synthesize(&self, text: &str, persona: Persona) -> Result<Vec<u8>>;
}

/// Synthesizes speech through an OpenAI-compatible `/v1/audio/speech` API
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: SecretString, base_url: impl Into<String>) -> Result<Self> {
        Self::new_openai_with_model(api_key, base_url, DEFAULT_TTS_MODEL.to_string())
    }

    /// Create a new TTS instance using `OpenAI` with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai_with_model(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy for transient failures
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, persona: Persona) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: persona.voice(),
            speed: persona.speed(),
        };

        tracing::debug!(%persona, chars = text.len(), "synthesizing speech");

        let url = format!("{}/v1/audio/speech", self.base_url);
        let response = send_with_retry(&self.retry, "tts", || {
            self.client
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&request)
                .send()
        })
        .await
        .map_err(|e| Error::SynthesisProvider(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SynthesisProvider(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::SynthesisProvider(format!("failed to read audio: {e}")))?;
        Ok(audio.to_vec())
    }
}
