//! Speech-to-text (STT) via a submit/poll transcription provider

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::retry::{RetryPolicy, send_with_retry};
use crate::{Error, Result};

/// Default provider base URL
pub const DEFAULT_STT_URL: &str = "https://api.assemblyai.com";

/// How often and how long to poll a transcript job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between poll requests
    pub interval: Duration,
    /// Poll requests made before giving up
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            max_attempts: 200,
        }
    }
}

/// Status of a transcript job as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptStatus {
    Queued,
    Processing,
    Completed { text: String },
    Error { message: String },
}

/// A provider that transcribes audio as a server-side job
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Upload audio and open a transcript job, returning its id
    ///
    /// # Errors
    ///
    /// Returns `Error::Transcription` on network or HTTP failure
    async fn submit(&self, audio: Vec<u8>) -> Result<String>;

    /// Fetch the current status of a transcript job
    ///
    /// # Errors
    ///
    /// Returns `Error::Transcription` on network or HTTP failure
    async fn poll(&self, transcript_id: &str) -> Result<TranscriptStatus>;

    /// Polling cadence and bound for [`Transcriber::wait_for`]
    fn poll_policy(&self) -> PollPolicy;

    /// Poll a job until it completes, fails, or the poll bound is reached
    ///
    /// The first poll is issued immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::TranscriptionProvider` if the job failed,
    /// `Error::TranscriptionTimeout` if it never reached a terminal status,
    /// or `Error::Transcription` if a poll request failed
    async fn wait_for(&self, transcript_id: &str) -> Result<String> {
        let policy = self.poll_policy();
        // At least one poll, even under a zero bound
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.poll(transcript_id).await? {
                TranscriptStatus::Completed { text } => {
                    tracing::info!(transcript_id, attempt, chars = text.len(), "transcription complete");
                    return Ok(text);
                }
                TranscriptStatus::Error { message } => {
                    tracing::error!(transcript_id, error = %message, "transcription job failed");
                    return Err(Error::TranscriptionProvider(message));
                }
                status => {
                    tracing::debug!(transcript_id, attempt, ?status, "transcript not ready");
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        tracing::error!(transcript_id, attempts = max_attempts, "transcription poll bound exceeded");
        Err(Error::TranscriptionTimeout {
            attempts: max_attempts,
        })
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Deserialize)]
struct TranscriptResponse {
    id: String,
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl TranscriptResponse {
    fn into_status(self) -> Result<TranscriptStatus> {
        match self.status.as_str() {
            "queued" => Ok(TranscriptStatus::Queued),
            "processing" => Ok(TranscriptStatus::Processing),
            "completed" => Ok(TranscriptStatus::Completed {
                text: self.text.unwrap_or_default(),
            }),
            "error" => Ok(TranscriptStatus::Error {
                message: self
                    .error
                    .unwrap_or_else(|| "provider reported an error".to_string()),
            }),
            other => Err(Error::Transcription(format!(
                "unexpected transcript status {other:?} for {}",
                self.id
            ))),
        }
    }
}

/// Transcribes speech through an AssemblyAI-compatible API
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    poll: PollPolicy,
    retry: RetryPolicy,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, base_url: impl Into<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "transcription API key required".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the polling cadence and bound
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Override the retry policy for transient failures
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, "transcription {what} failed");
        Err(Error::Transcription(format!("{what} returned {status}: {body}")))
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn submit(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "uploading audio for transcription");

        let upload_url = format!("{}/v2/upload", self.base_url);
        let response = send_with_retry(&self.retry, "stt upload", || {
            self.client
                .post(&upload_url)
                .header("authorization", self.api_key.expose_secret())
                .header("content-type", "application/octet-stream")
                .body(audio.clone())
                .send()
        })
        .await
        .map_err(|e| Error::Transcription(format!("upload request failed: {e}")))?;

        let uploaded: UploadResponse = Self::check(response, "upload")
            .await?
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("invalid upload response: {e}")))?;

        let transcript_url = format!("{}/v2/transcript", self.base_url);
        let body = serde_json::json!({ "audio_url": uploaded.upload_url });
        let response = send_with_retry(&self.retry, "stt submit", || {
            self.client
                .post(&transcript_url)
                .header("authorization", self.api_key.expose_secret())
                .json(&body)
                .send()
        })
        .await
        .map_err(|e| Error::Transcription(format!("submit request failed: {e}")))?;

        let job: TranscriptResponse = Self::check(response, "submit")
            .await?
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("invalid submit response: {e}")))?;

        tracing::info!(transcript_id = %job.id, status = %job.status, "transcript job submitted");
        Ok(job.id)
    }

    async fn poll(&self, transcript_id: &str) -> Result<TranscriptStatus> {
        let url = format!("{}/v2/transcript/{transcript_id}", self.base_url);
        let response = send_with_retry(&self.retry, "stt poll", || {
            self.client
                .get(&url)
                .header("authorization", self.api_key.expose_secret())
                .send()
        })
        .await
        .map_err(|e| Error::Transcription(format!("poll request failed: {e}")))?;

        let job: TranscriptResponse = Self::check(response, "poll")
            .await?
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("invalid poll response: {e}")))?;

        job.into_status()
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }
}
