//! Shared test utilities

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use banter_gateway::api::ApiServerBuilder;
use banter_gateway::audio::{AudioNormalizer, UploadDir};
use banter_gateway::{
    ChatCompleter, ChatPipeline, Error, Persona, PollPolicy, Result, SpeechSynthesizer,
    TranscribePipeline, Transcriber, TranscriptStatus,
};

/// Normalizer that copies the source, or fails on demand
#[derive(Default)]
pub struct CopyNormalizer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioNormalizer for CopyNormalizer {
    async fn normalize(&self, source: &Path, dest: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Conversion("unrecognized input".to_string()));
        }
        tokio::fs::copy(source, dest).await?;
        Ok(())
    }
}

/// Transcriber that replays a fixed list of statuses
pub struct ScriptedTranscriber {
    statuses: Mutex<Vec<TranscriptStatus>>,
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    poll: PollPolicy,
}

impl ScriptedTranscriber {
    pub fn new(mut statuses: Vec<TranscriptStatus>) -> Self {
        statuses.reverse();
        Self {
            statuses: Mutex::new(statuses),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            poll: PollPolicy {
                interval: Duration::from_millis(2),
                max_attempts: 5,
            },
        }
    }

    pub fn completing(text: &str) -> Self {
        Self::new(vec![TranscriptStatus::Completed {
            text: text.to_string(),
        }])
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn submit(&self, _audio: Vec<u8>) -> Result<String> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok("job-1".to_string())
    }

    async fn poll(&self, _id: &str) -> Result<TranscriptStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(TranscriptStatus::Processing))
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }
}

/// Stage at which [`FailingTranscriber`] errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Submit,
    Poll,
}

/// Transcriber whose network calls fail at a chosen stage
pub struct FailingTranscriber {
    pub fail_at: FailAt,
    pub polls: AtomicUsize,
}

impl FailingTranscriber {
    pub fn new(fail_at: FailAt) -> Self {
        Self {
            fail_at,
            polls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for FailingTranscriber {
    async fn submit(&self, _audio: Vec<u8>) -> Result<String> {
        match self.fail_at {
            FailAt::Submit => Err(Error::Transcription("connection reset".to_string())),
            FailAt::Poll => Ok("job-1".to_string()),
        }
    }

    async fn poll(&self, _id: &str) -> Result<TranscriptStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Transcription("connection reset".to_string()))
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(2),
            max_attempts: 5,
        }
    }
}

/// Chat provider that records what it was asked
#[derive(Default)]
pub struct RecordingChat {
    pub reply: Option<String>,
    pub seen: Mutex<Vec<(String, Persona)>>,
}

impl RecordingChat {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatCompleter for RecordingChat {
    async fn complete(&self, message: &str, persona: Persona) -> Result<String> {
        self.seen
            .lock()
            .unwrap()
            .push((message.to_string(), persona));
        self.reply
            .clone()
            .ok_or_else(|| Error::ChatProvider("upstream 500".to_string()))
    }
}

/// Synthesizer returning fixed bytes, or failing when none are set
#[derive(Default)]
pub struct FixedSpeech {
    pub audio: Option<Vec<u8>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for FixedSpeech {
    async fn synthesize(&self, _text: &str, _persona: Persona) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.audio
            .clone()
            .ok_or_else(|| Error::SynthesisProvider("upstream 500".to_string()))
    }
}

/// Router wired to fakes, plus handles to inspect them
pub struct TestApp {
    pub router: axum::Router,
    pub uploads: UploadDir,
    pub normalizer: Arc<CopyNormalizer>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub chat: Arc<RecordingChat>,
    pub speech: Arc<FixedSpeech>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new(
        normalizer: CopyNormalizer,
        transcriber: ScriptedTranscriber,
        chat: RecordingChat,
        speech: FixedSpeech,
    ) -> Self {
        let transcriber = Arc::new(transcriber);
        Self::with_transcriber(normalizer, transcriber.clone(), transcriber, chat, speech)
    }

    /// Build around any transcriber, keeping a scripted one for inspection
    pub fn with_transcriber(
        normalizer: CopyNormalizer,
        transcriber: Arc<dyn Transcriber>,
        scripted: Arc<ScriptedTranscriber>,
        chat: RecordingChat,
        speech: FixedSpeech,
    ) -> Self {
        Self::build(normalizer, transcriber, scripted, chat, speech, None)
    }

    /// Default fakes behind a small request body limit
    pub fn with_upload_limit(max_upload_bytes: usize) -> Self {
        Self::build(
            CopyNormalizer::default(),
            Arc::new(ScriptedTranscriber::completing("hello")),
            Arc::new(ScriptedTranscriber::completing("hello")),
            RecordingChat::default(),
            FixedSpeech::default(),
            Some(max_upload_bytes),
        )
    }

    fn build(
        normalizer: CopyNormalizer,
        transcriber: Arc<dyn Transcriber>,
        scripted: Arc<ScriptedTranscriber>,
        chat: RecordingChat,
        speech: FixedSpeech,
        max_upload_bytes: Option<usize>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let uploads = UploadDir::new(dir.path().join("uploads")).expect("failed to create uploads");

        let normalizer = Arc::new(normalizer);
        let chat = Arc::new(chat);
        let speech = Arc::new(speech);

        let mut builder = ApiServerBuilder::new(
            TranscribePipeline::new(normalizer.clone(), transcriber, uploads.clone()),
            ChatPipeline::new(chat.clone(), speech.clone()),
            0,
        );
        if let Some(limit) = max_upload_bytes {
            builder = builder.max_upload_bytes(limit);
        }
        let router = builder.build().router();

        Self {
            router,
            uploads,
            normalizer,
            transcriber: scripted,
            chat,
            speech,
            _dir: dir,
        }
    }

    /// Number of entries left in the upload directory
    pub fn leftover_uploads(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .expect("uploads dir should exist")
            .count()
    }
}

pub const BOUNDARY: &str = "banter-test-boundary";

/// A single multipart field
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

/// Encode fields as a `multipart/form-data` body
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{file_name}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Multipart body with an `audio` recording and a `bot` field
pub fn recording_body(audio: &[u8]) -> Vec<u8> {
    multipart_body(&[
        Part {
            name: "audio",
            file_name: Some("recording.webm"),
            content_type: Some("audio/webm"),
            data: audio,
        },
        Part {
            name: "bot",
            file_name: None,
            content_type: None,
            data: b"roy",
        },
    ])
}
