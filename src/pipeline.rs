//! Request orchestration
//!
//! Two linear pipelines, each a short chain of awaited provider calls:
//!
//! ```text
//! transcribe: Received → Normalizing → Uploading → Polling → Completed | Failed
//! chat:       Received → Completing → Synthesizing → Completed | Failed
//! ```
//!
//! Neither pipeline keeps state between requests. The transcribe pipeline
//! owns its temporary files through [`ScratchFiles`], so they are removed
//! on every exit path.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use serde::Serialize;

use crate::audio::{AudioNormalizer, ScratchFiles, UploadDir, extension_for};
use crate::chat::ChatCompleter;
use crate::persona::Persona;
use crate::voice::tts::SPEECH_MIME;
use crate::voice::{SpeechSynthesizer, Transcriber};
use crate::{Error, Result};

/// Raw audio as received from the client
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

/// Text recognized from an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptResult {
    pub text: String,
}

/// One stateless chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub message: String,
    pub persona: Persona,
}

/// Reply text plus playable audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub text: String,
    /// `data:` URI with base64-encoded speech
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Reply text plus the raw synthesized speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenReply {
    pub text: String,
    /// MP3 bytes; empty if the provider returned no audio
    pub audio: Vec<u8>,
}

impl From<SpokenReply> for ChatReply {
    fn from(reply: SpokenReply) -> Self {
        let audio = (!reply.audio.is_empty()).then(|| audio_data_uri(&reply.audio));
        Self {
            text: reply.text,
            audio,
        }
    }
}

/// Encode audio bytes as a `data:` URI the browser can play directly
#[must_use]
pub fn audio_data_uri(audio: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(audio);
    format!("data:{SPEECH_MIME};base64,{payload}")
}

/// Stages of the transcribe pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscribeState {
    Received,
    Normalizing,
    Uploading,
    Polling,
    Completed,
    Failed,
}

/// Stages of the chat pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Received,
    Completing,
    Synthesizing,
    Completed,
    Failed,
}

/// Logs each stage change for one request
struct Progress<S> {
    pipeline: &'static str,
    request_id: uuid::Uuid,
    state: S,
}

impl<S: Copy + fmt::Debug> Progress<S> {
    fn start(pipeline: &'static str, initial: S) -> Self {
        let request_id = uuid::Uuid::new_v4();
        tracing::debug!(pipeline, %request_id, state = ?initial, "request received");
        Self {
            pipeline,
            request_id,
            state: initial,
        }
    }

    fn enter(&mut self, next: S) {
        tracing::debug!(
            pipeline = self.pipeline,
            request_id = %self.request_id,
            from = ?self.state,
            to = ?next,
            "pipeline stage"
        );
        self.state = next;
    }

    fn fail(&mut self, failed: S, err: &Error) {
        tracing::error!(
            pipeline = self.pipeline,
            request_id = %self.request_id,
            stage = ?self.state,
            error = %err,
            "pipeline failed"
        );
        self.state = failed;
    }
}

/// Normalize → submit → poll
#[derive(Clone)]
pub struct TranscribePipeline {
    normalizer: Arc<dyn AudioNormalizer>,
    transcriber: Arc<dyn Transcriber>,
    uploads: UploadDir,
}

impl TranscribePipeline {
    /// Create a transcribe pipeline
    #[must_use]
    pub fn new(
        normalizer: Arc<dyn AudioNormalizer>,
        transcriber: Arc<dyn Transcriber>,
        uploads: UploadDir,
    ) -> Self {
        Self {
            normalizer,
            transcriber,
            uploads,
        }
    }

    /// Upload directory used for scratch files
    #[must_use]
    pub const fn uploads(&self) -> &UploadDir {
        &self.uploads
    }

    /// Transcribe one upload
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` for an empty upload, or the error of the
    /// first stage that failed
    pub async fn run(&self, upload: AudioUpload) -> Result<TranscriptResult> {
        let mut progress = Progress::start("transcribe", TranscribeState::Received);

        if upload.bytes.is_empty() {
            let err = Error::BadRequest("No audio file uploaded".to_string());
            progress.fail(TranscribeState::Failed, &err);
            return Err(err);
        }

        let mut scratch = self.uploads.scratch();
        let outcome = self.stages(&mut progress, &mut scratch, upload).await;
        drop(scratch);

        match outcome {
            Ok(text) => {
                progress.enter(TranscribeState::Completed);
                Ok(TranscriptResult { text })
            }
            Err(e) => {
                progress.fail(TranscribeState::Failed, &e);
                Err(e)
            }
        }
    }

    async fn stages(
        &self,
        progress: &mut Progress<TranscribeState>,
        scratch: &mut ScratchFiles,
        upload: AudioUpload,
    ) -> Result<String> {
        let source = scratch.reserve(&extension_for(
            upload.mime_type.as_deref(),
            upload.file_name.as_deref(),
        ));
        let normalized = scratch.reserve("wav");

        progress.enter(TranscribeState::Normalizing);
        tokio::fs::write(&source, &upload.bytes).await?;
        drop(upload);
        self.normalizer.normalize(&source, &normalized).await?;

        progress.enter(TranscribeState::Uploading);
        let audio = tokio::fs::read(&normalized).await?;
        let transcript_id = self.transcriber.submit(audio).await?;

        progress.enter(TranscribeState::Polling);
        self.transcriber.wait_for(&transcript_id).await
    }
}

/// Complete → synthesize
#[derive(Clone)]
pub struct ChatPipeline {
    chat: Arc<dyn ChatCompleter>,
    tts: Arc<dyn SpeechSynthesizer>,
}

impl ChatPipeline {
    /// Create a chat pipeline
    #[must_use]
    pub fn new(chat: Arc<dyn ChatCompleter>, tts: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { chat, tts }
    }

    /// Reply to one turn with text and a playable `data:` URI
    ///
    /// # Errors
    ///
    /// Same as [`ChatPipeline::speak`]
    pub async fn run(&self, turn: ChatTurn) -> Result<ChatReply> {
        self.speak(turn).await.map(ChatReply::from)
    }

    /// Reply to one turn with text and raw speech bytes
    ///
    /// Synthesis is skipped if the chat call fails. If synthesis fails the
    /// reply text is discarded and only the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` for an empty message,
    /// `Error::ChatProvider` or `Error::SynthesisProvider` from the
    /// stage that failed
    pub async fn speak(&self, turn: ChatTurn) -> Result<SpokenReply> {
        let mut progress = Progress::start("chat", ChatState::Received);

        if turn.message.trim().is_empty() {
            let err = Error::BadRequest("Message must not be empty".to_string());
            progress.fail(ChatState::Failed, &err);
            return Err(err);
        }

        match self.stages(&mut progress, &turn).await {
            Ok(reply) => {
                progress.enter(ChatState::Completed);
                Ok(reply)
            }
            Err(e) => {
                progress.fail(ChatState::Failed, &e);
                Err(e)
            }
        }
    }

    async fn stages(&self, progress: &mut Progress<ChatState>, turn: &ChatTurn) -> Result<SpokenReply> {
        progress.enter(ChatState::Completing);
        let text = self.chat.complete(&turn.message, turn.persona).await?;

        progress.enter(ChatState::Synthesizing);
        let audio = self.tts.synthesize(&text, turn.persona).await?;
        if audio.is_empty() {
            tracing::warn!(persona = %turn.persona, "synthesis returned no audio");
        }

        Ok(SpokenReply { text, audio })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::voice::{PollPolicy, TranscriptStatus};

    struct CopyNormalizer {
        fail: bool,
    }

    #[async_trait]
    impl AudioNormalizer for CopyNormalizer {
        async fn normalize(&self, source: &Path, dest: &Path) -> Result<()> {
            if self.fail {
                return Err(Error::Conversion("unrecognized input".to_string()));
            }
            tokio::fs::copy(source, dest).await?;
            Ok(())
        }
    }

    struct ScriptedTranscriber {
        statuses: Mutex<Vec<TranscriptStatus>>,
        submitted: Mutex<Vec<Vec<u8>>>,
        polls: AtomicUsize,
    }

    impl ScriptedTranscriber {
        fn new(mut statuses: Vec<TranscriptStatus>) -> Self {
            statuses.reverse();
            Self {
                statuses: Mutex::new(statuses),
                submitted: Mutex::new(Vec::new()),
                polls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        async fn submit(&self, audio: Vec<u8>) -> Result<String> {
            self.submitted.lock().unwrap().push(audio);
            Ok("job".to_string())
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
            PollPolicy {
                interval: std::time::Duration::from_millis(1),
                max_attempts: 4,
            }
        }
    }

    fn upload() -> AudioUpload {
        AudioUpload {
            bytes: b"webm-bytes".to_vec(),
            mime_type: Some("audio/webm".to_string()),
            file_name: Some("recording.webm".to_string()),
        }
    }

    fn leftover(dir: &UploadDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn transcribes_normalized_audio() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(dir.path()).unwrap();
        let transcriber = Arc::new(ScriptedTranscriber::new(vec![
            TranscriptStatus::Queued,
            TranscriptStatus::Completed { text: "hello".to_string() },
        ]));
        let pipeline = TranscribePipeline::new(
            Arc::new(CopyNormalizer { fail: false }),
            transcriber.clone(),
            uploads.clone(),
        );

        let result = pipeline.run(upload()).await.unwrap();

        assert_eq!(result.text, "hello");
        assert_eq!(transcriber.submitted.lock().unwrap()[0], b"webm-bytes");
        assert_eq!(transcriber.polls.load(Ordering::SeqCst), 2);
        assert_eq!(leftover(&uploads), 0);
    }

    #[tokio::test]
    async fn conversion_failure_skips_provider_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(dir.path()).unwrap();
        let transcriber = Arc::new(ScriptedTranscriber::new(vec![]));
        let pipeline = TranscribePipeline::new(
            Arc::new(CopyNormalizer { fail: true }),
            transcriber.clone(),
            uploads.clone(),
        );

        let err = pipeline.run(upload()).await.unwrap_err();

        assert!(matches!(err, Error::Conversion(_)));
        assert!(transcriber.submitted.lock().unwrap().is_empty());
        assert_eq!(leftover(&uploads), 0);
    }

    #[tokio::test]
    async fn poll_bound_yields_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(dir.path()).unwrap();
        let pipeline = TranscribePipeline::new(
            Arc::new(CopyNormalizer { fail: false }),
            Arc::new(ScriptedTranscriber::new(vec![])),
            uploads.clone(),
        );

        let err = pipeline.run(upload()).await.unwrap_err();

        assert!(matches!(err, Error::TranscriptionTimeout { attempts: 4 }));
        assert_eq!(leftover(&uploads), 0);
    }

    #[tokio::test]
    async fn empty_upload_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(dir.path()).unwrap();
        let transcriber = Arc::new(ScriptedTranscriber::new(vec![]));
        let pipeline = TranscribePipeline::new(
            Arc::new(CopyNormalizer { fail: false }),
            transcriber.clone(),
            uploads.clone(),
        );

        let err = pipeline
            .run(AudioUpload {
                bytes: Vec::new(),
                mime_type: None,
                file_name: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(transcriber.polls.load(Ordering::SeqCst), 0);
        assert_eq!(leftover(&uploads), 0);
    }

    /// Fails the submit, or blocks forever in `poll`
    struct StalledTranscriber {
        fail_submit: bool,
        polls: AtomicUsize,
    }

    #[async_trait]
    impl Transcriber for StalledTranscriber {
        async fn submit(&self, _audio: Vec<u8>) -> Result<String> {
            if self.fail_submit {
                return Err(Error::Transcription("net down".to_string()));
            }
            Ok("job".to_string())
        }

        async fn poll(&self, _id: &str) -> Result<TranscriptStatus> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        fn poll_policy(&self) -> PollPolicy {
            PollPolicy::default()
        }
    }

    #[tokio::test]
    async fn submit_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(dir.path()).unwrap();
        let pipeline = TranscribePipeline::new(
            Arc::new(CopyNormalizer { fail: false }),
            Arc::new(StalledTranscriber {
                fail_submit: true,
                polls: AtomicUsize::new(0),
            }),
            uploads.clone(),
        );

        let err = pipeline.run(upload()).await.unwrap_err();

        assert!(matches!(err, Error::Transcription(ref m) if m == "net down"));
        assert_eq!(leftover(&uploads), 0);
    }

    #[tokio::test]
    async fn cancelled_request_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(dir.path()).unwrap();
        let transcriber = Arc::new(StalledTranscriber {
            fail_submit: false,
            polls: AtomicUsize::new(0),
        });
        let pipeline = TranscribePipeline::new(
            Arc::new(CopyNormalizer { fail: false }),
            transcriber.clone(),
            uploads.clone(),
        );

        let outcome =
            tokio::time::timeout(std::time::Duration::from_millis(200), pipeline.run(upload())).await;

        assert!(outcome.is_err(), "request should still be polling");
        assert_eq!(transcriber.polls.load(Ordering::SeqCst), 1);
        assert_eq!(leftover(&uploads), 0);
    }

    struct FixedChat(Option<&'static str>);

    #[async_trait]
    impl ChatCompleter for FixedChat {
        async fn complete(&self, _message: &str, _persona: Persona) -> Result<String> {
            self.0
                .map(ToString::to_string)
                .ok_or_else(|| Error::ChatProvider("503".to_string()))
        }
    }

    struct FixedSpeech {
        audio: Option<Vec<u8>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for FixedSpeech {
        async fn synthesize(&self, _text: &str, _persona: Persona) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.audio
                .clone()
                .ok_or_else(|| Error::SynthesisProvider("500".to_string()))
        }
    }

    fn turn(message: &str) -> ChatTurn {
        ChatTurn {
            message: message.to_string(),
            persona: Persona::Roy,
        }
    }

    #[tokio::test]
    async fn chat_reply_carries_encoded_audio() {
        let wav = vec![0x52, 0x49, 0x46, 0x46, 0x24, 0x08, 0x00, 0x00];
        let pipeline = ChatPipeline::new(
            Arc::new(FixedChat(Some("I hear you"))),
            Arc::new(FixedSpeech {
                audio: Some(wav.clone()),
                calls: AtomicUsize::new(0),
            }),
        );

        let reply = pipeline.run(turn("rough day")).await.unwrap();

        assert_eq!(reply.text, "I hear you");
        let audio = reply.audio.unwrap();
        let payload = audio.strip_prefix("data:audio/mp3;base64,").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(decoded, wav);
    }

    #[tokio::test]
    async fn speak_returns_raw_audio() {
        let pipeline = ChatPipeline::new(
            Arc::new(FixedChat(Some("sure"))),
            Arc::new(FixedSpeech {
                audio: Some(vec![0xff, 0xfb, 0x90]),
                calls: AtomicUsize::new(0),
            }),
        );

        let reply = pipeline.speak(turn("hi")).await.unwrap();

        assert_eq!(reply.text, "sure");
        assert_eq!(reply.audio, vec![0xff, 0xfb, 0x90]);
    }

    #[tokio::test]
    async fn chat_failure_skips_synthesis() {
        let speech = Arc::new(FixedSpeech {
            audio: Some(vec![1]),
            calls: AtomicUsize::new(0),
        });
        let pipeline = ChatPipeline::new(Arc::new(FixedChat(None)), speech.clone());

        let err = pipeline.run(turn("hi")).await.unwrap_err();

        assert!(matches!(err, Error::ChatProvider(_)));
        assert_eq!(speech.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn synthesis_failure_is_distinct_from_chat_failure() {
        let pipeline = ChatPipeline::new(
            Arc::new(FixedChat(Some("I hear you"))),
            Arc::new(FixedSpeech {
                audio: None,
                calls: AtomicUsize::new(0),
            }),
        );

        let err = pipeline.run(turn("hi")).await.unwrap_err();

        assert!(matches!(err, Error::SynthesisProvider(_)));
    }

    #[tokio::test]
    async fn empty_audio_omits_data_uri() {
        let pipeline = ChatPipeline::new(
            Arc::new(FixedChat(Some("ok"))),
            Arc::new(FixedSpeech {
                audio: Some(Vec::new()),
                calls: AtomicUsize::new(0),
            }),
        );

        let reply = pipeline.run(turn("hi")).await.unwrap();

        assert_eq!(reply.audio, None);
        assert_eq!(serde_json::to_value(&reply).unwrap(), serde_json::json!({ "text": "ok" }));
    }

    #[tokio::test]
    async fn blank_message_is_bad_request() {
        let pipeline = ChatPipeline::new(
            Arc::new(FixedChat(Some("ok"))),
            Arc::new(FixedSpeech {
                audio: Some(vec![1]),
                calls: AtomicUsize::new(0),
            }),
        );

        assert!(matches!(pipeline.run(turn("   ")).await, Err(Error::BadRequest(_))));
    }
}
