//! Banter Gateway - voice chatbot backend
//!
//! Records come in from the browser, get transcribed, answered by a
//! persona, and spoken back:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Browser                          │
//! └───────────────┬──────────────────────────┬───────────────┘
//!      POST /api/transcribe            POST /api/chat
//! ┌───────────────▼──────────────┐ ┌─────────▼───────────────┐
//! │ normalize (ffmpeg) → STT job │ │ chat completion → TTS   │
//! │ submit → poll                │ │ → base64 data URI       │
//! └──────────────────────────────┘ └─────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod persona;
pub mod pipeline;
pub mod retry;
pub mod voice;

pub use chat::{ChatClient, ChatCompleter};
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use persona::Persona;
pub use pipeline::{
    AudioUpload, ChatPipeline, ChatReply, ChatTurn, SpokenReply, TranscribePipeline, TranscriptResult,
};
pub use retry::RetryPolicy;
pub use voice::{PollPolicy, SpeechSynthesizer, SpeechToText, TextToSpeech, Transcriber, TranscriptStatus};
