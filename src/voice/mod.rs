//! Voice processing module
//!
//! Speech-to-text and text-to-speech provider clients.

pub mod stt;
pub mod tts;

pub use stt::{PollPolicy, SpeechToText, Transcriber, TranscriptStatus};
pub use tts::{SpeechSynthesizer, TextToSpeech};
