//! Voice chat endpoints: transcription and spoken replies

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::Error;
use crate::persona::Persona;
use crate::pipeline::{AudioUpload, ChatReply, ChatTurn, TranscriptResult};

/// Message returned when the upload is missing
pub const NO_AUDIO_MESSAGE: &str = "No audio file uploaded";

/// Message returned when the upload exceeds the body limit
pub const TOO_LARGE_MESSAGE: &str = "Audio upload is too large";

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/chat", post(chat))
        .with_state(state)
}

/// Transcribe an uploaded recording
///
/// Expects multipart form data with an `audio` file field. The `bot` field
/// is accepted for compatibility and only logged.
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscriptResult>, VoiceError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!(error = %e, "transcribe request is not multipart");
        VoiceError::BadRequest(NO_AUDIO_MESSAGE.to_string())
    })?;

    let mut upload = None;
    let mut bot = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VoiceError::from_multipart(&e, "malformed multipart body"))?
    {
        match field.name() {
            Some("audio") => {
                let mime_type = field.content_type().map(ToString::to_string);
                let file_name = field.file_name().map(ToString::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| VoiceError::from_multipart(&e, "failed to read audio field"))?;
                upload = Some(AudioUpload {
                    bytes: bytes.to_vec(),
                    mime_type,
                    file_name,
                });
            }
            Some("bot") => match field.text().await {
                Ok(text) => bot = Some(text),
                Err(e) => tracing::warn!(error = %e, "failed to read bot field"),
            },
            _ => {}
        }
    }

    let upload = upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or_else(|| VoiceError::BadRequest(NO_AUDIO_MESSAGE.to_string()))?;

    tracing::info!(
        audio_bytes = upload.bytes.len(),
        mime_type = ?upload.mime_type,
        bot = ?bot,
        "transcription requested"
    );

    let result = state
        .transcribe
        .run(upload)
        .await
        .map_err(VoiceError::from_transcribe)?;

    Ok(Json(result))
}

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub persona: Option<String>,
}

/// Reply to a transcript with text and synthesized speech
async fn chat(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, VoiceError> {
    let Json(request) = body.map_err(|e| VoiceError::BadRequest(e.body_text()))?;

    let persona = Persona::resolve(request.persona.as_deref()).map_err(VoiceError::from_chat)?;

    let reply = state
        .chat
        .run(ChatTurn {
            message: request.message,
            persona,
        })
        .await
        .map_err(VoiceError::from_chat)?;

    Ok(Json(reply))
}

/// Voice API errors
#[derive(Debug, PartialEq, Eq)]
pub enum VoiceError {
    BadRequest(String),
    PayloadTooLarge,
    InvalidPersona(String),
    TranscriptionFailed,
    TranscriptionTimedOut,
    ChatFailed,
    SynthesisFailed,
}

impl VoiceError {
    /// Map a multipart read error, keeping body-limit hits distinct
    fn from_multipart(err: &MultipartError, context: &'static str) -> Self {
        tracing::warn!(error = %err, status = %err.status(), "{context}");
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(NO_AUDIO_MESSAGE.to_string())
        }
    }

    /// Map a transcribe pipeline error to its response
    #[must_use]
    pub fn from_transcribe(err: Error) -> Self {
        match err {
            Error::BadRequest(msg) => Self::BadRequest(msg),
            Error::TranscriptionTimeout { .. } => Self::TranscriptionTimedOut,
            other => {
                tracing::error!(error = %other, "transcription failed");
                Self::TranscriptionFailed
            }
        }
    }

    /// Map a chat pipeline error to its response
    #[must_use]
    pub fn from_chat(err: Error) -> Self {
        match err {
            Error::BadRequest(msg) => Self::BadRequest(msg),
            Error::InvalidPersona(p) => Self::InvalidPersona(p),
            Error::SynthesisProvider(e) => {
                tracing::error!(error = %e, "speech synthesis failed");
                Self::SynthesisFailed
            }
            other => {
                tracing::error!(error = %other, "chat completion failed");
                Self::ChatFailed
            }
        }
    }

    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, TOO_LARGE_MESSAGE.to_string()),
            Self::InvalidPersona(p) => (StatusCode::BAD_REQUEST, format!("Unknown persona: {p}")),
            Self::TranscriptionFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to transcribe audio".to_string(),
            ),
            Self::TranscriptionTimedOut => (
                StatusCode::GATEWAY_TIMEOUT,
                "Transcription timed out".to_string(),
            ),
            Self::ChatFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate a reply".to_string(),
            ),
            Self::SynthesisFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to synthesize speech".to_string(),
            ),
        }
    }
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let (status, error) = self.status_and_message();
        (status, Json(ErrorResponse { error })).into_response()
    }
}
