//! Single-turn chat completion
//!
//! Every call sends exactly two messages: the persona's system prompt and
//! the user's transcript. Nothing is remembered between calls.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::persona::Persona;
use crate::retry::{RetryPolicy, send_with_retry};
use crate::{Error, Result};

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default `OpenAI` API base URL
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Produces a reply to a single user message
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Reply to `message` in the voice of `persona`
    ///
    /// # Errors
    ///
    /// Returns `Error::ChatProvider` if the provider call fails
    async fn complete(&self, message: &str, persona: Persona) -> Result<String>;
}

/// A chat message on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Build the system + user exchange for one turn
#[must_use]
pub fn build_messages(message: &str, persona: Persona) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system".to_string(),
            content: persona.system_prompt().to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: message.to_string(),
        },
    ]
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat client for an OpenAI-compatible `/v1/chat/completions` API
pub struct ChatClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, base_url: impl Into<String>, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for chat".to_string()));
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
impl ChatCompleter for ChatClient {
    async fn complete(&self, message: &str, persona: Persona) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: build_messages(message, persona),
        };

        tracing::debug!(%persona, model = %self.model, "requesting chat completion");

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = send_with_retry(&self.retry, "chat", || {
            self.client
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&request)
                .send()
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "chat request failed");
            Error::ChatProvider(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::ChatProvider(format!("chat API error {status}: {body}")));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::ChatProvider(format!("invalid chat response: {e}")))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::ChatProvider("chat response had no content".to_string()))?;

        tracing::info!(%persona, chars = reply.len(), "chat reply received");
        Ok(reply)
    }
}
