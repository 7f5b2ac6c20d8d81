//! Assistant backends: one request of role-tagged messages in, one reply out.

pub mod claude;
pub mod ollama;
pub mod openai;
pub mod relay;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::Config;
use crate::conversation::Message;
use crate::provider::Provider;

pub use claude::ClaudeClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use relay::RelayClient;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("could not reach the assistant: {0}")]
    Network(String),
    #[error("assistant returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not read the assistant reply: {0}")]
    Parse(String),
    #[error("{0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Sends the ordered message list and returns the assistant's reply text.
    async fn exchange(&self, messages: &[Message]) -> Result<String, BackendError>;

    /// Short label for the UI, e.g. `"OpenAI: gpt-4"`.
    fn describe(&self) -> String;
}

/// Builds the backend selected in `config`.
pub fn connect(config: &Config) -> Arc<dyn AssistantBackend> {
    let model = config.model();
    match config.provider() {
        Provider::Relay => Arc::new(RelayClient::new(&config.api_url())),
        Provider::Ollama => Arc::new(OllamaClient::new(&config.ollama_url(), &model)),
        Provider::Claude => Arc::new(ClaudeClient::new(config.claude_api_key().as_deref(), &model)),
        Provider::OpenAI => Arc::new(OpenAIClient::new(config.openai_api_key().as_deref(), &model)),
    }
}

/// Reads a JSON body, turning non-2xx statuses into [`BackendError::Status`].
pub(crate) async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            body: error_message(&text),
        });
    }

    Ok(serde_json::from_str(&text)?)
}

/// Pulls the human-readable part out of an error body.
///
/// Understands `{"error": "..."}` and `{"error": {"message": "..."}}`; anything
/// else is returned as-is.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    match value.get("error") {
        Some(serde_json::Value::String(message)) => message.clone(),
        Some(err) => err
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
        None => body.trim().to_string(),
    }
}
