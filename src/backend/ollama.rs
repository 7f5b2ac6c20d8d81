use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{decode, AssistantBackend, BackendError};
use crate::conversation::Message;

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;

        let models: OllamaModelsResponse = decode(response).await?;
        Ok(models.models.into_iter().map(|model| model.name).collect())
    }
}

#[async_trait]
impl AssistantBackend for OllamaClient {
    async fn exchange(&self, messages: &[Message]) -> Result<String, BackendError> {
        let url = format!("{}/api/chat", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                BackendError::Network(format!(
                    "{err}. Make sure Ollama is running with: ollama serve"
                ))
            })?;

        let body: OllamaResponse = decode(response).await?;
        Ok(body.message.content)
    }

    fn describe(&self) -> String {
        format!("Ollama: {}", self.model)
    }
}
