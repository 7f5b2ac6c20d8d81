use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{decode, AssistantBackend, BackendError};
use crate::conversation::Message;

#[derive(Serialize)]
struct RelayRequest<'a> {
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct RelayResponse {
    reply: String,
}

/// Client for the chat relay endpoint: `POST {base}/chat` with
/// `{"messages": [...]}`, answered by `{"reply": "..."}`.
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat", self.base_url)
    }
}

#[async_trait]
impl AssistantBackend for RelayClient {
    async fn exchange(&self, messages: &[Message]) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&RelayRequest { messages })
            .send()
            .await?;

        let body: RelayResponse = decode(response).await?;
        Ok(body.reply)
    }

    fn describe(&self) -> String {
        format!("Relay: {}", self.base_url)
    }
}
