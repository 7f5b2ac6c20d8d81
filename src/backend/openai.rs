use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{decode, AssistantBackend, BackendError};
use crate::conversation::Message;

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

impl OpenAIResponse {
    fn into_reply(self) -> Result<String, BackendError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::Parse("response contained no choices".to_string()))
    }
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.map(str::to_string),
            model: model.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gpt-4".to_string(),
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4-turbo".to_string(),
        ]
    }

    fn request<'a>(&'a self, messages: &'a [Message]) -> OpenAIRequest<'a> {
        OpenAIRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl AssistantBackend for OpenAIClient {
    async fn exchange(&self, messages: &[Message]) -> Result<String, BackendError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            BackendError::NotConfigured("OpenAI API key not configured (set OPENAI_API_KEY)".to_string())
        })?;

        let response = self
            .client
            .post(ENDPOINT)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&self.request(messages))
            .send()
            .await?;

        let body: OpenAIResponse = decode(response).await?;
        body.into_reply()
    }

    fn describe(&self) -> String {
        format!("OpenAI: {}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_keeps_roles_and_order() {
        let client = OpenAIClient::new(Some("sk-test"), "gpt-4");
        let messages = vec![Message::system("primer"), Message::user("quote")];
        let json = serde_json::to_value(client.request(&messages)).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "quote");
    }

    #[test]
    fn test_reply_from_first_choice() {
        let body: OpenAIResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "4"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.into_reply().unwrap(), "4");
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let body: OpenAIResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(body.into_reply(), Err(BackendError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let client = OpenAIClient::new(None, "gpt-4");
        let err = client.exchange(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured(_)));
    }
}
