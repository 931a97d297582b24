use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{NarrativeProvider, ProviderError};
use crate::narrative::context::NarrativeContext;
use crate::narrative::prompt::NarrativePrompt;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub base_url: String,
    pub connect_timeout: Duration,
}

impl AnthropicSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 900,
            temperature: 0.3,
            base_url: API_BASE.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Messages API client. Overall request deadlines are owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    settings: AnthropicSettings,
}

impl AnthropicProvider {
    pub fn new(settings: AnthropicSettings) -> Result<Self, ProviderError> {
        if settings.api_key.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "ANTHROPIC_API_KEY is not set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ProviderError::Configuration(err.to_string()))?;

        Ok(Self { client, settings })
    }

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.settings.api_key)
                .map_err(|_| ProviderError::Configuration("API key is not a valid header".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }
}

#[async_trait]
impl NarrativeProvider for AnthropicProvider {
    async fn generate(
        &self,
        prompt: &NarrativePrompt,
        _context: &NarrativeContext,
    ) -> Result<String, ProviderError> {
        let user_message = prompt.user_message();
        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: &prompt.system_instructions,
            messages: vec![ApiMessage {
                role: "user",
                content: &user_message,
            }],
        };

        debug!(model = %self.settings.model, "requesting narrative from Anthropic");
        let response = self
            .client
            .post(format!("{}/messages", self.settings.base_url))
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Parse(err.to_string()))?;

        let text = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(text.to_string())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_is_a_configuration_error() {
        let error = AnthropicProvider::new(AnthropicSettings::new("  ")).expect_err("blank key");
        assert!(matches!(error, ProviderError::Configuration(_)));
    }

    #[test]
    fn request_serializes_messages_shape() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-5",
            max_tokens: 900,
            temperature: 0.3,
            system: "sys",
            messages: vec![ApiMessage {
                role: "user",
                content: "hello",
            }],
        };
        let json = serde_json::to_value(&request).expect("serializes");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["system"], "sys");
        assert_eq!(json["max_tokens"], 900);
    }

    #[test]
    fn response_ignores_non_text_blocks() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"tool_use","id":"x"},{"type":"text","text":"Summary"}]}"#,
        )
        .expect("parses");
        let texts: Vec<_> = body.content.into_iter().filter_map(|b| b.text).collect();
        assert_eq!(texts, vec!["Summary".to_string()]);
    }
}
