//! Anthropic messages API client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Role, TokenUsage,
};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: SecretString, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        // The messages API takes the system prompt as a top-level field.
        let mut system = String::new();
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg.role {
                Role::System => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(&msg.content);
                }
                Role::User => messages.push(json!({"role": "user", "content": msg.content})),
                Role::Assistant => {
                    messages.push(json!({"role": "assistant", "content": msg.content}))
                }
            }
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(1024),
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::AuthFailed {
                provider: "anthropic".to_string(),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: "anthropic".to_string(),
                reason: e.to_string(),
            })?;

        let content = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: "anthropic".to_string(),
                reason: "response had no text content".to_string(),
            });
        }

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse { content, usage })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
