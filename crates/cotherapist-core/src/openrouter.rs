//! OpenRouter generation backend (OpenAI-compatible chat completions).
//!
//! API key: `OPENROUTER_API_KEY`. Default model: `meta-llama/llama-3.3-70b-instruct`.

use crate::clients::{GenerationClient, GenerationParams};
use crate::error::{Service, ServiceError, ServiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

const SYSTEM_PROMPT: &str = "You are a supportive, empathetic assistant trained in \
    therapeutic communication. You are not a licensed therapist and never diagnose \
    or prescribe.";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

pub struct OpenRouterGenerator {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenRouterGenerator {
    /// `None` when `OPENROUTER_API_KEY` is unset or blank.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("OPENROUTER_API_KEY").ok()?;
        let key = key.trim().to_string();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key))
    }

    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENROUTER_API_BASE.to_string(),
            client,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Point at another OpenAI-compatible endpoint (no trailing slash).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, prompt: &str, params: GenerationParams) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_new_tokens),
        }
    }
}

#[async_trait]
impl GenerationClient for OpenRouterGenerator {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> ServiceResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(prompt, params);

        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::failed(Service::Generation, e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ServiceError::failed(
                Service::Generation,
                format!("OpenRouter API error {}: {}", status, text),
            ));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| ServiceError::failed(Service::Generation, e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ServiceError::failed(
                Service::Generation,
                "OpenRouter returned no content",
            ));
        }
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_params() {
        let generator = OpenRouterGenerator::new(" key ".to_string()).with_model("test/model");
        let body = generator.request_body(
            "hello",
            GenerationParams {
                temperature: 0.2,
                max_new_tokens: 150,
            },
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "test/model");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["messages"][1]["content"], "hello");
        assert_eq!(generator.api_key, "key");
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let generator = OpenRouterGenerator::new("k".to_string()).with_base_url("http://localhost:8080/v1/");
        assert_eq!(generator.base_url, "http://localhost:8080/v1");
    }
}
