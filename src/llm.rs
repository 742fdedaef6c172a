//! Text-generation clients for the newsletter pipeline
//!
//! Provides the `TextGenerator` seam plus OpenAI and Anthropic backends.
//! Uses a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::{LlmProvider, Settings};
use crate::error::NewsletterError;
use crate::Result;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 2048;

/// Trait for text generation (one system + user exchange per call).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Build the generator for the configured provider.
pub fn build_generator(settings: &Settings) -> Arc<dyn TextGenerator> {
    match settings.llm_provider {
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(
            settings.openai_api_key.clone().unwrap_or_default(),
            settings.llm_model.clone(),
            settings.llm_temperature,
        )),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(
            settings.anthropic_api_key.clone().unwrap_or_default(),
            settings.llm_model.clone(),
            settings.llm_temperature,
        )),
    }
}

fn build_http_client() -> Client {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .timeout(Duration::from_secs(120))
        .build()
        .expect("Failed to build HTTP client")
}

//
// ================= OpenAI =================
//

/// Reusable OpenAI chat-completions client (connection-pooled)
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, temperature: f32) -> Self {
        Self {
            client: build_http_client(),
            api_key,
            model,
            temperature,
            base_url: OPENAI_CHAT_URL.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(NewsletterError::Generation(
                "Missing OPENAI_API_KEY for OpenAI provider".to_string(),
            ));
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: self.temperature,
        };

        debug!(model = %self.model, "Calling OpenAI chat completions");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI request failed: {}", e);
                NewsletterError::Generation(format!("OpenAI request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI error response ({}): {}", status, error_text);
            return Err(NewsletterError::Generation(format!(
                "OpenAI returned {}: {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse OpenAI response: {}", e);
            NewsletterError::Generation(format!("OpenAI parse error: {}", e))
        })?;

        let answer = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                NewsletterError::Generation("Empty response from OpenAI".to_string())
            })?;

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

//
// ================= Anthropic =================
//

/// Reusable Anthropic messages client (connection-pooled)
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, temperature: f32) -> Self {
        Self {
            client: build_http_client(),
            api_key,
            model,
            temperature,
            base_url: ANTHROPIC_MESSAGES_URL.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(NewsletterError::Generation(
                "Missing ANTHROPIC_API_KEY for Anthropic provider".to_string(),
            ));
        }

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: ANTHROPIC_MAX_TOKENS,
            temperature: self.temperature,
            system: system.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        debug!(model = %self.model, "Calling Anthropic messages API");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Anthropic request failed: {}", e);
                NewsletterError::Generation(format!("Anthropic request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic error response ({}): {}", status, error_text);
            return Err(NewsletterError::Generation(format!(
                "Anthropic returned {}: {}",
                status, error_text
            )));
        }

        let messages_response: MessagesResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Anthropic response: {}", e);
            NewsletterError::Generation(format!("Anthropic parse error: {}", e))
        })?;

        // Content is a list of blocks; assemble the text ones.
        let answer: String = messages_response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}
