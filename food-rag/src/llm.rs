//! Language model used to turn retrieved context into an answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::openai::OpenAIClient;

/// A chat-style language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model name, for logs.
    fn name(&self) -> &str;

    /// Produce a completion for `user`, steered by the `system` instructions.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// A [`LanguageModel`] backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIChatModel {
    client: OpenAIClient,
    model: String,
    temperature: Option<f32>,
}

fn llm_err(message: impl Into<String>) -> RagError {
    RagError::LlmError { provider: "OpenAI".into(), message: message.into() }
}

impl OpenAIChatModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client =
            OpenAIClient::new(api_key).ok_or_else(|| llm_err("API key must not be empty"))?;
        Ok(Self { client, model: model.into(), temperature: None })
    }

    /// Point the model at another OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.set_base_url(base_url);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = user.len(), "requesting chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: self.temperature,
        };
        let response: ChatResponse =
            self.client.post("chat/completions", &request).await.map_err(|message| {
                error!(model = %self.model, error = %message, "chat request failed");
                llm_err(message)
            })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| llm_err("API returned no answer"))
    }
}
