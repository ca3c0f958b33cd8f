//! OpenAI-compatible HTTP client and embedding provider.
//!
//! [`OpenAIClient`] is shared by the embedding provider here and the chat
//! model in [`crate::llm`]; it talks to any server implementing the OpenAI
//! REST shape, which covers OpenAI itself and local servers such as Ollama.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Native dimensionality of `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// Authenticated JSON client for one OpenAI-compatible base URL.
#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAIClient {
    /// Returns `None` for an empty key; callers turn that into their own error.
    pub fn new(api_key: impl Into<String>) -> Option<Self> {
        let api_key = api_key.into();
        (!api_key.is_empty()).then(|| Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
    }

    /// POST `body` to `{base_url}/{path}` and decode the JSON reply.
    ///
    /// Failures come back as a message; the caller picks the error variant.
    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, String>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorBody>(&text).map(|e| e.error.message).unwrap_or(text);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

/// An [`EmbeddingProvider`] backed by `POST /embeddings`.
///
/// ```rust,ignore
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?.with_dimensions(768);
/// let embedding = provider.embed("mango sticky rice").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: OpenAIClient,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

fn embedding_err(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: "OpenAI".into(), message: message.into() }
}

impl OpenAIEmbeddingProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client =
            OpenAIClient::new(api_key).ok_or_else(|| embedding_err("API key must not be empty"))?;
        Ok(Self { client, model: DEFAULT_MODEL.into(), dimensions: DEFAULT_DIMENSIONS })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.set_base_url(base_url);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Output dimension. Anything but 1536 is requested from the API, which
    /// then returns shortened embeddings.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| embedding_err("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch_size = texts.len(), "embedding batch");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: (self.dimensions != DEFAULT_DIMENSIONS).then_some(self.dimensions),
        };
        let response: EmbeddingResponse =
            self.client.post("embeddings", &request).await.map_err(|message| {
                error!(model = %self.model, error = %message, "embedding request failed");
                embedding_err(message)
            })?;

        if response.data.len() != texts.len() {
            return Err(embedding_err(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
