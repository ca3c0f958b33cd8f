//! Process-wide configuration, read once at startup.
//!
//! [`AppConfig::from_env`] reads the environment a single time in `main`; the
//! resulting value is passed to whichever component needs it. Invalid values
//! are [`RagError::ConfigError`]s and abort startup.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Which vector store backend the configuration asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Linear-scan store in process memory, optionally snapshotted to disk.
    #[default]
    InMemory,
    /// A Qdrant server reachable on the local network.
    LocalServer,
    /// A managed Upstash Vector index.
    RemoteManaged,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InMemory => "in-memory",
            Self::LocalServer => "local-server",
            Self::RemoteManaged => "remote-managed",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "local-server" | "local" | "qdrant" => Ok(Self::LocalServer),
            "remote-managed" | "remote" | "upstash" => Ok(Self::RemoteManaged),
            other => Err(RagError::ConfigError(format!(
                "unknown VECTOR_DB_TYPE '{other}' (expected in-memory, local-server or remote-managed)"
            ))),
        }
    }
}

/// Validated application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Requested vector store backend.
    pub backend: BackendKind,
    /// Snapshot file for the in-memory backend.
    pub snapshot_path: Option<PathBuf>,
    /// Qdrant gRPC endpoint.
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    /// Qdrant collection holding the corpus.
    pub qdrant_collection: String,
    /// Upstash Vector REST endpoint.
    pub upstash_url: Option<String>,
    /// Upstash Vector REST token.
    pub upstash_token: Option<String>,
    /// Dimension of vectors produced by the embedding model.
    pub embedding_dimensions: usize,
    pub embedding_model: String,
    pub chat_model: String,
    pub openai_api_key: String,
    /// Base URL of an OpenAI-compatible API, without a trailing slash.
    pub openai_base_url: String,
    /// Number of matches forwarded to the language model.
    pub top_k: usize,
    /// Retry policy for network-backed stores.
    pub retry: RetryPolicy,
    /// Path to the food dataset.
    pub data_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::InMemory,
            snapshot_path: None,
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_api_key: None,
            qdrant_collection: "foods".to_string(),
            upstash_url: None,
            upstash_token: None,
            embedding_dimensions: 1536,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            top_k: 3,
            retry: RetryPolicy::default(),
            data_path: PathBuf::from("data/foods.json"),
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl AppConfig {
    /// Create a new builder for constructing an [`AppConfig`].
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut builder = Self::builder();

        if let Some(kind) = var("VECTOR_DB_TYPE") {
            builder = builder.backend(kind.parse()?);
        }
        if let Some(path) = var("VECTOR_SNAPSHOT_PATH") {
            builder = builder.snapshot_path(path);
        }
        if let Some(url) = var("QDRANT_URL") {
            builder = builder.qdrant_url(url);
        }
        if let Some(key) = var("QDRANT_API_KEY") {
            builder = builder.qdrant_api_key(key);
        }
        if let Some(collection) = var("QDRANT_COLLECTION") {
            builder = builder.qdrant_collection(collection);
        }
        if let Some(url) = var("UPSTASH_VECTOR_REST_URL") {
            builder = builder.upstash_url(url);
        }
        if let Some(token) = var("UPSTASH_VECTOR_REST_TOKEN") {
            builder = builder.upstash_token(token);
        }
        if let Some(dims) = var("EMBEDDING_DIMENSIONS") {
            builder = builder.embedding_dimensions(parse_var("EMBEDDING_DIMENSIONS", &dims)?);
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Some(model) = var("CHAT_MODEL") {
            builder = builder.chat_model(model);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            builder = builder.openai_api_key(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            builder = builder.openai_base_url(url);
        }
        if let Some(k) = var("RAG_TOP_K") {
            builder = builder.top_k(parse_var("RAG_TOP_K", &k)?);
        }
        if let Some(n) = var("RETRY_MAX_ATTEMPTS") {
            builder = builder.retry_max_attempts(parse_var("RETRY_MAX_ATTEMPTS", &n)?);
        }
        if let Some(ms) = var("RETRY_BASE_DELAY_MS") {
            builder = builder
                .retry_base_delay(Duration::from_millis(parse_var("RETRY_BASE_DELAY_MS", &ms)?));
        }
        if let Some(ms) = var("OPERATION_TIMEOUT_MS") {
            builder = builder
                .operation_timeout(Duration::from_millis(parse_var("OPERATION_TIMEOUT_MS", &ms)?));
        }
        if let Some(path) = var("FOOD_DATA_PATH") {
            builder = builder.data_path(path);
        }
        if let Some(host) = var("HOST") {
            builder = builder.host(host);
        }
        if let Some(port) = var("PORT") {
            builder = builder.port(parse_var("PORT", &port)?);
        }

        builder.build()
    }

    /// Upstash URL and token, when both are present.
    pub fn upstash_credentials(&self) -> Option<(&str, &str)> {
        match (&self.upstash_url, &self.upstash_token) {
            (Some(url), Some(token)) => Some((url.as_str(), token.as_str())),
            _ => None,
        }
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e| RagError::ConfigError(format!("invalid {key} '{value}': {e}")))
}

/// Builder for constructing a validated [`AppConfig`].
#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = Some(path.into());
        self
    }

    pub fn qdrant_url(mut self, url: impl Into<String>) -> Self {
        self.config.qdrant_url = url.into();
        self
    }

    pub fn qdrant_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.qdrant_api_key = Some(key.into());
        self
    }

    pub fn qdrant_collection(mut self, collection: impl Into<String>) -> Self {
        self.config.qdrant_collection = collection.into();
        self
    }

    pub fn upstash_url(mut self, url: impl Into<String>) -> Self {
        self.config.upstash_url = Some(url.into());
        self
    }

    pub fn upstash_token(mut self, token: impl Into<String>) -> Self {
        self.config.upstash_token = Some(token.into());
        self
    }

    /// Set the embedding dimension used for bootstrap queries and dimension checks.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = dims;
        self
    }

    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.openai_api_key = key.into();
        self
    }

    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.openai_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the number of matches forwarded to the language model.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    /// Bound each retried store operation, backoff included.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.retry.deadline = Some(timeout);
        self
    }

    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_path = path.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Build the [`AppConfig`], validating that parameters are usable.
    ///
    /// Missing Upstash credentials are deliberately not an error here: backend
    /// selection falls back to the in-memory store instead.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `embedding_dimensions == 0`
    /// - `retry.max_attempts == 0`
    /// - the OpenAI API key is empty
    pub fn build(self) -> Result<AppConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("RAG_TOP_K must be greater than zero".to_string()));
        }
        if self.config.embedding_dimensions == 0 {
            return Err(RagError::ConfigError(
                "EMBEDDING_DIMENSIONS must be greater than zero".to_string(),
            ));
        }
        if self.config.retry.max_attempts == 0 {
            return Err(RagError::ConfigError(
                "RETRY_MAX_ATTEMPTS must be greater than zero".to_string(),
            ));
        }
        if self.config.openai_api_key.is_empty() {
            return Err(RagError::ConfigError("OPENAI_API_KEY is required".to_string()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_api_key_is_set() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.backend, BackendKind::InMemory);
        assert_eq!(config.embedding_dimensions, 1536);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.port, 3000);
        assert!(config.snapshot_path.is_none());
        assert!(config.upstash_credentials().is_none());
    }

    #[test]
    fn reads_every_override() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:11434/v1/"),
            ("VECTOR_DB_TYPE", "upstash"),
            ("UPSTASH_VECTOR_REST_URL", "https://example.upstash.io"),
            ("UPSTASH_VECTOR_REST_TOKEN", "secret"),
            ("EMBEDDING_DIMENSIONS", "768"),
            ("RAG_TOP_K", "5"),
            ("RETRY_MAX_ATTEMPTS", "4"),
            ("RETRY_BASE_DELAY_MS", "50"),
            ("OPERATION_TIMEOUT_MS", "2000"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendKind::RemoteManaged);
        assert_eq!(config.openai_base_url, "http://localhost:11434/v1");
        assert_eq!(config.upstash_credentials(), Some(("https://example.upstash.io", "secret")));
        assert_eq!(config.embedding_dimensions, 768);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.base_delay, Duration::from_millis(50));
        assert_eq!(config.retry.deadline, Some(Duration::from_secs(2)));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("VECTOR_DB_TYPE", "  "),
            ("UPSTASH_VECTOR_REST_TOKEN", ""),
        ]))
        .unwrap();
        assert_eq!(config.backend, BackendKind::InMemory);
        assert!(config.upstash_token.is_none());
    }

    #[test]
    fn rejects_invalid_values() {
        let cases: &[&[(&str, &str)]] = &[
            &[],
            &[("OPENAI_API_KEY", "sk"), ("VECTOR_DB_TYPE", "pinecone")],
            &[("OPENAI_API_KEY", "sk"), ("RAG_TOP_K", "0")],
            &[("OPENAI_API_KEY", "sk"), ("RAG_TOP_K", "three")],
            &[("OPENAI_API_KEY", "sk"), ("EMBEDDING_DIMENSIONS", "0")],
            &[("OPENAI_API_KEY", "sk"), ("RETRY_MAX_ATTEMPTS", "0")],
            &[("OPENAI_API_KEY", "sk"), ("PORT", "70000")],
        ];
        for vars in cases {
            let result = AppConfig::from_lookup(lookup(vars));
            assert!(matches!(result, Err(RagError::ConfigError(_))), "accepted {vars:?}");
        }
    }

    #[test]
    fn backend_kind_aliases() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::InMemory);
        assert_eq!("Qdrant".parse::<BackendKind>().unwrap(), BackendKind::LocalServer);
        assert_eq!("remote-managed".parse::<BackendKind>().unwrap(), BackendKind::RemoteManaged);
        assert_eq!(BackendKind::LocalServer.to_string(), "local-server");
    }
}
