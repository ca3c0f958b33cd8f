//! Choosing and opening the configured vector store.
//!
//! [`select_backend`] is a pure function of [`AppConfig`]. Asking for the
//! remote-managed backend without both Upstash credentials falls back to the
//! in-memory store (with a warning) instead of building a client that can
//! never work.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{AppConfig, BackendKind};
use crate::error::Result;
use crate::inmemory::InMemoryVectorStore;
use crate::retry::RetryPolicy;
use crate::upstash::UpstashVectorStore;
use crate::vectorstore::VectorStore;

/// A resolved backend choice, carrying only what that backend needs.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendSelection {
    InMemory {
        snapshot_path: Option<PathBuf>,
    },
    LocalServer {
        url: String,
        api_key: Option<String>,
        collection: String,
        dimensions: usize,
        retry: RetryPolicy,
    },
    RemoteManaged {
        url: String,
        token: String,
        dimensions: usize,
        retry: RetryPolicy,
    },
}

/// Resolve which backend to build from `config`.
pub fn select_backend(config: &AppConfig) -> BackendSelection {
    let in_memory = || BackendSelection::InMemory { snapshot_path: config.snapshot_path.clone() };

    match config.backend {
        BackendKind::InMemory => in_memory(),
        BackendKind::LocalServer => BackendSelection::LocalServer {
            url: config.qdrant_url.clone(),
            api_key: config.qdrant_api_key.clone(),
            collection: config.qdrant_collection.clone(),
            dimensions: config.embedding_dimensions,
            retry: config.retry,
        },
        BackendKind::RemoteManaged => match config.upstash_credentials() {
            Some((url, token)) => BackendSelection::RemoteManaged {
                url: url.to_string(),
                token: token.to_string(),
                dimensions: config.embedding_dimensions,
                retry: config.retry,
            },
            None => {
                warn!(
                    requested = %BackendKind::RemoteManaged,
                    fallback = %BackendKind::InMemory,
                    "UPSTASH_VECTOR_REST_URL or UPSTASH_VECTOR_REST_TOKEN missing, falling back"
                );
                in_memory()
            }
        },
    }
}

impl BackendSelection {
    /// The backend kind this selection resolved to.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::InMemory { .. } => BackendKind::InMemory,
            Self::LocalServer { .. } => BackendKind::LocalServer,
            Self::RemoteManaged { .. } => BackendKind::RemoteManaged,
        }
    }

    /// Construct the store. No network traffic happens here.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InitializationFailed`](crate::RagError::InitializationFailed)
    /// if the client cannot be built.
    pub fn into_store(self) -> Result<Arc<dyn VectorStore>> {
        match self {
            Self::InMemory { snapshot_path: Some(path) } => {
                Ok(Arc::new(InMemoryVectorStore::with_snapshot(path)))
            }
            Self::InMemory { snapshot_path: None } => Ok(Arc::new(InMemoryVectorStore::new())),
            Self::LocalServer { url, api_key, collection, dimensions, retry } => {
                local_server(&url, api_key.as_deref(), collection, dimensions, retry)
            }
            Self::RemoteManaged { url, token, dimensions, retry } => {
                Ok(Arc::new(UpstashVectorStore::new(url, token, dimensions, retry)?))
            }
        }
    }
}

#[cfg(feature = "qdrant")]
fn local_server(
    url: &str,
    api_key: Option<&str>,
    collection: String,
    dimensions: usize,
    retry: RetryPolicy,
) -> Result<Arc<dyn VectorStore>> {
    let store = crate::qdrant::QdrantVectorStore::new(url, api_key, collection, dimensions, retry)?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "qdrant"))]
fn local_server(
    _url: &str,
    _api_key: Option<&str>,
    _collection: String,
    _dimensions: usize,
    _retry: RetryPolicy,
) -> Result<Arc<dyn VectorStore>> {
    Err(crate::error::RagError::InitializationFailed {
        backend: "qdrant".to_string(),
        message: "food-rag was built without the `qdrant` feature".to_string(),
    })
}

/// Select, build and initialize the configured store.
///
/// Any failure is fatal: callers should not start serving queries.
pub async fn open_vector_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>> {
    let selection = select_backend(config);
    let kind = selection.kind();
    let store = selection.into_store()?;
    store.initialize().await?;
    info!(backend = store.name(), kind = %kind, "vector store ready");
    Ok(store)
}
