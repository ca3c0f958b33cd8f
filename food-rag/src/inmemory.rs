//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a linear-scan store backed by
//! an [`IndexMap`] protected by a `tokio::sync::RwLock`. It is the development
//! fallback backend: suitable for a corpus in the low hundreds of records.
//!
//! When a snapshot path is configured, the whole corpus is written to a JSON
//! file after every mutation and read back by [`VectorStore::initialize`].
//! Snapshot writes are serialized; each one captures the corpus as it is when
//! the write starts, so concurrent mutations end with the latest corpus on disk.

use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::document::{DocumentRecord, QueryMatch, zip_records};
use crate::error::{RagError, Result};
use crate::similarity::{cosine_similarity, distance_from_similarity};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "in-memory";

/// On-disk shape of the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    records: Vec<DocumentRecord>,
}

/// An in-memory vector store ranking by cosine similarity.
///
/// Records keep insertion order, which is also the tie-break order when two
/// records score equally. Replacing a record moves it to the end.
///
/// # Example
///
/// ```rust,ignore
/// use food_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::with_snapshot("data/vector-store.json");
/// store.initialize().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    corpus: RwLock<IndexMap<String, DocumentRecord>>,
    snapshot_path: Option<PathBuf>,
    /// Held for the whole read-write-rename of one snapshot.
    persist_lock: Mutex<()>,
}

impl InMemoryVectorStore {
    /// Create a new empty store that is never persisted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store mirrored to the JSON snapshot at `path`.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self { snapshot_path: Some(path.into()), ..Self::default() }
    }

    /// The snapshot file, if any.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.corpus.read().await.len()
    }

    /// Whether the corpus is empty.
    pub async fn is_empty(&self) -> bool {
        self.corpus.read().await.is_empty()
    }

    async fn load_snapshot(path: &Path) -> Result<Option<Snapshot>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RagError::InitializationFailed {
                    backend: BACKEND.to_string(),
                    message: format!("failed to read snapshot {}: {e}", path.display()),
                });
            }
        };
        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::InitializationFailed {
                backend: BACKEND.to_string(),
                message: format!("corrupt snapshot {}: {e}", path.display()),
            }
        })?;
        Ok(Some(snapshot))
    }

    /// Write the current corpus to the snapshot file, if one is configured.
    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;

        let json = {
            let corpus = self.corpus.read().await;
            let snapshot = Snapshot { records: corpus.values().cloned().collect() };
            serde_json::to_vec(&snapshot).map_err(|e| Self::map_io(path, e))?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Self::map_io(path, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await.map_err(|e| Self::map_io(path, e))?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| Self::map_io(path, e))?;

        debug!(path = %path.display(), bytes = json.len(), "wrote vector store snapshot");
        Ok(())
    }

    fn map_io(path: &Path, e: impl std::fmt::Display) -> RagError {
        RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("failed to write snapshot {}: {e}", path.display()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn initialize(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            debug!("in-memory store started without a snapshot");
            return Ok(());
        };

        match Self::load_snapshot(path).await? {
            Some(snapshot) => {
                let mut corpus = self.corpus.write().await;
                corpus.clear();
                for record in snapshot.records {
                    corpus.insert(record.id.clone(), record);
                }
                info!(path = %path.display(), count = corpus.len(), "loaded vector store snapshot");
            }
            None => {
                info!(path = %path.display(), "no snapshot found, starting empty");
            }
        }
        Ok(())
    }

    async fn add_documents(
        &self,
        texts: &[String],
        vectors: &[Vec<f32>],
        ids: &[String],
    ) -> Result<()> {
        let records = zip_records(texts, vectors, ids);
        {
            let mut corpus = self.corpus.write().await;
            for record in records {
                corpus.shift_remove(&record.id);
                corpus.insert(record.id.clone(), record);
            }
            debug!(count = ids.len(), total = corpus.len(), "added documents to in-memory store");
        }
        self.persist().await
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        let corpus = self.corpus.read().await;
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = Vec::with_capacity(corpus.len());
        for record in corpus.values() {
            let similarity = cosine_similarity(vector, &record.vector)?;
            // A non-finite stored vector must not poison the ordering.
            let similarity = if similarity.is_nan() { f32::NEG_INFINITY } else { similarity };
            scored.push((record, similarity));
        }

        // No NaN left, so `partial_cmp` is total here; `sort_by` is stable,
        // so equal scores keep corpus order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(record, similarity)| QueryMatch {
                id: record.id.clone(),
                text: record.text.clone(),
                distance: distance_from_similarity(similarity),
            })
            .collect())
    }

    async fn get_existing_ids(&self) -> Result<Vec<String>> {
        Ok(self.corpus.read().await.keys().cloned().collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        {
            let mut corpus = self.corpus.write().await;
            for id in ids {
                corpus.shift_remove(id);
            }
        }
        self.persist().await
    }

    async fn reset(&self) -> Result<()> {
        self.corpus.write().await.clear();
        self.persist().await
    }
}
