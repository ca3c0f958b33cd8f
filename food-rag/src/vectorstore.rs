//! Vector store trait for storing and ranking embedded documents.

use async_trait::async_trait;

use crate::document::QueryMatch;
use crate::error::Result;

/// A storage backend for embedded documents with similarity search.
///
/// Every backend (in-memory, local Qdrant server, Upstash Vector) behaves the
/// same from the caller's perspective, so the active backend can be chosen by
/// configuration alone. Stores are shared process-wide behind an `Arc` and
/// take `&self` everywhere.
///
/// # Example
///
/// ```rust,ignore
/// use food_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.initialize().await?;
/// store.add_documents(&texts, &vectors, &ids).await?;
/// let matches = store.query(&query_vector, 3).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Bring the backend to a ready state. Must run once before any other call.
    ///
    /// Failures are fatal and are not retried.
    async fn initialize(&self) -> Result<()>;

    /// Store `texts[i]` with `vectors[i]` under `ids[i]`, replacing any
    /// existing record with the same id.
    ///
    /// The three slices must have equal length.
    async fn add_documents(
        &self,
        texts: &[String],
        vectors: &[Vec<f32>],
        ids: &[String],
    ) -> Result<()>;

    /// Return up to `k` matches ordered by ascending distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>>;

    /// Return every id currently stored. No ordering is guaranteed.
    async fn get_existing_ids(&self) -> Result<Vec<String>>;

    /// Remove the records with the given ids. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Remove every record.
    async fn reset(&self) -> Result<()>;

    /// Release any held resources.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
