//! Qdrant vector store backend (local server).
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC against
//! a single collection with cosine distance.
//!
//! Qdrant point ids must be unsigned integers or UUIDs. Caller ids that are
//! already one of those are used directly; anything else is mapped to a UUIDv5
//! of the id. The caller's id is kept in the payload and returned by queries.
//!
//! # Example
//!
//! ```rust,ignore
//! use food_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334", None, "foods", 1536, retry)?;
//! store.initialize().await?;
//! store.add_documents(&texts, &vectors, &ids).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct, PointsIdsList,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::QueryMatch;
use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;
use crate::similarity::distance_from_similarity;
use crate::vectorstore::VectorStore;

const BACKEND: &str = "qdrant";

/// Page size used when scrolling through the collection to list ids.
const SCROLL_PAGE: u32 = 256;

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(
        url: &str,
        api_key: Option<&str>,
        collection: impl Into<String>,
        dimensions: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key.to_string());
        }
        let client = builder.build().map_err(|e| RagError::InitializationFailed {
            backend: BACKEND.to_string(),
            message: format!("failed to build client for {url}: {e}"),
        })?;
        Ok(Self::from_client(client, collection, dimensions, retry))
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(
        client: Qdrant,
        collection: impl Into<String>,
        dimensions: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self { client, collection: collection.into(), dimensions, retry }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn init_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::InitializationFailed { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn create_collection_builder(&self) -> CreateCollectionBuilder {
        CreateCollectionBuilder::new(&self.collection).vectors_config(VectorParamsBuilder::new(
            self.dimensions as u64,
            Distance::Cosine,
        ))
    }

    async fn scroll_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut request = ScrollPointsBuilder::new(&self.collection)
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(offset) = offset.take() {
                request = request.offset(offset);
            }

            let page = self.client.scroll(request).await.map_err(Self::map_err)?;
            ids.extend(page.result.iter().filter_map(|point| {
                point
                    .payload
                    .get("id")
                    .and_then(Self::extract_string)
                    .or_else(|| point.id.as_ref().and_then(point_id_to_string))
            }));

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(ids)
    }
}

/// Map a caller id onto a valid Qdrant point id.
fn point_id(id: &str) -> PointId {
    if let Some(n) = id.parse::<u64>().ok().filter(|n| n.to_string() == id) {
        return PointId::from(n);
    }
    let uuid = Uuid::parse_str(id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()));
    PointId::from(uuid.to_string())
}

fn point_id_to_string(pid: &PointId) -> Option<String> {
    match &pid.point_id_options {
        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
        None => None,
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn initialize(&self) -> Result<()> {
        self.client.health_check().await.map_err(Self::init_err)?;

        let exists =
            self.client.collection_exists(&self.collection).await.map_err(Self::init_err)?;
        if exists {
            debug!(collection = %self.collection, "qdrant collection already exists, skipping creation");
        } else {
            self.client
                .create_collection(self.create_collection_builder())
                .await
                .map_err(Self::init_err)?;
            info!(collection = %self.collection, dimensions = self.dimensions, "created qdrant collection");
        }
        Ok(())
    }

    async fn add_documents(
        &self,
        texts: &[String],
        vectors: &[Vec<f32>],
        ids: &[String],
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(ids.len());
        for ((text, vector), id) in texts.iter().zip(vectors).zip(ids) {
            self.check_dimensions(vector)?;
            let payload = Payload::try_from(serde_json::json!({ "id": id, "text": text }))
                .map_err(Self::map_err)?;
            points.push(PointStruct::new(point_id(id), vector.clone(), payload));
        }

        let points = &points;
        self.retry
            .run("qdrant.upsert", || async move {
                self.client
                    .upsert_points(
                        UpsertPointsBuilder::new(&self.collection, points.clone()).wait(true),
                    )
                    .await
                    .map_err(Self::map_err)
            })
            .await?;

        debug!(collection = %self.collection, count = ids.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        self.check_dimensions(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .retry
            .run("qdrant.query", || async move {
                self.client
                    .search_points(
                        SearchPointsBuilder::new(&self.collection, vector.to_vec(), k as u64)
                            .with_payload(true),
                    )
                    .await
                    .map_err(Self::map_err)
            })
            .await?;

        let matches = response
            .result
            .into_iter()
            .map(|scored| {
                let id = scored
                    .payload
                    .get("id")
                    .and_then(Self::extract_string)
                    .or_else(|| scored.id.as_ref().and_then(point_id_to_string))
                    .unwrap_or_default();
                let text =
                    scored.payload.get("text").and_then(Self::extract_string).unwrap_or_default();
                QueryMatch { id, text, distance: distance_from_similarity(scored.score) }
            })
            .collect();

        Ok(matches)
    }

    /// Best-effort: scroll errors are logged and yield an empty list.
    async fn get_existing_ids(&self) -> Result<Vec<String>> {
        match self.retry.run("qdrant.list_ids", || self.scroll_ids()).await {
            Ok(ids) => Ok(ids),
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "could not list qdrant ids, assuming none");
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<PointId> = ids.iter().map(String::as_str).map(point_id).collect();
        let point_ids = &point_ids;
        self.retry
            .run("qdrant.delete", || async move {
                self.client
                    .delete_points(
                        DeletePointsBuilder::new(&self.collection)
                            .points(PointsIdsList { ids: point_ids.clone() })
                            .wait(true),
                    )
                    .await
                    .map_err(Self::map_err)
            })
            .await?;

        debug!(collection = %self.collection, count = ids.len(), "deleted points from qdrant");
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.retry
            .run("qdrant.reset", || async move {
                self.client.delete_collection(self.collection.as_str()).await.map_err(Self::map_err)?;
                self.client
                    .create_collection(self.create_collection_builder())
                    .await
                    .map_err(Self::map_err)
            })
            .await?;

        info!(collection = %self.collection, "reset qdrant collection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(id: &str) -> PointIdOptions {
        point_id(id).point_id_options.unwrap()
    }

    #[test]
    fn numeric_ids_stay_numeric() {
        assert_eq!(options("42"), PointIdOptions::Num(42));
    }

    #[test]
    fn numeric_ids_with_leading_zeros_are_hashed() {
        assert!(matches!(options("007"), PointIdOptions::Uuid(_)));
        assert_ne!(options("007"), options("7"));
    }

    #[test]
    fn uuid_ids_are_kept() {
        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        assert_eq!(options(id), PointIdOptions::Uuid(id.to_string()));
    }

    #[test]
    fn other_ids_hash_deterministically() {
        assert_eq!(options("pad-thai"), options("pad-thai"));
        assert_ne!(options("pad-thai"), options("pho"));
    }

    #[test]
    fn point_ids_render_back_to_strings() {
        assert_eq!(point_id_to_string(&point_id("5")).as_deref(), Some("5"));
    }
}
