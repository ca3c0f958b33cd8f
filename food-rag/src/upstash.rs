//! Upstash Vector backend (remote-managed).
//!
//! Provides [`UpstashVectorStore`] which implements [`VectorStore`] against the
//! [Upstash Vector](https://upstash.com/docs/vector) REST API using `reqwest`.
//! Upsert, query, delete and reset go through a [`RetryPolicy`]; readiness is
//! checked once with a `GET /info` round-trip that is never retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use food_rag::upstash::UpstashVectorStore;
//!
//! let store = UpstashVectorStore::new(url, token, 1536, RetryPolicy::default())?;
//! store.initialize().await?;
//! let matches = store.query(&query_embedding, 3).await?;
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::QueryMatch;
use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;
use crate::similarity::distance_from_similarity;
use crate::vectorstore::VectorStore;

const BACKEND: &str = "upstash";

/// Upstash rejects a `topK` above 1000. Queries are clamped to it and the
/// bootstrap id listing asks for exactly that many.
const MAX_TOP_K: usize = 1000;

/// A [`VectorStore`] backed by an Upstash Vector index.
///
/// The index must use the `COSINE` similarity function and the same
/// dimension as the configured embedding model. Record text is kept in the
/// vector metadata under `text`.
pub struct UpstashVectorStore {
    client: reqwest::Client,
    url: String,
    token: String,
    dimensions: usize,
    retry: RetryPolicy,
}

// ── Upstash REST request/response types ────────────────────────────

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    vector: &'a [f32],
    metadata: VectorMetadata<'a>,
}

#[derive(Serialize)]
struct VectorMetadata<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct QueryHit {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<HitMetadata>,
}

#[derive(Deserialize)]
struct HitMetadata {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexInfo {
    dimension: usize,
    #[serde(default)]
    vector_count: u64,
    #[serde(default)]
    similarity_function: Option<String>,
}

impl UpstashVectorStore {
    /// Create a store for the index at `url`, authenticated with `token`.
    ///
    /// `dimensions` must match the embedding model; vectors of any other
    /// length are rejected before they reach the network.
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        dimensions: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            RagError::InitializationFailed {
                backend: BACKEND.to_string(),
                message: format!("failed to build http client: {e}"),
            }
        })?;
        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            dimensions,
            retry,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.url)
    }

    fn map_err(e: impl std::fmt::Display) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
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

    /// Send one request and unwrap Upstash's `{result, error}` envelope.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.token).send().await.map_err(Self::map_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or(body);
            return Err(Self::map_err(format!("API returned {status}: {detail}")));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Self::map_err(format!("failed to parse response: {e}")))?;
        if let Some(error) = envelope.error {
            return Err(Self::map_err(error));
        }
        envelope.result.ok_or_else(|| Self::map_err("response has no result"))
    }

    async fn query_hits(
        &self,
        operation: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryHit>> {
        let body = QueryRequest { vector, top_k, include_metadata };
        self.retry
            .run(operation, || self.send(self.client.post(self.endpoint("query")).json(&body)))
            .await
    }
}

/// Upstash reports cosine scores normalized to `(1 + cos) / 2`.
fn distance_from_score(score: f32) -> f32 {
    distance_from_similarity(2.0 * score - 1.0)
}

#[async_trait]
impl VectorStore for UpstashVectorStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn initialize(&self) -> Result<()> {
        let info: IndexInfo =
            self.send(self.client.get(self.endpoint("info"))).await.map_err(|e| {
                RagError::InitializationFailed {
                    backend: BACKEND.to_string(),
                    message: format!("index at {} is not reachable: {e}", self.url),
                }
            })?;

        if info.dimension != self.dimensions {
            return Err(RagError::InitializationFailed {
                backend: BACKEND.to_string(),
                message: format!(
                    "index dimension {} does not match EMBEDDING_DIMENSIONS {}",
                    info.dimension, self.dimensions
                ),
            });
        }
        match info.similarity_function.as_deref() {
            Some(function) if !function.eq_ignore_ascii_case("COSINE") => {
                warn!(similarity_function = function, "upstash index is not using cosine similarity");
            }
            _ => {}
        }

        info!(url = %self.url, dimension = info.dimension, vectors = info.vector_count, "upstash index ready");
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
        for vector in vectors {
            self.check_dimensions(vector)?;
        }

        let payload: Vec<UpsertVector<'_>> = texts
            .iter()
            .zip(vectors)
            .zip(ids)
            .map(|((text, vector), id)| UpsertVector {
                id,
                vector,
                metadata: VectorMetadata { text },
            })
            .collect();

        self.retry
            .run("upstash.upsert", || {
                self.send::<serde_json::Value>(
                    self.client.post(self.endpoint("upsert")).json(&payload),
                )
            })
            .await?;

        debug!(count = ids.len(), "upserted vectors to upstash");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        self.check_dimensions(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.query_hits("upstash.query", vector, k.min(MAX_TOP_K), true).await?;
        let mut matches: Vec<QueryMatch> = hits
            .into_iter()
            .map(|hit| QueryMatch {
                id: hit.id,
                text: hit.metadata.map(|m| m.text).unwrap_or_default(),
                distance: distance_from_score(hit.score),
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);

        debug!(count = matches.len(), "queried upstash");
        Ok(matches)
    }

    /// Best-effort id listing.
    ///
    /// The REST API has no "list ids" call, so this issues a bootstrap query
    /// with a unit vector and returns whatever ids come back (at most
    /// 1000). Any failure yields an empty list.
    async fn get_existing_ids(&self) -> Result<Vec<String>> {
        let mut unit = vec![0.0; self.dimensions];
        if let Some(first) = unit.first_mut() {
            *first = 1.0;
        }

        match self.query_hits("upstash.list_ids", &unit, MAX_TOP_K, false).await {
            Ok(hits) => Ok(hits.into_iter().map(|hit| hit.id).collect()),
            Err(e) => {
                warn!(error = %e, "could not list upstash ids, assuming none");
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.retry
            .run("upstash.delete", || {
                self.send::<serde_json::Value>(
                    self.client.delete(self.endpoint("delete")).json(ids),
                )
            })
            .await?;
        debug!(count = ids.len(), "deleted vectors from upstash");
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.retry
            .run("upstash.reset", || {
                self.send::<serde_json::Value>(self.client.post(self.endpoint("reset")))
            })
            .await?;
        info!("reset upstash index");
        Ok(())
    }
}
