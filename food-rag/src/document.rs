//! Data types for stored records and query results.

use serde::{Deserialize, Serialize};

/// A piece of text and its embedding, keyed by a caller-assigned id.
///
/// Adding a record whose id already exists replaces the previous record in
/// full; nothing is merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    /// Unique identifier within a corpus.
    pub id: String,
    /// The text that was embedded.
    pub text: String,
    /// The embedding vector for `text`.
    pub vector: Vec<f32>,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self { id: id.into(), text: text.into(), vector }
    }
}

/// One entry of a query result set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryMatch {
    /// Id of the matched record.
    pub id: String,
    /// Text of the matched record.
    pub text: String,
    /// `1 - cosine similarity` to the query vector (lower is more relevant).
    pub distance: f32,
}

/// Pair up parallel `texts`, `vectors` and `ids` slices into records.
///
/// Equal lengths are the caller's responsibility; surplus entries in a longer
/// slice are ignored.
pub fn zip_records(texts: &[String], vectors: &[Vec<f32>], ids: &[String]) -> Vec<DocumentRecord> {
    texts
        .iter()
        .zip(vectors)
        .zip(ids)
        .map(|((text, vector), id)| DocumentRecord::new(id.clone(), text.clone(), vector.clone()))
        .collect()
}
