//! RAG service orchestrator.
//!
//! The [`RagService`] coordinates loading the food dataset (embed → store)
//! and answering questions (embed → query → prompt → language model) by
//! composing an [`EmbeddingProvider`], a [`VectorStore`] and a
//! [`LanguageModel`].
//!
//! # Example
//!
//! ```rust,ignore
//! use food_rag::{RagService, InMemoryVectorStore};
//!
//! let service = RagService::builder()
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .language_model(Arc::new(chat_model))
//!     .top_k(3)
//!     .build()?;
//!
//! service.load_data(&items).await?;
//! let answer = service.ask("Which soups are sour?").await?;
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::dataset::FoodItem;
use crate::document::QueryMatch;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::vectorstore::VectorStore;

/// Instructions given to the language model with every question.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about food. \
Answer using only the numbered context entries. If the context does not contain the answer, \
say that you don't know.";

/// Returned instead of an answer when nothing has been loaded yet.
pub const EMPTY_CORPUS_ANSWER: &str =
    "I don't have any food information yet. Load the dataset and ask again.";

/// Result of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    /// The matches that were given to the language model, most relevant first.
    pub sources: Vec<QueryMatch>,
}

/// Outcome of loading a dataset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadReport {
    /// Items offered.
    pub total: usize,
    /// Items embedded and stored.
    pub added: usize,
    /// Items skipped because their id was already stored.
    pub skipped: usize,
}

/// The question-answering service.
///
/// Construct one via [`RagService::builder()`] at startup and share it across
/// requests.
pub struct RagService {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    language_model: Arc<dyn LanguageModel>,
    top_k: usize,
}

impl RagService {
    /// Create a new [`RagServiceBuilder`].
    pub fn builder() -> RagServiceBuilder {
        RagServiceBuilder::default()
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embed and store the items whose ids are not stored yet.
    ///
    /// The existing-id listing is best-effort on remote backends; if it comes
    /// back empty every item is re-embedded, which is harmless because adding
    /// replaces by id.
    pub async fn load_data(&self, items: &[FoodItem]) -> Result<LoadReport> {
        let existing: HashSet<String> =
            self.vector_store.get_existing_ids().await?.into_iter().collect();
        let fresh: Vec<&FoodItem> =
            items.iter().filter(|item| !existing.contains(&item.id)).collect();

        let added = self.store_items(&fresh).await?;
        let report = LoadReport { total: items.len(), added, skipped: items.len() - added };
        info!(total = report.total, added = report.added, skipped = report.skipped, "loaded data");
        Ok(report)
    }

    /// Re-embed and store every item, replacing records with the same id.
    pub async fn reload_data(&self, items: &[FoodItem]) -> Result<LoadReport> {
        let all: Vec<&FoodItem> = items.iter().collect();
        let added = self.store_items(&all).await?;
        info!(total = items.len(), added, "reloaded data");
        Ok(LoadReport { total: items.len(), added, skipped: 0 })
    }

    async fn store_items(&self, items: &[&FoodItem]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = items.iter().map(|item| item.document_text()).collect();
        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let vectors = self
            .embedding_provider
            .embed_batch(&refs)
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during load"))?;

        self.vector_store
            .add_documents(&texts, &vectors, &ids)
            .await
            .inspect_err(|e| error!(backend = self.vector_store.name(), error = %e, "add failed during load"))?;

        Ok(ids.len())
    }

    /// Answer `question` from the most similar stored records.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] for an empty question; embedding,
    /// store and language model errors are passed through unchanged.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::PipelineError("question must not be empty".to_string()));
        }

        let query_vector = self
            .embedding_provider
            .embed(question)
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during query"))?;

        let sources = self
            .vector_store
            .query(&query_vector, self.top_k)
            .await
            .inspect_err(|e| error!(backend = self.vector_store.name(), error = %e, "query failed"))?;

        if sources.is_empty() {
            info!("no stored records, skipping language model");
            return Ok(Answer {
                question: question.to_string(),
                answer: EMPTY_CORPUS_ANSWER.to_string(),
                sources,
            });
        }

        let prompt = build_prompt(question, &sources);
        let answer = self
            .language_model
            .complete(SYSTEM_PROMPT, &prompt)
            .await
            .inspect_err(|e| error!(model = self.language_model.name(), error = %e, "answer failed"))?;

        info!(source_count = sources.len(), "question answered");
        Ok(Answer { question: question.to_string(), answer, sources })
    }
}

/// Lay out the retrieved context and the question for the language model.
pub fn build_prompt(question: &str, sources: &[QueryMatch]) -> String {
    let mut prompt = String::from("Context:\n");
    for (i, source) in sources.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, source.text);
    }
    let _ = write!(prompt, "\nQuestion: {question}");
    prompt
}

/// Builder for constructing a [`RagService`].
#[derive(Default)]
pub struct RagServiceBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    language_model: Option<Arc<dyn LanguageModel>>,
    top_k: Option<usize>,
}

impl RagServiceBuilder {
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set an already initialized vector store.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Number of matches forwarded to the language model (default 3).
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Build the [`RagService`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a component is missing or `top_k` is zero.
    pub fn build(self) -> Result<RagService> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let language_model = self
            .language_model
            .ok_or_else(|| RagError::ConfigError("language_model is required".to_string()))?;
        let top_k = self.top_k.unwrap_or(3);
        if top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }

        Ok(RagService { embedding_provider, vector_store, language_model, top_k })
    }
}
