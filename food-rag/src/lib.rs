//! # food-rag
//!
//! Ask natural-language questions about a small food dataset. Food
//! descriptions are embedded, stored in a vector store, and the closest
//! matches to a question are handed to a language model as context.
//!
//! ```text
//! FoodItem -> EmbeddingProvider -> VectorStore
//!                                      |
//! question -> EmbeddingProvider -> query (k) -> LanguageModel -> Answer
//! ```
//!
//! ## Vector stores
//!
//! | Backend | Type | Notes |
//! |---|---|---|
//! | in-memory | [`InMemoryVectorStore`] | linear scan, optional JSON snapshot |
//! | local-server | `qdrant::QdrantVectorStore` | feature `qdrant` (default) |
//! | remote-managed | [`UpstashVectorStore`] | falls back to in-memory without credentials |
//!
//! Network-backed stores retry failed calls via [`RetryPolicy`].

pub mod backend;
pub mod config;
pub mod dataset;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod llm;
pub mod openai;
pub mod pipeline;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod retry;
pub mod server;
pub mod similarity;
pub mod upstash;
pub mod vectorstore;

pub use backend::{BackendSelection, open_vector_store, select_backend};
pub use config::{AppConfig, AppConfigBuilder, BackendKind};
pub use dataset::{FoodItem, load_food_dataset, parse_food_dataset};
pub use document::{DocumentRecord, QueryMatch};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorStore;
pub use llm::{LanguageModel, OpenAIChatModel};
pub use openai::OpenAIEmbeddingProvider;
pub use pipeline::{Answer, LoadReport, RagService, RagServiceBuilder};
pub use retry::RetryPolicy;
pub use server::{AppState, ServerConfig, app_router, bind_listener, run_server};
pub use similarity::{cosine_similarity, distance_from_similarity};
pub use upstash::UpstashVectorStore;
pub use vectorstore::VectorStore;
