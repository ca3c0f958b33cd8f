#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use food_rag::{
    EmbeddingProvider, FoodItem, InMemoryVectorStore, LanguageModel, RagError, RagService,
    VectorStore,
};

pub const KEYWORDS: [&str; 4] = ["soup", "noodle", "dessert", "rice"];

/// Embeds text as keyword presence flags, so rankings are predictable.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> food_rag::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = text.to_lowercase();
        Ok(KEYWORDS.iter().map(|k| if text.contains(k) { 1.0 } else { 0.0 }).collect())
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }
}

/// Records every prompt and answers with a fixed string, or fails.
#[derive(Default)]
pub struct ScriptedModel {
    pub prompts: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl ScriptedModel {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, system: &str, user: &str) -> food_rag::Result<String> {
        self.prompts.lock().unwrap().push((system.to_string(), user.to_string()));
        if self.fail {
            return Err(RagError::LlmError {
                provider: "scripted".into(),
                message: "model unavailable".into(),
            });
        }
        Ok("Pho is the noodle soup.".to_string())
    }
}

pub fn food(id: &str, text: &str, region: &str, kind: &str) -> FoodItem {
    FoodItem {
        id: id.to_string(),
        text: text.to_string(),
        region: region.to_string(),
        kind: kind.to_string(),
    }
}

pub fn sample_foods() -> Vec<FoodItem> {
    vec![
        food("1", "Pho is a fragrant noodle soup with beef.", "Vietnam", "Soup"),
        food("2", "Mango sticky rice is a sweet treat.", "Thailand", "Dessert"),
        food("3", "Tom yum is a hot and sour broth.", "Thailand", "Soup"),
    ]
}

pub struct Harness {
    pub service: RagService,
    pub embedder: Arc<KeywordEmbedder>,
    pub model: Arc<ScriptedModel>,
    pub store: Arc<InMemoryVectorStore>,
}

pub async fn harness(model: ScriptedModel, top_k: usize) -> Harness {
    let embedder = Arc::new(KeywordEmbedder::default());
    let model = Arc::new(model);
    let store = Arc::new(InMemoryVectorStore::new());
    store.initialize().await.unwrap();

    let service = RagService::builder()
        .embedding_provider(embedder.clone())
        .vector_store(store.clone())
        .language_model(model.clone())
        .top_k(top_k)
        .build()
        .unwrap();

    Harness { service, embedder, model, store }
}
