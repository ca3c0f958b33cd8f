use std::sync::Arc;

use food_rag::{
    AppConfig, AppState, OpenAIChatModel, OpenAIEmbeddingProvider, RagService, ServerConfig,
    open_vector_store, run_server,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let embedder = OpenAIEmbeddingProvider::new(config.openai_api_key.clone())?
        .with_base_url(config.openai_base_url.clone())
        .with_model(config.embedding_model.clone())
        .with_dimensions(config.embedding_dimensions);
    let chat = OpenAIChatModel::new(config.openai_api_key.clone(), config.chat_model.clone())?
        .with_base_url(config.openai_base_url.clone());

    // Refuse to serve anything until the store is ready.
    let store = open_vector_store(&config).await?;

    let service = RagService::builder()
        .embedding_provider(Arc::new(embedder))
        .vector_store(store.clone())
        .language_model(Arc::new(chat))
        .top_k(config.top_k)
        .build()?;

    let state = AppState { service: Arc::new(service), data_path: config.data_path.clone() };
    let result = run_server(ServerConfig { host: config.host.clone(), port: config.port }, state).await;

    store.close().await?;
    result
}
