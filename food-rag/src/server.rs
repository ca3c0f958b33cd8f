//! HTTP surface for loading the dataset and asking questions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::dataset::load_food_dataset;
use crate::error::RagError;
use crate::pipeline::RagService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RagService>,
    /// Dataset loaded by `POST /api/load`.
    pub data_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 3000 }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadParams {
    /// Re-embed every item, not just the new ones.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

struct ApiError(RagError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RagError::PipelineError(_) => StatusCode::BAD_REQUEST,
            // The embedder and the store disagree; the request itself is fine.
            RagError::DimensionMismatch { .. }
            | RagError::DatasetError(_)
            | RagError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        warn!(%status, error = %self.0, "request failed");
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        Self(e)
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/documents", get(list_documents))
        .route("/api/load", post(load_data))
        .route("/api/ask", post(ask))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured listener. `host` may be a name such as `localhost`.
pub async fn bind_listener(config: &ServerConfig) -> anyhow::Result<TcpListener> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state);
    let listener = bind_listener(&config).await?;
    info!("food-rag listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "food-rag",
        "backend": state.service.vector_store().name(),
    }))
}

async fn list_documents(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let ids = state.service.vector_store().get_existing_ids().await?;
    Ok(Json(json!({ "count": ids.len(), "ids": ids })))
}

async fn load_data(
    State(state): State<AppState>,
    Query(params): Query<LoadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let items = load_food_dataset(&state.data_path).await?;
    let report = if params.force {
        state.service.reload_data(&items).await?
    } else {
        state.service.load_data(&items).await?
    };
    Ok(Json(report))
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let answer = state.service.ask(&request.question).await?;
    Ok(Json(answer))
}
