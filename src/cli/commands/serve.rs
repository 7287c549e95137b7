//! HTTP search API.
//!
//! Exposes the queued, direct, keyword and exact searches plus best-video
//! lookup. The index store is opened once at startup and released when the
//! server shuts down on Ctrl+C.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::DaesaError;
use crate::history::SearchHistory;
use crate::retrieval::{validate_query, youtube_link, QueryResult};
use crate::service::{SearchMode, SearchService};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// The only search type accepted by the direct endpoint.
const DIRECT_SEARCH_TYPE: &str = "vector_no_celery";

/// Shared application state.
pub struct AppState {
    service: SearchService,
}

impl AppState {
    pub fn new(service: SearchService) -> Self {
        Self { service }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Serve, &settings)?;

    let service = SearchService::from_settings(&settings)?
        .with_history(SearchHistory::new(settings.history_dir()));
    let state = Arc::new(AppState::new(service));

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Daesa Search API");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Status", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Search", "POST /search");
    Output::kv("Direct", "POST /search/direct");
    Output::kv("Best video", "POST /best_video");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    state.service.close()?;
    Ok(())
}

/// Build the API routes over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/search/direct", post(search_direct))
        .route("/best_video", post(best_video))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_type")]
    search_type: String,
}

fn default_search_type() -> String {
    SearchMode::Semantic.as_str().to_string()
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub timestamp: String,
    pub question: String,
    pub results: Vec<QueryResult>,
}

#[derive(Deserialize)]
struct BestVideoRequest {
    query: String,
}

#[derive(Serialize)]
struct BestVideoResponse {
    video_id: String,
    youtube_link: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: error.into() })).into_response()
}

/// HTTP status for a failed search.
fn error_status(e: &DaesaError) -> StatusCode {
    match e {
        DaesaError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
        DaesaError::WaitTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Shape a search outcome into the response every search endpoint returns.
fn search_response(query: &str, outcome: crate::error::Result<Vec<QueryResult>>) -> Response {
    match outcome {
        Ok(results) if results.is_empty() => {
            error_response(StatusCode::NOT_FOUND, "No results found")
        }
        Ok(results) => Json(SearchResponse {
            timestamp: chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
            question: query.to_string(),
            results,
        })
        .into_response(),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                error!("Search failed: {}", e);
            }
            error_response(status, format!("Search failed: {}", e))
        }
    }
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "running",
        "message": "Daesa transcript search API is running",
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ready = state.service.is_ready().await;
    Json(serde_json::json!({
        "status": if ready { "healthy" } else { "degraded" },
        "index_store_ready": ready,
    }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Response {
    if req.search_type == DIRECT_SEARCH_TYPE {
        return search_direct(State(state), Json(req)).await;
    }

    let started = Instant::now();
    let mode: SearchMode = match req.search_type.parse() {
        Ok(mode) => mode,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let outcome = state.service.search(mode, &req.query).await;
    info!(
        "POST /search ({}) took {:.2}s",
        mode.as_str(),
        started.elapsed().as_secs_f64()
    );
    search_response(&req.query, outcome)
}

async fn search_direct(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Response {
    if req.search_type != DIRECT_SEARCH_TYPE {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid search type: {}", req.search_type),
        );
    }

    let started = Instant::now();
    let outcome = state.service.search_direct(&req.query).await;
    info!(
        "POST /search/direct took {:.2}s",
        started.elapsed().as_secs_f64()
    );
    search_response(&req.query, outcome)
}

async fn best_video(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BestVideoRequest>,
) -> Response {
    if let Err(e) = validate_query(&req.query) {
        return error_response(error_status(&e), e.to_string());
    }
    match state.service.best_video(&req.query).await {
        Some(video_id) => Json(BestVideoResponse {
            youtube_link: youtube_link(&video_id, 0.0),
            video_id,
        })
        .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No matching video"),
    }
}
