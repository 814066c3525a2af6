//! JSON HTTP front end for the dispatcher.
//!
//! Each request carries the user id it acts for; the server holds that
//! user's [`UserGate`](crate::bot::UserGate) lock while the dispatcher runs,
//! so inputs from one user are handled in arrival order.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/messages` | `{user_id, text}`: search text or `/start`, `/help`, `/reload` |
//! | `POST` | `/callbacks` | `{user_id, data}`: button press (pagination, mode, exit) |
//! | `GET`  | `/search` | Stateless lookup: `?q=...&mode=...&page=...` |
//! | `POST` | `/reload` | Re-read the spreadsheet |
//! | `GET`  | `/health` | Health check with catalog status |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message text must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `catalog_unavailable` (503),
//! `ingestion_failed` (500), `internal` (500).

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use stock_lookup_core::paginate::total_pages;
use stock_lookup_core::search::search_active;
use stock_lookup_core::{render_page, CatalogHandle, Page, SearchMode, UserId};

use crate::bot::{Bot, BotError, Command, Reply};
use crate::config::Config;
use crate::ingest;

#[derive(Clone)]
struct AppState {
    bot: Arc<Bot>,
}

/// Loads the catalog and serves the API on `[server].bind` until Ctrl-C.
///
/// A failed initial load is logged and the server still starts; searches
/// answer with the "not loaded" reply until a `/reload` succeeds.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let config = Arc::new(config.clone());
    let normalizer = config.normalizer()?;
    let handle = Arc::new(CatalogHandle::new());

    {
        let config = config.clone();
        let handle = handle.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            ingest::load_catalog(&config, &handle, &normalizer)
        })
        .await?;
        if let Err(e) = loaded {
            tracing::warn!(error = %e, "starting without a catalog");
        }
    }

    let bot = Arc::new(Bot::new(config.clone(), handle)?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "stock lookup server listening");

    axum::serve(listener, app(bot))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

/// Builds the router around an existing dispatcher.
pub fn app(bot: Arc<Bot>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/messages", post(handle_message))
        .route("/callbacks", post(handle_callback))
        .route("/search", get(handle_search))
        .route("/reload", post(handle_reload))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { bot })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn catalog_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "catalog_unavailable",
        message: message.into(),
    }
}

fn ingestion_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "ingestion_failed",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<BotError> for AppError {
    fn from(e: BotError) -> Self {
        bad_request(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        tracing::error!(error = %e, "blocking task failed");
        internal(e.to_string())
    }
}

// ============ POST /messages ============

#[derive(Deserialize)]
struct MessageRequest {
    user_id: UserId,
    text: String,
}

async fn handle_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<Reply>, AppError> {
    let _turn = state.bot.gate().acquire(req.user_id).await;

    let reply = if Command::parse(&req.text) == Some(Command::Reload) {
        let bot = state.bot.clone();
        tokio::task::spawn_blocking(move || bot.handle_reload()).await?
    } else {
        state.bot.handle_message(req.user_id, &req.text)?
    };
    Ok(Json(reply))
}

// ============ POST /callbacks ============

#[derive(Deserialize)]
struct CallbackRequest {
    user_id: UserId,
    data: String,
}

async fn handle_callback(
    State(state): State<AppState>,
    Json(req): Json<CallbackRequest>,
) -> Result<Json<Reply>, AppError> {
    let _turn = state.bot.gate().acquire(req.user_id).await;
    let reply = state.bot.handle_callback(req.user_id, &req.data)?;
    Ok(Json(reply))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    mode: Option<String>,
    /// Zero-based page index.
    #[serde(default)]
    page: usize,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    mode: SearchMode,
    total: usize,
    total_pages: usize,
    /// Absent when nothing matched.
    page: Option<Page>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("q must not be empty"));
    }
    let mode: SearchMode = match params.mode.as_deref() {
        Some(m) => m.parse().map_err(bad_request)?,
        None => SearchMode::Combined,
    };

    let bot = &state.bot;
    let results = search_active(&params.q, bot.catalog(), bot.normalizer(), mode)
        .map_err(|e| catalog_unavailable(e.to_string()))?;

    let page_size = bot.sessions().page_size();
    let page = if results.is_empty() {
        None
    } else {
        Some(
            render_page(results.records(), params.page, page_size)
                .map_err(|e| bad_request(e.to_string()))?,
        )
    };

    Ok(Json(SearchResponse {
        query: params.q,
        mode,
        total: results.len(),
        total_pages: total_pages(results.len(), page_size),
        page,
    }))
}

// ============ POST /reload ============

#[derive(Serialize)]
struct ReloadResponse {
    version: u64,
    records: usize,
    in_stock: usize,
    skipped_rows: usize,
}

async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let bot = state.bot.clone();
    let catalog = tokio::task::spawn_blocking(move || bot.reload())
        .await?
        .map_err(|e| ingestion_failed(e.to_string()))?;

    Ok(Json(ReloadResponse {
        version: catalog.version(),
        records: catalog.len(),
        in_stock: catalog.in_stock_count(),
        skipped_rows: catalog.skipped_rows(),
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    catalog_loaded: bool,
    catalog_version: Option<u64>,
    catalog_records: usize,
    /// Analyzer in use: a Snowball language or `"none"`.
    lemmatizer: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let handle = state.bot.catalog();
    let snapshot = handle.active_snapshot().ok();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        catalog_loaded: handle.is_loaded(),
        catalog_version: snapshot.as_ref().map(|c| c.version()),
        catalog_records: snapshot.as_ref().map_or(0, |c| c.len()),
        lemmatizer: state.bot.normalizer().lemmatizer_name().to_string(),
    })
}
