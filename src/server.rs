use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agents::types::AnalysisRequest;
use crate::agents::INTERNAL_API_KEY_HEADER;
use crate::config::ServerConfig;
use crate::decision::types::{Ack, FinalDecision};
use crate::error::CycleError;
use crate::orchestrator::Orchestrator;
use crate::store::{Receipt, ReceiptStore};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    store: ReceiptStore,
    api_key: String,
}

pub async fn run(
    orchestrator: Arc<Orchestrator>,
    store: ReceiptStore,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let state = AppState {
        orchestrator,
        store,
        api_key: config.internal_api_key,
    };

    let protected = Router::new()
        .route("/trigger_decision_cycle_sync", post(trigger_decision_cycle_sync))
        .route("/trigger_decision_cycle", post(trigger_decision_cycle))
        .route("/receipts", get(list_receipts))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let app = Router::new()
        .merge(protected)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("🌐 Orchestrator listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Every non-health endpoint requires the shared internal key. Absence or
/// mismatch is a 401, before any body parsing happens.
async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(INTERNAL_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided != Some(state.api_key.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "invalid or missing internal API key" })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn trigger_decision_cycle_sync(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<FinalDecision>, CycleError> {
    let decision = state.orchestrator.decide_sync(request).await?;
    Ok(Json(decision))
}

async fn trigger_decision_cycle(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<(StatusCode, Json<Ack>), CycleError> {
    let ack = state.orchestrator.decide_async(request)?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

#[derive(Debug, Deserialize)]
struct ReceiptsQuery {
    asset: Option<String>,
    limit: Option<i64>,
}

async fn list_receipts(
    State(state): State<AppState>,
    Query(params): Query<ReceiptsQuery>,
) -> Result<Json<Vec<Receipt>>, CycleError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let receipts = match params.asset {
        Some(asset) => state.store.for_asset(&asset, limit).await?,
        None => state.store.recent(limit).await?,
    };
    Ok(Json(receipts))
}
