//! HTTP front-end over `faas_scheduler::Scheduler` (§4.8).
//!
//! A single `AppState`, handlers returning a flat `Response`, a
//! `GatewayError` for the two failure outcomes, `CorsLayer::permissive`,
//! and the axum 0.7 `State` extractor pattern.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use faas_common::{Clock, InvokeOutcome, Runtime, Strategy};
use faas_scheduler::{Scheduler, StatsSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState<C: Clock, R: Runtime> {
    pub scheduler: Arc<Scheduler<C, R>>,
}

pub fn create_app<C: Clock + 'static, R: Runtime + 'static>(state: AppState<C, R>) -> Router {
    Router::new()
        .route("/invoke/:function_id", post(invoke_handler::<C, R>))
        .route("/stats", get(stats_handler::<C, R>))
        .route("/stats/reset", post(reset_stats_handler::<C, R>))
        .route("/set_strategy", post(set_strategy_handler::<C, R>))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize, Default)]
struct InvokeRequest {
    exec_time_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct InvokeResponse {
    function: String,
    container_id: String,
    execution_time_ms: u128,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Wraps the two failure outcomes `Scheduler::invoke` can report so the
/// handler body stays a flat match (spec §4.8: both map to `500`),
/// following `faas-common::FaasError`'s / `faas-orchestrator::Error`'s
/// shape of one flat `thiserror` enum per crate boundary.
#[derive(Debug, Error)]
enum GatewayError {
    #[error("cold start failed: {0}")]
    ColdStart(String),
    #[error("invocation failed: {0}")]
    Invocation(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn invoke_handler<C: Clock + 'static, R: Runtime + 'static>(
    State(state): State<AppState<C, R>>,
    Path(function_id): Path<String>,
    body: axum::body::Bytes,
) -> Response {
    let parsed: InvokeRequest = if body.is_empty() {
        InvokeRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_default()
    };
    let exec_time = Duration::from_millis(parsed.exec_time_ms.unwrap_or(0));

    match state.scheduler.invoke(&function_id, exec_time).await {
        InvokeOutcome::Executed {
            container_id,
            elapsed,
        } => Json(InvokeResponse {
            function: function_id,
            container_id,
            execution_time_ms: elapsed.as_millis(),
        })
        .into_response(),
        InvokeOutcome::Queued => {
            (StatusCode::ACCEPTED, Json(serde_json::json!({ "message": "queued" }))).into_response()
        }
        InvokeOutcome::ColdStartFailed(reason) => {
            warn!(function_id, reason, "cold start failed");
            GatewayError::ColdStart(reason).into_response()
        }
        InvokeOutcome::InvocationFailed(reason) => {
            warn!(function_id, reason, "invocation failed");
            GatewayError::Invocation(reason).into_response()
        }
    }
}

async fn stats_handler<C: Clock + 'static, R: Runtime + 'static>(
    State(state): State<AppState<C, R>>,
) -> Json<StatsSnapshot> {
    Json(state.scheduler.stats_snapshot().await)
}

async fn reset_stats_handler<C: Clock + 'static, R: Runtime + 'static>(
    State(state): State<AppState<C, R>>,
) -> StatusCode {
    state.scheduler.stats().reset().await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct SetStrategyRequest {
    strategy: String,
}

async fn set_strategy_handler<C: Clock + 'static, R: Runtime + 'static>(
    State(state): State<AppState<C, R>>,
    Json(req): Json<SetStrategyRequest>,
) -> Response {
    match req.strategy.parse::<Strategy>() {
        Ok(strategy) => {
            info!(%strategy, "strategy changed");
            state.scheduler.set_strategy(strategy).await;
            StatusCode::OK.into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests;
