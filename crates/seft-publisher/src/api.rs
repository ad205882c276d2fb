//! Operator HTTP API
//!
//! - `GET /healthcheck`: health document, 200 when `OK`, 503 when `FAILED`
//! - `GET /recent`: coordinator state and the most recent cycle reports
//! - `POST /trigger`: request a cycle, answered with 202

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::health::HealthReporter;
use crate::pipeline::{CycleCoordinator, CycleReport, CycleState};
use crate::scheduler::TriggerHandle;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<CycleCoordinator>,
    pub health: HealthReporter,
    pub trigger: TriggerHandle,
}

#[derive(Debug, Serialize)]
pub struct RecentCycles {
    pub state: CycleState,
    pub cycles: Vec<CycleReport>,
}

#[derive(Debug, Serialize)]
struct TriggerAccepted {
    accepted: bool,
    state: CycleState,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/recent", get(recent))
        .route("/trigger", post(trigger))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        )
}

async fn healthcheck(State(state): State<AppState>) -> Response {
    let report = state.health.check().await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

async fn recent(State(state): State<AppState>) -> Json<RecentCycles> {
    Json(RecentCycles {
        state: state.coordinator.state(),
        cycles: state.coordinator.recent().await,
    })
}

async fn trigger(State(state): State<AppState>) -> impl IntoResponse {
    info!("Cycle requested through operator API");
    state.trigger.fire();
    (
        StatusCode::ACCEPTED,
        Json(TriggerAccepted {
            accepted: true,
            state: state.coordinator.state(),
        }),
    )
}
