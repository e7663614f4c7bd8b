//! Health and stats endpoints

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::broker::Broker;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub uptime_sec: u64,
    pub topics: usize,
    pub subscribers: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopicStatsBody {
    pub messages: u64,
    pub subscribers: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub topics: BTreeMap<String, TopicStatsBody>,
}

/// Shared state for observability endpoints
#[derive(Clone)]
pub struct StatusApiState {
    pub broker: Arc<Broker>,
    pub started_at: Instant,
}

/// Build health/stats routes
pub fn routes(broker: Arc<Broker>, started_at: Instant) -> Router<()> {
    let state = StatusApiState { broker, started_at };

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

/// Health snapshot with process uptime
#[utoipa::path(
    get,
    path = "/health",
    tag = "status",
    responses(
        (status = 200, description = "Broker is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<StatusApiState>) -> Json<HealthResponse> {
    let snapshot = state.broker.health_stats();
    Json(HealthResponse {
        uptime_sec: state.started_at.elapsed().as_secs(),
        topics: snapshot.topics,
        subscribers: snapshot.subscribers,
    })
}

/// Per-topic message and subscriber counts
#[utoipa::path(
    get,
    path = "/stats",
    tag = "status",
    responses(
        (status = 200, description = "Per-topic statistics", body = StatsResponse)
    )
)]
pub async fn stats(State(state): State<StatusApiState>) -> Json<StatsResponse> {
    let topics = state
        .broker
        .full_stats()
        .into_iter()
        .map(|(name, s)| {
            (
                name,
                TopicStatsBody {
                    messages: s.messages,
                    subscribers: s.subscribers,
                },
            )
        })
        .collect();
    Json(StatsResponse { topics })
}
