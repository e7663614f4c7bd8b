//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::openapi;
use super::routes::{health, stream, topics};
use crate::broker::Broker;
use crate::core::CoreApp;
use crate::core::constants::APP_NAME;

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Assemble the full router: control plane, observability, stream
    fn router(broker: Arc<Broker>, started_at: Instant) -> Router<()> {
        Router::new()
            .route("/", get(root))
            .route("/api/openapi.json", get(openapi::openapi_json))
            .merge(health::routes(broker.clone(), started_at))
            .merge(stream::routes(broker.clone()))
            .nest("/topics", topics::routes(broker))
            .fallback(handle_404)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    pub async fn start(self) -> Result<()> {
        let Self { app } = self;

        let shutdown = app.shutdown.clone();
        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);

        let router = Self::router(app.broker.clone(), app.started_at);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(())
    }
}

/// Service identity at the root path
async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": APP_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "not_found",
            "code": "ROUTE_NOT_FOUND",
            "message": "No such route"
        })),
    )
}
