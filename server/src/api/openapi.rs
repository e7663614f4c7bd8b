//! OpenAPI document for the REST control plane

use axum::Json;
use axum::response::IntoResponse;
use utoipa::OpenApi;

use super::routes::{health, topics};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fanout",
        description = "In-memory pub/sub broker: topic lifecycle and observability. \
                       Real-time messaging runs over the WebSocket endpoint at /ws."
    ),
    paths(
        topics::create_topic,
        topics::delete_topic,
        topics::list_topics,
        health::health,
        health::stats,
    ),
    components(schemas(
        topics::CreateTopicRequest,
        topics::TopicStatusResponse,
        topics::ListTopicsResponse,
        health::HealthResponse,
        health::StatsResponse,
        health::TopicStatsBody,
    )),
    tags(
        (name = "topics", description = "Topic lifecycle"),
        (name = "status", description = "Health and statistics")
    )
)]
struct ApiDoc;

/// Serve the OpenAPI document as JSON
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_control_plane_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/topics"));
        assert!(paths.iter().any(|p| p.as_str() == "/topics/{name}"));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
        assert!(paths.iter().any(|p| p.as_str() == "/stats"));
    }
}
