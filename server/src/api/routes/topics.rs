//! Topic lifecycle endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::broker::Broker;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 100, message = "Topic name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopicStatusResponse {
    pub status: String,
    pub topic: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListTopicsResponse {
    pub topics: Vec<String>,
}

/// Shared state for topic endpoints
#[derive(Clone)]
pub struct TopicsApiState {
    pub broker: Arc<Broker>,
}

/// Build topic lifecycle routes
pub fn routes(broker: Arc<Broker>) -> Router<()> {
    let state = TopicsApiState { broker };

    Router::new()
        .route("/", get(list_topics).post(create_topic))
        .route("/{name}", axum::routing::delete(delete_topic))
        .with_state(state)
}

/// Create a new topic
#[utoipa::path(
    post,
    path = "/topics",
    tag = "topics",
    request_body = CreateTopicRequest,
    responses(
        (status = 201, description = "Topic created", body = TopicStatusResponse),
        (status = 400, description = "Invalid topic name"),
        (status = 409, description = "Topic already exists")
    )
)]
pub async fn create_topic(
    State(state): State<TopicsApiState>,
    ValidatedJson(req): ValidatedJson<CreateTopicRequest>,
) -> Result<(StatusCode, Json<TopicStatusResponse>), ApiError> {
    state.broker.create_topic(&req.name)?;
    Ok((
        StatusCode::CREATED,
        Json(TopicStatusResponse {
            status: "created".to_string(),
            topic: req.name,
        }),
    ))
}

/// Delete a topic, force-disconnecting its subscribers
#[utoipa::path(
    delete,
    path = "/topics/{name}",
    tag = "topics",
    params(("name" = String, Path, description = "Topic name")),
    responses(
        (status = 200, description = "Topic deleted", body = TopicStatusResponse),
        (status = 404, description = "Topic not found")
    )
)]
pub async fn delete_topic(
    State(state): State<TopicsApiState>,
    Path(name): Path<String>,
) -> Result<Json<TopicStatusResponse>, ApiError> {
    state.broker.delete_topic(&name)?;
    Ok(Json(TopicStatusResponse {
        status: "deleted".to_string(),
        topic: name,
    }))
}

/// List current topics
#[utoipa::path(
    get,
    path = "/topics",
    tag = "topics",
    responses(
        (status = 200, description = "Current topic names", body = ListTopicsResponse)
    )
)]
pub async fn list_topics(State(state): State<TopicsApiState>) -> Json<ListTopicsResponse> {
    Json(ListTopicsResponse {
        topics: state.broker.list_topics(),
    })
}
