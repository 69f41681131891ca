//! Node Endpoints
//!
//! Thin handlers over `NodeService`: parse the request, call exactly one
//! engine operation, serialize its result.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /api/node` - List every node with the maximum depth
//! - `POST /api/node` - Create a node
//! - `GET /api/node/:id` - Get a node with its direct children
//! - `PATCH /api/node/:id` - Rename a node
//! - `DELETE /api/node/:id` - Delete a node and its subtree
//! - `PATCH /api/node/:id/reattach` - Move a node under a new parent
//! - `PATCH /api/node/:id/reorder` - Move a node to a given parent and slot
//! - `PATCH /api/node/:id/shift` - Swap a node with its neighbour
//! - `GET /api/tree` - The assembled tree
//! - `GET /api/events` - Server-sent tree events

use arbor_core::{
    CreateNodeParams, DeleteResult, Node, NodeId, NodeListing, NodeWithChildren, ReorderResult,
    ShiftDirection, TreeView,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, patch},
    Router,
};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, time::Duration};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};

use crate::{AppState, HttpError};

type ApiResult<T> = Result<T, HttpError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeInput {
    pub parent_node_id: Option<NodeId>,
    pub title: Option<String>,
    pub ordering: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RenameNodeInput {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReattachNodeInput {
    pub parent_node_id: Option<NodeId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderNodeInput {
    pub parent_node_id: Option<NodeId>,
    pub ordering: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ShiftNodeInput {
    pub direction: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

fn node_id(path: Result<Path<NodeId>, PathRejection>) -> ApiResult<NodeId> {
    let Path(id) = path?;
    Ok(id)
}

fn body<T>(json: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    let Json(input) = json?;
    Ok(input)
}

/// Health check endpoint
///
/// ```bash
/// curl http://localhost:3001/api/health
/// ```
async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_nodes(State(state): State<AppState>) -> ApiResult<Json<NodeListing>> {
    Ok(Json(state.node_service.list_nodes().await?))
}

/// Create a node
///
/// ```bash
/// curl -X POST http://localhost:3001/api/node \
///   -H "Content-Type: application/json" \
///   -d '{"parentNodeId": 1, "title": "Spruce"}'
/// ```
async fn create_node(
    State(state): State<AppState>,
    json: Result<Json<CreateNodeInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    let input = body(json)?;
    let (Some(parent_id), Some(title)) = (input.parent_node_id, input.title) else {
        return Err(HttpError::invalid_argument("Missing title or parentNodeId."));
    };

    let mut params = CreateNodeParams::new(parent_id, title);
    params.ordering = input.ordering;

    let node = state.node_service.create_node(params).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn get_node(
    State(state): State<AppState>,
    path: Result<Path<NodeId>, PathRejection>,
) -> ApiResult<Json<NodeWithChildren>> {
    let id = node_id(path)?;
    Ok(Json(state.node_service.get_node(id).await?))
}

/// Rename a node
///
/// ```bash
/// curl -X PATCH http://localhost:3001/api/node/2 \
///   -H "Content-Type: application/json" \
///   -d '{"title": "Fir"}'
/// ```
async fn rename_node(
    State(state): State<AppState>,
    path: Result<Path<NodeId>, PathRejection>,
    json: Result<Json<RenameNodeInput>, JsonRejection>,
) -> ApiResult<Json<Node>> {
    let id = node_id(path)?;
    let title = body(json)?.title.unwrap_or_default();
    Ok(Json(state.node_service.rename_node(id, &title).await?))
}

async fn delete_node(
    State(state): State<AppState>,
    path: Result<Path<NodeId>, PathRejection>,
) -> ApiResult<Json<DeleteResult>> {
    let id = node_id(path)?;
    Ok(Json(state.node_service.delete_node(id).await?))
}

async fn reattach_node(
    State(state): State<AppState>,
    path: Result<Path<NodeId>, PathRejection>,
    json: Result<Json<ReattachNodeInput>, JsonRejection>,
) -> ApiResult<Json<Node>> {
    let id = node_id(path)?;
    let input = body(json)?;
    Ok(Json(
        state
            .node_service
            .reattach_node(id, input.parent_node_id)
            .await?,
    ))
}

/// Move a node to `(parentNodeId, ordering)`, swapping with any occupant
///
/// ```bash
/// curl -X PATCH http://localhost:3001/api/node/5/reorder \
///   -H "Content-Type: application/json" \
///   -d '{"parentNodeId": 1, "ordering": 2}'
/// ```
async fn reorder_node(
    State(state): State<AppState>,
    path: Result<Path<NodeId>, PathRejection>,
    json: Result<Json<ReorderNodeInput>, JsonRejection>,
) -> ApiResult<Json<ReorderResult>> {
    let id = node_id(path)?;
    let input = body(json)?;
    let ordering = input
        .ordering
        .ok_or_else(|| HttpError::invalid_argument("Missing ordering."))?;

    Ok(Json(
        state
            .node_service
            .reorder_node(id, input.parent_node_id, ordering)
            .await?,
    ))
}

/// Swap a node with its previous (`-1`) or next (`1`) sibling
async fn shift_node(
    State(state): State<AppState>,
    path: Result<Path<NodeId>, PathRejection>,
    json: Result<Json<ShiftNodeInput>, JsonRejection>,
) -> ApiResult<Json<Vec<Node>>> {
    let id = node_id(path)?;
    let direction = body(json)?
        .direction
        .ok_or_else(|| HttpError::invalid_argument("Node move direction not found"))?;
    let direction = ShiftDirection::try_from(direction)
        .map_err(|err| HttpError::invalid_argument(err.to_string()))?;

    Ok(Json(state.node_service.shift_node(id, direction).await?))
}

async fn get_tree(State(state): State<AppState>) -> ApiResult<Json<Option<TreeView>>> {
    Ok(Json(state.node_service.tree().await?))
}

/// Stream of committed tree events
///
/// Each message is one JSON-encoded `TreeEvent`, named after its type
/// (`node:created`, `nodes:reordered`, ...).
///
/// ```javascript
/// const events = new EventSource("http://localhost:3001/api/events");
/// events.addEventListener("node:deleted", (e) => console.log(JSON.parse(e.data)));
/// ```
async fn tree_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("SSE client connected");
    let rx = state.node_service.subscribe_to_events();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
            Err(e) => {
                tracing::error!("Failed to serialize tree event: {}", e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!("SSE client lagged by {} events", n);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/node", get(list_nodes).post(create_node))
        .route(
            "/api/node/:id",
            get(get_node).patch(rename_node).delete(delete_node),
        )
        .route("/api/node/:id/reattach", patch(reattach_node))
        .route("/api/node/:id/reorder", patch(reorder_node))
        .route("/api/node/:id/shift", patch(shift_node))
        .route("/api/tree", get(get_tree))
        .route("/api/events", get(tree_events))
        .with_state(state)
}
