use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use drip_core::component::{ComponentKind, ComponentSchema};
use drip_core::execution::{ExecutionId, ExecutionRecord, WorkflowId};
use drip_core::graph::Graph;
use drip_core::store::{AnalyticsSink, ExecutionStore};

use super::error::ApiError;
use super::server::AppState;
use crate::workflows::save_workflow_graph;

const DEFAULT_EXECUTION_LIMIT: i64 = 50;
const MAX_EXECUTION_LIMIT: i64 = 500;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn component_kind(segment: &str) -> Result<ComponentKind, ApiError> {
    match segment {
        "actions" => Ok(ComponentKind::Action),
        "logic" => Ok(ComponentKind::Logic),
        "triggers" => Ok(ComponentKind::Trigger),
        _ => Err(ApiError::not_found("Component type not found")),
    }
}

pub async fn list_components(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<ComponentSchema>>, ApiError> {
    let kind = component_kind(&kind)?;
    Ok(Json(
        state.registry.schemas(kind).into_iter().cloned().collect(),
    ))
}

pub async fn get_component(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Json<ComponentSchema>, ApiError> {
    let kind = component_kind(&kind)?;
    state
        .registry
        .schema(kind, &name)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.label())))
}

fn checked_graph(state: &AppState, body: &str) -> Result<Graph, ApiError> {
    let graph = Graph::from_json(body)?;
    let violations = graph.violations(&state.registry);
    if violations.is_empty() {
        Ok(graph)
    } else {
        Err(ApiError::invalid_graph(violations))
    }
}

pub async fn validate_graph(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    checked_graph(&state, &body)?;
    Ok(Json(json!({ "valid": true })))
}

pub async fn save_graph(
    State(state): State<AppState>,
    Path(workflow_id): Path<WorkflowId>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let graph = checked_graph(&state, &body)?;
    let triggers =
        save_workflow_graph(state.store.as_ref(), &state.registry, workflow_id, &graph).await?;

    Ok(Json(json!({ "workflow_id": workflow_id, "triggers": triggers })))
}

/// A tracked event.
#[derive(Debug, Deserialize)]
pub struct TrackEvent {
    pub site_id: i64,
    pub event: String,
    /// Event properties, seeded into started executions.
    #[serde(default)]
    pub data: Map<String, Value>,
}

pub async fn track_event(
    State(state): State<AppState>,
    Json(request): Json<TrackEvent>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let context = Value::Object(request.data);

    if let Err(e) = state
        .analytics
        .record(request.site_id, &request.event, &context)
        .await
    {
        tracing::warn!(site_id = request.site_id, error = %e, "Failed to record event");
    }

    let executions = state
        .events
        .dispatch_event(request.site_id, &request.event, &context)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "executions": executions })),
    ))
}

pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    state
        .store
        .get_execution(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Execution not found"))
}

#[derive(Debug, Deserialize)]
pub struct ExecutionQuery {
    pub limit: Option<i64>,
}

pub async fn list_executions(
    State(state): State<AppState>,
    Path(workflow_id): Path<WorkflowId>,
    Query(query): Query<ExecutionQuery>,
) -> Result<Json<Vec<ExecutionRecord>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EXECUTION_LIMIT)
        .clamp(1, MAX_EXECUTION_LIMIT);

    Ok(Json(
        state.store.list_executions(workflow_id, limit).await?,
    ))
}
