// SPDX-License-Identifier: MIT

//! HTTP API over the workflow runtime

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::adk::error::{WaypointError, WorkflowError};
use crate::waypoint::nodes::PresetPrompter;
use crate::waypoint::runtime::Runtime;
use crate::waypoint::workflow::graph::WorkflowEvent;
use crate::waypoint::workflow::presets;

#[derive(Clone)]
pub struct AppState {
    runtime: Arc<Runtime>,
}

/// Error body `{ "error": ... }` with a status derived from the error kind
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<WaypointError> for ApiError {
    fn from(err: WaypointError) -> Self {
        let status = match &err {
            WaypointError::Workflow(WorkflowError::FileNotFound(_)) => StatusCode::NOT_FOUND,
            WaypointError::Workflow(WorkflowError::Unroutable { .. })
            | WaypointError::Workflow(WorkflowError::NodeFailed { .. })
            | WaypointError::Workflow(WorkflowError::MaxStepsExceeded(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WaypointError::Workflow(_) | WaypointError::Yaml(_) | WaypointError::Config(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        WaypointError::from(err).into()
    }
}

pub fn router(runtime: Arc<Runtime>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/executions", post(create_execution))
        .route("/api/executions/stream", post(stream_execution))
        .with_state(AppState { runtime })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(runtime: Arc<Runtime>, port: u16) -> crate::adk::error::Result<()> {
    let app = router(runtime);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.runtime.has_model(),
        "tools": state.runtime.tools().names().await,
    }))
}

async fn list_workflows(State(state): State<AppState>) -> Json<Value> {
    let workflows: Vec<Value> = state
        .runtime
        .workflow_ids()
        .into_iter()
        .map(|id| match state.runtime.definition(&id) {
            Ok(def) => json!({
                "id": id,
                "name": def.name,
                "description": def.description,
                "builtin": presets::source(&id).is_some(),
            }),
            Err(e) => json!({ "id": id, "error": e.to_string() }),
        })
        .collect();
    Json(json!(workflows))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let definition = state.runtime.definition(&id)?;
    let mermaid = match state.runtime.diagram(&id, None) {
        Ok(mermaid) => Some(mermaid),
        Err(e) => {
            log::warn!("Workflow '{}' does not build: {}", id, e);
            None
        }
    };
    Ok(Json(json!({
        "id": id,
        "definition": definition,
        "mermaid": mermaid,
    })))
}

#[derive(Deserialize)]
struct ExecutionRequest {
    #[serde(default = "default_workflow")]
    workflow_id: String,
    input: String,
    /// Values for fields the extraction step may leave empty
    #[serde(default)]
    fields: HashMap<String, String>,
}

fn default_workflow() -> String {
    presets::ASSISTANT.to_string()
}

async fn create_execution(
    State(state): State<AppState>,
    Json(payload): Json<ExecutionRequest>,
) -> Result<Json<Value>, ApiError> {
    let prompter = Arc::new(PresetPrompter::new(payload.fields));
    let graph = state.runtime.build(&payload.workflow_id, prompter)?;

    let outcome = graph.invoke(&payload.input).await?;
    let artifact = outcome.artifact();
    Ok(Json(json!({
        "status": "completed",
        "run_id": outcome.run_id,
        "workflow": outcome.workflow,
        "trail": outcome.trail,
        "elapsed_ms": outcome.elapsed_ms,
        "artifact": artifact,
        "state": outcome.state,
    })))
}

async fn stream_execution(
    State(state): State<AppState>,
    Json(payload): Json<ExecutionRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<WorkflowEvent>(100);
    let span = tracing::info_span!("execution", workflow = %payload.workflow_id);

    let run = async move {
        log::info!("Starting streaming execution for workflow: {}", payload.workflow_id);

        let prompter = Arc::new(PresetPrompter::new(payload.fields));
        let graph = match state.runtime.build(&payload.workflow_id, prompter) {
            Ok(graph) => graph,
            Err(e) => {
                log::error!("Failed to build workflow: {}", e);
                let _ = tx
                    .send(WorkflowEvent::Failed {
                        error: format!("Build failed: {}", e),
                    })
                    .await;
                return;
            }
        };

        let initial = graph.initial_state(&payload.input);
        if let Err(e) = graph.invoke_stream(initial, tx).await {
            log::error!("Workflow execution failed: {}", e);
        }
    };
    tokio::spawn(run.instrument(span));

    let stream = ReceiverStream::new(rx).map(|event| {
        let sse = Event::default().event(event.name());
        Ok(sse
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("failed").data(e.to_string())))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}
