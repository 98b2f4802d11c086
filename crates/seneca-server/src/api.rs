//! HTTP API and the patch event stream

use async_stream::stream;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use seneca_buffer::FsBufferStore;
use seneca_core::{
    period_from_secs, AnalysisController, AnalysisError, PatchBus, RoutineError, RoutineStatus,
    RoutineSupervisor, SessionState,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// SSE event name carrying one serialized patch
pub const PATCH_EVENT: &str = "patch";

/// Shared server state
pub struct AppState {
    /// Analysis lifecycle
    pub controller: Arc<AnalysisController<FsBufferStore>>,
    /// Routine processes
    pub routines: RoutineSupervisor,
    /// Patch fan-out
    pub bus: PatchBus,
}

/// API error, mapped to an HTTP status
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Analysis lifecycle error
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Routine error
    #[error(transparent)]
    Routine(#[from] RoutineError),

    /// Invalid request body
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Analysis(e) if e.is_illegal_transition() => StatusCode::CONFLICT,
            Self::Analysis(AnalysisError::InvalidLogDirectory(_) | AnalysisError::Config(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Routine(RoutineError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Routine(RoutineError::AlreadyRunning(_) | RoutineError::NotRunning(_)) => {
                StatusCode::CONFLICT
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Analysis(_) | Self::Routine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: String,
    /// Server version
    pub version: String,
    /// Analysis lifecycle state
    pub analysis: SessionState,
}

/// Body of `POST /analysis/start`
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    /// Resume over the retained display state
    #[serde(default)]
    pub paused: bool,
    /// Tick period for this run
    #[serde(default)]
    pub period_secs: Option<f64>,
}

/// Lifecycle state after a request
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StateResponse {
    /// Current state
    pub state: SessionState,
}

/// Body of `POST /log`
#[derive(Debug, Deserialize)]
pub struct LogRequest {
    /// New log file; empty stops logging
    #[serde(default)]
    pub path: String,
}

/// Active status log
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LogResponse {
    /// Log file, if logging
    pub path: Option<String>,
}

/// Build the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(patch_events))
        .route("/analysis/start", post(start_analysis))
        .route("/analysis/pause", post(pause_analysis))
        .route("/analysis/stop", post(stop_analysis))
        .route("/routines", get(list_routines))
        .route("/routines/:id/run", post(run_routine))
        .route("/routines/:id/stop", post(stop_routine))
        .route("/routines/:id/pause", post(pause_routine))
        .route("/routines/:id/resume", post(resume_routine))
        .route("/log", post(set_log))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        analysis: state.controller.state().await,
    })
}

/// Stream every published patch as a `patch` event, in publish order
pub async fn patch_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();
    debug!("patch stream opened");

    let stream = stream! {
        let mut live = BroadcastStream::new(rx);
        while let Some(item) = live.next().await {
            match item {
                Ok(patch) => match serde_json::to_string(&patch) {
                    Ok(data) => yield Ok(Event::default().event(PATCH_EVENT).data(data)),
                    Err(e) => warn!(error = %e, "patch not serializable"),
                },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "patch stream lagged, client view is stale");
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// Start or restart the analysis loop
pub async fn start_analysis(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<StateResponse>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    if let Some(secs) = request.period_secs {
        let period = period_from_secs(secs).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        state.controller.set_period(period).await;
    }
    state.controller.start(request.paused).await?;
    Ok(Json(StateResponse {
        state: state.controller.state().await,
    }))
}

/// Pause the analysis loop
pub async fn pause_analysis(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ApiError> {
    state.controller.pause().await?;
    Ok(Json(StateResponse {
        state: state.controller.state().await,
    }))
}

/// Stop the analysis loop
pub async fn stop_analysis(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ApiError> {
    state.controller.stop().await?;
    Ok(Json(StateResponse {
        state: state.controller.state().await,
    }))
}

/// Known routines with their run state
pub async fn list_routines(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoutineStatus>>, ApiError> {
    Ok(Json(state.routines.list().await?))
}

/// Run a routine, or resume it when paused
pub async fn run_routine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.routines.run(&id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Terminate a routine
pub async fn stop_routine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.routines.stop(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Suspend a routine
pub async fn pause_routine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.routines.pause(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Continue a suspended routine
pub async fn resume_routine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.routines.resume(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change or disable the status log file
pub async fn set_log(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LogRequest>,
) -> Result<Json<LogResponse>, ApiError> {
    let path = state.bus.set_log_path(&request.path)?;
    Ok(Json(LogResponse {
        path: path.map(|p| p.display().to_string()),
    }))
}
