//! Handler tests against a temp-dir backed server state

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use pretty_assertions::assert_eq;
use seneca_buffer::FsBufferStore;
use seneca_core::{
    Analysis, AnalysisController, PatchBus, RoutineSupervisor, SenecaConfig, SessionState,
    StatusLog,
};
use seneca_patch::Patch;
use seneca_server::api::{
    health_check, list_routines, pause_analysis, run_routine, set_log, start_analysis,
    stop_analysis, stop_routine, ApiError, LogRequest, StartRequest,
};
use seneca_server::AppState;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn app_state(dir: &TempDir) -> Arc<AppState> {
    let config = SenecaConfig::default()
        .with_plot_data_dir(dir.path().join("plot_data"))
        .with_upload_dir(dir.path().join("routines"))
        .with_period_secs(1.0);
    std::fs::create_dir_all(&config.upload_dir).unwrap();
    std::fs::write(config.upload_dir.join("fit.py"), "print('hi')\n").unwrap();

    let bus = PatchBus::new(Arc::new(StatusLog::disabled()));
    let store = FsBufferStore::open(&config.plot_data_dir).unwrap();
    let controller = Arc::new(AnalysisController::new(
        Arc::new(Analysis::new(store)),
        bus.clone(),
        Duration::from_secs(1),
    ));
    Arc::new(AppState {
        controller,
        routines: RoutineSupervisor::local(&config, bus.clone()),
        bus,
    })
}

fn status_of(err: ApiError) -> StatusCode {
    err.into_response().status()
}

#[tokio::test]
async fn health_reports_lifecycle_state() {
    let dir = TempDir::new().unwrap();
    let state = app_state(&dir);

    let Json(health) = health_check(State(state)).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.analysis, SessionState::Stopped);
}

#[tokio::test]
async fn start_pause_stop_flow() {
    let dir = TempDir::new().unwrap();
    let state = app_state(&dir);
    let mut rx = state.bus.subscribe();

    let Json(started) = start_analysis(State(state.clone()), None).await.unwrap();
    assert_eq!(started.state, SessionState::Running);

    let err = start_analysis(State(state.clone()), None).await.unwrap_err();
    assert_eq!(status_of(err), StatusCode::CONFLICT);

    let Json(paused) = pause_analysis(State(state.clone())).await.unwrap();
    assert_eq!(paused.state, SessionState::Paused);

    let Json(resumed) = start_analysis(
        State(state.clone()),
        Some(Json(StartRequest {
            paused: true,
            period_secs: Some(2.0),
        })),
    )
    .await
    .unwrap();
    assert_eq!(resumed.state, SessionState::Running);

    let Json(stopped) = stop_analysis(State(state.clone())).await.unwrap();
    assert_eq!(stopped.state, SessionState::Stopped);

    let err = pause_analysis(State(state)).await.unwrap_err();
    assert_eq!(status_of(err), StatusCode::CONFLICT);

    let mut lines = Vec::new();
    while let Ok(patch) = rx.try_recv() {
        lines.extend(patch.status_text());
    }
    assert_eq!(
        lines,
        vec![
            "Analysis started",
            "Analysis paused",
            "Analysis restarted",
            "Analysis stopped",
        ]
    );
}

#[tokio::test]
async fn rejects_unusable_periods() {
    let dir = TempDir::new().unwrap();
    let state = app_state(&dir);

    let err = start_analysis(
        State(state.clone()),
        Some(Json(StartRequest {
            paused: false,
            period_secs: Some(0.0),
        })),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

    // Finite but beyond what a Duration holds
    let err = start_analysis(
        State(state.clone()),
        Some(Json(StartRequest {
            paused: false,
            period_secs: Some(1e20),
        })),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

    let Json(health) = health_check(State(state)).await;
    assert_eq!(health.analysis, SessionState::Stopped);
}

#[tokio::test]
async fn routine_errors_map_to_statuses() {
    let dir = TempDir::new().unwrap();
    let state = app_state(&dir);

    let Json(routines) = list_routines(State(state.clone())).await.unwrap();
    assert_eq!(routines.len(), 1);
    assert_eq!(routines[0].info.name, "fit.py");

    let err = run_routine(State(state.clone()), Path("missing.py".to_string()))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);

    let err = stop_routine(State(state), Path("fit.py".to_string()))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::CONFLICT);
}

#[tokio::test]
async fn log_path_round_trip() {
    let dir = TempDir::new().unwrap();
    let state = app_state(&dir);
    let mut rx = state.bus.subscribe();
    let path = dir.path().join("status.log");

    let Json(set) = set_log(
        State(state.clone()),
        Json(LogRequest {
            path: path.display().to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(set.path, Some(path.display().to_string()));

    let err = set_log(
        State(state.clone()),
        Json(LogRequest {
            path: dir.path().join("nope").join("x.log").display().to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

    let Json(cleared) = set_log(State(state), Json(LogRequest { path: String::new() }))
        .await
        .unwrap();
    assert_eq!(cleared.path, None);

    let first = rx.try_recv().unwrap();
    assert_eq!(
        first,
        Patch::status(&format!("Log path changed to '{}'.", path.display()))
    );
    let logged = std::fs::read_to_string(&path).unwrap();
    assert!(logged.contains("is not a valid directory."));
}
