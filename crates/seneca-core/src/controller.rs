//! Start / pause / stop of the analysis loop

use crate::analysis::{run, Analysis, RunControl};
use crate::bus::PatchBus;
use crate::error::AnalysisError;
use crate::session::{validate_transition, AnalysisSession, SessionState};
use seneca_buffer::BufferStore;
use seneca_patch::{client, selectors, Patch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct ActiveRun {
    control: RunControl,
    handle: JoinHandle<AnalysisSession>,
}

struct ControllerInner {
    state: SessionState,
    period: Duration,
    /// Held while no loop task owns it
    session: Option<AnalysisSession>,
    active: Option<ActiveRun>,
}

/// Owns the analysis lifecycle
///
/// At most one loop task exists at a time. Lifecycle patches (container
/// resets, status lines, timer calls) go out on the same bus as tick
/// patches.
pub struct AnalysisController<S> {
    analysis: Arc<Analysis<S>>,
    bus: PatchBus,
    inner: Mutex<ControllerInner>,
}

impl<S: BufferStore + 'static> AnalysisController<S> {
    /// New controller in the `Stopped` state
    #[must_use]
    pub fn new(analysis: Arc<Analysis<S>>, bus: PatchBus, period: Duration) -> Self {
        Self {
            analysis,
            bus,
            inner: Mutex::new(ControllerInner {
                state: SessionState::Stopped,
                period,
                session: None,
                active: None,
            }),
        }
    }

    /// Patch bus
    #[must_use]
    pub fn bus(&self) -> &PatchBus {
        &self.bus
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Tick period used by the next start
    pub async fn set_period(&self, period: Duration) {
        self.inner.lock().await.period = period;
    }

    /// Copy of the session while no loop is running
    pub async fn snapshot(&self) -> Option<AnalysisSession> {
        self.inner.lock().await.session.clone()
    }

    /// Start the loop
    ///
    /// With `paused` set the loop resumes over the retained display state.
    /// Otherwise the display state is discarded, every buffer is deleted and
    /// the page containers are emptied first.
    ///
    /// # Errors
    /// Returns [`AnalysisError::IllegalTransition`] when already running and
    /// [`AnalysisError::Buffer`] when buffers cannot be reset
    pub async fn start(&self, paused: bool) -> Result<(), AnalysisError> {
        let mut inner = self.inner.lock().await;
        validate_transition(inner.state, SessionState::Running)?;

        let period = inner.period;
        let mut session = if paused {
            inner
                .session
                .take()
                .unwrap_or_else(|| AnalysisSession::new(period))
        } else {
            self.analysis.reset_buffers()?;
            inner.session = None;
            self.bus.publish_all([
                Patch::set_html(selectors::PLOTS_CONTAINER, ""),
                Patch::set_html(selectors::PLOT_LIST, ""),
            ]);
            AnalysisSession::new(period)
        };
        session.set_period(period);

        self.bus.status(if paused {
            "Analysis restarted"
        } else {
            "Analysis started"
        });
        self.bus.publish(Patch::invoke(client::START_TIMER, Vec::new()));

        let control = RunControl::new();
        let handle = tokio::spawn(run(
            Arc::clone(&self.analysis),
            session,
            control.clone(),
            self.bus.clone(),
        ));
        inner.active = Some(ActiveRun { control, handle });
        inner.state = SessionState::Running;
        info!(paused, period_ms = period.as_millis(), "analysis started");
        Ok(())
    }

    /// Pause the loop, keeping the display state
    ///
    /// # Errors
    /// Returns [`AnalysisError::IllegalTransition`] unless running
    pub async fn pause(&self) -> Result<(), AnalysisError> {
        let mut inner = self.inner.lock().await;
        validate_transition(inner.state, SessionState::Paused)?;

        let result = Self::halt(&mut inner).await;
        inner.state = SessionState::Paused;
        self.bus.status("Analysis paused");
        self.bus.publish(Patch::invoke(client::STOP_TIMER, Vec::new()));
        info!("analysis paused");
        result
    }

    /// Stop the loop
    ///
    /// The display state is kept until the next non-paused start replaces it.
    ///
    /// # Errors
    /// Returns [`AnalysisError::IllegalTransition`] when already stopped
    pub async fn stop(&self) -> Result<(), AnalysisError> {
        let mut inner = self.inner.lock().await;
        validate_transition(inner.state, SessionState::Stopped)?;

        let result = Self::halt(&mut inner).await;
        inner.state = SessionState::Stopped;
        self.bus.status("Analysis stopped");
        self.bus.publish(Patch::invoke(client::RESET_TIMER, Vec::new()));
        info!("analysis stopped");
        result
    }

    /// End the loop task, if any, and take its session back
    async fn halt(inner: &mut ControllerInner) -> Result<(), AnalysisError> {
        let Some(active) = inner.active.take() else {
            return Ok(());
        };
        active.control.stop();
        match active.handle.await {
            Ok(session) => {
                inner.session = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "analysis task ended abnormally");
                Err(AnalysisError::Task(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_log::StatusLog;
    use seneca_buffer::FsBufferStore;
    use tempfile::TempDir;

    fn controller(dir: &TempDir) -> AnalysisController<FsBufferStore> {
        let store = FsBufferStore::open(dir.path()).unwrap();
        AnalysisController::new(
            Arc::new(Analysis::new(store)),
            PatchBus::new(Arc::new(StatusLog::disabled())),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn lifecycle_follows_transition_table() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);
        assert_eq!(controller.state().await, SessionState::Stopped);

        assert!(controller.pause().await.unwrap_err().is_illegal_transition());
        assert!(controller.stop().await.unwrap_err().is_illegal_transition());

        controller.start(false).await.unwrap();
        assert_eq!(controller.state().await, SessionState::Running);
        assert!(controller.start(false).await.unwrap_err().is_illegal_transition());

        controller.pause().await.unwrap();
        assert_eq!(controller.state().await, SessionState::Paused);
        controller.start(true).await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(controller.state().await, SessionState::Stopped);
    }

    #[tokio::test]
    async fn fresh_start_emits_resets_before_status() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);
        let mut rx = controller.bus().subscribe();

        controller.start(false).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Patch::set_html("#plots-container", ""));
        assert_eq!(rx.recv().await.unwrap(), Patch::set_html("#plot-list", ""));
        assert_eq!(rx.recv().await.unwrap(), Patch::status("Analysis started"));
        assert_eq!(
            rx.recv().await.unwrap(),
            Patch::invoke(client::START_TIMER, Vec::new())
        );
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn pause_and_stop_call_timers() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);
        controller.start(false).await.unwrap();
        let mut rx = controller.bus().subscribe();

        controller.pause().await.unwrap();
        controller.stop().await.unwrap();

        let mut received = Vec::new();
        while let Ok(patch) = rx.try_recv() {
            received.push(patch);
        }
        assert_eq!(
            received,
            vec![
                Patch::status("Analysis paused"),
                Patch::invoke(client::STOP_TIMER, Vec::new()),
                Patch::status("Analysis stopped"),
                Patch::invoke(client::RESET_TIMER, Vec::new()),
            ]
        );
    }
}
