//! The analysis tick and the polling loop around it

use crate::bus::PatchBus;
use crate::error::AnalysisError;
use crate::session::AnalysisSession;
use seneca_buffer::{BufferBatch, BufferReader, BufferStore};
use seneca_patch::{emit_all, Patch};
use seneca_reconcile::{dedup, reconcile};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Cooperative stop signal for one loop task
///
/// The loop checks it at the top of every tick, so a stop request lets the
/// current tick finish. A pending inter-tick sleep is cut short.
#[derive(Debug, Clone)]
pub struct RunControl {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    /// New control in the running state
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Whether the loop should keep ticking
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the loop to end after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.wake.notify_one();
    }

    /// Sleep for `duration` or until [`stop`](Self::stop) is called
    pub async fn sleep(&self, duration: Duration) {
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = self.wake.notified() => {}
        }
    }
}

/// One tick's worth of work over a buffer store
#[derive(Debug)]
pub struct Analysis<S> {
    reader: BufferReader<S>,
}

impl<S: BufferStore> Analysis<S> {
    /// Analysis over `store`
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            reader: BufferReader::new(store),
        }
    }

    /// Buffer reader
    #[inline]
    #[must_use]
    pub fn reader(&self) -> &BufferReader<S> {
        &self.reader
    }

    /// Delete every buffer ahead of a fresh run
    ///
    /// # Errors
    /// Returns [`AnalysisError::Buffer`] if the buffers cannot be listed or removed
    pub fn reset_buffers(&self) -> Result<usize, AnalysisError> {
        let removed = self.reader.store().delete_all()?;
        debug!(removed, "buffers reset");
        Ok(removed)
    }

    /// Read, dedup, reconcile and render every buffer once
    ///
    /// Never fails: unreadable buffers are skipped and retried next tick,
    /// malformed records become status lines.
    pub fn tick(&self, session: &mut AnalysisSession) -> Vec<Patch> {
        let batches = match self.reader.batches() {
            Ok(batches) => batches,
            Err(e) => {
                warn!(error = %e, "buffer directory unreadable, skipping tick");
                return Vec::new();
            }
        };

        let mut patches = Vec::new();
        for batch in batches {
            patches.extend(render_batch(session, batch));
        }
        patches
    }
}

fn render_batch(session: &mut AnalysisSession, batch: BufferBatch) -> Vec<Patch> {
    debug!(
        path = %batch.path.display(),
        records = batch.records.len(),
        issues = batch.issues.len(),
        disposition = ?batch.disposition,
        "buffer read"
    );
    let events = reconcile(session.display_mut(), dedup(batch.records));
    let mut patches = emit_all(&events);
    patches.extend(batch.issues.iter().map(|issue| Patch::status(&issue.status_text())));
    patches
}

/// Tick until `control` is stopped, then hand the session back
///
/// Ticks run on the blocking pool since they do file IO. Each tick's patches
/// are published in computed order before the loop sleeps for the rest of
/// the period. A tick slower than the period is reported once per run and
/// the next tick starts immediately.
///
/// # Panics
/// Resumes the panic of a tick that panicked.
pub async fn run<S: BufferStore + 'static>(
    analysis: Arc<Analysis<S>>,
    mut session: AnalysisSession,
    control: RunControl,
    bus: PatchBus,
) -> AnalysisSession {
    session.begin_run();
    info!(period_ms = session.period().as_millis(), "analysis loop started");

    while control.is_running() {
        let started = Instant::now();
        let period = session.period();
        let worker = Arc::clone(&analysis);
        let ticked = tokio::task::spawn_blocking(move || {
            let patches = worker.tick(&mut session);
            (session, patches)
        })
        .await;
        let patches = match ticked {
            Ok((returned, patches)) => {
                session = returned;
                patches
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!(error = %e, "tick cancelled, display state lost");
                return AnalysisSession::new(period);
            }
        };
        bus.publish_all(patches);

        let timing = session.account_tick(started.elapsed());
        if let Some(warning) = timing.warning {
            warn!(elapsed_ms = started.elapsed().as_millis(), "tick overran period");
            bus.publish(warning);
        }
        match timing.sleep {
            Some(remaining) => control.sleep(remaining).await,
            None => tokio::task::yield_now().await,
        }
    }

    info!(ticks = session.ticks(), "analysis loop ended");
    session
}
