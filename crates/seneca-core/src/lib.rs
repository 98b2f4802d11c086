//! Seneca Core
//!
//! The long-poll analysis loop:
//! - [`Analysis`]: one tick of read → dedup → reconcile → emit
//! - [`run`]: the periodic loop with overrun reporting
//! - [`AnalysisController`]: start / pause / stop lifecycle
//! - [`RoutineSupervisor`]: running routine scripts and reporting outcomes
//!
//! # Example
//!
//! ```rust,no_run
//! use seneca_buffer::FsBufferStore;
//! use seneca_core::{Analysis, AnalysisController, PatchBus, SenecaConfig, StatusLog};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SenecaConfig::default();
//! let store = FsBufferStore::open(&config.plot_data_dir)?;
//! let bus = PatchBus::new(Arc::new(StatusLog::disabled()));
//! let controller = AnalysisController::new(Arc::new(Analysis::new(store)), bus, config.period()?);
//!
//! controller.start(false).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod analysis;
pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod routine;
pub mod session;
pub mod status_log;

pub use analysis::{run, Analysis, RunControl};
pub use bus::{PatchBus, PATCH_CHANNEL_CAPACITY};
pub use config::{period_from_secs, SenecaConfig};
pub use controller::AnalysisController;
pub use error::{AnalysisError, RoutineError};
pub use routine::{
    DirRegistry, Launcher, LocalRoutine, RoutineExit, RoutineInfo, RoutineProcess,
    RoutineRegistry, RoutineState, RoutineStatus, RoutineSupervisor, PLOT_DATA_ENV,
};
pub use session::{
    allowed_transitions, format_significant, validate_transition, AnalysisSession, SessionState,
    TickTiming,
};
pub use status_log::StatusLog;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
