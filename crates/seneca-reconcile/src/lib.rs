//! Seneca Reconciliation
//!
//! Turns the records decoded in one tick into display events:
//!
//! 1. [`dedup`] keeps one record per identity key (the latest version),
//!    in first-seen order.
//! 2. [`reconcile`] compares each record with the [`DisplayState`] of its
//!    routine and classifies it as routine introduction, CREATE or UPDATE.
//!
//! # Example
//!
//! ```rust,ignore
//! use seneca_reconcile::{dedup, reconcile, DisplayState};
//!
//! let mut state = DisplayState::new();
//! let events = reconcile(&mut state, dedup(records));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod dedup;
mod engine;
mod state;

pub use dedup::dedup;
pub use engine::{reconcile, ReconcileEvent};
pub use state::{DisplayState, RoutineDisplayState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
