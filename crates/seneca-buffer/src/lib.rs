//! Seneca Result Buffers
//!
//! Routines append their output to one buffer file per routine inside the
//! plot-data directory. This crate owns the consuming side:
//!
//! ```text
//! plot_data/*.jsonl → BufferStore → BufferReader → BufferBatch (records + issues)
//!                          ↑______________________________↓
//!                               clear (or delete on Complete)
//! ```
//!
//! Producers and the reader never synchronize across the process boundary.
//! A buffer caught mid-write fails to parse, is left untouched and is read
//! again on the next tick. Entries appended between the read and the clear
//! are lost; this is a known limitation of the buffer contract.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod reader;
mod store;

pub use error::BufferError;
pub use reader::{BufferBatch, BufferIssue, BufferReader, Disposition};
pub use store::{BufferStore, FsBufferStore, BUFFER_EXTENSION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
