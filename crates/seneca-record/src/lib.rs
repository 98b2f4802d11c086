//! Seneca Result Records
//!
//! Typed representation of analysis output written by routines into their
//! per-routine buffers:
//! - [`WireEntry`]: one raw entry of the versioned JSON Lines buffer format
//! - [`ResultRecord`]: a validated record (message, completion, plot, table, image)
//! - [`RecordKey`]: the identity of a UI element across ticks
//!
//! # Example
//!
//! ```rust,ignore
//! use seneca_record::{decode_buffer, ResultRecord};
//!
//! for entry in decode_buffer(&bytes).entries {
//!     let record = ResultRecord::from_entry(entry)?;
//!     println!("{:?} from {}", record.kind, record.routine_file);
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod key;
mod kind;
mod record;
mod wire;

pub use error::RecordError;
pub use key::{stable_id, RecordKey};
pub use kind::RecordKind;
pub use record::{Payload, ResultRecord, TableData};
pub use wire::{decode_buffer, encode_entries, DecodedBuffer, WireEntry, WIRE_VERSION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
