//! Seneca UI Patches
//!
//! Translates reconciliation events into the ordered patch operations the
//! browser applies:
//!
//! - `append_container(parent_selector, html)`
//! - `set_html(selector, html)`
//! - `invoke_client(function, args)`
//! - `append_status(text)`
//!
//! Multi-step emissions (container, then list entry, then client init) are
//! separate patches; the client needs the container in the DOM before the
//! init call arrives, so consumers must deliver them in order.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod emitter;
mod patch;
pub mod render;

pub use emitter::{emit, emit_all};
pub use patch::{client, selectors, Patch, PatchSink};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
