//! Seneca Server
//!
//! Thin adapters around `seneca-core`: the axum API with its SSE patch
//! stream, logging setup and the buffer inspection command.

#![warn(missing_docs)]

pub mod api;
pub mod inspect;
pub mod logging;

pub use api::{create_router, AppState};
