//! HTTP surface of the departure board.
//!
//! Stands in for the host: exposes the current board, punctuality statistics
//! and the watch and track commands.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::create_router;
pub use state::{AppState, BoardCoordinator};
