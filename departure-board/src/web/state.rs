//! Application state for the web layer.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::BoardClient;
use crate::coordinator::Coordinator;
use crate::tracking::LogNotifier;

/// The coordinator as the binary runs it.
pub type BoardCoordinator = Coordinator<BoardClient, LogNotifier>;

/// Shared application state.
///
/// The update loop and every handler go through the same lock, so a command
/// never lands in the middle of a cycle.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Mutex<BoardCoordinator>>,
}

impl AppState {
    pub fn new(coordinator: BoardCoordinator) -> Self {
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
        }
    }
}
