//! Data transfer objects for web requests and responses.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::coordinator::HealthIssue;

/// The current board.
#[derive(Debug, Serialize)]
pub struct DeparturesResponse {
    pub station: String,

    /// Display time of the next departure
    pub summary: Option<String>,

    /// Departure records as handed to the host
    pub departures: Vec<Map<String, Value>>,

    /// Active health issues
    pub issues: Vec<HealthIssue>,

    pub consecutive_errors: u32,
}

/// Acknowledgement of a command.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: &'static str,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
