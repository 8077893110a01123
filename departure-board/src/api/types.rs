//! Upstream response DTOs.
//!
//! The board endpoint wraps an untyped list of departure objects. Only the
//! envelope is typed here; records stay raw until the pipeline converts them.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::RawDeparture;

/// Response from `GET <base>/<station>.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardResponse {
    /// Departures at the station. `null` or absent means no data this cycle.
    #[serde(default)]
    pub departures: Option<Vec<Value>>,

    /// Error text some backends send alongside an empty list.
    #[serde(default)]
    pub error: Option<String>,
}

impl BoardResponse {
    /// The departure objects, skipping entries that are not JSON objects.
    pub fn into_departures(self) -> Vec<RawDeparture> {
        let entries = self.departures.unwrap_or_default();
        let total = entries.len();

        let departures: Vec<RawDeparture> = entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(fields) => Some(fields),
                _ => None,
            })
            .collect();

        if departures.len() < total {
            tracing::debug!(
                skipped = total - departures.len(),
                "ignoring non-object departure entries"
            );
        }
        departures
    }
}
