//! Tracked connections.
//!
//! A tracked connection pairs a train on this board with an onward train at
//! a change station. Each cycle the change station's board is fetched and
//! the onward train's status attached to the feeding departure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ConnectionInfo, Departure, RawDeparture, delay_value, value_text};

/// The "track connection" command.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRequest {
    /// Train name or trip identifier of the departure on this board.
    pub train_id: String,
    pub change_station: String,
    /// Train name or trip identifier of the onward train.
    pub next_train_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedConnection {
    pub change_station: String,
    pub next_train_id: String,
}

/// Tracked connections keyed by the feeding train.
#[derive(Debug, Clone, Default)]
pub struct ConnectionBook {
    connections: HashMap<String, TrackedConnection>,
}

impl ConnectionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the connection for a train.
    pub fn track(&mut self, request: TrackRequest) {
        tracing::info!(
            train = %request.train_id,
            change_station = %request.change_station,
            next_train = %request.next_train_id,
            "tracking connection"
        );
        self.connections.insert(
            request.train_id,
            TrackedConnection {
                change_station: request.change_station,
                next_train_id: request.next_train_id,
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// The connection tracked for this departure, matched by train or trip.
    pub fn lookup(&self, departure: &Departure) -> Option<&TrackedConnection> {
        [departure.train.as_deref(), departure.trip_id.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|id| self.connections.get(id))
    }
}

fn raw_matches(raw: &RawDeparture, id: &str) -> bool {
    ["train", "trainId", "tripId"]
        .iter()
        .filter_map(|key| raw.get(*key).and_then(value_text))
        .any(|value| value == id)
}

/// Find the onward train on the change station's board.
pub fn find_connection(
    board: &[RawDeparture],
    connection: &TrackedConnection,
) -> Option<ConnectionInfo> {
    let target = board
        .iter()
        .find(|raw| raw_matches(raw, &connection.next_train_id))?;

    Some(ConnectionInfo {
        target_train: target
            .get("train")
            .and_then(value_text)
            .unwrap_or_else(|| connection.next_train_id.clone()),
        target_platform: target.get("platform").and_then(value_text),
        target_delay: target
            .get("delayDeparture")
            .and_then(delay_value)
            .unwrap_or(0),
        transfer_station: connection.change_station.clone(),
    })
}
