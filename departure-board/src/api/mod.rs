//! Departure board API access.
//!
//! The upstream service answers `GET <base>/<station>.json` with a
//! `departures` array of loosely typed records. Which regional backend
//! produces them (IRIS-TTS, HAFAS or EFA) is chosen by query parameters.
//!
//! Everything above this module talks to the API through [`DepartureSource`],
//! so the coordinator can be driven by an in-memory source in tests.

mod client;
mod error;
mod query;
mod types;

use std::future::Future;

use crate::domain::RawDeparture;

pub use client::{BoardClient, ClientConfig, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use query::{BoardQuery, backend_selector};
pub use types::BoardResponse;

/// Something that can produce the raw departures of a station.
pub trait DepartureSource {
    /// Fetch the departures of `station` with the given query parameters.
    fn fetch_departures(
        &self,
        station: &str,
        query: &BoardQuery,
    ) -> impl Future<Output = Result<Vec<RawDeparture>, ApiError>> + Send;
}
