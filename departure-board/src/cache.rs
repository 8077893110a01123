//! Caching layer for change-station boards.
//!
//! Connection lookahead fetches the board of each tracked change station.
//! Several departures may point at the same station within one cycle, so
//! responses are kept for a short TTL and shared.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::api::{ApiError, BoardQuery, DepartureSource};
use crate::domain::RawDeparture;

/// Cached board entry.
type BoardEntry = Arc<Vec<RawDeparture>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached stations.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 64,
        }
    }
}

/// A departure source with a per-station response cache.
///
/// Queries are always parameterless: change-station boards are fetched in
/// their default shape.
pub struct CachedSource<S> {
    source: S,
    boards: MokaCache<String, BoardEntry>,
}

impl<S: DepartureSource> CachedSource<S> {
    /// Wrap `source` with a cache.
    pub fn new(source: S, config: &CacheConfig) -> Self {
        let boards = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { source, boards }
    }

    /// Get a station's board, using the cache if available.
    pub async fn get_board(&self, station: &str) -> Result<BoardEntry, ApiError> {
        if let Some(cached) = self.boards.get(station).await {
            tracing::trace!(station, "change-station board served from cache");
            return Ok(cached);
        }

        let departures = self
            .source
            .fetch_departures(station, &BoardQuery::empty())
            .await?;
        let entry = Arc::new(departures);

        self.boards.insert(station.to_string(), entry.clone()).await;
        Ok(entry)
    }

    /// Access the wrapped source.
    pub fn source(&self) -> &S {
        &self.source
    }
}
