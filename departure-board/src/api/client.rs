//! Departure board HTTP client.
//!
//! Issues `GET <base>/<station>.json` against a DBF-compatible API and
//! returns the raw departure records.

use std::time::Duration;

use crate::domain::RawDeparture;

use super::DepartureSource;
use super::error::ApiError;
use super::query::BoardQuery;
use super::types::BoardResponse;

/// Default host of the departure board API.
pub const DEFAULT_BASE_URL: &str = "https://dbf.finalrewind.org";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the board client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API (defaults to the public instance)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Create a config pointing at the default host.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Departure board API client.
#[derive(Debug, Clone)]
pub struct BoardClient {
    http: reqwest::Client,
    base_url: String,
}

impl BoardClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("departure-board/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of a station's board.
    pub fn board_url(&self, station: &str) -> String {
        format!("{}/{}.json", self.base_url, urlencoding::encode(station))
    }

    /// Fetch the raw departures of a station.
    pub async fn get_board(
        &self,
        station: &str,
        query: &BoardQuery,
    ) -> Result<Vec<RawDeparture>, ApiError> {
        let url = self.board_url(station);
        tracing::debug!(%url, params = query.params().len(), "fetching board");

        let response = self.http.get(&url).query(query.params()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;

        let board: BoardResponse = serde_json::from_str(&body).map_err(|e| ApiError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })?;

        if let Some(error) = &board.error {
            tracing::debug!(station, error, "upstream reported an error");
        }

        Ok(board.into_departures())
    }
}

impl DepartureSource for BoardClient {
    async fn fetch_departures(
        &self,
        station: &str,
        query: &BoardQuery,
    ) -> Result<Vec<RawDeparture>, ApiError> {
        self.get_board(station, query).await
    }
}
