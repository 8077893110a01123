//! Board configuration.
//!
//! The host resolves its options screens into one [`BoardConfig`] record. The
//! standalone binary reads the same record from a YAML file.

use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::domain::RecordOptions;

/// How several via stations combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViaLogic {
    /// A departure passing any via station is kept.
    #[default]
    Or,
    /// A departure must pass every via station.
    And,
}

/// Whether the board lists departures or arrivals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdMode {
    Dep,
    Arr,
}

impl AdMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdMode::Dep => "dep",
            AdMode::Arr => "arr",
        }
    }
}

/// Resolved configuration for one station board.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Station name or identifier as the upstream API expects it.
    pub station: String,

    /// Maximum number of departures returned per cycle.
    #[serde(default = "default_next_departures")]
    pub next_departures: usize,

    /// Seconds between update cycles.
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    #[serde(default)]
    pub hide_low_delay: bool,

    /// Ask for and keep the detailed record shape.
    #[serde(default)]
    pub detailed: bool,

    #[serde(default)]
    pub past_60_minutes: bool,

    #[serde(default)]
    pub keep_route: bool,

    /// Keep departures terminating at this station.
    #[serde(default)]
    pub keep_endstation: bool,

    #[serde(default)]
    pub deduplicate_departures: bool,

    #[serde(default)]
    pub exclude_cancelled: bool,

    /// Measure the offset against the scheduled rather than the expected time.
    #[serde(default)]
    pub drop_late_trains: bool,

    #[serde(default)]
    pub show_occupancy: bool,

    /// Departures leaving sooner than this are hidden.
    #[serde(default)]
    pub offset_minutes: i64,

    /// Comma-separated platform list passed upstream.
    #[serde(default)]
    pub platforms: Option<String>,

    #[serde(default)]
    pub admode: Option<AdMode>,

    #[serde(default = "default_data_source")]
    pub data_source: String,

    /// Replaces the default upstream host.
    #[serde(default)]
    pub custom_api_url: Option<String>,

    #[serde(default)]
    pub via_stations: Vec<String>,

    #[serde(default)]
    pub via_logic: ViaLogic,

    /// Required direction substring.
    #[serde(default)]
    pub direction: Option<String>,

    #[serde(default)]
    pub excluded_directions: Vec<String>,

    #[serde(default)]
    pub ignored_train_types: Vec<String>,

    #[serde(default)]
    pub favorite_trains: Vec<String>,

    /// IANA timezone the board's local times are in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long change-station boards are reused for connection lookahead.
    #[serde(default = "default_lookahead_ttl")]
    pub lookahead_cache_ttl_secs: u64,
}

fn default_next_departures() -> usize {
    4
}

fn default_update_interval() -> u64 {
    180
}

fn default_data_source() -> String {
    "IRIS-TTS".to_string()
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_lookahead_ttl() -> u64 {
    60
}

impl BoardConfig {
    /// Create a configuration for `station` with every option at its default.
    pub fn new(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            next_departures: default_next_departures(),
            update_interval_secs: default_update_interval(),
            hide_low_delay: false,
            detailed: false,
            past_60_minutes: false,
            keep_route: false,
            keep_endstation: false,
            deduplicate_departures: false,
            exclude_cancelled: false,
            drop_late_trains: false,
            show_occupancy: false,
            offset_minutes: 0,
            platforms: None,
            admode: None,
            data_source: default_data_source(),
            custom_api_url: None,
            via_stations: Vec::new(),
            via_logic: ViaLogic::default(),
            direction: None,
            excluded_directions: Vec::new(),
            ignored_train_types: Vec::new(),
            favorite_trains: Vec::new(),
            timezone: default_timezone(),
            request_timeout_secs: default_request_timeout(),
            lookahead_cache_ttl_secs: default_lookahead_ttl(),
        }
    }

    /// Load and validate a configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.station.trim().is_empty() {
            return Err(ConfigError::Invalid("station must not be empty"));
        }
        if self.next_departures == 0 {
            return Err(ConfigError::Invalid("next_departures must be at least 1"));
        }
        if self.update_interval_secs == 0 {
            return Err(ConfigError::Invalid("update_interval_secs must be at least 1"));
        }
        self.tz()?;
        Ok(())
    }

    /// The board's timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn lookahead_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.lookahead_cache_ttl_secs)
    }

    /// Output shaping derived from the detail and route options.
    pub fn record_options(&self) -> RecordOptions {
        RecordOptions {
            detailed: self.detailed,
            keep_route: self.keep_route,
        }
    }

    /// Via stations with blank entries removed.
    pub fn via_stations(&self) -> Vec<&str> {
        self.via_stations
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}
