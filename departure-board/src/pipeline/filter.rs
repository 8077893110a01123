//! Per-departure filter predicates.
//!
//! The checks run in a fixed order and stop at the first one that rejects a
//! departure. Configuration strings are lowercased once when the chain is
//! built.

use std::collections::HashSet;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::config::{BoardConfig, ViaLogic};
use crate::domain::{Departure, expand_ignored_types};

/// Why a departure was filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ExcludedDirection,
    DirectionMismatch,
    FinalStop,
    Cancelled,
    IgnoredTrainType(String),
    ViaMismatch,
    TooSoon { offset_secs: i64 },
}

/// The configured filters of one board.
#[derive(Debug, Clone)]
pub struct FilterChain {
    station: String,
    keep_endstation: bool,
    exclude_cancelled: bool,
    drop_late_trains: bool,
    min_offset_secs: i64,
    direction: Option<String>,
    excluded_directions: Vec<String>,
    ignored_types: HashSet<String>,
    /// Only populated when more than one via station is configured.
    via_stations: Vec<String>,
    via_logic: ViaLogic,
    favorites: Vec<String>,
}

impl FilterChain {
    pub fn new(config: &BoardConfig) -> Self {
        let lowered = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let via = config.via_stations();
        let via_stations = if via.len() > 1 {
            via.iter().map(|s| s.to_lowercase()).collect()
        } else {
            Vec::new()
        };

        Self {
            station: config.station.trim().to_string(),
            keep_endstation: config.keep_endstation,
            exclude_cancelled: config.exclude_cancelled,
            drop_late_trains: config.drop_late_trains,
            min_offset_secs: config.offset_minutes * 60,
            direction: config
                .direction
                .as_deref()
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty()),
            excluded_directions: lowered(&config.excluded_directions),
            ignored_types: expand_ignored_types(&config.ignored_train_types),
            via_stations,
            via_logic: config.via_logic,
            favorites: config
                .favorite_trains
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Whether the departure heads in an excluded direction.
    ///
    /// Applied while converting raw records, before deduplication.
    pub fn is_excluded_direction(&self, departure: &Departure) -> bool {
        let Some(direction) = departure.direction.as_deref() else {
            return false;
        };
        let direction = direction.to_lowercase();
        self.excluded_directions
            .iter()
            .any(|excluded| direction.contains(excluded.as_str()))
    }

    /// Run the per-departure checks in order.
    pub fn check(&self, departure: &Departure, now: &DateTime<Tz>) -> Result<(), SkipReason> {
        self.check_direction(departure)?;
        self.check_final_stop(departure)?;
        self.check_cancelled(departure)?;
        self.check_train_type(departure)?;
        self.check_via(departure)?;
        self.check_offset(departure, now)
    }

    fn check_direction(&self, departure: &Departure) -> Result<(), SkipReason> {
        let Some(required) = &self.direction else {
            return Ok(());
        };
        match departure.direction.as_deref() {
            Some(direction) if direction.to_lowercase().contains(required.as_str()) => Ok(()),
            _ => Err(SkipReason::DirectionMismatch),
        }
    }

    fn check_final_stop(&self, departure: &Departure) -> Result<(), SkipReason> {
        if !self.keep_endstation && departure.destination.trim() == self.station {
            return Err(SkipReason::FinalStop);
        }
        Ok(())
    }

    fn check_cancelled(&self, departure: &Departure) -> Result<(), SkipReason> {
        if self.exclude_cancelled && departure.cancelled {
            return Err(SkipReason::Cancelled);
        }
        Ok(())
    }

    fn check_train_type(&self, departure: &Departure) -> Result<(), SkipReason> {
        match departure
            .train_classes
            .iter()
            .find(|class| self.ignored_types.contains(class.as_str()))
        {
            Some(class) => Err(SkipReason::IgnoredTrainType(class.clone())),
            None => Ok(()),
        }
    }

    fn check_via(&self, departure: &Departure) -> Result<(), SkipReason> {
        if self.via_stations.is_empty() {
            return Ok(());
        }

        let haystack: Vec<String> = std::iter::once(departure.destination.as_str())
            .chain(departure.route_stop_names())
            .chain(departure.via.iter().flatten().map(String::as_str))
            .map(str::to_lowercase)
            .collect();
        let passes = |station: &String| haystack.iter().any(|name| name.contains(station.as_str()));

        let matched = match self.via_logic {
            ViaLogic::Or => self.via_stations.iter().any(passes),
            ViaLogic::And => self.via_stations.iter().all(passes),
        };
        if matched {
            Ok(())
        } else {
            Err(SkipReason::ViaMismatch)
        }
    }

    fn check_offset(&self, departure: &Departure, now: &DateTime<Tz>) -> Result<(), SkipReason> {
        let departs_at = if self.drop_late_trains {
            departure.departure_time
        } else {
            departure
                .expected_departure()
                .unwrap_or(departure.departure_time)
        };

        let offset_secs = (departs_at - *now).num_seconds();
        if offset_secs < self.min_offset_secs {
            return Err(SkipReason::TooSoon { offset_secs });
        }
        Ok(())
    }

    /// Whether favorite filtering is configured.
    pub fn has_favorites(&self) -> bool {
        !self.favorites.is_empty()
    }

    /// Keep only departures whose train matches a favorite.
    ///
    /// Without favorites configured the list is returned unchanged.
    pub fn retain_favorites(&self, departures: &mut Vec<Departure>) {
        if !self.has_favorites() {
            return;
        }
        departures.retain(|departure| {
            departure.train.as_deref().is_some_and(|train| {
                self.favorites
                    .iter()
                    .any(|favorite| train.contains(favorite.as_str()))
            })
        });
    }
}
