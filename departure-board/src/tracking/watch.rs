//! Watched trips.
//!
//! A watched trip remembers what was last notified so each change is
//! reported once. Trips missing from a cycle's list are left alone.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Departure, ServiceTarget, TargetError};

use super::notify::Notification;

fn default_delay_threshold() -> i64 {
    5
}

fn default_true() -> bool {
    true
}

/// The "watch train" command.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchRequest {
    /// Train name (e.g. `ICE 1601`) or trip identifier.
    pub train_id: String,
    /// Notification service as `domain.service`.
    pub notify_target: String,
    /// Minimum delay in minutes worth reporting.
    #[serde(default = "default_delay_threshold")]
    pub delay_threshold: i64,
    #[serde(default = "default_true")]
    pub notify_on_platform_change: bool,
    #[serde(default = "default_true")]
    pub notify_on_cancellation: bool,
}

/// Subscription state of one watched trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchedTrip {
    pub notify_target: ServiceTarget,
    pub delay_threshold: i64,
    pub notify_on_platform_change: bool,
    pub notify_on_cancellation: bool,
    pub last_notified_delay: Option<i64>,
    pub last_notified_platform: Option<String>,
    pub last_notified_cancellation: bool,
}

impl WatchedTrip {
    /// Compare against the trip's current departure, returning what changed.
    fn observe(&mut self, train_id: &str, departure: &Departure) -> Vec<Notification> {
        let mut out = Vec::new();
        let train = departure.train.as_deref().unwrap_or(train_id);

        let delay = departure.delay_departure;
        if delay >= self.delay_threshold && self.last_notified_delay != Some(delay) {
            out.push(self.notification(
                format!("{train} delayed"),
                format!(
                    "{train} to {} is {delay} minutes late, now departing {}",
                    departure.destination, departure.departure_current
                ),
            ));
            self.last_notified_delay = Some(delay);
        }

        if self.notify_on_platform_change && departure.platform != self.last_notified_platform {
            if let (Some(previous), Some(current)) =
                (&self.last_notified_platform, &departure.platform)
            {
                out.push(self.notification(
                    format!("{train} platform change"),
                    format!("{train} now departs from platform {current} instead of {previous}"),
                ));
            }
            self.last_notified_platform = departure.platform.clone();
        }

        if self.notify_on_cancellation && departure.cancelled && !self.last_notified_cancellation {
            out.push(self.notification(
                format!("{train} cancelled"),
                format!(
                    "{train} to {} scheduled at {} is cancelled",
                    departure.destination,
                    departure
                        .scheduled_departure
                        .as_deref()
                        .unwrap_or(departure.departure_current.as_str())
                ),
            ));
            self.last_notified_cancellation = true;
        }

        out
    }

    fn notification(&self, title: String, message: String) -> Notification {
        Notification {
            target: self.notify_target.clone(),
            title,
            message,
        }
    }
}

/// Watched trips keyed by train name or trip identifier.
#[derive(Debug, Clone, Default)]
pub struct WatchList {
    trips: HashMap<String, WatchedTrip>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a watched trip.
    ///
    /// Replacing resets what was last notified.
    pub fn watch(&mut self, request: WatchRequest) -> Result<(), TargetError> {
        let notify_target = ServiceTarget::parse(&request.notify_target)?;
        tracing::info!(
            train = %request.train_id,
            target_service = %notify_target,
            threshold = request.delay_threshold,
            "watching train"
        );

        self.trips.insert(
            request.train_id,
            WatchedTrip {
                notify_target,
                delay_threshold: request.delay_threshold,
                notify_on_platform_change: request.notify_on_platform_change,
                notify_on_cancellation: request.notify_on_cancellation,
                last_notified_delay: None,
                last_notified_platform: None,
                last_notified_cancellation: false,
            },
        );
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn get(&self, train_id: &str) -> Option<&WatchedTrip> {
        self.trips.get(train_id)
    }

    /// Run every watched trip against this cycle's departures.
    pub fn evaluate(&mut self, departures: &[Departure]) -> Vec<Notification> {
        let mut out = Vec::new();
        for (train_id, trip) in &mut self.trips {
            let Some(departure) = departures.iter().find(|d| d.is_identified_by(train_id)) else {
                continue;
            };
            out.extend(trip.observe(train_id, departure));
        }
        out
    }
}
