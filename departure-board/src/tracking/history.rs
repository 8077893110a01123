//! Rolling punctuality history.

use std::collections::HashMap;

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::Departure;

/// How long an observation stays in the ledger.
pub const HISTORY_WINDOW_HOURS: i64 = 24;

/// Delays below this many minutes count as punctual.
pub const PUNCTUAL_THRESHOLD_MINUTES: i64 = 6;

/// The latest observation of one trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub train: Option<String>,
    /// When the trip was last observed.
    pub timestamp: DateTime<Tz>,
    pub scheduled: Option<String>,
    pub delay: i64,
    pub cancelled: bool,
}

/// Summary over the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PunctualityStats {
    pub total: usize,
    pub punctual: usize,
    pub delayed: usize,
    pub cancelled: usize,
    /// Mean delay in minutes over trips that ran, rounded to one decimal.
    pub average_delay: Option<f64>,
    /// Share of punctual trips in percent, rounded to one decimal.
    pub punctuality_percent: Option<f64>,
}

/// Observations of the last 24 hours, one per trip.
#[derive(Debug, Clone, Default)]
pub struct PunctualityLedger {
    entries: HashMap<String, HistoryEntry>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl PunctualityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop observations older than the history window.
    pub fn purge(&mut self, now: &DateTime<Tz>) {
        let cutoff = *now - Duration::hours(HISTORY_WINDOW_HOURS);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.timestamp >= cutoff);

        let purged = before - self.entries.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = self.entries.len(), "purged punctuality history");
        }
    }

    /// Record the current state of every departure, replacing older
    /// observations of the same trip.
    pub fn record(&mut self, departures: &[Departure], now: &DateTime<Tz>) {
        for departure in departures {
            let key = match &departure.trip_id {
                Some(trip) => trip.clone(),
                None => format!(
                    "{}_{}",
                    departure.train.as_deref().unwrap_or_default(),
                    departure.departure_time.timestamp()
                ),
            };
            self.entries.insert(
                key,
                HistoryEntry {
                    train: departure.train.clone(),
                    timestamp: *now,
                    scheduled: departure.scheduled_departure.clone(),
                    delay: departure.delay_departure,
                    cancelled: departure.cancelled,
                },
            );
        }
    }

    pub fn statistics(&self) -> PunctualityStats {
        let total = self.entries.len();
        let cancelled = self.entries.values().filter(|e| e.cancelled).count();
        let ran: Vec<i64> = self
            .entries
            .values()
            .filter(|e| !e.cancelled)
            .map(|e| e.delay)
            .collect();
        let punctual = ran
            .iter()
            .filter(|delay| **delay < PUNCTUAL_THRESHOLD_MINUTES)
            .count();

        let average_delay = if ran.is_empty() {
            None
        } else {
            Some(round1(ran.iter().sum::<i64>() as f64 / ran.len() as f64))
        };
        let punctuality_percent = if total == 0 {
            None
        } else {
            Some(round1(punctual as f64 * 100.0 / total as f64))
        };

        PunctualityStats {
            total,
            punctual,
            delayed: ran.len() - punctual,
            cancelled,
            average_delay,
            punctuality_percent,
        }
    }
}
