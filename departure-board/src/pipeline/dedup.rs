//! Duplicate collapsing.
//!
//! Some backends report the same trip twice, e.g. once per platform section
//! or once from each of two merged data feeds. Entries describing the same
//! trip within two minutes of each other are collapsed into the earliest.

use std::collections::{HashMap, HashSet};

use crate::domain::Departure;

/// Entries of the same trip closer than this are duplicates.
const DUPLICATE_WINDOW_SECS: i64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Trip {
        line: String,
        destination: String,
        trip: String,
    },
    Route {
        line: String,
        destination: String,
    },
    /// Records without line and destination are never merged.
    Unique(usize),
}

fn dedup_key(departure: &Departure, position: usize) -> DedupKey {
    let line = departure.line_or_train().unwrap_or_default().to_string();
    let destination = departure.destination.clone();

    if line.is_empty() && destination.is_empty() {
        return DedupKey::Unique(position);
    }

    let trip = departure
        .key
        .as_ref()
        .and_then(crate::domain::value_text)
        .or_else(|| departure.train_number.clone());

    match trip {
        Some(trip) => DedupKey::Trip {
            line,
            destination,
            trip,
        },
        None => DedupKey::Route { line, destination },
    }
}

/// Collapse duplicate departures, returning the survivors sorted by time.
///
/// Each record is compared with the first record stored under its key. Within
/// the window it is dropped; further away it is kept under its key suffixed
/// with its timestamp. A second record with that same suffixed key is a
/// duplicate too.
pub fn deduplicate(mut departures: Vec<Departure>) -> Vec<Departure> {
    departures.sort_by_key(|d| d.departure_time);

    let mut first: HashMap<DedupKey, i64> = HashMap::new();
    let mut suffixed: HashSet<(DedupKey, i64)> = HashSet::new();
    let mut kept: Vec<Departure> = Vec::with_capacity(departures.len());
    let mut dropped = 0usize;

    for (position, departure) in departures.into_iter().enumerate() {
        let key = dedup_key(&departure, position);
        let timestamp = departure.departure_time.timestamp();

        let Some(&stored) = first.get(&key) else {
            first.insert(key, timestamp);
            kept.push(departure);
            continue;
        };

        if (timestamp - stored).abs() <= DUPLICATE_WINDOW_SECS
            || !suffixed.insert((key, timestamp))
        {
            dropped += 1;
            continue;
        }
        kept.push(departure);
    }

    if dropped > 0 {
        tracing::debug!(dropped, kept = kept.len(), "collapsed duplicate departures");
    }

    kept.sort_by_key(|d| d.departure_time);
    kept
}
