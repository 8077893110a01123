//! Derived fields.
//!
//! Everything here reads fields already on the [`Departure`] and writes
//! derived ones; none of it can reject a departure.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::DateTime;
use chrono_tz::Tz;
use regex::Regex;
use serde_json::Value;

use crate::config::BoardConfig;
use crate::domain::{
    AlternativeConnection, Departure, Facilities, RouteDetail, delay_value, display_time,
};

/// Maximum alternatives attached to one departure.
const MAX_ALTERNATIVES: usize = 3;

/// A trailing sector token: one letter A-G or a range like "A-D".
static SECTOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s([A-G](?:\s*-\s*[A-G])?)\s*$").expect("sector pattern is valid")
});

const WIFI_KEYWORDS: [&str; 3] = ["wlan", "wifi", "wi-fi"];
const BISTRO_KEYWORDS: [&str; 5] = [
    "bistro",
    "restaurant",
    "catering",
    "speisewagen",
    "bordgastronomie",
];
const OUTAGE_KEYWORDS: [&str; 4] = ["nicht", "gestört", "ausfall", "defekt"];
const CLOSURE_KEYWORDS: [&str; 2] = ["geschlossen", "closed"];

/// Bistro and restaurant cars are recognized by these type fragments.
const BISTRO_WAGON_TYPES: [&str; 3] = ["WR", "AR", "Bistro"];

/// Fill every derived field of a departure that survived filtering.
pub fn enrich(departure: &mut Departure, config: &BoardConfig, now: &DateTime<Tz>) {
    apply_delays(departure, now);

    if !config.show_occupancy {
        departure.occupancy = None;
    }

    departure.changed_platform = platform_changed(departure);
    departure.platform_sectors = departure.platform.as_deref().and_then(platform_sectors);
    departure.wagon_order_html = departure.wagonorder.as_ref().and_then(wagon_order_summary);
    departure.facilities = departure.messages.as_ref().and_then(infer_facilities);
    departure.route_details = departure
        .route
        .as_deref()
        .map(route_details)
        .unwrap_or_default();
}

/// Shift the display times by the reported delays.
///
/// Without a scheduled arrival the arrival fields mirror the departure.
pub fn apply_delays(departure: &mut Departure, now: &DateTime<Tz>) {
    let departs = departure
        .expected_departure()
        .unwrap_or(departure.departure_time);
    departure.departure_current = display_time(&departs, now);
    departure.departure_timestamp = departs.timestamp();

    match departure.arrival_time {
        Some(arrival) => {
            let arrives = departure.expected_arrival().unwrap_or(arrival);
            departure.arrival_current = display_time(&arrives, now);
            departure.arrival_timestamp = arrives.timestamp();
        }
        None => {
            departure.arrival_current = departure.departure_current.clone();
            departure.arrival_timestamp = departure.departure_timestamp;
        }
    }
}

/// True when both platforms are known and differ.
pub fn platform_changed(departure: &Departure) -> bool {
    match (&departure.platform, &departure.scheduled_platform) {
        (Some(actual), Some(scheduled)) => actual.trim() != scheduled.trim(),
        _ => false,
    }
}

/// Extract the sector token from a platform such as `"5 A-C"`.
pub fn platform_sectors(platform: &str) -> Option<String> {
    SECTOR_PATTERN
        .captures(platform)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<String>())
}

/// Summarize a wagon order into the sections where first class, second
/// class and the bistro stop.
///
/// Accepts a bare list of wagons or an object holding one under `wagons`,
/// `sections` or `vehicles`.
pub fn wagon_order_summary(wagonorder: &Value) -> Option<String> {
    let wagons = match wagonorder {
        Value::Array(wagons) => wagons,
        Value::Object(fields) => ["wagons", "sections", "vehicles"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_array))?,
        _ => return None,
    };

    let mut first = BTreeSet::new();
    let mut second = BTreeSet::new();
    let mut bistro = BTreeSet::new();

    for wagon in wagons {
        let Some(section) = wagon
            .get("section")
            .or_else(|| wagon.get("sector"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            continue;
        };

        let class = match wagon.get("class") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if class.contains('1') {
            first.insert(section.to_string());
        }
        if class.contains('2') {
            second.insert(section.to_string());
        }

        let wagon_type = wagon.get("type").and_then(Value::as_str).unwrap_or_default();
        if BISTRO_WAGON_TYPES.iter().any(|t| wagon_type.contains(t)) {
            bistro.insert(section.to_string());
        }
    }

    let parts: Vec<String> = [
        ("1. Klasse", &first),
        ("2. Klasse", &second),
        ("Bordbistro", &bistro),
    ]
    .into_iter()
    .filter(|(_, sections)| !sections.is_empty())
    .map(|(label, sections)| {
        let list: Vec<&str> = sections.iter().map(String::as_str).collect();
        format!("<b>{label}:</b> {}", list.join(", "))
    })
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

/// Collect every `text` string from the messages structure.
fn message_texts(messages: &Value, out: &mut Vec<String>) {
    match messages {
        Value::String(s) => out.push(s.to_lowercase()),
        Value::Array(items) => items.iter().for_each(|item| message_texts(item, out)),
        Value::Object(fields) => {
            if let Some(Value::String(text)) = fields.get("text") {
                out.push(text.to_lowercase());
            }
            fields
                .iter()
                .filter(|(key, _)| key.as_str() != "text")
                .for_each(|(_, value)| message_texts(value, out));
        }
        _ => {}
    }
}

/// Infer facility outages from free-text messages.
pub fn infer_facilities(messages: &Value) -> Option<Facilities> {
    let mut texts = Vec::new();
    message_texts(messages, &mut texts);

    let mentions = |text: &str, keywords: &[&str]| keywords.iter().any(|k| text.contains(k));
    let mut facilities = Facilities::default();

    for text in &texts {
        if mentions(text, &WIFI_KEYWORDS) && mentions(text, &OUTAGE_KEYWORDS) {
            facilities.wifi = Some(false);
        }
        if mentions(text, &BISTRO_KEYWORDS)
            && (mentions(text, &OUTAGE_KEYWORDS) || mentions(text, &CLOSURE_KEYWORDS))
        {
            facilities.bistro = Some(false);
        }
    }

    if facilities.is_empty() {
        None
    } else {
        Some(facilities)
    }
}

/// Project route stops to name plus known delays.
pub fn route_details(route: &[Value]) -> Vec<RouteDetail> {
    route
        .iter()
        .filter_map(|stop| match stop {
            Value::String(name) => Some(RouteDetail {
                name: name.clone(),
                arr_delay: None,
                dep_delay: None,
            }),
            Value::Object(fields) => {
                let name = fields.get("name").and_then(Value::as_str)?;
                Some(RouteDetail {
                    name: name.to_string(),
                    arr_delay: fields.get("arr_delay").and_then(delay_value),
                    dep_delay: fields.get("dep_delay").and_then(delay_value),
                })
            }
            _ => None,
        })
        .collect()
}

/// Attach up to three later departures to the same destination.
///
/// Alternatives are taken in list order, so for a time-sorted list they are
/// the next ones to leave.
pub fn attach_alternatives(departures: &mut [Departure]) {
    let summaries: Vec<(String, i64, AlternativeConnection)> = departures
        .iter()
        .map(|d| {
            (
                d.destination.clone(),
                d.departure_timestamp,
                AlternativeConnection {
                    train: d.train.clone(),
                    scheduled_departure: d.scheduled_departure.clone(),
                    platform: d.platform.clone(),
                },
            )
        })
        .collect();

    for departure in departures.iter_mut() {
        let alternatives: Vec<AlternativeConnection> = summaries
            .iter()
            .filter(|(destination, timestamp, _)| {
                *destination == departure.destination && *timestamp > departure.departure_timestamp
            })
            .take(MAX_ALTERNATIVES)
            .map(|(_, _, summary)| summary.clone())
            .collect();

        departure.alternative_connections = if alternatives.is_empty() {
            None
        } else {
            Some(alternatives)
        };
    }
}
