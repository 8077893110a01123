//! The typed departure record.
//!
//! Upstream records are loosely typed JSON objects whose keys vary by backend.
//! They are converted into [`Departure`] as the first pipeline step; nothing
//! downstream looks at the raw map again.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{Map, Value};

use super::time::{self, TimeError};
use super::train_type::normalize_train_classes;

/// A departure exactly as the upstream API returned it.
pub type RawDeparture = Map<String, Value>;

/// Any of these being truthy marks a departure as cancelled.
const CANCELLATION_FLAGS: [&str; 3] = ["isCancelled", "cancelled", "is_cancelled"];

/// Internal or bulky keys dropped unless detailed output is requested.
const BULKY_FIELDS: [&str; 6] = ["id", "stop_id_num", "stateless", "key", "messages", "mot"];

/// Keys describing the train's path, dropped unless the route is kept.
const ROUTE_FIELDS: [&str; 4] = ["route", "via", "prev_route", "next_route"];

/// Fields that may carry the scheduled departure as shown to the host.
const SCHEDULED_DEPARTURE_FIELDS: [&str; 2] = ["scheduledDeparture", "sched_dep"];

/// Delays beyond a week either way are treated as garbage.
const MAX_DELAY_MINUTES: i64 = 7 * 24 * 60;

/// Keys allowed to stay null in compact output.
const NULLABLE_FIELDS: [&str; 7] = [
    "scheduledDeparture",
    "scheduledArrival",
    "departure_current",
    "arrival_current",
    "departure_timestamp",
    "arrival_timestamp",
    "trip_id",
];

/// Why a raw record did not make it into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// No recognized time field could be parsed.
    #[error("no usable departure time: {0}")]
    Time(#[from] TimeError),

    /// Applying the delay moves the time out of the representable range.
    #[error("delay of {0} minutes is out of range")]
    DelayOutOfRange(i64),

    /// The record could not be rendered as JSON.
    #[error("record cannot be serialized: {0}")]
    Serialize(String),
}

/// Which parts of a departure end up in its output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordOptions {
    /// Keep internal keys and null fields.
    pub detailed: bool,
    /// Keep `route`, `via`, `prev_route` and `next_route`.
    pub keep_route: bool,
}

/// Facility outages inferred from free-text messages.
///
/// Only negative signals are modeled: a field is `Some(false)` when a message
/// reports the facility as unavailable and absent otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Facilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bistro: Option<bool>,
}

impl Facilities {
    /// Whether no facility signal was found.
    pub fn is_empty(&self) -> bool {
        self.wifi.is_none() && self.bistro.is_none()
    }
}

/// A stop on the route with the delays known for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDetail {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arr_delay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dep_delay: Option<i64>,
}

/// A later departure to the same destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlternativeConnection {
    pub train: Option<String>,
    #[serde(rename = "scheduledDeparture")]
    pub scheduled_departure: Option<String>,
    pub platform: Option<String>,
}

/// Status of a tracked onward connection at the change station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub target_train: String,
    pub target_platform: Option<String>,
    pub target_delay: i64,
    pub transfer_station: String,
}

/// A departure after normalization.
///
/// `departure_time` and `arrival_time` are internal and never serialized;
/// the display strings and epoch timestamps carry the same information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    #[serde(skip)]
    pub departure_time: DateTime<Tz>,
    #[serde(skip)]
    pub arrival_time: Option<DateTime<Tz>>,

    #[serde(rename = "scheduledDeparture")]
    pub scheduled_departure: Option<String>,
    #[serde(rename = "scheduledArrival")]
    pub scheduled_arrival: Option<String>,
    pub departure_current: String,
    pub departure_timestamp: i64,
    pub arrival_current: String,
    pub arrival_timestamp: i64,

    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(rename = "trainNumber", skip_serializing_if = "Option::is_none")]
    pub train_number: Option<String>,
    pub trip_id: Option<String>,

    #[serde(rename = "delayDeparture")]
    pub delay_departure: i64,
    #[serde(rename = "delayArrival")]
    pub delay_arrival: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(rename = "scheduledPlatform", skip_serializing_if = "Option::is_none")]
    pub scheduled_platform: Option<String>,
    pub changed_platform: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_sectors: Option<String>,

    #[serde(rename = "trainClasses")]
    pub train_classes: BTreeSet<String>,
    #[serde(rename = "isCancelled")]
    pub cancelled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wagonorder: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wagon_order_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub route_details: Vec<RouteDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_route: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_route: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facilities: Option<Facilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_connections: Option<Vec<AlternativeConnection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_info: Option<ConnectionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_id_num: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stateless: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mot: Option<Value>,
}

impl Departure {
    /// Convert a raw upstream record.
    ///
    /// Fails only when no departure time can be resolved; every other field
    /// degrades to absent or zero.
    pub fn from_raw(raw: &RawDeparture, now: &DateTime<Tz>) -> Result<Self, RecordError> {
        let departure_time = time::departure_time(raw, now)?;
        let arrival_time = time::arrival_time(raw, now);

        let mut classes: Vec<String> = match raw.get("trainClasses") {
            Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
            Some(other) => value_text(other).into_iter().collect(),
            None => Vec::new(),
        };
        classes.extend(text(raw, "type"));

        let departure_current = time::display_time(&departure_time, now);
        let (arrival_current, arrival_timestamp) = match &arrival_time {
            Some(t) => (time::display_time(t, now), t.timestamp()),
            None => (departure_current.clone(), departure_time.timestamp()),
        };

        let departure = Self {
            departure_time,
            arrival_time,
            scheduled_departure: SCHEDULED_DEPARTURE_FIELDS
                .iter()
                .find_map(|field| match raw.get(*field) {
                    Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
                    _ => None,
                }),
            scheduled_arrival: text(raw, "scheduledArrival"),
            departure_current,
            departure_timestamp: departure_time.timestamp(),
            arrival_current,
            arrival_timestamp,
            destination: text(raw, "destination").unwrap_or_default(),
            direction: text(raw, "direction"),
            train: text(raw, "train"),
            line: text(raw, "line"),
            train_number: text(raw, "trainNumber"),
            trip_id: text(raw, "trainId").or_else(|| text(raw, "tripId")),
            delay_departure: delay(raw, "delayDeparture"),
            delay_arrival: delay(raw, "delayArrival"),
            platform: text(raw, "platform"),
            scheduled_platform: text(raw, "scheduledPlatform"),
            changed_platform: false,
            platform_sectors: None,
            train_classes: normalize_train_classes(classes.iter().map(String::as_str)),
            cancelled: CANCELLATION_FLAGS
                .iter()
                .any(|flag| raw.get(*flag).is_some_and(truthy)),
            wagonorder: present(raw, "wagonorder"),
            wagon_order_html: None,
            route: match raw.get("route") {
                Some(Value::Array(stops)) => Some(stops.clone()),
                _ => None,
            },
            route_details: Vec::new(),
            via: via_list(raw.get("via")),
            prev_route: present(raw, "prev_route"),
            next_route: present(raw, "next_route"),
            messages: present(raw, "messages"),
            facilities: None,
            occupancy: present(raw, "occupancy"),
            alternative_connections: None,
            connection_info: None,
            id: present(raw, "id"),
            stop_id_num: present(raw, "stop_id_num"),
            stateless: present(raw, "stateless"),
            key: present(raw, "key"),
            mot: present(raw, "mot"),
        };

        if departure.expected_departure().is_none() {
            return Err(RecordError::DelayOutOfRange(departure.delay_departure));
        }
        if departure.arrival_time.is_some() && departure.expected_arrival().is_none() {
            return Err(RecordError::DelayOutOfRange(departure.delay_arrival));
        }
        Ok(departure)
    }

    /// Scheduled departure shifted by the departure delay.
    pub fn expected_departure(&self) -> Option<DateTime<Tz>> {
        shift(&self.departure_time, self.delay_departure)
    }

    /// Scheduled arrival shifted by the arrival delay, if there is an arrival.
    pub fn expected_arrival(&self) -> Option<DateTime<Tz>> {
        shift(self.arrival_time.as_ref()?, self.delay_arrival)
    }

    /// The identifier of the line or train, whichever is known.
    pub fn line_or_train(&self) -> Option<&str> {
        self.line.as_deref().or(self.train.as_deref())
    }

    /// Whether `id` names this departure by train or by trip.
    pub fn is_identified_by(&self, id: &str) -> bool {
        self.train.as_deref() == Some(id) || self.trip_id.as_deref() == Some(id)
    }

    /// Names of the stops on the route, for structured and bare-string stops alike.
    pub fn route_stop_names(&self) -> Vec<&str> {
        self.route
            .iter()
            .flatten()
            .filter_map(|stop| match stop {
                Value::String(name) => Some(name.as_str()),
                Value::Object(fields) => fields.get("name").and_then(Value::as_str),
                _ => None,
            })
            .collect()
    }

    /// Render the departure as the record handed to the host.
    pub fn to_record(&self, options: &RecordOptions) -> Result<Map<String, Value>, RecordError> {
        let mut record = match serde_json::to_value(self) {
            Ok(Value::Object(record)) => record,
            Ok(other) => return Err(RecordError::Serialize(format!("not an object: {other}"))),
            Err(e) => return Err(RecordError::Serialize(e.to_string())),
        };

        if !options.detailed {
            for field in BULKY_FIELDS {
                record.remove(field);
            }
            record.retain(|key, value| NULLABLE_FIELDS.contains(&key.as_str()) || !is_blank(value));
        }
        if !options.keep_route {
            for field in ROUTE_FIELDS {
                record.remove(field);
            }
        }

        Ok(record)
    }

    /// Serialized byte length of the output record.
    pub fn record_len(&self, options: &RecordOptions) -> Result<usize, RecordError> {
        let record = self.to_record(options)?;
        serde_json::to_vec(&record)
            .map(|bytes| bytes.len())
            .map_err(|e| RecordError::Serialize(e.to_string()))
    }
}

fn shift(time: &DateTime<Tz>, minutes: i64) -> Option<DateTime<Tz>> {
    time.checked_add_signed(TimeDelta::try_minutes(minutes)?)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// A present, non-null value, cloned.
fn present(raw: &RawDeparture, key: &str) -> Option<Value> {
    raw.get(key).filter(|v| !v.is_null()).cloned()
}

/// A string or number rendered as text; blank strings count as absent.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(raw: &RawDeparture, key: &str) -> Option<String> {
    raw.get(key).and_then(value_text)
}

/// Parse a delay in minutes. Anything unparseable or implausibly large
/// counts as no delay.
pub(crate) fn delay_value(value: &Value) -> Option<i64> {
    let minutes = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
        }
        _ => None,
    }?;
    (minutes.abs() <= MAX_DELAY_MINUTES).then_some(minutes)
}

fn delay(raw: &RawDeparture, key: &str) -> i64 {
    raw.get(key).and_then(delay_value).unwrap_or(0)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// `via` arrives either as a list of station names or as one comma-separated string.
fn via_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(items.iter().filter_map(value_text).collect()),
        Value::String(s) if !s.trim().is_empty() => Some(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}
