//! Departure time normalization.
//!
//! Upstream backends disagree on how they report times: IRIS sends ISO
//! strings with an offset, HAFAS sometimes sends epoch seconds, EFA sends a
//! bare "HH:MM". Every representation is resolved to an absolute timestamp in
//! the board's timezone, anchored to a caller-supplied "now".

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde_json::Value;

use super::RawDeparture;

/// Fields that may carry the departure time, in priority order.
pub const DEPARTURE_TIME_FIELDS: [&str; 7] = [
    "scheduledDeparture",
    "sched_dep",
    "scheduledArrival",
    "sched_arr",
    "scheduledTime",
    "dep",
    "datetime",
];

/// Fields that may carry the arrival time.
pub const ARRIVAL_TIME_FIELDS: [&str; 1] = ["scheduledArrival"];

/// A time-of-day further than this in the past belongs to tomorrow.
const ROLLOVER_GRACE_MINUTES: i64 = 5;

const AWARE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M%z"];

const NAIVE_DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const TIME_OF_DAY_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Error returned when no usable time can be extracted from a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    /// None of the recognized time fields is present.
    #[error("no time field present")]
    Missing,

    /// A time field is present but in no recognized format.
    #[error("unparseable time value: {0}")]
    Unparseable(String),
}

/// Returns the first present, non-empty value among `fields`.
pub fn first_time_value<'a>(raw: &'a RawDeparture, fields: &[&str]) -> Option<&'a Value> {
    fields.iter().filter_map(|f| raw.get(*f)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

/// Resolve the departure time of a raw record.
pub fn departure_time(raw: &RawDeparture, now: &DateTime<Tz>) -> Result<DateTime<Tz>, TimeError> {
    let value = first_time_value(raw, &DEPARTURE_TIME_FIELDS).ok_or(TimeError::Missing)?;
    parse_time_value(value, now)
}

/// Resolve the scheduled arrival time of a raw record, if it has one.
pub fn arrival_time(raw: &RawDeparture, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let value = first_time_value(raw, &ARRIVAL_TIME_FIELDS)?;
    parse_time_value(value, now).ok()
}

/// Parse a single JSON time value.
///
/// Numbers are epoch seconds. Strings are tried as an offset-aware datetime,
/// then as a naive datetime in the board's zone, then as a time of day. Naive
/// values more than five minutes in the past move forward one day.
pub fn parse_time_value(value: &Value, now: &DateTime<Tz>) -> Result<DateTime<Tz>, TimeError> {
    match value {
        Value::Number(n) => {
            let secs = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .ok_or_else(|| TimeError::Unparseable(n.to_string()))?;
            match now.timezone().timestamp_opt(secs, 0) {
                LocalResult::Single(dt) => Ok(dt),
                _ => Err(TimeError::Unparseable(n.to_string())),
            }
        }
        Value::String(s) => parse_time_str(s, now),
        other => Err(TimeError::Unparseable(other.to_string())),
    }
}

/// Parse a time string relative to `now`.
///
/// # Examples
///
/// ```
/// use chrono::TimeZone;
/// use chrono_tz::Europe::Berlin;
/// use departure_board::domain::parse_time_str;
///
/// let now = Berlin.with_ymd_and_hms(2024, 3, 15, 23, 50, 0).unwrap();
///
/// // Already departed more than five minutes ago: tomorrow's service.
/// let t = parse_time_str("00:10", &now).unwrap();
/// assert_eq!(t.format("%Y-%m-%d %H:%M").to_string(), "2024-03-16 00:10");
/// ```
pub fn parse_time_str(s: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>, TimeError> {
    let s = s.trim();
    let tz = now.timezone();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&tz));
    }
    for format in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&tz));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return roll_forward(naive, now).ok_or_else(|| TimeError::Unparseable(s.to_string()));
        }
    }

    for format in TIME_OF_DAY_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(s, format) {
            return anchor_today(time, now).ok_or_else(|| TimeError::Unparseable(s.to_string()));
        }
    }

    Err(TimeError::Unparseable(s.to_string()))
}

/// Combine a time of day with today's date, rolling over to tomorrow if the
/// result lies more than the grace window in the past.
pub fn anchor_today(time: NaiveTime, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    roll_forward(now.date_naive().and_time(time), now)
}

/// Localize a wall-clock datetime, moving it one day later if it lies more
/// than the grace window before `now`.
pub fn roll_forward(naive: NaiveDateTime, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let candidate = localize(&tz, naive)?;

    if candidate < *now - Duration::minutes(ROLLOVER_GRACE_MINUTES) {
        let next_day = naive.date().succ_opt()?;
        return localize(&tz, next_day.and_time(naive.time()));
    }
    Some(candidate)
}

/// Attach a timezone to a wall-clock time.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times in a
/// DST gap are pushed forward by an hour.
pub fn localize(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }
}

/// Render a time for display: bare "HH:MM" on the same day as `now`,
/// otherwise with the date.
pub fn display_time(time: &DateTime<Tz>, now: &DateTime<Tz>) -> String {
    if time.date_naive() == now.date_naive() {
        time.format("%H:%M").to_string()
    } else {
        time.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Berlin;
    use serde_json::json;

    fn now() -> DateTime<Tz> {
        Berlin.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn raw(value: Value) -> RawDeparture {
        value.as_object().cloned().unwrap()
    }

    fn hm(dt: &DateTime<Tz>) -> String {
        dt.format("%Y-%m-%d %H:%M").to_string()
    }

    #[test]
    fn epoch_seconds() {
        let expected = Berlin.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let t = parse_time_value(&json!(expected.timestamp()), &now()).unwrap();
        assert_eq!(t, expected);
    }

    #[test]
    fn aware_string_converted_to_board_zone() {
        let t = parse_time_str("2024-03-15T09:30:00Z", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-15 10:30");

        let t = parse_time_str("2024-03-15T10:30:00+01:00", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-15 10:30");
    }

    #[test]
    fn naive_datetime_in_the_future_keeps_its_date() {
        let t = parse_time_str("2024-03-15T10:30:00", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-15 10:30");

        let t = parse_time_str("2024-03-15 09:57", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-15 09:57");
    }

    #[test]
    fn naive_datetime_in_the_past_rolls_forward_one_day() {
        let t = parse_time_str("2024-03-15T09:00:00", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-16 09:00");

        let t = parse_time_str("2024-03-14T23:10:00", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-15 23:10");
    }

    #[test]
    fn time_of_day_today() {
        let t = parse_time_str("10:20", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-15 10:20");
    }

    #[test]
    fn time_of_day_within_grace_stays_today() {
        let t = parse_time_str("09:56", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-15 09:56");

        let t = parse_time_str("09:55:00", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-15 09:55");
    }

    #[test]
    fn time_of_day_rolls_over_past_midnight() {
        let t = parse_time_str("09:54", &now()).unwrap();
        assert_eq!(hm(&t), "2024-03-16 09:54");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_time_str("soon", &now()),
            Err(TimeError::Unparseable(_))
        ));
        assert!(parse_time_value(&json!(true), &now()).is_err());
    }

    #[test]
    fn field_priority() {
        let r = raw(json!({
            "datetime": "11:00",
            "scheduledDeparture": "10:30",
            "scheduledArrival": "10:28",
        }));
        assert_eq!(hm(&departure_time(&r, &now()).unwrap()), "2024-03-15 10:30");
    }

    #[test]
    fn empty_fields_are_skipped() {
        let r = raw(json!({
            "scheduledDeparture": "",
            "sched_dep": null,
            "dep": "10:45",
        }));
        assert_eq!(hm(&departure_time(&r, &now()).unwrap()), "2024-03-15 10:45");
    }

    #[test]
    fn missing_time() {
        let r = raw(json!({ "destination": "Berlin" }));
        assert_eq!(departure_time(&r, &now()), Err(TimeError::Missing));
    }

    #[test]
    fn arrival_only_reads_scheduled_arrival() {
        let r = raw(json!({ "sched_arr": "10:40" }));
        assert!(arrival_time(&r, &now()).is_none());

        let r = raw(json!({ "scheduledArrival": "10:40" }));
        assert_eq!(hm(&arrival_time(&r, &now()).unwrap()), "2024-03-15 10:40");
    }

    #[test]
    fn display_time_same_day_and_next_day() {
        let same = Berlin.with_ymd_and_hms(2024, 3, 15, 12, 5, 0).unwrap();
        assert_eq!(display_time(&same, &now()), "12:05");

        let next = Berlin.with_ymd_and_hms(2024, 3, 16, 0, 5, 0).unwrap();
        assert_eq!(display_time(&next, &now()), "2024-03-16 00:05");
    }

    #[test]
    fn dst_gap_is_pushed_forward() {
        let naive = chrono::NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let dt = localize(&Berlin, naive).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "03:30");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono_tz::Europe::Berlin;
    use proptest::prelude::*;

    proptest! {
        /// A time of day never resolves to more than the grace window in the past.
        #[test]
        fn never_far_in_the_past(h in 0u32..24, m in 0u32..60, now_h in 0u32..24, now_m in 0u32..60) {
            let now = Berlin.with_ymd_and_hms(2024, 6, 10, now_h, now_m, 0).unwrap();
            let s = format!("{h:02}:{m:02}");
            let t = parse_time_str(&s, &now).unwrap();
            prop_assert!(t >= now - Duration::minutes(ROLLOVER_GRACE_MINUTES));
            prop_assert!(t < now + Duration::days(1));
        }
    }
}
