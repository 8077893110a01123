//! The departure-processing pipeline.
//!
//! [`process_departures`] turns one raw upstream list into the filtered,
//! annotated and size-bounded list handed to the host:
//!
//! 1. convert each raw record into a [`Departure`], dropping unusable ones
//!    and those heading in an excluded direction
//! 2. optionally collapse duplicates
//! 3. run the [`FilterChain`], enrich survivors and admit them against the
//!    size budget until it is exhausted
//! 4. keep favorites only, attach alternatives, and trim to the budget again

mod budget;
mod dedup;
mod enrich;
mod filter;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::config::BoardConfig;
use crate::domain::{Departure, RawDeparture};

pub use budget::{MAX_PAYLOAD_BYTES, SizeBudget, truncate_to_budget};
pub use dedup::deduplicate;
pub use enrich::{
    apply_delays, attach_alternatives, enrich, infer_facilities, platform_changed,
    platform_sectors, route_details, wagon_order_summary,
};
pub use filter::{FilterChain, SkipReason};

/// Run one raw departure list through the pipeline.
///
/// The result is sorted as the upstream sent it (or by time when
/// deduplicating) and is not yet capped to `next_departures`.
pub fn process_departures(
    raw: Vec<RawDeparture>,
    config: &BoardConfig,
    now: DateTime<Tz>,
) -> Vec<Departure> {
    let filters = FilterChain::new(config);
    let options = config.record_options();
    let received = raw.len();

    let mut departures: Vec<Departure> = raw
        .iter()
        .filter_map(|record| match Departure::from_raw(record, &now) {
            Ok(departure) => Some(departure),
            Err(error) => {
                tracing::debug!(%error, "dropping departure");
                None
            }
        })
        .filter(|departure| {
            let excluded = filters.is_excluded_direction(departure);
            if excluded {
                tracing::debug!(
                    direction = departure.direction.as_deref(),
                    "skipping excluded direction"
                );
            }
            !excluded
        })
        .collect();

    if config.deduplicate_departures {
        departures = deduplicate(departures);
    }

    let mut budget = SizeBudget::default();
    let mut accepted = Vec::new();

    for mut departure in departures {
        if let Err(reason) = filters.check(&departure, &now) {
            tracing::debug!(
                train = departure.train.as_deref(),
                destination = %departure.destination,
                ?reason,
                "skipping departure"
            );
            continue;
        }

        enrich(&mut departure, config, &now);

        let len = match departure.record_len(&options) {
            Ok(len) => len,
            Err(error) => {
                tracing::debug!(%error, "dropping departure");
                continue;
            }
        };
        if !budget.try_admit(len) {
            tracing::debug!(
                used = budget.used(),
                accepted = accepted.len(),
                "size budget exhausted"
            );
            break;
        }

        accepted.push(departure);
    }

    filters.retain_favorites(&mut accepted);

    if config.detailed && accepted.len() > 1 {
        attach_alternatives(&mut accepted);
    }

    truncate_to_budget(&mut accepted, &options);

    tracing::debug!(received, returned = accepted.len(), "processed departures");
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;
    use serde_json::{Value, json};

    use crate::config::ViaLogic;

    fn now() -> DateTime<Tz> {
        Berlin.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn raw(values: Vec<Value>) -> Vec<RawDeparture> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn config() -> BoardConfig {
        BoardConfig::new("Frankfurt (Main) Hbf")
    }

    #[test]
    fn single_departure_passes_through() {
        let input = raw(vec![json!({
            "scheduledDeparture": "10:10",
            "destination": "Berlin",
            "train": "ICE1",
            "delayDeparture": 0,
        })]);

        let out = process_departures(input, &config(), now());
        assert_eq!(out.len(), 1);
        assert!(!out[0].changed_platform);
        assert_eq!(out[0].departure_current, "10:10");
    }

    #[test]
    fn cancelled_departure_excluded() {
        let mut config = config();
        config.exclude_cancelled = true;
        let input = raw(vec![json!({
            "scheduledDeparture": "10:10",
            "destination": "Berlin",
            "train": "ICE1",
            "cancelled": true,
        })]);

        assert!(process_departures(input, &config, now()).is_empty());
    }

    #[test]
    fn via_and_requires_every_station() {
        let mut config = config();
        config.via_stations = vec!["Fulda".into(), "Kassel".into()];
        config.via_logic = ViaLogic::And;
        let input = raw(vec![
            json!({
                "scheduledDeparture": "10:10",
                "destination": "Hamburg",
                "train": "ICE 1",
                "via": ["Fulda", "Kassel-Wilhelmshöhe"],
            }),
            json!({
                "scheduledDeparture": "10:20",
                "destination": "Hamburg",
                "train": "ICE 2",
                "via": ["Fulda", "Erfurt"],
            }),
        ]);

        let out = process_departures(input, &config, now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].train.as_deref(), Some("ICE 1"));
    }

    #[test]
    fn wagon_order_rendered() {
        let input = raw(vec![json!({
            "scheduledDeparture": "10:10",
            "destination": "München",
            "train": "ICE 599",
            "wagonorder": [
                { "section": "A", "class": 1 },
                { "section": "B", "class": "12" },
                { "section": "C", "class": 2 },
                { "section": "C", "type": "WRmz" },
            ],
        })]);

        let out = process_departures(input, &config(), now());
        assert_eq!(
            out[0].wagon_order_html.as_deref(),
            Some("<b>1. Klasse:</b> A, B | <b>2. Klasse:</b> B, C | <b>Bordbistro:</b> C")
        );
    }

    #[test]
    fn large_input_stays_within_budget() {
        let input = raw(
            (0..500)
                .map(|i| {
                    json!({
                        "scheduledDeparture": now().timestamp() + 600 + i * 60,
                        "destination": "Wiesbaden Hbf",
                        "train": format!("S {i}"),
                    })
                })
                .collect(),
        );

        let config = config();
        let out = process_departures(input, &config, now());
        assert!(!out.is_empty());
        assert!(out.len() < 500);

        let options = config.record_options();
        let records: Vec<_> = out.iter().map(|d| d.to_record(&options).unwrap()).collect();
        assert!(serde_json::to_vec(&records).unwrap().len() <= MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn unparseable_time_dropped() {
        let input = raw(vec![
            json!({ "scheduledDeparture": "tomorrow-ish", "train": "RE 1" }),
            json!({ "destination": "Mainz", "train": "RE 2" }),
            json!({ "sched_dep": "10:30", "train": "RE 3" }),
        ]);

        let out = process_departures(input, &config(), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].train.as_deref(), Some("RE 3"));
    }

    #[test]
    fn absurd_delay_does_not_sink_the_list() {
        let input = raw(vec![
            json!({ "scheduledDeparture": "10:20", "train": "RE 1", "destination": "Fulda" }),
            json!({
                "scheduledDeparture": "10:25",
                "train": "RE 2",
                "destination": "Hanau",
                "delayDeparture": "99999999999999",
            }),
        ]);

        let out = process_departures(input, &config(), now());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].delay_departure, 0);
        assert_eq!(out[1].departure_current, "10:25");
    }

    #[test]
    fn naive_datetime_in_the_past_is_tomorrows_train() {
        let input = raw(vec![json!({
            "scheduledDeparture": "2024-03-15T09:00:00",
            "train": "ICE 1601",
            "destination": "Berlin Hbf",
        })]);

        let out = process_departures(input, &config(), now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].departure_current, "2024-03-16 09:00");
    }

    #[test]
    fn excluded_direction_before_dedup() {
        let mut config = config();
        config.excluded_directions = vec!["hanau".into()];
        config.deduplicate_departures = true;
        let input = raw(vec![
            json!({ "scheduledDeparture": "10:10", "train": "S 8", "destination": "X", "direction": "Hanau Hbf" }),
            json!({ "scheduledDeparture": "10:11", "train": "S 8", "destination": "X", "direction": "Offenbach" }),
        ]);

        let out = process_departures(input, &config, now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].direction.as_deref(), Some("Offenbach"));
    }

    #[test]
    fn favorites_applied_after_loop() {
        let mut config = config();
        config.favorite_trains = vec!["ICE".into()];
        let input = raw(vec![
            json!({ "scheduledDeparture": "10:10", "train": "RE 50", "destination": "Fulda" }),
            json!({ "scheduledDeparture": "10:20", "train": "ICE 1601", "destination": "Berlin" }),
        ]);

        let out = process_departures(input, &config, now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].train.as_deref(), Some("ICE 1601"));
    }

    #[test]
    fn alternatives_only_in_detailed_mode() {
        let input = || {
            raw(vec![
                json!({ "scheduledDeparture": "10:10", "train": "S 1", "destination": "Wiesbaden" }),
                json!({ "scheduledDeparture": "10:25", "train": "S 9", "destination": "Wiesbaden" }),
            ])
        };

        let out = process_departures(input(), &config(), now());
        assert!(out.iter().all(|d| d.alternative_connections.is_none()));

        let mut detailed = config();
        detailed.detailed = true;
        let out = process_departures(input(), &detailed, now());
        let alternatives = out[0].alternative_connections.as_ref().unwrap();
        assert_eq!(alternatives[0].train.as_deref(), Some("S 9"));
        assert!(out[1].alternative_connections.is_none());
    }

    #[test]
    fn same_input_same_output() {
        let input = raw(vec![
            json!({ "scheduledDeparture": "10:10", "train": "RB 1", "destination": "A", "platform": "3 A-C" }),
            json!({ "scheduledDeparture": "10:05", "train": "RB 2", "destination": "B", "delayDeparture": 4 }),
        ]);

        let first = process_departures(input.clone(), &config(), now());
        let second = process_departures(input, &config(), now());
        assert_eq!(first, second);
        assert_eq!(first[0].platform_sectors.as_deref(), Some("A-C"));
    }
}
