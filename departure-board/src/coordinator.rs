//! Update cycle orchestration.
//!
//! The [`Coordinator`] owns everything that outlives a single cycle: the
//! last good departure list, error counters, health issues, watched trips,
//! tracked connections and the punctuality ledger. [`Coordinator::update`]
//! never fails; on any problem it serves the last good list instead.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::{ApiError, BoardQuery, DepartureSource};
use crate::cache::{CacheConfig, CachedSource};
use crate::config::{BoardConfig, ConfigError};
use crate::domain::{Departure, TargetError};
use crate::pipeline::{process_departures, truncate_to_budget};
use crate::tracking::{
    ConnectionBook, Notifier, PunctualityLedger, PunctualityStats, TrackRequest, WatchList,
    WatchRequest, find_connection,
};

/// Consecutive failures before the API is reported as failing.
const API_ERROR_THRESHOLD: u32 = 3;

/// Consecutive failures before the station is reported as unsupported.
const STATION_UNSUPPORTED_THRESHOLD: u32 = 10;

/// Hours without a successful cycle before data is reported as stale.
const STALE_DATA_HOURS: i64 = 24;

/// A condition surfaced to the host until the next successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthIssue {
    /// Several cycles in a row failed to fetch.
    ApiError,
    /// Fetching has failed long enough that the station is probably not
    /// served by the configured backend.
    StationUnsupported,
    /// No successful cycle for a day.
    StaleData,
}

/// Orchestrates fetch, processing, fallback and side effects for one board.
pub struct Coordinator<S, N> {
    config: BoardConfig,
    tz: Tz,
    query: BoardQuery,
    source: S,
    lookahead: CachedSource<S>,
    notifier: N,

    last_valid: Vec<Departure>,
    last_returned: Vec<Departure>,
    consecutive_errors: u32,
    last_success: Option<DateTime<Tz>>,
    issues: BTreeSet<HealthIssue>,

    watches: WatchList,
    connections: ConnectionBook,
    history: PunctualityLedger,
}

impl<S: DepartureSource + Sync, N: Notifier + Sync> Coordinator<S, N> {
    /// Create a coordinator.
    ///
    /// `source` serves this board; `lookahead` serves change-station boards
    /// for tracked connections and is queried without parameters.
    pub fn new(
        config: BoardConfig,
        source: S,
        lookahead: S,
        notifier: N,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tz = config.tz()?;
        let query = BoardQuery::from_config(&config);
        let cache_config = CacheConfig {
            ttl: config.lookahead_cache_ttl(),
            ..CacheConfig::default()
        };

        Ok(Self {
            tz,
            query,
            source,
            lookahead: CachedSource::new(lookahead, &cache_config),
            notifier,
            config,
            last_valid: Vec::new(),
            last_returned: Vec::new(),
            consecutive_errors: 0,
            last_success: None,
            issues: BTreeSet::new(),
            watches: WatchList::new(),
            connections: ConnectionBook::new(),
            history: PunctualityLedger::new(),
        })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Run one update cycle at the current time.
    pub async fn update(&mut self) -> Vec<Departure> {
        let now = Utc::now().with_timezone(&self.tz);
        self.update_at(now).await
    }

    /// Run one update cycle as if it were `now`.
    pub async fn update_at(&mut self, now: DateTime<Tz>) -> Vec<Departure> {
        self.history.purge(&now);

        let raw = match self
            .source
            .fetch_departures(&self.config.station, &self.query)
            .await
        {
            Ok(raw) => raw,
            Err(error) => {
                self.record_failure(&error, &now);
                return self.fallback();
            }
        };

        let mut departures = process_departures(raw, &self.config, now);
        if departures.is_empty() {
            tracing::info!(
                station = %self.config.station,
                cached = self.last_valid.len(),
                "no departures left after filtering, serving cached departures"
            );
            return self.fallback();
        }

        if !self.connections.is_empty() {
            self.attach_connections(&mut departures).await;
            truncate_to_budget(&mut departures, &self.config.record_options());
        }

        self.record_success(&now);
        self.history.record(&departures, &now);
        self.deliver_notifications(&departures).await;

        tracing::info!(
            station = %self.config.station,
            departures = departures.len(),
            "update cycle complete"
        );

        self.last_valid = departures;
        self.fallback()
    }

    /// The last good list capped to `next_departures`, remembered as returned.
    fn fallback(&mut self) -> Vec<Departure> {
        let capped: Vec<Departure> = self
            .last_valid
            .iter()
            .take(self.config.next_departures)
            .cloned()
            .collect();
        self.last_returned = capped.clone();
        capped
    }

    fn record_failure(&mut self, error: &ApiError, now: &DateTime<Tz>) {
        self.consecutive_errors += 1;
        tracing::warn!(
            station = %self.config.station,
            %error,
            consecutive_errors = self.consecutive_errors,
            cached = self.last_valid.len(),
            "fetching departures failed, serving cached departures"
        );

        if self.consecutive_errors >= API_ERROR_THRESHOLD {
            self.raise(HealthIssue::ApiError);
        }
        if self.consecutive_errors >= STATION_UNSUPPORTED_THRESHOLD {
            self.raise(HealthIssue::StationUnsupported);
        }
        if let Some(last_success) = self.last_success
            && *now - last_success >= Duration::hours(STALE_DATA_HOURS)
        {
            self.raise(HealthIssue::StaleData);
        }
    }

    fn record_success(&mut self, now: &DateTime<Tz>) {
        self.consecutive_errors = 0;
        self.last_success = Some(*now);
        for issue in std::mem::take(&mut self.issues) {
            tracing::info!(station = %self.config.station, ?issue, "health issue cleared");
        }
    }

    fn raise(&mut self, issue: HealthIssue) {
        if self.issues.insert(issue) {
            tracing::warn!(
                station = %self.config.station,
                ?issue,
                consecutive_errors = self.consecutive_errors,
                "health issue raised"
            );
        }
    }

    /// Fetch each tracked change station and attach the onward train's status.
    ///
    /// Fetches run one after another; a failed fetch leaves that departure
    /// without connection info.
    async fn attach_connections(&self, departures: &mut [Departure]) {
        for departure in departures.iter_mut() {
            let Some(connection) = self.connections.lookup(departure) else {
                continue;
            };

            match self.lookahead.get_board(&connection.change_station).await {
                Ok(board) => {
                    departure.connection_info = find_connection(&board, connection);
                    if departure.connection_info.is_none() {
                        tracing::debug!(
                            change_station = %connection.change_station,
                            next_train = %connection.next_train_id,
                            "connecting train not on change-station board"
                        );
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        change_station = %connection.change_station,
                        %error,
                        "connection lookahead failed"
                    );
                }
            }
        }
    }

    async fn deliver_notifications(&mut self, departures: &[Departure]) {
        for notification in self.watches.evaluate(departures) {
            if let Err(error) = self.notifier.notify(&notification).await {
                tracing::error!(%error, title = %notification.title, "notification not delivered");
            }
        }
    }

    /// Create or replace a watched trip.
    pub fn watch_train(&mut self, request: WatchRequest) -> Result<(), TargetError> {
        self.watches.watch(request)
    }

    /// Create or replace a tracked connection.
    pub fn track_connection(&mut self, request: TrackRequest) {
        self.connections.track(request);
    }

    /// The list returned by the most recent cycle.
    pub fn departures(&self) -> &[Departure] {
        &self.last_returned
    }

    /// The most recent list rendered as the records handed to the host.
    pub fn departure_records(&self) -> Vec<Map<String, Value>> {
        let options = self.config.record_options();
        self.last_returned
            .iter()
            .filter_map(|departure| match departure.to_record(&options) {
                Ok(record) => Some(record),
                Err(error) => {
                    tracing::debug!(%error, "departure record not rendered");
                    None
                }
            })
            .collect()
    }

    /// Display time of the next departure, the board's headline value.
    pub fn summary(&self) -> Option<&str> {
        self.last_returned
            .first()
            .map(|departure| departure.departure_current.as_str())
    }

    pub fn issues(&self) -> Vec<HealthIssue> {
        self.issues.iter().copied().collect()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn last_success(&self) -> Option<DateTime<Tz>> {
        self.last_success
    }

    pub fn statistics(&self) -> PunctualityStats {
        self.history.statistics()
    }

    pub fn watches(&self) -> &WatchList {
        &self.watches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;
    use serde_json::json;

    use crate::domain::RawDeparture;
    use crate::tracking::{Notification, NotifyError};

    /// Serves queued responses, then a timeout once the queue is empty.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<RawDeparture>, ApiError>>>,
        boards: HashMap<String, Vec<RawDeparture>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn push(&self, response: Result<Vec<Value>, ApiError>) {
            let response = response.map(|values| {
                values
                    .into_iter()
                    .map(|v| v.as_object().cloned().unwrap())
                    .collect()
            });
            self.responses.lock().unwrap().push_back(response);
        }

        fn with_board(mut self, station: &str, values: Vec<Value>) -> Self {
            self.boards.insert(
                station.to_string(),
                values
                    .into_iter()
                    .map(|v| v.as_object().cloned().unwrap())
                    .collect(),
            );
            self
        }
    }

    impl DepartureSource for ScriptedSource {
        async fn fetch_departures(
            &self,
            station: &str,
            _query: &BoardQuery,
        ) -> Result<Vec<RawDeparture>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(board) = self.boards.get(station) {
                return Ok(board.clone());
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ApiError::Timeout))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError {
                    target: notification.target.to_string(),
                    message: "service not found".into(),
                });
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn now() -> DateTime<Tz> {
        Berlin.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn departure(time: &str, train: &str) -> Value {
        json!({ "scheduledDeparture": time, "destination": "Berlin", "train": train })
    }

    fn coordinator(config: BoardConfig) -> Coordinator<ScriptedSource, RecordingNotifier> {
        Coordinator::new(
            config,
            ScriptedSource::default(),
            ScriptedSource::default(),
            RecordingNotifier::default(),
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_rejected() {
        let result = Coordinator::new(
            BoardConfig::new(" "),
            ScriptedSource::default(),
            ScriptedSource::default(),
            RecordingNotifier::default(),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn successful_cycle() {
        let mut coordinator = coordinator(BoardConfig::new("Frankfurt (Main) Hbf"));
        coordinator
            .source
            .push(Ok(vec![departure("10:10", "ICE1"), departure("10:20", "ICE2")]));

        let out = coordinator.update_at(now()).await;
        assert_eq!(out.len(), 2);
        assert_eq!(coordinator.summary(), Some("10:10"));
        assert_eq!(coordinator.last_success(), Some(now()));
        assert_eq!(coordinator.statistics().total, 2);
        assert_eq!(coordinator.departure_records().len(), 2);
    }

    #[tokio::test]
    async fn output_capped_to_next_departures() {
        let mut coordinator = coordinator(BoardConfig::new("Frankfurt (Main) Hbf"));
        let many: Vec<Value> = (0..500)
            .map(|i| {
                json!({
                    "scheduledDeparture": now().timestamp() + 600 + i,
                    "destination": "Mainz",
                    "train": format!("S {i}"),
                })
            })
            .collect();
        coordinator.source.push(Ok(many));

        let out = coordinator.update_at(now()).await;
        assert_eq!(out.len(), 4);
    }

    #[tokio::test]
    async fn all_filtered_keeps_cache() {
        let mut config = BoardConfig::new("Frankfurt (Main) Hbf");
        config.exclude_cancelled = true;
        let mut coordinator = coordinator(config);

        coordinator.source.push(Ok(vec![departure("10:10", "ICE1")]));
        coordinator.update_at(now()).await;

        let mut cancelled = departure("10:20", "ICE2");
        cancelled["cancelled"] = json!(true);
        coordinator.source.push(Ok(vec![cancelled]));

        let out = coordinator.update_at(now()).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].train.as_deref(), Some("ICE1"));
    }

    #[tokio::test]
    async fn all_filtered_without_cache_is_empty() {
        let mut config = BoardConfig::new("Frankfurt (Main) Hbf");
        config.exclude_cancelled = true;
        let mut coordinator = coordinator(config);

        let mut cancelled = departure("10:10", "ICE1");
        cancelled["cancelled"] = json!(true);
        coordinator.source.push(Ok(vec![cancelled]));

        assert!(coordinator.update_at(now()).await.is_empty());
        assert_eq!(coordinator.summary(), None);
    }

    #[tokio::test]
    async fn failures_raise_issues_until_success() {
        let mut coordinator = coordinator(BoardConfig::new("Frankfurt (Main) Hbf"));
        coordinator.source.push(Ok(vec![departure("10:10", "ICE1")]));
        coordinator.update_at(now()).await;

        for cycle in 1..=2 {
            let out = coordinator.update_at(now()).await;
            assert_eq!(out.len(), 1, "cycle {cycle} serves cache");
        }
        assert!(coordinator.issues().is_empty());

        coordinator.update_at(now()).await;
        assert_eq!(coordinator.issues(), vec![HealthIssue::ApiError]);

        for _ in 4..=10 {
            coordinator.update_at(now()).await;
        }
        assert_eq!(coordinator.consecutive_errors(), 10);
        assert_eq!(
            coordinator.issues(),
            vec![HealthIssue::ApiError, HealthIssue::StationUnsupported]
        );

        coordinator.source.push(Ok(vec![departure("10:30", "ICE3")]));
        let out = coordinator.update_at(now()).await;
        assert_eq!(out[0].train.as_deref(), Some("ICE3"));
        assert!(coordinator.issues().is_empty());
        assert_eq!(coordinator.consecutive_errors(), 0);
    }

    #[tokio::test]
    async fn stale_data_after_a_day() {
        let mut coordinator = coordinator(BoardConfig::new("Frankfurt (Main) Hbf"));
        coordinator.source.push(Ok(vec![departure("10:10", "ICE1")]));
        coordinator.update_at(now()).await;

        coordinator.update_at(now() + Duration::hours(23)).await;
        assert!(!coordinator.issues().contains(&HealthIssue::StaleData));

        coordinator.update_at(now() + Duration::hours(24)).await;
        assert!(coordinator.issues().contains(&HealthIssue::StaleData));
    }

    #[tokio::test]
    async fn no_stale_data_without_prior_success() {
        let mut coordinator = coordinator(BoardConfig::new("Frankfurt (Main) Hbf"));
        coordinator.update_at(now() + Duration::hours(48)).await;
        assert!(coordinator.issues().is_empty());
        assert_eq!(coordinator.consecutive_errors(), 1);
    }

    #[tokio::test]
    async fn watched_train_notified() {
        let mut coordinator = coordinator(BoardConfig::new("Frankfurt (Main) Hbf"));
        coordinator
            .watch_train(WatchRequest {
                train_id: "ICE1".into(),
                notify_target: "notify.phone".into(),
                delay_threshold: 5,
                notify_on_platform_change: true,
                notify_on_cancellation: true,
            })
            .unwrap();

        let mut delayed = departure("10:10", "ICE1");
        delayed["delayDeparture"] = json!(10);
        coordinator.source.push(Ok(vec![delayed.clone()]));
        coordinator.source.push(Ok(vec![delayed]));

        coordinator.update_at(now()).await;
        coordinator.update_at(now()).await;

        let sent = coordinator.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "ICE1 delayed");
    }

    #[tokio::test]
    async fn notification_failure_does_not_abort_cycle() {
        let mut coordinator = Coordinator::new(
            BoardConfig::new("Frankfurt (Main) Hbf"),
            ScriptedSource::default(),
            ScriptedSource::default(),
            RecordingNotifier {
                fail: true,
                ..Default::default()
            },
        )
        .unwrap();
        coordinator
            .watch_train(WatchRequest {
                train_id: "ICE1".into(),
                notify_target: "notify.phone".into(),
                delay_threshold: 0,
                notify_on_platform_change: false,
                notify_on_cancellation: false,
            })
            .unwrap();
        coordinator.source.push(Ok(vec![departure("10:10", "ICE1")]));

        assert_eq!(coordinator.update_at(now()).await.len(), 1);
        assert!(coordinator.issues().is_empty());
    }

    #[tokio::test]
    async fn malformed_watch_target_rejected() {
        let mut coordinator = coordinator(BoardConfig::new("Frankfurt (Main) Hbf"));
        let result = coordinator.watch_train(WatchRequest {
            train_id: "ICE1".into(),
            notify_target: "phone".into(),
            delay_threshold: 5,
            notify_on_platform_change: true,
            notify_on_cancellation: true,
        });
        assert!(result.is_err());
        assert!(coordinator.watches().is_empty());
    }

    #[tokio::test]
    async fn connection_info_attached() {
        let lookahead = ScriptedSource::default().with_board(
            "Fulda",
            vec![json!({ "train": "ICE 1601", "platform": "4", "delayDeparture": 3 })],
        );
        let mut coordinator = Coordinator::new(
            BoardConfig::new("Frankfurt (Main) Hbf"),
            ScriptedSource::default(),
            lookahead,
            RecordingNotifier::default(),
        )
        .unwrap();
        coordinator.track_connection(TrackRequest {
            train_id: "RE 50".into(),
            change_station: "Fulda".into(),
            next_train_id: "ICE 1601".into(),
        });
        coordinator.source.push(Ok(vec![
            departure("10:10", "RE 50"),
            departure("10:40", "RE 50"),
            departure("10:20", "RB 51"),
        ]));

        let out = coordinator.update_at(now()).await;
        let info = out[0].connection_info.as_ref().unwrap();
        assert_eq!(info.target_platform.as_deref(), Some("4"));
        assert_eq!(info.target_delay, 3);
        assert_eq!(info.transfer_station, "Fulda");
        assert!(out[1].connection_info.is_some());
        assert!(out[2].connection_info.is_none());

        // Both RE 50 departures share one change-station fetch.
        assert_eq!(coordinator.lookahead.source().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_lookahead_is_swallowed() {
        let mut coordinator = coordinator(BoardConfig::new("Frankfurt (Main) Hbf"));
        coordinator.track_connection(TrackRequest {
            train_id: "RE 50".into(),
            change_station: "Nowhere".into(),
            next_train_id: "ICE 1601".into(),
        });
        coordinator.source.push(Ok(vec![departure("10:10", "RE 50")]));

        let out = coordinator.update_at(now()).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].connection_info.is_none());
        assert!(coordinator.issues().is_empty());
    }
}
