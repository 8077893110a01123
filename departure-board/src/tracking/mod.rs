//! State that rides on top of the departure list.
//!
//! Watched trips, tracked connections and the punctuality ledger live as long
//! as the coordinator that owns them. They change only through the watch and
//! track commands and once per update cycle.

mod connection;
mod history;
mod notify;
mod watch;

pub use connection::{ConnectionBook, TrackRequest, TrackedConnection, find_connection};
pub use history::{
    HISTORY_WINDOW_HOURS, HistoryEntry, PUNCTUAL_THRESHOLD_MINUTES, PunctualityLedger,
    PunctualityStats,
};
pub use notify::{LogNotifier, Notification, Notifier, NotifyError};
pub use watch::{WatchList, WatchRequest, WatchedTrip};
