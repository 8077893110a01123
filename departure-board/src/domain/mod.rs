//! Domain types for the departure board.
//!
//! Raw upstream records are converted into validated types here. Code that
//! receives a [`Departure`] can rely on it having a resolved departure time
//! and a normalized train-class set.

mod departure;
mod target;
mod time;
mod train_type;

pub(crate) use departure::{delay_value, value_text};
pub use departure::{
    AlternativeConnection, ConnectionInfo, Departure, Facilities, RawDeparture, RecordError,
    RecordOptions, RouteDetail,
};
pub use target::{ServiceTarget, TargetError};
pub use time::{
    ARRIVAL_TIME_FIELDS, DEPARTURE_TIME_FIELDS, TimeError, anchor_today, arrival_time,
    departure_time, display_time, first_time_value, localize, parse_time_str, parse_time_value,
};
pub use train_type::{expand_ignored_types, normalize_train_classes, normalize_train_type};
