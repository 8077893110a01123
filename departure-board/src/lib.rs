//! Departure board.
//!
//! Polls a public departure API for one station and turns the loosely typed
//! response into a filtered, annotated and size-bounded list of departures,
//! with watched-trip notifications, connection lookahead and punctuality
//! history on top.

pub mod api;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod pipeline;
pub mod tracking;
pub mod web;
