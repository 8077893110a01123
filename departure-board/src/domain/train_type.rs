//! Train type vocabulary.
//!
//! Backends report product classes in their own dialect: IRIS uses single
//! letters ("F", "N", "S"), HAFAS and EFA use product names. Everything is
//! folded into one vocabulary before filtering.

use std::collections::{BTreeSet, HashSet};

/// Upstream spelling to normalized train type.
const TRAIN_TYPE_MAPPING: &[(&str, &str)] = &[
    ("F", "Fernverkehr"),
    ("D", "Fernverkehr"),
    ("FERNVERKEHR", "Fernverkehr"),
    ("ICE", "ICE"),
    ("IC", "IC"),
    ("EC", "EC"),
    ("ECE", "EC"),
    ("N", "Nahverkehr"),
    ("NAHVERKEHR", "Nahverkehr"),
    ("RE", "RE"),
    ("RB", "RB"),
    ("IRE", "RE"),
    ("S", "S-Bahn"),
    ("S-BAHN", "S-Bahn"),
    ("SBAHN", "S-Bahn"),
    ("U", "U-Bahn"),
    ("U-BAHN", "U-Bahn"),
    ("UBAHN", "U-Bahn"),
    ("T", "Tram"),
    ("STR", "Tram"),
    ("TRAM", "Tram"),
    ("B", "Bus"),
    ("BUS", "Bus"),
    ("METROBUS", "MetroBus"),
    ("STADTBUS", "StadtBus"),
    ("SEV", "Bus"),
    ("FERRY", "Fähre"),
    ("SCHIFF", "Fähre"),
    ("FÄHRE", "Fähre"),
    ("AST", "Anrufsammeltaxi"),
    ("TAXI", "Anrufsammeltaxi"),
    ("ANRUFSAMMELTAXI", "Anrufsammeltaxi"),
];

/// Ignored types that also block a legacy spelling.
const LEGACY_ALIASES: &[(&str, &str)] = &[("S-Bahn", "S"), ("MetroBus", "StadtBus")];

/// Map one upstream spelling to the normalized vocabulary.
///
/// Returns `None` for spellings outside the vocabulary.
pub fn normalize_train_type(raw: &str) -> Option<&'static str> {
    let key = raw.trim().to_uppercase();
    TRAIN_TYPE_MAPPING
        .iter()
        .find(|(upstream, _)| *upstream == key)
        .map(|(_, normalized)| *normalized)
}

/// Normalize a collection of upstream class spellings.
pub fn normalize_train_classes<'a>(raw: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    raw.into_iter()
        .filter_map(|class| {
            let normalized = normalize_train_type(class);
            if normalized.is_none() {
                tracing::trace!(class, "unknown train class ignored");
            }
            normalized
        })
        .map(str::to_string)
        .collect()
}

/// Build the effective ignored-type set, adding legacy aliases.
pub fn expand_ignored_types(ignored: &[String]) -> HashSet<String> {
    let mut expanded: HashSet<String> = ignored.iter().map(|t| t.trim().to_string()).collect();
    for (name, alias) in LEGACY_ALIASES {
        if expanded.contains(*name) {
            expanded.insert((*alias).to_string());
        }
    }
    expanded
}
