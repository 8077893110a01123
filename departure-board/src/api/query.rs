//! Board query parameters.

use crate::config::BoardConfig;

/// Named data sources and the query pair that selects them upstream.
///
/// The default backend (IRIS-TTS) needs no selector.
const DATA_SOURCES: &[(&str, &str, &str)] = &[
    ("HAFAS", "hafas", "1"),
    ("DB", "hafas", "1"),
    ("ÖBB", "hafas", "ÖBB"),
    ("BVG", "hafas", "BVG"),
    ("VBB", "hafas", "VBB"),
    ("NAH.SH", "hafas", "NAHSH"),
    ("RMV", "hafas", "RMV"),
    ("VRN", "hafas", "VRN"),
    ("MVV", "efa", "MVV"),
    ("VRR", "efa", "VRR"),
    ("NVBW", "efa", "NVBW"),
    ("BEG", "efa", "BEG"),
    ("VVS", "efa", "VVS"),
    ("KVV", "efa", "KVV"),
];

const DEFAULT_DATA_SOURCE: &str = "IRIS-TTS";

/// Look up the backend-selector pair for a data source name.
///
/// Returns `None` for the default backend and for unknown names; the latter
/// is logged.
pub fn backend_selector(name: &str) -> Option<(&'static str, &'static str)> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case(DEFAULT_DATA_SOURCE) {
        return None;
    }

    let found = DATA_SOURCES
        .iter()
        .find(|(source, _, _)| source.eq_ignore_ascii_case(name) || *source == name)
        .map(|(_, key, value)| (*key, *value));

    if found.is_none() {
        tracing::warn!(data_source = name, "unknown data source, using default backend");
    }
    found
}

/// Query parameters for one board request, in the order they are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardQuery {
    params: Vec<(String, String)>,
}

impl BoardQuery {
    /// A parameterless query.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the query a board configuration asks for.
    pub fn from_config(config: &BoardConfig) -> Self {
        let mut query = Self::empty();

        if let Some(platforms) = config.platforms.as_deref().map(str::trim)
            && !platforms.is_empty()
        {
            query.push("platforms", platforms);
        }
        if let Some(admode) = config.admode {
            query.push("admode", admode.as_str());
        }
        if let Some((key, value)) = backend_selector(&config.data_source) {
            query.push(key, value);
        }
        if config.hide_low_delay {
            query.push("hidelowdelay", "1");
        }
        if config.detailed {
            query.push("detailed", "1");
            query.push("wagonorder", "1");
        }
        if config.past_60_minutes {
            query.push("past", "1");
        }

        // A single via station is filtered upstream; several are filtered locally.
        let via = config.via_stations();
        if via.len() == 1 {
            query.push("via", &via.join(","));
        }

        query
    }

    fn push(&mut self, key: &str, value: &str) {
        self.params.push((key.to_string(), value.to_string()));
    }

    /// The parameters as key/value pairs.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Look up a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
