//! Payload size budget.
//!
//! The host stores the departure list as one attribute, which has a hard size
//! limit. Sizes are measured on the serialized output records, so the
//! internal time values never count.

use crate::domain::{Departure, RecordOptions};

/// Maximum serialized size of the departure list, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 16_000;

/// Running size of a JSON array being built one record at a time.
#[derive(Debug, Clone)]
pub struct SizeBudget {
    limit: usize,
    used: usize,
    items: usize,
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_BYTES)
    }
}

impl SizeBudget {
    pub fn new(limit: usize) -> Self {
        // An empty array is "[]".
        Self {
            limit,
            used: 2,
            items: 0,
        }
    }

    /// Admit a record of `len` bytes if the list stays within the limit.
    pub fn try_admit(&mut self, len: usize) -> bool {
        let separator = usize::from(self.items > 0);
        let next = self.used + separator + len;
        if next > self.limit {
            return false;
        }
        self.used = next;
        self.items += 1;
        true
    }

    /// Bytes used so far.
    pub fn used(&self) -> usize {
        self.used
    }
}

/// Drop departures from the tail until the whole list fits the budget.
///
/// A record that fails to serialize is removed outright.
pub fn truncate_to_budget(departures: &mut Vec<Departure>, options: &RecordOptions) {
    let mut budget = SizeBudget::default();
    let mut full = false;
    let before = departures.len();

    departures.retain(|departure| {
        if full {
            return false;
        }
        match departure.record_len(options) {
            Ok(len) if budget.try_admit(len) => true,
            Ok(_) => {
                full = true;
                false
            }
            Err(error) => {
                tracing::debug!(%error, "dropping unserializable departure");
                false
            }
        }
    });

    if departures.len() < before {
        tracing::debug!(
            kept = departures.len(),
            dropped = before - departures.len(),
            "departure list truncated to size budget"
        );
    }
}
