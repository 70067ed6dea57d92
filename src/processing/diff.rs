use chrono::NaiveDateTime;
use tracing::trace;

use crate::model::{Correction, DeltaRecord};
use crate::reference::ComplexIdx;

/// A resolved reading as kept in a device's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub entries: u64,
    pub exits: u64,
    pub complex: ComplexIdx,
}

/// A delta together with the complex of the reading that closed its period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodDelta {
    pub complex: ComplexIdx,
    pub record: DeltaRecord,
}

/// Sorts a device's history by timestamp and drops repeated timestamps,
/// keeping the first reading seen. Returns the number dropped.
pub fn order_history(samples: &mut Vec<Sample>) -> usize {
    let before = samples.len();
    // Stable sort: ties stay in file order so dedup keeps the earliest file.
    samples.sort_by_key(|s| s.timestamp);
    samples.dedup_by_key(|s| s.timestamp);
    before - samples.len()
}

/// Bounds one cumulative difference to `0..=ceiling`.
pub fn bounded_delta(previous: u64, current: u64, ceiling: u64) -> (u64, Correction) {
    if current < previous {
        (0, Correction::Reset)
    } else if current - previous > ceiling {
        (ceiling, Correction::Ceiling)
    } else {
        (current - previous, Correction::Clean)
    }
}

/// Turns an ordered history into per-period deltas. The first reading only
/// serves as a baseline.
pub fn diff_history(samples: &[Sample], ceiling: u64) -> Vec<PeriodDelta> {
    samples
        .windows(2)
        .map(|pair| {
            let (prev, cur) = (pair[0], pair[1]);
            let (entries, entries_correction) = bounded_delta(prev.entries, cur.entries, ceiling);
            let (exits, exits_correction) = bounded_delta(prev.exits, cur.exits, ceiling);
            if entries_correction != Correction::Clean || exits_correction != Correction::Clean {
                trace!(
                    period_start = %prev.timestamp,
                    ?entries_correction,
                    ?exits_correction,
                    raw_entries = cur.entries as i128 - prev.entries as i128,
                    raw_exits = cur.exits as i128 - prev.exits as i128,
                    "Delta clipped"
                );
            }
            PeriodDelta {
                complex: cur.complex,
                record: DeltaRecord {
                    period_start: prev.timestamp,
                    period_end: cur.timestamp,
                    entries,
                    exits,
                    entries_correction,
                    exits_correction,
                },
            }
        })
        .collect()
}
