use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::model::{DailyStationRidership, DeltaRecord};
use crate::reference::{ComplexIdx, Crosswalk};
use crate::stats::ComplexTotal;

#[derive(Debug, Default, Clone, Copy)]
struct Cell {
    entries: u64,
    exits: u64,
    devices: usize,
    last_device: Option<u32>,
}

/// Sums attributed deltas by (station complex, date).
///
/// Add a device's deltas contiguously; the distinct-device count relies on it.
/// Sums do not depend on the order devices are added in.
#[derive(Debug, Default)]
pub struct DailyAggregator {
    cells: HashMap<(ComplexIdx, NaiveDate), Cell>,
}

impl DailyAggregator {
    pub fn add(&mut self, device: u32, complex: ComplexIdx, date: NaiveDate, record: &DeltaRecord) {
        let cell = self.cells.entry((complex, date)).or_default();
        cell.entries += record.entries;
        cell.exits += record.exits;
        if cell.last_device != Some(device) {
            cell.devices += 1;
            cell.last_device = Some(device);
        }
    }

    /// Final rows ordered by complex id then date.
    pub fn finish(self, crosswalk: &Crosswalk) -> Vec<DailyStationRidership> {
        let mut rows: Vec<DailyStationRidership> = self
            .cells
            .into_iter()
            .map(|((complex, date), cell)| DailyStationRidership {
                complex_id: crosswalk.complex(complex).complex_id.clone(),
                date,
                entries: cell.entries,
                exits: cell.exits,
                devices: cell.devices,
            })
            .collect();
        rows.sort_by(|a, b| a.complex_id.cmp(&b.complex_id).then(a.date.cmp(&b.date)));
        rows
    }
}

/// The `n` busiest complexes over the whole run by entries plus exits, ties
/// broken by complex id.
pub fn top_complexes(
    rows: &[DailyStationRidership],
    crosswalk: &Crosswalk,
    n: usize,
) -> Vec<ComplexTotal> {
    let mut totals: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for row in rows {
        let total = totals.entry(row.complex_id.as_str()).or_default();
        total.0 += row.entries;
        total.1 += row.exits;
    }

    let mut ranked: Vec<ComplexTotal> = totals
        .into_iter()
        .map(|(complex_id, (entries, exits))| {
            let (name, routes) = crosswalk
                .find_complex(complex_id)
                .map(|idx| crosswalk.complex(idx))
                .map(|c| (c.name.clone(), c.routes.clone()))
                .unwrap_or_default();
            ComplexTotal {
                complex_id: complex_id.to_string(),
                name,
                routes,
                entries,
                exits,
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        (b.entries + b.exits)
            .cmp(&(a.entries + a.exits))
            .then_with(|| a.complex_id.cmp(&b.complex_id))
    });
    ranked.truncate(n);
    ranked
}
