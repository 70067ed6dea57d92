//! Run-scoped statistics.
//!
//! Every stage writes into a [`RunStats`] passed to it explicitly; per-file
//! loads carry their own copy which is merged once the file is accepted.

use chrono::NaiveDate;
use serde::Serialize;

/// Counters for one raw input file.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FileStats {
    pub file: String,
    pub layout: String,
    pub rows_parsed: usize,
    pub rows_skipped: usize,
    pub groups_skipped: usize,
    pub readings: usize,
    pub quarantined: bool,
}

/// Run totals for one station complex, as listed in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplexTotal {
    pub complex_id: String,
    pub name: String,
    pub routes: String,
    pub entries: u64,
    pub exits: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub files: Vec<FileStats>,
    pub failed_files: Vec<FailedFile>,

    // resolution
    pub readings_resolved: usize,
    pub readings_excluded_division: usize,
    pub readings_excluded_control_area: usize,
    pub readings_unmapped: usize,
    pub readings_unknown_unit: usize,
    pub duplicate_readings: usize,

    // outlier filter
    pub devices_seen: usize,
    pub devices_excluded: usize,
    pub readings_in_excluded_devices: usize,
    pub modal_reading_count: Option<usize>,
    pub outlier_threshold: f64,

    // audit boundaries
    pub readings_off_boundary: usize,

    // diff engine
    pub deltas: usize,
    pub entries_reset_clipped: usize,
    pub entries_ceiling_clipped: usize,
    pub exits_reset_clipped: usize,
    pub exits_ceiling_clipped: usize,

    // attribution
    pub midnight_spanning_periods: usize,
    pub out_of_range_periods: usize,
    pub periods_kept: usize,

    // aggregate
    pub total_entries: u64,
    pub total_exits: u64,
    pub complexes: usize,
    pub daily_rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub top_complexes: Vec<ComplexTotal>,
}

impl RunStats {
    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn rows_parsed(&self) -> usize {
        self.files.iter().map(|f| f.rows_parsed).sum()
    }

    pub fn rows_skipped(&self) -> usize {
        self.files.iter().map(|f| f.rows_skipped).sum()
    }

    pub fn readings_rejected(&self) -> usize {
        self.readings_excluded_division
            + self.readings_excluded_control_area
            + self.readings_unmapped
            + self.readings_unknown_unit
    }

    pub fn unmapped_pct(&self) -> f64 {
        Self::pct(
            self.readings_unmapped + self.readings_unknown_unit,
            self.readings_resolved + self.readings_rejected(),
        )
    }

    /// Folds the resolution counters of one accepted file into the run.
    /// Stage counters past resolution are run-global and never merged.
    pub fn merge_resolution(&mut self, other: RunStats) {
        self.files.extend(other.files);
        self.failed_files.extend(other.failed_files);
        self.readings_resolved += other.readings_resolved;
        self.readings_excluded_division += other.readings_excluded_division;
        self.readings_excluded_control_area += other.readings_excluded_control_area;
        self.readings_unmapped += other.readings_unmapped;
        self.readings_unknown_unit += other.readings_unknown_unit;
    }
}
