//! Which readings count, and on which calendar date their periods fall.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashMap;
use tracing::warn;

use crate::config::{PipelineConfig, YearRange};
use crate::model::DeltaRecord;
use crate::processing::diff::Sample;
use crate::reference::{ComplexIdx, Crosswalk};

/// Recognised audit boundaries: network-wide minutes plus per-complex extras.
#[derive(Debug, Clone, Default)]
pub struct AuditBoundaries {
    minutes: Vec<u32>,
    special: HashMap<ComplexIdx, Vec<u32>>,
}

impl AuditBoundaries {
    pub fn new(config: &PipelineConfig, crosswalk: &Crosswalk) -> Self {
        let mut special: HashMap<ComplexIdx, Vec<u32>> = HashMap::new();
        for boundary in &config.special_boundaries {
            match crosswalk.find_complex(&boundary.complex_id) {
                Some(idx) => special.entry(idx).or_default().push(boundary.minute),
                None => warn!(
                    complex_id = %boundary.complex_id,
                    minute = boundary.minute,
                    "Special audit boundary names a complex missing from the crosswalk"
                ),
            }
        }
        Self {
            minutes: config.boundary_minutes.clone(),
            special,
        }
    }

    pub fn is_boundary(&self, complex: ComplexIdx, start: NaiveDateTime) -> bool {
        if start.second() != 0 || start.nanosecond() != 0 {
            return false;
        }
        let minute = start.minute();
        self.minutes.contains(&minute)
            || self
                .special
                .get(&complex)
                .is_some_and(|extra| extra.contains(&minute))
    }

    /// Drops readings taken off an audit boundary, so every period that is
    /// diffed afterwards runs from one boundary reading to the next. Returns
    /// the number dropped.
    pub fn retain_on_boundary(&self, samples: &mut Vec<Sample>) -> usize {
        let before = samples.len();
        samples.retain(|s| self.is_boundary(s.complex, s.timestamp));
        before - samples.len()
    }
}

/// Date a period's traffic belongs to: always the date it started on, so a
/// 20:00 to 00:00 period stays with the evening it began.
pub fn attributed_date(period_start: NaiveDateTime) -> NaiveDate {
    period_start.date()
}

pub fn spans_midnight(record: &DeltaRecord) -> bool {
    record.period_end.date() > record.period_start.date()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    Keep(NaiveDate),
    OutOfRange,
}

pub fn attribute(year_range: Option<YearRange>, record: &DeltaRecord) -> Attribution {
    let date = attributed_date(record.period_start);
    match year_range {
        Some(range) if !range.contains(date.year()) => Attribution::OutOfRange,
        _ => Attribution::Keep(date),
    }
}
