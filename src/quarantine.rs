//! Side channel for rejected files and rows.

use std::collections::BTreeMap;

use crate::model::{QuarantinedRecord, ReasonCode};

/// Collects quarantined files as-is and coalesces row-level rejections per
/// (source, reason, subject) so the log stays bounded on large runs.
#[derive(Debug, Default)]
pub struct QuarantineLog {
    files: Vec<QuarantinedRecord>,
    rows: BTreeMap<(String, ReasonCode, String), usize>,
}

impl QuarantineLog {
    pub fn push_file(&mut self, record: QuarantinedRecord) {
        self.files.push(record);
    }

    pub fn count_row(&mut self, source: &str, reason: ReasonCode, subject: String) {
        *self
            .rows
            .entry((source.to_string(), reason, subject))
            .or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: QuarantineLog) {
        self.files.extend(other.files);
        for (key, n) in other.rows {
            *self.rows.entry(key).or_insert(0) += n;
        }
    }

    /// File-level records in arrival order, then row-level ones sorted by key.
    pub fn into_records(self) -> Vec<QuarantinedRecord> {
        let mut out = self.files;
        out.extend(self.rows.into_iter().map(|((source, reason, subject), n)| {
            QuarantinedRecord::new(source, reason, format!("{subject} ({n} readings)"))
        }));
        out
    }
}
