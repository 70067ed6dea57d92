//! Core data types shared by every pipeline stage.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// A single fare-control device, identified by control area, remote unit and
/// subunit channel position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceKey {
    pub control_area: String,
    pub unit: String,
    pub scp: String,
}

impl DeviceKey {
    pub fn new(control_area: &str, unit: &str, scp: &str) -> Self {
        Self {
            control_area: control_area.trim().to_string(),
            unit: unit.trim().to_string(),
            scp: scp.trim().to_string(),
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.unit, self.control_area, self.scp)
    }
}

/// Station fields as they appear in the raw data. Legacy rows carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSite {
    Legacy,
    Modern {
        station: String,
        line: String,
        division: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditType {
    Regular,
    Recovered,
    Other(String),
}

impl AuditType {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "REGULAR" => AuditType::Regular,
            "RECOVR AUD" | "RECOVR" => AuditType::Recovered,
            other => AuditType::Other(other.to_string()),
        }
    }
}

/// One cumulative counter reading.
#[derive(Debug, Clone)]
pub struct Reading {
    pub device: DeviceKey,
    pub site: RawSite,
    pub timestamp: NaiveDateTime,
    pub audit: AuditType,
    pub entries: u64,
    pub exits: u64,
}

/// How a delta was brought into the `0..=ceiling` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    Clean,
    /// Counter went backwards; clipped to zero.
    Reset,
    /// Counter jumped past the physical ceiling; clipped to it.
    Ceiling,
}

/// The traffic a device recorded between two adjacent readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRecord {
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub entries: u64,
    pub exits: u64,
    pub entries_correction: Correction,
    pub exits_correction: Correction,
}

/// Canonical station complex from the crosswalk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationComplex {
    pub complex_id: String,
    pub name: String,
    pub routes: String,
}

/// Terminal artifact: one row per complex per attributed date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStationRidership {
    pub complex_id: String,
    pub date: NaiveDate,
    pub entries: u64,
    pub exits: u64,
    pub devices: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    CorruptedFile,
    UnexpectedLayout,
    UnreadableFile,
    UnmappedStation,
    UnknownRemoteUnit,
    ExcludedControlArea,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::CorruptedFile => "corrupted_file",
            ReasonCode::UnexpectedLayout => "unexpected_layout",
            ReasonCode::UnreadableFile => "unreadable_file",
            ReasonCode::UnmappedStation => "unmapped_station",
            ReasonCode::UnknownRemoteUnit => "unknown_remote_unit",
            ReasonCode::ExcludedControlArea => "excluded_control_area",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected file or row, kept for audit and never aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantinedRecord {
    #[serde(rename = "source_file_or_row")]
    pub source: String,
    pub reason_code: ReasonCode,
    pub detail: String,
}

impl QuarantinedRecord {
    pub fn new(source: impl Into<String>, reason_code: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason_code,
            detail: detail.into(),
        }
    }
}
