//! Post-cutover layout: one reading per row with station fields inline.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;

use super::ParseCounters;
use crate::model::{AuditType, DeviceKey, RawSite, Reading};

pub const MODERN_COLUMNS: [&str; 11] = [
    "C/A", "UNIT", "SCP", "STATION", "LINENAME", "DIVISION", "DATE", "TIME", "DESC", "ENTRIES",
    "EXITS",
];

pub(super) fn unpack(record: &StringRecord, out: &mut Vec<Reading>, counters: &mut ParseCounters) {
    match parse_row(record) {
        Some(reading) => out.push(reading),
        None => counters.rows_skipped += 1,
    }
}

fn parse_row(record: &StringRecord) -> Option<Reading> {
    if record.len() != MODERN_COLUMNS.len() {
        return None;
    }
    let date = NaiveDate::parse_from_str(&record[6], "%m/%d/%Y").ok()?;
    let time = NaiveTime::parse_from_str(&record[7], "%H:%M:%S").ok()?;
    let timestamp = NaiveDateTime::new(date, time);

    Some(Reading {
        device: DeviceKey::new(&record[0], &record[1], &record[2]),
        site: RawSite::Modern {
            station: record[3].to_string(),
            line: record[4].to_string(),
            division: record[5].to_string(),
        },
        timestamp,
        audit: AuditType::parse(&record[8]),
        entries: record[9].parse().ok()?,
        exits: record[10].parse().ok()?,
    })
}
