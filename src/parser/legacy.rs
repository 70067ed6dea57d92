//! Pre-cutover layout: `CA,UNIT,SCP` followed by up to eight
//! `DATE,TIME,DESC,ENTRIES,EXITS` groups, no header.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;
use tracing::trace;

use super::ParseCounters;
use crate::model::{AuditType, DeviceKey, RawSite, Reading};

const KEY_FIELDS: usize = 3;
const GROUP_FIELDS: usize = 5;
const MAX_GROUPS: usize = 8;

pub(super) fn unpack(record: &StringRecord, out: &mut Vec<Reading>, counters: &mut ParseCounters) {
    if record.len() < KEY_FIELDS || record.iter().take(KEY_FIELDS).any(str::is_empty) {
        counters.rows_skipped += 1;
        return;
    }
    let device = DeviceKey::new(&record[0], &record[1], &record[2]);

    let fields: Vec<&str> = record.iter().skip(KEY_FIELDS).collect();
    // Trailing commas leave empty fields that are not a group attempt.
    let used = fields.iter().rposition(|f| !f.is_empty()).map_or(0, |i| i + 1);

    for (idx, group) in fields[..used].chunks(GROUP_FIELDS).enumerate() {
        if idx >= MAX_GROUPS {
            counters.groups_skipped += 1;
            continue;
        }
        match parse_group(group) {
            Some((timestamp, audit, entries, exits)) => out.push(Reading {
                device: device.clone(),
                site: RawSite::Legacy,
                timestamp,
                audit,
                entries,
                exits,
            }),
            None => {
                trace!(device = %device, group = idx, "Malformed legacy group skipped");
                counters.groups_skipped += 1;
            }
        }
    }
}

fn parse_group(group: &[&str]) -> Option<(NaiveDateTime, AuditType, u64, u64)> {
    if group.len() != GROUP_FIELDS {
        return None;
    }
    let date = NaiveDate::parse_from_str(group[0], "%m-%d-%y").ok()?;
    let time = NaiveTime::parse_from_str(group[1], "%H:%M:%S").ok()?;
    let entries = group[3].parse::<u64>().ok()?;
    let exits = group[4].parse::<u64>().ok()?;
    Some((date.and_time(time), AuditType::parse(group[2]), entries, exits))
}
