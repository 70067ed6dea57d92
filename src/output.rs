//! Output persistence for a finished run.
//!
//! Ridership and quarantine rows go to CSV, the run report to JSON. Every file
//! is written under a temporary name and renamed into place only once all of
//! them were written; a rename that fails puts the previous outputs back.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::{DailyStationRidership, QuarantinedRecord};
use crate::stats::RunStats;

pub const RIDERSHIP_FILE: &str = "daily_ridership.csv";
pub const QUARANTINE_FILE: &str = "quarantine.csv";
pub const REPORT_FILE: &str = "run_report.json";

/// Writes `rows` as CSV with a header derived from `T`.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV");
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn staging_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{name}.tmp"))
}

fn backup_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{name}.bak"))
}

/// One output moved into place, with the previous file it displaced.
struct Installed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

fn install(tmp: &Path, target: &Path, backup: &Path) -> Result<Installed> {
    let backup = if target.exists() {
        fs::rename(target, backup)
            .with_context(|| format!("setting aside {}", target.display()))?;
        Some(backup.to_path_buf())
    } else {
        None
    };
    if let Err(e) = fs::rename(tmp, target) {
        if let Some(backup) = &backup {
            let _ = fs::rename(backup, target);
        }
        return Err(e).with_context(|| format!("moving {} into place", target.display()));
    }
    Ok(Installed {
        target: target.to_path_buf(),
        backup,
    })
}

/// Puts back whatever the installed outputs displaced.
fn roll_back(installed: &[Installed]) {
    for done in installed.iter().rev() {
        match &done.backup {
            Some(backup) => {
                let _ = fs::rename(backup, &done.target);
            }
            None => {
                let _ = fs::remove_file(&done.target);
            }
        }
    }
}

/// Writes all run outputs into `dir`. Either every output is replaced or, on
/// failure, the directory keeps the outputs of the previous run.
pub fn publish(
    dir: &Path,
    ridership: &[DailyStationRidership],
    quarantine: &[QuarantinedRecord],
    stats: &RunStats,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    // Ridership goes last: its presence marks a complete publish.
    let names = [QUARANTINE_FILE, REPORT_FILE, RIDERSHIP_FILE];
    let staged: Vec<PathBuf> = names.iter().map(|name| staging_path(dir, name)).collect();

    let written = write_csv(&staged[0], quarantine)
        .and_then(|_| write_json(&staged[1], stats))
        .and_then(|_| write_csv(&staged[2], ridership));
    if let Err(e) = written {
        for tmp in &staged {
            let _ = fs::remove_file(tmp);
        }
        return Err(e);
    }

    let mut installed = Vec::with_capacity(names.len());
    for (name, tmp) in names.iter().zip(&staged) {
        match install(tmp, &dir.join(name), &backup_path(dir, name)) {
            Ok(done) => installed.push(done),
            Err(e) => {
                roll_back(&installed);
                for tmp in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e);
            }
        }
    }
    for done in &installed {
        if let Some(backup) = &done.backup {
            let _ = fs::remove_file(backup);
        }
    }

    info!(
        dir = %dir.display(),
        ridership_rows = ridership.len(),
        quarantined = quarantine.len(),
        "Outputs published"
    );
    Ok(())
}
