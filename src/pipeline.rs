//! Run orchestration.
//!
//! Raw files are discovered under the configured directory and loaded in
//! batches. Inside a batch files are parsed and resolved in parallel, each
//! into its own [`FileLoad`]; loads are merged into run state in file order
//! once the batch is done. Only after every batch is merged does the outlier
//! decision run, followed by the audit-boundary filter, diffing, attribution
//! and aggregation.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::model::{
    Correction, DailyStationRidership, DeviceKey, QuarantinedRecord, ReasonCode,
};
use crate::output;
use crate::parser::{self, ParsedFile, encoded_date};
use crate::processing::aggregate::{DailyAggregator, top_complexes};
use crate::processing::attribution::{AuditBoundaries, Attribution, attribute, spans_midnight};
use crate::processing::diff::{Sample, diff_history, order_history};
use crate::processing::outlier::OutlierDecision;
use crate::quarantine::QuarantineLog;
use crate::reference::ReferenceData;
use crate::resolver::{Rejection, Resolver};
use crate::stats::{FailedFile, FileStats, RunStats};

/// Complexes listed in the run report's busiest-complex summary.
const TOP_COMPLEXES: usize = 10;

/// Everything one raw file contributed, isolated from run state until merged.
#[derive(Debug, Default)]
pub struct FileLoad {
    pub stats: RunStats,
    pub quarantine: QuarantineLog,
    pub histories: HashMap<DeviceKey, Vec<Sample>>,
}

/// Result of a complete run, ready to publish.
#[derive(Debug)]
pub struct RunOutput {
    pub ridership: Vec<DailyStationRidership>,
    pub quarantine: Vec<QuarantinedRecord>,
    pub stats: RunStats,
}

impl RunOutput {
    /// Writes all outputs into `config.output_dir`. In strict mode a run with
    /// failed files publishes nothing.
    pub fn publish(&self, config: &PipelineConfig) -> Result<()> {
        if config.strict && !self.stats.failed_files.is_empty() {
            anyhow::bail!(
                "{} input file(s) failed and strict mode is on; nothing published",
                self.stats.failed_files.len()
            );
        }
        output::publish(
            &config.output_dir,
            &self.ridership,
            &self.quarantine,
            &self.stats,
        )
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    refs: ReferenceData,
}

impl Pipeline {
    /// Fails if the config does not validate.
    pub fn new(config: PipelineConfig, refs: ReferenceData) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, refs })
    }

    /// Loads reference data named by the config.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let refs = ReferenceData::load(&config)?;
        Ok(Self { config, refs })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Raw files under `raw_dir`, ordered by the date encoded in their name.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.config.raw_dir;
        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match encoded_date(name) {
                Some(date) => found.push((date, name.to_string(), path)),
                None => debug!(file = %name, "Ignoring file without an encoded date"),
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        info!(dir = %dir.display(), files = found.len(), "Raw files discovered");
        Ok(found.into_iter().map(|(_, _, path)| path).collect())
    }

    /// Parses and resolves one file. Any read failure fails the whole file.
    #[tracing::instrument(skip_all, fields(file = %path.display()))]
    pub fn load_file(&self, path: &Path) -> Result<FileLoad> {
        let file_name = file_name(path);
        let mut load = FileLoad::default();
        let mut file_stats = FileStats {
            file: file_name.clone(),
            ..Default::default()
        };

        match parser::open(path, &self.config)? {
            ParsedFile::Quarantined(record) => {
                warn!(reason = %record.reason_code, detail = %record.detail, "File quarantined");
                file_stats.quarantined = true;
                load.quarantine.push_file(record);
            }
            ParsedFile::Readings(mut readings) => {
                file_stats.layout = readings.layout().as_str().to_string();
                let resolver = Resolver::new(&self.config, &self.refs);

                for reading in readings.by_ref() {
                    let reading = reading.with_context(|| format!("reading {file_name}"))?;
                    match resolver.resolve(&reading.device, &reading.site) {
                        Ok(complex) => {
                            load.stats.readings_resolved += 1;
                            load.histories.entry(reading.device).or_default().push(Sample {
                                timestamp: reading.timestamp,
                                entries: reading.entries,
                                exits: reading.exits,
                                complex,
                            });
                        }
                        Err(rejection) => {
                            record_rejection(&mut load, &file_name, &reading.device, rejection)
                        }
                    }
                }

                let counters = readings.counters();
                file_stats.rows_parsed = counters.rows_parsed;
                file_stats.rows_skipped = counters.rows_skipped;
                file_stats.groups_skipped = counters.groups_skipped;
                file_stats.readings = counters.readings;
            }
        }

        debug!(
            layout = %file_stats.layout,
            rows = file_stats.rows_parsed,
            skipped = file_stats.rows_skipped,
            readings = file_stats.readings,
            devices = load.histories.len(),
            "File loaded"
        );
        load.stats.files.push(file_stats);
        Ok(load)
    }

    /// Runs every stage over `files` (in the given order).
    #[tracing::instrument(skip_all, fields(files = files.len()))]
    pub fn run(&self, files: &[PathBuf]) -> RunOutput {
        let mut stats = RunStats::default();
        let mut quarantine = QuarantineLog::default();
        let mut histories: HashMap<DeviceKey, Vec<Sample>> = HashMap::new();

        for (n, batch) in files.chunks(self.config.batch_size).enumerate() {
            let loads: Vec<(String, Result<FileLoad>)> = batch
                .par_iter()
                .map(|path| (file_name(path), self.load_file(path)))
                .collect();

            for (name, load) in loads {
                match load {
                    Ok(load) => {
                        stats.merge_resolution(load.stats);
                        quarantine.merge(load.quarantine);
                        for (device, mut samples) in load.histories {
                            histories.entry(device).or_default().append(&mut samples);
                        }
                    }
                    Err(e) => {
                        let error = format!("{e:#}");
                        warn!(file = %name, error = %error, "File failed; its readings are discarded");
                        quarantine.push_file(QuarantinedRecord::new(
                            name.clone(),
                            ReasonCode::UnreadableFile,
                            error.clone(),
                        ));
                        stats.failed_files.push(FailedFile { file: name, error });
                    }
                }
            }

            info!(
                batch = n + 1,
                files = batch.len(),
                devices = histories.len(),
                "Batch merged"
            );
        }

        info!(
            readings = stats.readings_resolved,
            rejected = stats.readings_rejected(),
            unmapped_pct = stats.unmapped_pct(),
            failed_files = stats.failed_files.len(),
            "Resolution finished"
        );

        let ridership = self.process(histories, &mut stats);
        let quarantine = quarantine.into_records();

        info!(
            daily_rows = stats.daily_rows,
            complexes = stats.complexes,
            total_entries = stats.total_entries,
            total_exits = stats.total_exits,
            quarantined = quarantine.len(),
            "Run finished"
        );

        RunOutput {
            ridership,
            quarantine,
            stats,
        }
    }

    /// Outlier decision over the complete device set, then per device: order,
    /// drop off-boundary readings, diff, attribute and aggregate.
    fn process(
        &self,
        histories: HashMap<DeviceKey, Vec<Sample>>,
        stats: &mut RunStats,
    ) -> Vec<DailyStationRidership> {
        stats.devices_seen = histories.len();
        let decision = OutlierDecision::from_counts(
            histories.values().map(Vec::len),
            self.config.outlier_threshold_factor,
        );
        stats.modal_reading_count = decision.modal_count;
        stats.outlier_threshold = decision.threshold;

        let boundaries = AuditBoundaries::new(&self.config, &self.refs.crosswalk);
        let mut devices: Vec<(DeviceKey, Vec<Sample>)> = histories.into_iter().collect();
        devices.sort_by(|a, b| a.0.cmp(&b.0));

        let mut aggregator = DailyAggregator::default();
        for (ordinal, (device, mut samples)) in devices.into_iter().enumerate() {
            if decision.excludes(samples.len()) {
                debug!(device = %device, readings = samples.len(), "Device excluded as outlier");
                stats.devices_excluded += 1;
                stats.readings_in_excluded_devices += samples.len();
                continue;
            }

            stats.duplicate_readings += order_history(&mut samples);
            stats.readings_off_boundary += boundaries.retain_on_boundary(&mut samples);

            for delta in diff_history(&samples, self.config.delta_ceiling) {
                stats.deltas += 1;
                match delta.record.entries_correction {
                    Correction::Reset => stats.entries_reset_clipped += 1,
                    Correction::Ceiling => stats.entries_ceiling_clipped += 1,
                    Correction::Clean => {}
                }
                match delta.record.exits_correction {
                    Correction::Reset => stats.exits_reset_clipped += 1,
                    Correction::Ceiling => stats.exits_ceiling_clipped += 1,
                    Correction::Clean => {}
                }

                match attribute(self.config.year_range, &delta.record) {
                    Attribution::Keep(date) => {
                        stats.periods_kept += 1;
                        if spans_midnight(&delta.record) {
                            stats.midnight_spanning_periods += 1;
                        }
                        stats.total_entries += delta.record.entries;
                        stats.total_exits += delta.record.exits;
                        aggregator.add(ordinal as u32, delta.complex, date, &delta.record);
                    }
                    Attribution::OutOfRange => stats.out_of_range_periods += 1,
                }
            }
        }

        info!(
            devices = stats.devices_seen,
            excluded = stats.devices_excluded,
            modal_count = ?stats.modal_reading_count,
            threshold = stats.outlier_threshold,
            deltas = stats.deltas,
            kept = stats.periods_kept,
            off_boundary = stats.readings_off_boundary,
            "Devices processed"
        );

        let rows = aggregator.finish(&self.refs.crosswalk);
        stats.daily_rows = rows.len();
        stats.complexes = rows
            .iter()
            .map(|r| r.complex_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        stats.first_date = rows.iter().map(|r| r.date).min();
        stats.last_date = rows.iter().map(|r| r.date).max();
        stats.top_complexes = top_complexes(&rows, &self.refs.crosswalk, TOP_COMPLEXES);
        for (rank, complex) in stats.top_complexes.iter().enumerate() {
            info!(
                rank = rank + 1,
                complex_id = %complex.complex_id,
                name = %complex.name,
                entries = complex.entries,
                exits = complex.exits,
                "Busiest complex"
            );
        }
        rows
    }
}

fn record_rejection(load: &mut FileLoad, source: &str, device: &DeviceKey, rejection: Rejection) {
    let subject = match &rejection {
        Rejection::ExcludedControlArea => {
            load.stats.readings_excluded_control_area += 1;
            format!("control area {} ({device})", device.control_area)
        }
        Rejection::ExcludedStation(station) => {
            load.stats.readings_excluded_control_area += 1;
            format!("station {station} ({device})")
        }
        Rejection::ExcludedDivision(_) => {
            load.stats.readings_excluded_division += 1;
            return;
        }
        Rejection::UnknownRemoteUnit => {
            load.stats.readings_unknown_unit += 1;
            format!("{}_{}", device.unit, device.control_area)
        }
        Rejection::UnmappedStation { station, line } => {
            load.stats.readings_unmapped += 1;
            format!("{station}|{line}")
        }
    };
    if let Some(reason) = rejection.reason_code() {
        load.quarantine.count_row(source, reason, subject);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parses one raw file and reports its counts without resolving anything.
pub fn inspect(path: &Path, config: &PipelineConfig) -> Result<FileStats> {
    let mut file_stats = FileStats {
        file: file_name(path),
        ..Default::default()
    };
    match parser::open(path, config)? {
        ParsedFile::Quarantined(record) => {
            info!(reason = %record.reason_code, detail = %record.detail, "File would be quarantined");
            file_stats.quarantined = true;
        }
        ParsedFile::Readings(mut readings) => {
            file_stats.layout = readings.layout().as_str().to_string();
            for reading in readings.by_ref() {
                reading?;
            }
            let counters = readings.counters();
            file_stats.rows_parsed = counters.rows_parsed;
            file_stats.rows_skipped = counters.rows_skipped;
            file_stats.groups_skipped = counters.groups_skipped;
            file_stats.readings = counters.readings;
        }
    }
    Ok(file_stats)
}
