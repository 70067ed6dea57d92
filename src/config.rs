//! Pipeline configuration.
//!
//! Stored as a JSON object on disk; every field is optional and falls back to
//! the historical defaults:
//! ```json
//! {
//!   "raw_dir": "data/raw/turnstile",
//!   "batch_size": 50,
//!   "year_range": { "start": 2015, "end": 2019 }
//! }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Minute past the hour at which one specific complex audits its devices.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpecialBoundary {
    pub complex_id: String,
    pub minute: u32,
}

/// Inclusive range of calendar years kept in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub raw_dir: PathBuf,
    pub crosswalk_path: PathBuf,
    pub units_path: PathBuf,
    pub output_dir: PathBuf,

    /// YYMMDD of the first file in the one-reading-per-row layout.
    pub modern_format_cutover: u32,
    pub corrupted_files: Vec<String>,

    pub excluded_control_areas: Vec<String>,
    pub excluded_stations: Vec<String>,
    pub allowed_divisions: Vec<String>,

    pub delta_ceiling: u64,
    pub outlier_threshold_factor: f64,

    pub boundary_minutes: Vec<u32>,
    pub special_boundaries: Vec<SpecialBoundary>,

    pub batch_size: usize,
    pub year_range: Option<YearRange>,
    pub strict: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw/turnstile"),
            crosswalk_path: PathBuf::from("references/stations/stations_turnstile_mapping.csv"),
            units_path: PathBuf::from("references/stations/remote_booth_station.csv"),
            output_dir: PathBuf::from("data/processed/turnstile"),
            modern_format_cutover: 141018,
            corrupted_files: vec!["turnstile_150919.txt".to_string()],
            excluded_control_areas: vec!["OB01".to_string()],
            excluded_stations: vec!["ORCHARD BEACH".to_string()],
            allowed_divisions: vec!["BMT".to_string(), "IND".to_string(), "IRT".to_string()],
            delta_ceiling: 7200,
            outlier_threshold_factor: 0.1,
            boundary_minutes: vec![0, 30],
            special_boundaries: vec![SpecialBoundary {
                complex_id: "604".to_string(),
                minute: 22,
            }],
            batch_size: 50,
            year_range: None,
            strict: false,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.outlier_threshold_factor) {
            anyhow::bail!(
                "outlier_threshold_factor must be within 0..=1, got {}",
                self.outlier_threshold_factor
            );
        }
        if let Some(range) = self.year_range {
            if range.start > range.end {
                anyhow::bail!("year_range start {} is after end {}", range.start, range.end);
            }
        }
        Ok(())
    }

    pub fn is_corrupted(&self, file_name: &str) -> bool {
        let base = file_name.strip_suffix(".gz").unwrap_or(file_name);
        self.corrupted_files.iter().any(|c| c == base)
    }
}
