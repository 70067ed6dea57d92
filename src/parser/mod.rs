//! Raw device-log parser.
//!
//! Weekly files named `turnstile_YYMMDD.txt` (optionally gzipped) come in two
//! layouts: before the cutover date every row packs up to eight readings
//! after the device key, afterwards each row is one reading with the station
//! fields inline. [`open`] picks the layout from the encoded date and hands
//! back a lazy [`ReadingIter`].

mod legacy;
mod modern;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::model::{QuarantinedRecord, Reading, ReasonCode};

pub use modern::MODERN_COLUMNS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Legacy,
    Modern,
}

impl Layout {
    pub fn for_file_date(file_date: u32, cutover: u32) -> Self {
        if file_date >= cutover {
            Layout::Modern
        } else {
            Layout::Legacy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Legacy => "legacy",
            Layout::Modern => "modern",
        }
    }
}

/// Extracts the YYMMDD date from `turnstile_YYMMDD.txt` or `turnstile_YYMMDD.txt.gz`.
pub fn encoded_date(file_name: &str) -> Option<u32> {
    let stem = file_name.strip_suffix(".gz").unwrap_or(file_name);
    let digits = stem.strip_prefix("turnstile_")?.strip_suffix(".txt")?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Skip counters for one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParseCounters {
    pub rows_parsed: usize,
    pub rows_skipped: usize,
    pub groups_skipped: usize,
    pub readings: usize,
}

/// One raw row, tagged by layout. Each variant turns into zero or more readings.
pub enum RawRow<'r> {
    Legacy(&'r StringRecord),
    Modern(&'r StringRecord),
}

impl RawRow<'_> {
    pub fn readings(&self, out: &mut Vec<Reading>, counters: &mut ParseCounters) {
        counters.rows_parsed += 1;
        match self {
            RawRow::Legacy(record) => legacy::unpack(record, out, counters),
            RawRow::Modern(record) => modern::unpack(record, out, counters),
        }
    }
}

/// Lazy, single-pass sequence of readings from one file.
///
/// Yields `Err` once if the underlying bytes cannot be read and then ends.
pub struct ReadingIter<R: Read> {
    reader: csv::Reader<R>,
    layout: Layout,
    record: StringRecord,
    pending: std::vec::IntoIter<Reading>,
    buffer: Vec<Reading>,
    counters: ParseCounters,
    done: bool,
}

impl<R: Read> ReadingIter<R> {
    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn counters(&self) -> ParseCounters {
        self.counters
    }
}

impl<R: Read> Iterator for ReadingIter<R> {
    type Item = Result<Reading>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(reading) = self.pending.next() {
                self.counters.readings += 1;
                return Some(Ok(reading));
            }
            if self.done {
                return None;
            }
            match self.reader.read_record(&mut self.record) {
                Ok(true) => {
                    let row = match self.layout {
                        Layout::Legacy => RawRow::Legacy(&self.record),
                        Layout::Modern => RawRow::Modern(&self.record),
                    };
                    self.buffer.clear();
                    row.readings(&mut self.buffer, &mut self.counters);
                    self.pending = std::mem::take(&mut self.buffer).into_iter();
                }
                Ok(false) => {
                    self.done = true;
                }
                Err(e) if e.is_io_error() => {
                    self.done = true;
                    return Some(Err(anyhow::Error::new(e).context("reading raw file")));
                }
                Err(e) => {
                    debug!(error = %e, "Unparseable row skipped");
                    self.counters.rows_parsed += 1;
                    self.counters.rows_skipped += 1;
                }
            }
        }
    }
}

/// Result of opening one raw file.
pub enum ParsedFile<R: Read> {
    Readings(ReadingIter<R>),
    Quarantined(QuarantinedRecord),
}

/// Builds a reading iterator over any byte source.
///
/// Modern sources must start with the declared header; a header of the wrong
/// width quarantines the whole source.
pub fn from_reader<R: Read>(source: &str, reader: R, layout: Layout) -> Result<ParsedFile<R>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(layout == Layout::Modern)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    if layout == Layout::Modern {
        let headers = reader
            .headers()
            .with_context(|| format!("reading header of {source}"))?;
        if headers.len() != MODERN_COLUMNS.len() {
            return Ok(ParsedFile::Quarantined(QuarantinedRecord::new(
                source,
                ReasonCode::UnexpectedLayout,
                format!(
                    "header has {} columns, expected {}",
                    headers.len(),
                    MODERN_COLUMNS.len()
                ),
            )));
        }
    }

    Ok(ParsedFile::Readings(ReadingIter {
        reader,
        layout,
        record: StringRecord::new(),
        pending: Vec::new().into_iter(),
        buffer: Vec::new(),
        counters: ParseCounters::default(),
        done: false,
    }))
}

/// Opens a raw file, recognising the known corrupted file and gzip input.
#[tracing::instrument(skip_all, fields(file = %path.display()))]
pub fn open(path: &Path, config: &PipelineConfig) -> Result<ParsedFile<Box<dyn Read + Send>>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    if config.is_corrupted(&file_name) {
        return Ok(ParsedFile::Quarantined(QuarantinedRecord::new(
            file_name,
            ReasonCode::CorruptedFile,
            "known file with header rows embedded as data",
        )));
    }

    let file_date = encoded_date(&file_name)
        .with_context(|| format!("{file_name} does not encode a YYMMDD date"))?;
    let layout = Layout::for_file_date(file_date, config.modern_format_cutover);

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader: Box<dyn Read + Send> = if file_name.ends_with(".gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    debug!(layout = layout.as_str(), "Opened raw file");
    from_reader(&file_name, reader, layout)
}
