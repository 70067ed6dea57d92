use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use turnstile_ridership::config::PipelineConfig;
use turnstile_ridership::model::{DailyStationRidership, ReasonCode};
use turnstile_ridership::output::{QUARANTINE_FILE, REPORT_FILE, RIDERSHIP_FILE};
use turnstile_ridership::pipeline::{Pipeline, RunOutput, inspect};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn config(output_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        raw_dir: fixtures().join("raw"),
        crosswalk_path: fixtures().join("stations_turnstile_mapping.csv"),
        units_path: fixtures().join("remote_booth_station.csv"),
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    }
}

fn run(config: PipelineConfig) -> (Pipeline, RunOutput) {
    let pipeline = Pipeline::from_config(config).expect("reference data should load");
    let files = pipeline.discover().expect("raw dir should be listable");
    let output = pipeline.run(&files);
    (pipeline, output)
}

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2014, m, d).unwrap()
}

fn find<'a>(rows: &'a [DailyStationRidership], complex: &str, date: NaiveDate) -> &'a DailyStationRidership {
    rows.iter()
        .find(|r| r.complex_id == complex && r.date == date)
        .unwrap_or_else(|| panic!("no row for {complex} on {date}"))
}

#[test]
fn test_full_pipeline() {
    let out_dir = tempfile::tempdir().unwrap();
    let (_, output) = run(config(out_dir.path()));
    let rows = &output.ridership;

    assert_eq!(rows.len(), 6);

    // Legacy week, resolved through the remote-unit registry.
    let lex = find(rows, "613", day(10, 4));
    assert_eq!((lex.entries, lex.exits, lex.devices), (650, 220, 1));

    // 103 St had an entries counter reset at noon, clipped to zero.
    let st103 = find(rows, "306", day(10, 4));
    assert_eq!((st103.entries, st103.exits), (370, 260));

    // The last legacy reading chains to the first modern one.
    let lex_sunday = find(rows, "613", day(10, 5));
    assert_eq!((lex_sunday.entries, lex_sunday.exits), (50, 10));

    let lex_modern = find(rows, "613", day(10, 11));
    assert_eq!((lex_modern.entries, lex_modern.exits), (300, 90));

    let ordered: Vec<(&str, NaiveDate)> = rows.iter().map(|r| (r.complex_id.as_str(), r.date)).collect();
    let mut sorted = ordered.clone();
    sorted.sort();
    assert_eq!(ordered, sorted);
}

#[test]
fn test_midnight_period_belongs_to_start_date() {
    let out_dir = tempfile::tempdir().unwrap();
    let (_, output) = run(config(out_dir.path()));

    // 20:00 -> 00:00 deltas (50 entries for 59 St) land on 10-04, not 10-05.
    let lex_sunday = find(&output.ridership, "613", day(10, 5));
    assert_eq!(lex_sunday.entries, 10 + 40);
    assert_eq!(output.stats.midnight_spanning_periods, 4);
}

#[test]
fn test_run_stats() {
    let out_dir = tempfile::tempdir().unwrap();
    let (_, output) = run(config(out_dir.path()));
    let stats = &output.stats;

    assert_eq!(stats.files.len(), 3);
    assert!(stats.failed_files.is_empty());
    assert_eq!(stats.devices_seen, 3);
    assert_eq!(stats.modal_reading_count, Some(12));
    assert_eq!(stats.devices_excluded, 1);
    assert_eq!(stats.readings_in_excluded_devices, 1);
    assert_eq!(stats.readings_excluded_division, 1);
    assert_eq!(stats.readings_excluded_control_area, 3);
    assert_eq!(stats.readings_unknown_unit, 2);
    assert_eq!(stats.readings_unmapped, 1);
    assert_eq!(stats.entries_reset_clipped, 1);
    assert_eq!(stats.readings_off_boundary, 0);
    assert_eq!(stats.deltas, 22);
    assert_eq!(stats.periods_kept, 22);
    assert_eq!(stats.first_date, Some(day(10, 4)));
    assert_eq!(stats.last_date, Some(day(10, 11)));

    let top: Vec<(&str, &str, u64)> = stats
        .top_complexes
        .iter()
        .map(|c| (c.complex_id.as_str(), c.name.as_str(), c.entries))
        .collect();
    assert_eq!(top, vec![("613", "Lexington Av/59 St", 1000), ("306", "103 St", 540)]);

    let legacy = &stats.files[0];
    assert_eq!(legacy.layout, "legacy");
    assert_eq!(legacy.rows_parsed, 6);
    assert_eq!(legacy.groups_skipped, 1);
    assert_eq!(legacy.readings, 19);

    let modern = &stats.files[1];
    assert_eq!(modern.layout, "modern");
    assert_eq!(modern.rows_parsed, 13);
    assert_eq!(modern.rows_skipped, 0);
}

#[test]
fn test_corrupted_file_yields_one_record_and_no_readings() {
    let out_dir = tempfile::tempdir().unwrap();
    let (_, output) = run(config(out_dir.path()));

    let corrupted: Vec<_> = output
        .quarantine
        .iter()
        .filter(|q| q.source == "turnstile_150919.txt")
        .collect();
    assert_eq!(corrupted.len(), 1);
    assert_eq!(corrupted[0].reason_code, ReasonCode::CorruptedFile);

    let file = &output.stats.files[2];
    assert!(file.quarantined);
    assert_eq!(file.readings, 0);
    assert!(output.ridership.iter().all(|r| r.date.format("%Y").to_string() == "2014"));
}

#[test]
fn test_row_rejections_are_quarantined() {
    let out_dir = tempfile::tempdir().unwrap();
    let (_, output) = run(config(out_dir.path()));

    let reasons: Vec<(&str, ReasonCode, &str)> = output
        .quarantine
        .iter()
        .map(|q| (q.source.as_str(), q.reason_code, q.detail.as_str()))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("turnstile_150919.txt", ReasonCode::CorruptedFile, "known file with header rows embedded as data"),
            ("turnstile_141011.txt", ReasonCode::UnknownRemoteUnit, "R999_X001 (2 readings)"),
            ("turnstile_141011.txt", ReasonCode::ExcludedControlArea, "control area OB01 (R459_OB01_00-00-00) (1 readings)"),
            ("turnstile_141018.txt", ReasonCode::UnmappedStation, "NOWHERE|Q (1 readings)"),
            ("turnstile_141018.txt", ReasonCode::ExcludedControlArea, "control area OB01 (R459_OB01_00-00-00) (1 readings)"),
            ("turnstile_141018.txt", ReasonCode::ExcludedControlArea, "station ORCHARD BEACH (R459_R999_00-00-01) (1 readings)"),
        ]
    );
}

/// One modern week where three devices at 59 St report every four hours and
/// a fourth device at 103 St reports only twice, cleanly and on boundaries.
fn write_sparse_device_week(raw_dir: &Path) {
    let header = "C/A,UNIT,SCP,STATION,LINENAME,DIVISION,DATE,TIME,DESC,ENTRIES,EXITS\n";
    let mut data = header.to_string();
    for scp in ["02-00-00", "02-00-01", "02-00-03"] {
        for reading in 0..30u64 {
            let date = day(10, 11) + chrono::Days::new(reading / 6);
            let hour = (reading % 6) * 4;
            data.push_str(&format!(
                "A002,R051,{scp},59 ST,NQR456W,BMT,{},{hour:02}:00:00,REGULAR,{},{}\n",
                date.format("%m/%d/%Y"),
                1000 + reading * 10,
                500 + reading * 5,
            ));
        }
    }
    data.push_str("R170,R191,00-00-00,103 ST,1,IRT,10/11/2014,00:00:00,REGULAR,5000,3000\n");
    data.push_str("R170,R191,00-00-00,103 ST,1,IRT,10/11/2014,04:00:00,REGULAR,5400,3200\n");
    std::fs::write(raw_dir.join("turnstile_141018.txt"), data).unwrap();
}

#[test]
fn test_sparse_device_contributes_nothing() {
    let raw = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_sparse_device_week(raw.path());
    let mut cfg = config(out_dir.path());
    cfg.raw_dir = raw.path().to_path_buf();

    let (_, output) = run(cfg.clone());

    assert_eq!(output.stats.modal_reading_count, Some(30));
    assert_eq!(output.stats.devices_excluded, 1);
    assert_eq!(output.stats.readings_in_excluded_devices, 2);
    assert!(output.ridership.iter().all(|r| r.complex_id != "306"));
    assert!(output.ridership.iter().all(|r| r.devices == 3));

    // With the filter off the same device does show up.
    cfg.outlier_threshold_factor = 0.0;
    let (_, unfiltered) = run(cfg);
    let st103 = find(&unfiltered.ridership, "306", day(10, 11));
    assert_eq!((st103.entries, st103.exits), (400, 200));
}

#[test]
fn test_year_range_drops_everything_outside() {
    let out_dir = tempfile::tempdir().unwrap();
    let mut cfg = config(out_dir.path());
    cfg.year_range = Some(turnstile_ridership::config::YearRange { start: 2015, end: 2019 });
    let (_, output) = run(cfg);

    assert!(output.ridership.is_empty());
    assert_eq!(output.stats.out_of_range_periods, 22);
}

#[test]
fn test_published_outputs_are_byte_identical_across_runs() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    for dir in [first.path(), second.path()] {
        let (pipeline, output) = run(config(dir));
        output.publish(pipeline.config()).unwrap();
    }

    for name in [RIDERSHIP_FILE, QUARANTINE_FILE, REPORT_FILE] {
        let a = std::fs::read(first.path().join(name)).unwrap();
        let b = std::fs::read(second.path().join(name)).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b, "{name} differs between runs");
    }

    let csv = std::fs::read_to_string(first.path().join(RIDERSHIP_FILE)).unwrap();
    assert!(csv.starts_with("complex_id,date,entries,exits,devices\n306,2014-10-04,370,260,1\n"));
}

#[test]
fn test_gzipped_input_reads_like_plain() {
    let dir = tempfile::tempdir().unwrap();
    let plain = fixtures().join("raw/turnstile_141018.txt");
    let gz_path = dir.path().join("turnstile_141018.txt.gz");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&std::fs::read(&plain).unwrap()).unwrap();
    std::fs::write(&gz_path, encoder.finish().unwrap()).unwrap();

    let cfg = PipelineConfig::default();
    let from_plain = inspect(&plain, &cfg).unwrap();
    let from_gz = inspect(&gz_path, &cfg).unwrap();
    assert_eq!(from_plain.readings, from_gz.readings);
    assert_eq!(from_plain.rows_parsed, from_gz.rows_parsed);
    assert_eq!(from_gz.layout, "modern");
}
