//! CLI entry point for the turnstile ridership pipeline.
//!
//! `run` turns a directory of weekly turnstile logs into daily station
//! ridership; `inspect` parses a single raw file and reports its counts.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use turnstile_ridership::{
    config::PipelineConfig,
    pipeline::{Pipeline, inspect},
};

#[derive(Parser)]
#[command(name = "turnstile_ridership")]
#[command(about = "Daily station ridership from raw turnstile logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every raw file and publish daily ridership
    Run {
        /// JSON config file; defaults apply to anything it leaves out
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding turnstile_YYMMDD.txt[.gz] files
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Directory the outputs are published to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Station crosswalk CSV
        #[arg(long)]
        crosswalk: Option<PathBuf>,

        /// Remote-unit registry CSV
        #[arg(long)]
        units: Option<PathBuf>,

        /// Publish nothing if any input file fails
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Parse one raw file and log its counts
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/turnstile_ridership.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("turnstile_ridership.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", LevelFilter::INFO));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            raw_dir,
            output_dir,
            crosswalk,
            units,
            strict,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = raw_dir {
                config.raw_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(path) = crosswalk {
                config.crosswalk_path = path;
            }
            if let Some(path) = units {
                config.units_path = path;
            }
            config.strict |= strict;

            let pipeline = Pipeline::from_config(config)?;
            let files = pipeline.discover()?;
            let output = pipeline.run(&files);
            output.publish(pipeline.config())?;
        }
        Commands::Inspect { file, config } => {
            let config = load_config(config.as_deref())?;
            let stats = inspect(&file, &config)?;
            info!(
                file = %stats.file,
                layout = %stats.layout,
                rows = stats.rows_parsed,
                skipped = stats.rows_skipped,
                groups_skipped = stats.groups_skipped,
                readings = stats.readings,
                quarantined = stats.quarantined,
                "File inspected"
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::load(path)?;
            info!(path = %path.display(), "Config loaded");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Filter from `var`, falling back to `default` when the variable is unset.
fn env_filter(var: &str, default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var(var)
        .from_env_lossy()
}
