use clap::{Parser, Subcommand};
use metroblock_cli::{feature_summary, AnvilRegionWriter, JsonSourceReader};
use metroblock_common::{ConvertError, Rect, Result};
use metroblock_convert::{
    ConversionConfig, ConversionReport, Converter, ProgressEvent, ProgressListener, ScaleFactor,
};
use metroblock_logger::{log, set_min_severity, LogSeverity};
use metroblock_world::SourceReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use LogSeverity::*;

#[derive(Parser, Debug)]
#[command(name = "metroblock")]
#[command(about = "Convert city simulation saves into block-based worlds")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a source save into a world directory
    Convert {
        /// Source save (JSON document)
        #[arg(long, short)]
        source: PathBuf,

        /// Output world directory
        #[arg(long, short)]
        output: PathBuf,

        /// Configuration file (JSON); flags below override it
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Source area as `x,z,width,depth` (default: the whole save)
        #[arg(long, value_parser = parse_area, allow_hyphen_values = true)]
        area: Option<Rect>,

        /// Write the conversion report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Horizontal scale, e.g. `up:4` or `down:2`
        #[arg(long)]
        scale: Option<ScaleFactor>,

        #[arg(long, allow_hyphen_values = true)]
        sea_level: Option<i32>,

        /// Per-region timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Concurrent chunk workers
        #[arg(long)]
        workers: Option<usize>,

        /// Clear a non-empty output directory
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// List feature counts and features that would be replaced by defaults
    Check {
        #[arg(long, short)]
        source: PathBuf,
    },
}

fn parse_area(value: &str) -> std::result::Result<Rect, String> {
    let parts: Vec<i32> = value
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid area '{}': {}", value, e))?;
    match parts.as_slice() {
        [x, z, width, depth] if *width > 0 && *depth > 0 => {
            Ok(Rect::with_size(*x, *z, *width, *depth))
        }
        _ => Err(format!(
            "area must be x,z,width,depth with a positive size, got '{}'",
            value
        )),
    }
}

/// Logs pipeline progress through the workspace logger.
struct LogProgress;

impl ProgressListener for LogProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { run_id, regions } => {
                log(format!("Run {} started: {} regions", run_id, regions), Info)
            }
            ProgressEvent::RegionStarted { .. } | ProgressEvent::ChunkSealed { .. } => {}
            ProgressEvent::RegionPhase { region, phase } => {
                log(format!("Region {}: {}", region, phase), Debug)
            }
            ProgressEvent::RegionFinished { region, outcome } => {
                log(format!("Region {} {}", region, outcome), Info)
            }
            ProgressEvent::RunFinished { run_id, failed } => {
                log(format!("Run {} finished, {} failed regions", run_id, failed), Info)
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ConversionConfig> {
    match path {
        Some(path) => ConversionConfig::load(path),
        None => Ok(ConversionConfig::default()),
    }
}

fn write_report(path: &Path, report: &ConversionReport) -> Result<()> {
    let json = report
        .to_json()
        .map_err(|e| ConvertError::DestinationWrite(format!("report: {}", e)))?;
    std::fs::write(path, json)
        .map_err(|e| ConvertError::DestinationWrite(format!("{}: {}", path.display(), e)))
}

#[allow(clippy::too_many_arguments)]
async fn convert(
    source: &Path,
    output: &Path,
    config: Option<&Path>,
    area: Option<Rect>,
    report_path: Option<&Path>,
    scale: Option<ScaleFactor>,
    sea_level: Option<i32>,
    timeout: Option<u64>,
    workers: Option<usize>,
    force: bool,
) -> Result<bool> {
    let mut config = load_config(config)?;
    if let Some(scale) = scale {
        config.scale = scale;
    }
    if let Some(sea_level) = sea_level {
        config.sea_level = sea_level;
    }
    if let Some(timeout) = timeout {
        config.region_timeout_secs = timeout;
    }
    if let Some(workers) = workers {
        config.column_workers = workers;
    }

    let reader = Arc::new(JsonSourceReader::open(source)?);
    let area = match area {
        Some(area) => area,
        None => reader.extent()?,
    };
    let writer = Arc::new(AnvilRegionWriter::create(output, force)?);
    let converter = Converter::new(reader, writer, config)?.with_progress(Arc::new(LogProgress));

    let token = converter.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log("Interrupted, finishing the current batch".to_owned(), Warning);
            token.cancel();
        }
    });

    let report = converter.convert(area).await;
    for region in &report.regions {
        log(
            format!(
                "{}: {} ({} chunks, {} defaulted)",
                region.region, region.outcome, region.chunks, region.defaulted_chunks
            ),
            Info,
        );
    }
    if let Some(path) = report_path {
        write_report(path, &report)?;
    }
    if let Some(err) = &report.fatal {
        log(format!("Conversion stopped: {}", err), Error);
    }
    Ok(report.is_success())
}

fn check(source: &Path) -> Result<bool> {
    let reader = JsonSourceReader::open(source)?;
    let summary = feature_summary(reader.source());
    for (class, count) in &summary.counts {
        log(format!("{:?}: {}", class, count), Info);
    }
    for (id, reason) in &summary.malformed {
        log(format!("Feature #{} is malformed: {}", id, reason), Warning);
    }
    log(
        format!("{} malformed features", summary.malformed.len()),
        Info,
    );
    Ok(summary.malformed.is_empty())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.debug {
        set_min_severity(Debug);
    }

    let result = match cli.command {
        Command::Convert {
            source,
            output,
            config,
            area,
            report,
            scale,
            sea_level,
            timeout,
            workers,
            force,
        } => {
            convert(
                &source,
                &output,
                config.as_deref(),
                area,
                report.as_deref(),
                scale,
                sea_level,
                timeout,
                workers,
                force,
            )
            .await
        }
        Command::Check { source } => check(&source),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            log(err.to_string(), Fatal);
            ExitCode::from(2)
        }
    }
}
