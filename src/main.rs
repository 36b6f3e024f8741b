use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

use gcprep::config::{self, Config, RunConfig};
use gcprep::gcp;
use gcprep::report;

/// Inventory and utilization reports for GCP resources
#[derive(Parser, Debug)]
#[command(name = "gcprep", version, about, long_about = None)]
struct Args {
    /// GCP project to report on
    #[arg(short, long)]
    project: Option<String>,

    /// Comma-separated region list
    #[arg(short, long)]
    regions: Option<String>,

    /// Start of the utilization window (YYYY-MM-DD)
    #[arg(short = 'b', long = "start")]
    start: Option<String>,

    /// End of the utilization window (YYYY-MM-DD)
    #[arg(short = 'e', long = "end")]
    end: Option<String>,

    /// Sum all attached disks instead of root-disk-only sizing
    #[arg(short = 's', long = "sum-disks")]
    sum_disks: bool,

    /// Override the default output file name
    #[arg(short = 'f', long = "output-file")]
    output_file: Option<String>,

    /// Directory the dated report directory is created under
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_max_level(tracing_level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcprep started with log level: {:?}", level);

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    let config = Config::load();

    let project = args
        .project
        .clone()
        .or_else(|| config.project_id.clone())
        .or_else(gcp::auth::get_default_project)
        .ok_or_else(|| {
            anyhow::anyhow!("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project")
        })?;

    // Remember an explicit project choice for later runs
    if args.project.is_some() && config.project_id.as_deref() != Some(project.as_str()) {
        let mut updated = config.clone();
        updated.project_id = Some(project.clone());
        if let Err(e) = updated.save() {
            tracing::warn!("Could not persist project selection: {}", e);
        }
    }

    let output_root = args
        .output_dir
        .clone()
        .or_else(|| std::env::var(config::ENV_OUTPUT_DIR).ok().map(PathBuf::from))
        .or_else(|| config.output_dir.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let run = RunConfig {
        project: project.clone(),
        regions: RunConfig::parse_regions(args.regions.as_deref()),
        window: RunConfig::parse_window(args.start.as_deref(), args.end.as_deref())?,
        sum_disks: args.sum_disks,
        output_file: args.output_file.clone(),
        output_root,
    };

    // Validate the enabled reports before touching credentials or the network
    let plans = report::plan(&config, &run)?;
    if plans.is_empty() {
        println!("No reports enabled; nothing to do.");
        return Ok(());
    }

    tracing::info!(
        "project {}, regions {:?}, {} report(s) planned",
        run.project,
        run.regions,
        plans.len()
    );

    let client = gcp::client::GcpClient::new(&project).await?;

    let summary = report::execute(&client, &plans, &run).await?;

    println!("Reports written to {}", summary.run_dir.display());
    for file in &summary.files {
        println!("  {}", file.display());
    }

    Ok(())
}
