use std::path::PathBuf;

use bubblescan::detect::{MemoryDiagnostics, ProgressUpdate};
use bubblescan::ScanJobConfig;
use clap::Parser;
use log::{info, LevelFilter};

/// Detect and classify answer-sheet bubbles described by a JSON job file.
#[derive(Parser, Debug)]
#[command(name = "bubblescan", version, about)]
struct Cli {
    /// Job file naming the page image and its boxes.
    #[arg(long)]
    config: PathBuf,

    /// Report path; overrides `output_path` from the job file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Scan boxes on a thread pool.
    #[arg(long)]
    parallel: bool,

    /// One of off, error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Emit JSON-formatted tracing events.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut cfg = ScanJobConfig::load_json(&cli.config)?;
    cfg.parallel |= cli.parallel;

    let progress = |u: &ProgressUpdate| info!("{:5.1}% {}", u.percent(), u.message);
    let diagnostics = MemoryDiagnostics::new();
    let report = cfg.run(&progress, &diagnostics)?;

    let output = cli.output.unwrap_or_else(|| cfg.output_path());
    report.write_json(&output)?;

    let tested: usize = diagnostics
        .records()
        .iter()
        .map(|d| d.total_combinations_tested)
        .sum();
    println!(
        "{} boxes, {} circles ({} failed boxes, {} combinations tested) -> {}",
        report.boxes.len(),
        report.circle_count(),
        report.failed_boxes(),
        tested,
        output.display()
    );
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) {
    if let Err(err) = bubblescan::core::init_with_level(cli.log_level) {
        eprintln!("logger unavailable: {err}");
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) {
    // Route `log` records from the library crates into the subscriber.
    let _ = tracing_log::LogTracer::init();
    log::set_max_level(cli.log_level);
    bubblescan::core::init_tracing(cli.json_logs);
}
