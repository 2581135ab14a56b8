/*!
 * Cascade CLI - Command Line Interface
 */

use cascade::{
    cli_progress::CliProgress,
    config::{CopyConfig, LogLevel},
    error::{CascadeError, Result, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    output::OutputWriter,
    ByteCounter, CopyBatch,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "cascade")]
#[command(version, about = "Parallel file copy that adds workers while throughput keeps rising", long_about = None)]
struct Cli {
    /// Load settings from a TOML file (flags override it)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Verbose logging (same as --log-level debug)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy files and directories
    Cp(CpArgs),
}

#[derive(Args)]
struct CpArgs {
    /// Source paths followed by the target
    #[arg(value_name = "PATH", num_args = 2.., required = true)]
    paths: Vec<PathBuf>,

    /// Copy directories recursively
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Emit JSON Lines
    #[arg(long)]
    json: bool,

    /// Only print failures and the summary
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Replace existing target files
    #[arg(long)]
    overwrite: bool,

    /// Upper bound on concurrent workers
    #[arg(long, value_name = "N")]
    max_workers: Option<usize>,

    /// Bandwidth sampling period in milliseconds
    #[arg(long, value_name = "MS")]
    monitor_period_ms: Option<u64>,

    /// Non-improving samples before growth stops
    #[arg(long, value_name = "N")]
    plateau_ticks: Option<u32>,

    /// Workers to start with (0 = one per CPU)
    #[arg(long, value_name = "N")]
    initial_workers: Option<usize>,

    /// Workers added per growth step
    #[arg(long, value_name = "N")]
    worker_factor: Option<usize>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CopyConfig::from_file(path)?,
        None => CopyConfig::default(),
    };

    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }
    config.verbose |= cli.verbose;

    match cli.command {
        Commands::Cp(args) => run_cp(args, config),
    }
}

fn run_cp(args: CpArgs, mut config: CopyConfig) -> Result<i32> {
    apply_cp_overrides(&args, &mut config);
    config.parallel.validate()?;
    logging::init_logging(&config)?;

    let mut paths = args.paths;
    let target = paths
        .pop()
        .ok_or_else(|| CascadeError::Config("missing target".to_string()))?;
    let sources = paths;
    debug!(sources = sources.len(), target = %target.display(), "Starting cp");

    let writer = OutputWriter::new(config.json, config.quiet);
    let batch = match CopyBatch::plan(&sources, &target, &config) {
        Ok(batch) => batch,
        Err(e) => {
            writer.error(&e.to_string());
            return Ok(e.exit_code());
        }
    };
    info!(jobs = batch.len(), "Planned copy");

    let counter = ByteCounter::new();
    let progress = CliProgress::start(Arc::new(counter.clone()), config.wants_progress_bar());
    progress.set_total(batch.total_bytes());

    let outcome = batch.run(counter, |result| {
        progress.suspend(|| writer.transfer_result(result));
    });
    progress.finish();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            writer.error(&e.to_string());
            return Ok(e.exit_code());
        }
    };
    writer.batch_summary(&summary);

    Ok(if summary.all_succeeded() {
        EXIT_SUCCESS
    } else {
        EXIT_PARTIAL
    })
}

fn apply_cp_overrides(args: &CpArgs, config: &mut CopyConfig) {
    config.recursive |= args.recursive;
    config.json |= args.json;
    config.quiet |= args.quiet;
    config.overwrite |= args.overwrite;

    if let Some(n) = args.max_workers {
        config.parallel.max_workers = n;
    }
    if let Some(ms) = args.monitor_period_ms {
        config.parallel.monitor_period_ms = ms;
    }
    if let Some(n) = args.plateau_ticks {
        config.parallel.plateau_ticks = n;
    }
    if let Some(n) = args.initial_workers {
        config.parallel.initial_workers = n;
    }
    if let Some(n) = args.worker_factor {
        config.parallel.worker_factor = n;
    }
}
