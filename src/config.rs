/*!
 * Configuration types for Cascade
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CascadeError, Result};

/// Tuning knobs for the adaptive worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Hard ceiling on concurrent workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Interval between throughput samples, in milliseconds
    #[serde(default = "default_monitor_period_ms")]
    pub monitor_period_ms: u64,

    /// Consecutive non-improving samples before the scaler gives up
    #[serde(default = "default_plateau_ticks")]
    pub plateau_ticks: u32,

    /// Workers started with the pool (0 = one per CPU core)
    #[serde(default = "default_initial_workers")]
    pub initial_workers: usize,

    /// Workers requested per growth decision
    #[serde(default = "default_worker_factor")]
    pub worker_factor: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            monitor_period_ms: default_monitor_period_ms(),
            plateau_ticks: default_plateau_ticks(),
            initial_workers: default_initial_workers(),
            worker_factor: default_worker_factor(),
        }
    }
}

impl ParallelConfig {
    /// Sampling period as a `Duration`
    pub fn monitor_period(&self) -> Duration {
        Duration::from_millis(self.monitor_period_ms)
    }

    /// Number of workers to start with, resolving `0` to the CPU count
    /// and clamping to `max_workers`.
    pub fn effective_initial_workers(&self) -> usize {
        let initial = if self.initial_workers == 0 {
            get_cpu_count()
        } else {
            self.initial_workers
        };
        initial.clamp(1, self.max_workers.max(1))
    }

    /// Reject values the pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(CascadeError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.monitor_period_ms == 0 {
            return Err(CascadeError::Config(
                "monitor_period_ms must be at least 1".to_string(),
            ));
        }
        if self.plateau_ticks == 0 {
            return Err(CascadeError::Config(
                "plateau_ticks must be at least 1".to_string(),
            ));
        }
        if self.worker_factor == 0 {
            return Err(CascadeError::Config(
                "worker_factor must be at least 1".to_string(),
            ));
        }
        if self.initial_workers > self.max_workers {
            return Err(CascadeError::Config(format!(
                "initial_workers ({}) exceeds max_workers ({})",
                self.initial_workers, self.max_workers
            )));
        }
        Ok(())
    }
}

/// Configuration for a `cp` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Descend into source directories
    #[serde(default)]
    pub recursive: bool,

    /// Replace existing target files
    #[serde(default)]
    pub overwrite: bool,

    /// Emit JSON Lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Suppress per-file output
    #[serde(default)]
    pub quiet: bool,

    /// Show progress bar
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// Worker pool tuning
    #[serde(default)]
    pub parallel: ParallelConfig,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            overwrite: false,
            json: false,
            quiet: false,
            show_progress: true,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
            parallel: ParallelConfig::default(),
        }
    }
}

impl CopyConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CascadeError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: CopyConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Whether the interactive progress bar should be drawn
    pub fn wants_progress_bar(&self) -> bool {
        self.show_progress && !self.json && !self.quiet
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    32
}

fn default_monitor_period_ms() -> u64 {
    5_000
}

fn default_plateau_ticks() -> u32 {
    3
}

fn default_initial_workers() -> usize {
    1
}

fn default_worker_factor() -> usize {
    1
}

/// Get the number of available CPU cores
fn get_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
