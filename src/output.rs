//! Structured output writer supporting JSON Lines and human-readable modes.

use serde::Serialize;

use crate::core::parallel::ParallelSummary;
use crate::core::transfer::TransferResult;

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Structured output writer that supports both human-readable and JSON output
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputMode,
    /// Suppress successful per-file lines (failures and summary still print)
    pub quiet: bool,
}

impl OutputWriter {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self {
            mode: if json { OutputMode::Json } else { OutputMode::Human },
            quiet,
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Print one transfer result
    pub fn transfer_result(&self, result: &TransferResult) {
        if self.quiet && result.is_success() {
            return;
        }
        match self.mode {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(result) {
                    println!("{}", json);
                }
            }
            OutputMode::Human => {
                if let Some(line) = self.render_human(result) {
                    if result.is_success() {
                        println!("{}", line);
                    } else {
                        eprintln!("{}", line);
                    }
                }
            }
        }
    }

    /// Human line for a result, `None` when quiet hides it
    pub fn render_human(&self, result: &TransferResult) -> Option<String> {
        match &result.error {
            None if self.quiet => None,
            None => Some(format!(
                "  {} \u{2192} {} ({})",
                result.source.display(),
                result.target.display(),
                format_bytes(result.bytes)
            )),
            Some(err) => Some(format!(
                "  Failed: {}: {}",
                result.source.display(),
                sanitize_error(err)
            )),
        }
    }

    /// Print the end-of-batch summary
    pub fn batch_summary(&self, summary: &BatchSummary) {
        match self.mode {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(summary) {
                    println!("{}", json);
                }
            }
            OutputMode::Human => {
                println!();
                println!(
                    "  {} copied, {} failed, {} in {} ({}/s) using {} workers",
                    summary.files_copied,
                    summary.files_failed,
                    format_bytes(summary.bytes_copied),
                    format_duration(summary.duration_secs),
                    format_bytes(summary.throughput_bps() as u64),
                    summary.workers
                );
            }
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        match self.mode {
            OutputMode::Json => {
                let payload = ErrorLine {
                    status: "error",
                    error: sanitize_error(msg),
                };
                if let Ok(json) = serde_json::to_string(&payload) {
                    eprintln!("{}", json);
                }
            }
            OutputMode::Human => {
                eprintln!("Error: {}", sanitize_error(msg));
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorLine {
    status: &'static str,
    error: String,
}

/// Totals for a finished batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub files_copied: u64,
    pub files_failed: u64,
    pub bytes_copied: u64,
    pub duration_secs: f64,
    pub workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_bandwidth_bytes: Option<u64>,
}

impl BatchSummary {
    /// Fold one result into the totals
    pub fn record(&mut self, result: &TransferResult) {
        if result.is_success() {
            self.files_copied += 1;
            self.bytes_copied += result.bytes;
        } else {
            self.files_failed += 1;
        }
    }

    /// Attach engine statistics once the pool has been joined
    pub fn finish(&mut self, parallel: &ParallelSummary, duration_secs: f64) {
        self.workers = parallel.workers;
        self.peak_bandwidth_bytes = parallel.scaler.map(|report| report.peak_bandwidth);
        self.duration_secs = duration_secs;
    }

    pub fn throughput_bps(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.bytes_copied as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.files_failed == 0
    }
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let base = 1024.0_f64;
    let exp = (bytes_f.ln() / base.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f / base.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.2} {}", value, UNITS[exp])
    }
}

/// Format duration into human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let minutes = (secs / 60.0).floor();
        format!("{:.0}m {:.0}s", minutes, secs - minutes * 60.0)
    }
}
