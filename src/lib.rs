/*!
 * Cascade - adaptive parallel file copy
 *
 * A bulk copy engine whose worker pool grows while throughput keeps rising:
 * - Bounded worker pool fed through a rendezvous task queue
 * - Bandwidth monitor that adds workers until throughput plateaus
 * - Byte counting readers feeding the monitor and the progress bar
 * - Recursive `cp` planning with per-file results
 * - JSON Lines or human output, structured logging
 */

pub mod cli_progress;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod output;

// Re-export commonly used types
pub use config::{CopyConfig, LogLevel, ParallelConfig};
pub use core::copy::CopyBatch;
pub use core::parallel::{ParallelManager, ParallelSummary, ScalerExit, ScalerReport, TaskQueue};
pub use core::progress::{ByteCounter, ProgressReader, ProgressSource};
pub use core::transfer::{TransferJob, TransferResult};
pub use error::{CascadeError, Result};
pub use output::BatchSummary;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
