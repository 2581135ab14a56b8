/*!
 * Batch copy: plan, feed the parallel manager, collect results
 */

use crossbeam_channel::bounded;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::CopyConfig;
use crate::core::parallel::ParallelManager;
use crate::core::plan::{plan_copy, PlanItem};
use crate::core::progress::ByteCounter;
use crate::core::transfer::{self, TransferOptions, TransferResult};
use crate::error::{CascadeError, Result};
use crate::output::BatchSummary;

/// A planned batch, ready to run
#[derive(Debug)]
pub struct CopyBatch {
    items: Vec<PlanItem>,
    config: CopyConfig,
}

impl CopyBatch {
    /// Expand sources into jobs. Fails only on unusable targets or config.
    pub fn plan(sources: &[PathBuf], target: &Path, config: &CopyConfig) -> Result<Self> {
        config.parallel.validate()?;
        let items = plan_copy(sources, target, config.recursive)?;
        Ok(Self {
            items,
            config: config.clone(),
        })
    }

    /// Number of results the batch will produce
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of source sizes for runnable jobs, as known at planning time
    pub fn total_bytes(&self) -> u64 {
        self.items
            .iter()
            .filter_map(|item| match item {
                PlanItem::Job(job) => std::fs::metadata(&job.source).ok(),
                PlanItem::Invalid { .. } => None,
            })
            .map(|meta| meta.len())
            .sum()
    }

    /// Run every job on the adaptive pool.
    ///
    /// `counter` receives every byte copied and drives worker growth.
    /// `on_result` sees each result in completion order on the calling thread.
    pub fn run<F>(self, counter: ByteCounter, mut on_result: F) -> Result<BatchSummary>
    where
        F: FnMut(&TransferResult),
    {
        let start = Instant::now();
        let expected = self.items.len();
        let options = TransferOptions {
            overwrite: self.config.overwrite,
        };

        let (results_tx, results_rx) = bounded::<TransferResult>(self.config.parallel.max_workers);
        let (manager, queue) = ParallelManager::with_config(
            &self.config.parallel,
            results_tx,
            Some(Arc::new(counter.clone())),
        )?;

        let items = self.items;
        let producer = thread::Builder::new()
            .name("cascade-producer".to_string())
            .spawn(move || {
                for item in items {
                    let pushed = match item {
                        PlanItem::Job(job) => {
                            let counter = counter.clone();
                            queue.push(move || transfer::execute(&job, &counter, options))
                        }
                        PlanItem::Invalid { job, error } => {
                            let result = TransferResult::failed(&job, &error);
                            queue.push(move || result)
                        }
                    };
                    if let Err(e) = pushed {
                        warn!("Stopping submission: {}", e);
                        break;
                    }
                }
                queue.close();
                manager.wait()
            })
            .map_err(|e| CascadeError::Parallel(format!("failed to start producer: {}", e)))?;

        let mut summary = BatchSummary::default();
        for result in results_rx.iter() {
            summary.record(&result);
            on_result(&result);
        }

        let parallel = producer
            .join()
            .map_err(|_| CascadeError::Parallel("a transfer task panicked".to_string()))?;

        let received = (summary.files_copied + summary.files_failed) as usize;
        if received != expected {
            warn!(expected, received, "Result count mismatch");
        }

        summary.finish(&parallel, start.elapsed().as_secs_f64());
        info!(
            copied = summary.files_copied,
            failed = summary.files_failed,
            bytes = summary.bytes_copied,
            workers = summary.workers,
            "Copy batch finished"
        );
        Ok(summary)
    }
}
