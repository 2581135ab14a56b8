/*!
 * Adaptive parallel execution of independent transfer tasks
 *
 * A [`ParallelManager`] owns a pool of worker threads that drain a
 * rendezvous task queue into a caller-supplied result sink, plus an optional
 * [`AdaptiveScaler`] that grows the pool while throughput keeps improving.
 *
 * ```no_run
 * use cascade::core::parallel::ParallelManager;
 * use cascade::core::progress::ByteCounter;
 * use std::sync::Arc;
 *
 * let counter = ByteCounter::new();
 * let (results_tx, results_rx) = crossbeam_channel::unbounded();
 * let (manager, queue) = ParallelManager::new(results_tx, Some(Arc::new(counter.clone())))?;
 *
 * let producer = std::thread::spawn(move || {
 *     for i in 0..10u64 {
 *         let counter = counter.clone();
 *         queue.push(move || { counter.add(1024); i }).ok();
 *     }
 *     queue.close();
 *     manager.wait()
 * });
 *
 * let done: Vec<u64> = results_rx.iter().collect();
 * assert_eq!(done.len(), 10);
 * producer.join().unwrap();
 * # Ok::<(), cascade::error::CascadeError>(())
 * ```
 */

mod pool;
mod scaler;

pub use pool::{Scalable, Task, WorkerPool};
pub use scaler::{
    AdaptiveScaler, ScaleDecision, ScalerExit, ScalerReport, ScalerSettings, ScalerState,
};

use crossbeam_channel::{bounded, Sender};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ParallelConfig;
use crate::core::progress::ProgressSource;
use crate::error::{CascadeError, Result};

/// Producer side of the task queue.
///
/// Every push is a hand-off: it blocks until a worker takes the task.
pub struct TaskQueue<R> {
    sender: Sender<Task<R>>,
}

impl<R: Send + 'static> TaskQueue<R> {
    /// Hand a task to the next free worker, blocking until one is free
    pub fn push<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        self.push_boxed(Box::new(task))
    }

    pub fn push_boxed(&self, task: Task<R>) -> Result<()> {
        self.sender
            .send(task)
            .map_err(|_| CascadeError::Parallel("task queue has no workers left".to_string()))
    }

    /// Signal that no more tasks will follow. Workers exit once drained.
    pub fn close(self) {}
}

/// Snapshot returned by [`ParallelManager::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelSummary {
    /// Workers started over the batch; this is also the peak
    pub workers: usize,
    /// Present when a progress source drove the scaler
    pub scaler: Option<ScalerReport>,
}

/// Single-use engine for one batch of transfers
pub struct ParallelManager<R> {
    pool: WorkerPool<R>,
    scaler: Option<AdaptiveScaler>,
}

impl<R: Send + 'static> ParallelManager<R> {
    /// Start an engine with default tuning (one initial worker, cap of 32,
    /// 5 second monitor period, plateau after 3 flat periods).
    ///
    /// Without a progress source the engine stays at its initial worker.
    pub fn new(
        sink: Sender<R>,
        progress: Option<Arc<dyn ProgressSource>>,
    ) -> Result<(Self, TaskQueue<R>)> {
        Self::with_config(&ParallelConfig::default(), sink, progress)
    }

    pub fn with_config(
        config: &ParallelConfig,
        sink: Sender<R>,
        progress: Option<Arc<dyn ProgressSource>>,
    ) -> Result<(Self, TaskQueue<R>)> {
        config.validate()?;

        let (task_tx, task_rx) = bounded::<Task<R>>(0);
        let pool = WorkerPool::new(task_rx, sink, config.max_workers);

        for _ in 0..config.effective_initial_workers() {
            pool.add_worker();
        }
        if pool.worker_count() == 0 {
            return Err(CascadeError::Parallel(
                "unable to start any worker thread".to_string(),
            ));
        }

        let scaler = match progress {
            Some(source) => {
                match AdaptiveScaler::spawn(source, pool.clone(), ScalerSettings::from(config)) {
                    Ok(scaler) => Some(scaler),
                    Err(e) => {
                        warn!("Failed to start scaler, running with fixed workers: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        debug!(
            workers = pool.worker_count(),
            max_workers = pool.max_workers(),
            adaptive = scaler.is_some(),
            "Parallel manager started"
        );

        Ok((Self { pool, scaler }, TaskQueue { sender: task_tx }))
    }

    /// Request one more worker; a no-op at the cap
    pub fn add_worker(&self) {
        self.pool.add_worker();
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn max_workers(&self) -> usize {
        self.pool.max_workers()
    }

    /// Wait for every worker to finish, then stop the scaler.
    ///
    /// The task queue must have been closed, otherwise this never returns.
    /// Once it returns the engine no longer holds the result sink.
    pub fn wait(mut self) -> ParallelSummary {
        self.pool.wait();
        let scaler = self.scaler.take().and_then(AdaptiveScaler::stop);

        let summary = ParallelSummary {
            workers: self.pool.worker_count(),
            scaler,
        };
        debug!(workers = summary.workers, "Parallel manager finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::ByteCounter;
    use crossbeam_channel::unbounded;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_starts_with_one_worker() {
        let (tx, _rx) = unbounded::<()>();
        let (manager, queue) = ParallelManager::new(tx, None).unwrap();
        assert_eq!(manager.worker_count(), 1);
        assert_eq!(manager.max_workers(), 32);
        queue.close();
        let summary = manager.wait();
        assert_eq!(summary.workers, 1);
        assert!(summary.scaler.is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let (tx, _rx) = unbounded::<()>();
        let config = ParallelConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            ParallelManager::with_config(&config, tx, None),
            Err(CascadeError::Config(_))
        ));
    }

    #[test]
    fn test_initial_workers_from_config() {
        let (tx, _rx) = unbounded::<()>();
        let config = ParallelConfig {
            initial_workers: 4,
            max_workers: 8,
            ..Default::default()
        };
        let (manager, queue) = ParallelManager::with_config(&config, tx, None).unwrap();
        assert_eq!(manager.worker_count(), 4);
        queue.close();
        manager.wait();
    }

    #[test]
    fn test_manual_add_worker() {
        let (tx, _rx) = unbounded::<()>();
        let config = ParallelConfig {
            max_workers: 2,
            ..Default::default()
        };
        let (manager, queue) = ParallelManager::with_config(&config, tx, None).unwrap();
        manager.add_worker();
        manager.add_worker();
        assert_eq!(manager.worker_count(), 2);
        queue.close();
        manager.wait();
    }

    #[test]
    fn test_wait_stops_running_scaler() {
        let (tx, rx) = unbounded();
        let counter = ByteCounter::new();
        let config = ParallelConfig {
            monitor_period_ms: 60_000,
            ..Default::default()
        };
        let (manager, queue) =
            ParallelManager::with_config(&config, tx, Some(Arc::new(counter.clone()))).unwrap();

        for i in 0..5u32 {
            let counter = counter.clone();
            queue
                .push(move || {
                    counter.add(10);
                    i
                })
                .unwrap();
        }
        queue.close();

        let summary = manager.wait();
        let report = summary.scaler.unwrap();
        assert_eq!(report.exit, ScalerExit::Stopped);
        assert_eq!(rx.iter().count(), 5);
    }

    #[test]
    fn test_push_blocks_until_worker_free() {
        let (tx, rx) = unbounded();
        let (manager, queue) = ParallelManager::new(tx, None).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);

        // Occupy the only worker
        queue
            .push(move || {
                release_rx.recv().ok();
                1u32
            })
            .unwrap();

        let pusher = thread::spawn(move || {
            queue.push(|| 2u32).unwrap();
            queue.close();
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!pusher.is_finished());

        release_tx.send(()).unwrap();
        pusher.join().unwrap();
        manager.wait();

        let mut results: Vec<u32> = rx.iter().collect();
        results.sort_unstable();
        assert_eq!(results, vec![1, 2]);
    }

    #[test]
    fn test_push_fails_once_every_worker_died() {
        let (tx, _rx) = unbounded::<u32>();
        let (manager, queue) = ParallelManager::new(tx, None).unwrap();

        queue.push(|| -> u32 { panic!("worker lost") }).unwrap();

        let pusher = thread::spawn(move || {
            let outcome = queue.push(|| 2);
            queue.close();
            outcome
        });
        let outcome = pusher.join().unwrap();
        assert!(matches!(outcome, Err(CascadeError::Parallel(_))));

        let joined = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || manager.wait()));
        assert!(joined.is_err());
    }
}
