/*!
 * Capped, grow-only pool of worker threads draining a rendezvous queue
 */

use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// One unit of work: runs once on some worker and yields one result
pub type Task<R> = Box<dyn FnOnce() -> R + Send + 'static>;

/// Something the adaptive scaler can grow
pub trait Scalable: Send + Sync + 'static {
    /// Best-effort request for one more worker; silently ignored at the cap
    fn add_worker(&self);

    fn worker_count(&self) -> usize;

    fn max_workers(&self) -> usize;
}

/// Handle to the worker pool; clones share the same workers
pub struct WorkerPool<R> {
    shared: Arc<PoolShared<R>>,
}

impl<R> Clone for WorkerPool<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct PoolShared<R> {
    /// Workers ever started; only grows
    workers: AtomicUsize,
    max_workers: usize,
    state: Mutex<PoolState<R>>,
}

struct PoolState<R> {
    /// `None` once the pool has been joined or every worker has exited;
    /// new workers are refused and pushes see a disconnected queue
    queue: Option<Receiver<Task<R>>>,
    sink: Option<Sender<R>>,
    handles: Vec<JoinHandle<()>>,
    /// Workers whose thread is still running
    live: usize,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Create an empty pool. No worker runs until [`add_worker`](Self::add_worker).
    pub fn new(queue: Receiver<Task<R>>, sink: Sender<R>, max_workers: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                workers: AtomicUsize::new(0),
                max_workers: max_workers.max(1),
                state: Mutex::new(PoolState {
                    queue: Some(queue),
                    sink: Some(sink),
                    handles: Vec::new(),
                    live: 0,
                }),
            }),
        }
    }

    /// Start one more worker unless the cap is reached or the pool is joined
    pub fn add_worker(&self) {
        let mut state = self.lock_state();

        let (queue, sink) = match (&state.queue, &state.sink) {
            (Some(queue), Some(sink)) => (queue.clone(), sink.clone()),
            _ => {
                trace!("Pool already joined, not adding worker");
                return;
            }
        };

        let current = self.shared.workers.load(Ordering::Acquire);
        if current >= self.shared.max_workers {
            trace!(workers = current, "Worker cap reached");
            return;
        }

        let id = current + 1;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("cascade-worker-{}", id))
            .spawn(move || {
                let _live = LiveWorker { shared, id };
                worker_loop(id, queue, sink);
            });

        match spawned {
            Ok(handle) => {
                // The new worker cannot retire before this lock is released
                state.live += 1;
                self.shared.workers.fetch_add(1, Ordering::AcqRel);
                state.handles.push(handle);
                debug!(workers = id, "Started worker");
            }
            Err(e) => {
                warn!("Failed to spawn worker {}: {}", id, e);
            }
        }
    }

    /// Number of workers started so far
    pub fn worker_count(&self) -> usize {
        self.shared.workers.load(Ordering::Acquire)
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    /// Block until every started worker has exited.
    ///
    /// Workers exit only once the task queue is closed and drained, so this
    /// blocks forever if the queue is never closed. After it returns the pool
    /// refuses new workers and has released its handle on the result sink.
    /// A panic raised by a task is re-raised here once all workers are joined.
    pub fn wait(&self) {
        let mut panic_payload = None;

        loop {
            let handles = {
                let mut state = self.lock_state();
                if state.handles.is_empty() {
                    state.queue = None;
                    state.sink = None;
                    break;
                }
                std::mem::take(&mut state.handles)
            };

            for handle in handles {
                if let Err(payload) = handle.join() {
                    error!("Worker panicked while running a task");
                    panic_payload.get_or_insert(payload);
                }
            }
        }

        debug!(workers = self.worker_count(), "All workers exited");

        if let Some(payload) = panic_payload {
            std::panic::resume_unwind(payload);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState<R>> {
        self.shared.lock_state()
    }
}

impl<R> PoolShared<R> {
    fn lock_state(&self) -> MutexGuard<'_, PoolState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held by each worker thread for its whole life, unwinding included.
///
/// When the last running worker goes away the pool drops its own queue
/// receiver, so a blocked or later push fails instead of waiting forever.
struct LiveWorker<R> {
    shared: Arc<PoolShared<R>>,
    id: usize,
}

impl<R> Drop for LiveWorker<R> {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        state.live = state.live.saturating_sub(1);

        if thread::panicking() {
            warn!(worker = self.id, live = state.live, "Worker lost to a panicking task");
        }
        if state.live == 0 && state.queue.take().is_some() {
            debug!(worker = self.id, "Last worker exited, task queue retired");
        }
    }
}

impl<R: Send + 'static> Scalable for WorkerPool<R> {
    fn add_worker(&self) {
        WorkerPool::add_worker(self);
    }

    fn worker_count(&self) -> usize {
        WorkerPool::worker_count(self)
    }

    fn max_workers(&self) -> usize {
        WorkerPool::max_workers(self)
    }
}

fn worker_loop<R>(id: usize, queue: Receiver<Task<R>>, sink: Sender<R>) {
    let mut executed = 0u64;

    // Ends once every sender is gone and nothing is left in flight
    for task in queue.iter() {
        let result = task();
        executed += 1;
        if sink.send(result).is_err() {
            trace!(worker = id, "Result sink disconnected, dropping result");
        }
    }

    debug!(worker = id, executed, "Task queue closed, worker exiting");
}
