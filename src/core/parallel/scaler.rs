/*!
 * Throughput-driven growth of the worker pool
 *
 * Every monitor period the scaler samples the cumulative byte counter and
 * compares the bytes moved during that period with the best period seen so
 * far. A new best means concurrency is still paying off. A run of
 * `plateau_ticks` periods without a new best means the transfer has
 * saturated something (CPU, network, server) and the scaler stops for good.
 * Until then every period asks the pool for more workers, including the
 * non-improving ones below the threshold.
 *
 * The pool never shrinks.
 */

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::pool::Scalable;
use crate::config::ParallelConfig;
use crate::core::progress::ProgressSource;

/// Outcome of a single monitoring tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Ask the pool for more workers
    Grow,
    /// Throughput stopped improving; stop monitoring
    Plateau,
}

/// Peak tracking across ticks
#[derive(Debug, Clone)]
pub struct ScalerState {
    previous_bytes: u64,
    peak_bandwidth: u64,
    non_improving: u32,
    plateau_ticks: u32,
}

impl ScalerState {
    /// `baseline` is the counter value at the moment monitoring starts
    pub fn new(plateau_ticks: u32, baseline: u64) -> Self {
        Self {
            previous_bytes: baseline,
            peak_bandwidth: 0,
            non_improving: 0,
            plateau_ticks: plateau_ticks.max(1),
        }
    }

    /// Feed one counter sample and decide what to do this tick
    pub fn observe(&mut self, sent_bytes: u64) -> ScaleDecision {
        let bandwidth = sent_bytes.saturating_sub(self.previous_bytes);
        self.previous_bytes = sent_bytes;

        if bandwidth > self.peak_bandwidth {
            self.non_improving = 0;
            self.peak_bandwidth = bandwidth;
            return ScaleDecision::Grow;
        }

        self.non_improving += 1;
        if self.non_improving >= self.plateau_ticks {
            ScaleDecision::Plateau
        } else {
            ScaleDecision::Grow
        }
    }

    /// Most bytes moved in a single period so far
    pub fn peak_bandwidth(&self) -> u64 {
        self.peak_bandwidth
    }

    pub fn non_improving_ticks(&self) -> u32 {
        self.non_improving
    }
}

/// Why the scaler loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalerExit {
    /// Throughput plateaued
    Plateau,
    /// The pool reached its worker cap
    CapReached,
    /// Stopped from outside after the pool was joined
    Stopped,
}

/// What the scaler did over its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalerReport {
    pub ticks: u64,
    pub peak_bandwidth: u64,
    pub exit: ScalerExit,
}

/// Timing and growth parameters for the scaler loop
#[derive(Debug, Clone, Copy)]
pub struct ScalerSettings {
    pub period: Duration,
    pub plateau_ticks: u32,
    pub worker_factor: usize,
}

impl From<&ParallelConfig> for ScalerSettings {
    fn from(config: &ParallelConfig) -> Self {
        Self {
            period: config.monitor_period(),
            plateau_ticks: config.plateau_ticks,
            worker_factor: config.worker_factor,
        }
    }
}

/// Background thread running the scaling loop
pub struct AdaptiveScaler {
    /// Dropping this sender is the one and only stop signal
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<ScalerReport>>,
}

impl AdaptiveScaler {
    /// Start monitoring `source` and growing `pool`
    pub fn spawn<P: Scalable>(
        source: Arc<dyn ProgressSource>,
        pool: P,
        settings: ScalerSettings,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("cascade-scaler".to_string())
            .spawn(move || run(source, pool, settings, stop_rx))?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signal the loop to stop and wait for it to exit.
    ///
    /// Returns `None` only if the scaler thread panicked.
    pub fn stop(mut self) -> Option<ScalerReport> {
        self.stop.take();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                warn!("Scaler thread panicked");
                None
            }
        }
    }
}

impl Drop for AdaptiveScaler {
    fn drop(&mut self) {
        // Detached: the loop sees the disconnect on its next select
        self.stop.take();
    }
}

fn run<P: Scalable>(
    source: Arc<dyn ProgressSource>,
    pool: P,
    settings: ScalerSettings,
    stop: Receiver<()>,
) -> ScalerReport {
    let ticker = tick(settings.period);
    let mut state = ScalerState::new(settings.plateau_ticks, source.bytes_transferred());
    let mut ticks = 0u64;

    let report = |state: &ScalerState, ticks: u64, exit: ScalerExit| ScalerReport {
        ticks,
        peak_bandwidth: state.peak_bandwidth(),
        exit,
    };

    loop {
        select! {
            recv(stop) -> _ => {
                debug!(ticks, "Scaler stopped");
                return report(&state, ticks, ScalerExit::Stopped);
            }
            recv(ticker) -> _ => {
                ticks += 1;
                let sent = source.bytes_transferred();

                match state.observe(sent) {
                    ScaleDecision::Plateau => {
                        info!(
                            workers = pool.worker_count(),
                            peak_bandwidth = state.peak_bandwidth(),
                            "Throughput plateaued, no more workers will be added"
                        );
                        return report(&state, ticks, ScalerExit::Plateau);
                    }
                    ScaleDecision::Grow => {
                        for _ in 0..settings.worker_factor {
                            pool.add_worker();
                        }
                        debug!(
                            tick = ticks,
                            sent,
                            peak_bandwidth = state.peak_bandwidth(),
                            non_improving = state.non_improving_ticks(),
                            workers = pool.worker_count(),
                            "Scaler tick"
                        );
                    }
                }

                if pool.worker_count() >= pool.max_workers() {
                    info!(workers = pool.worker_count(), "Worker cap reached");
                    return report(&state, ticks, ScalerExit::CapReached);
                }
            }
        }
    }
}
