/*!
 * CLI progress renderer for interactive terminal display
 *
 * Samples a byte counter on its own thread and draws cumulative bytes,
 * throughput and ETA with indicatif.
 */

use crossbeam_channel::{bounded, select, tick, Sender};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

use crate::core::progress::ProgressSource;

const REFRESH: Duration = Duration::from_millis(100);

/// Progress bar bound to a [`ProgressSource`]
pub struct CliProgress {
    bar: ProgressBar,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CliProgress {
    /// Start rendering. A hidden renderer draws nothing but keeps the same API.
    pub fn start(source: Arc<dyn ProgressSource>, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        };

        match ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {bytes} ({binary_bytes_per_sec}) {msg}")
        {
            Ok(style) => bar.set_style(style),
            Err(e) => warn!("Invalid progress template: {}", e),
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let render_bar = bar.clone();
        let spawned = thread::Builder::new()
            .name("cascade-progress".to_string())
            .spawn(move || {
                let ticker = tick(REFRESH);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            render_bar.set_position(source.bytes_transferred());
                        }
                    }
                }
                render_bar.set_position(source.bytes_transferred());
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to start progress renderer: {}", e);
                None
            }
        };

        Self {
            bar,
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Set the total once it is known, turning the spinner into a bar
    pub fn set_total(&self, total_bytes: u64) {
        self.bar.set_length(total_bytes);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}, {eta}) {msg}")
        {
            self.bar.set_style(style.progress_chars("#>-"));
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    /// Run `f` with the bar temporarily cleared so printed lines do not tear
    pub fn suspend<F: FnOnce() -> T, T>(&self, f: F) -> T {
        self.bar.suspend(f)
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Stop sampling and clear the bar
    pub fn finish(mut self) {
        self.shutdown();
        self.bar.finish_and_clear();
    }

    fn shutdown(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Progress renderer thread panicked");
            }
        }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.shutdown();
    }
}
