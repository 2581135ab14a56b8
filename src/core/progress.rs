/*!
 * Byte accounting for running transfers
 *
 * The worker pool never measures transfers itself. It samples a
 * [`ProgressSource`], a monotonically non-decreasing counter that transfer
 * code feeds as bytes move, and derives throughput from consecutive samples.
 */

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cumulative byte counter observed by the adaptive scaler
///
/// Implementations must never report a value lower than a previous one.
pub trait ProgressSource: Send + Sync {
    /// Total bytes transferred so far
    fn bytes_transferred(&self) -> u64;
}

impl<T: ProgressSource + ?Sized> ProgressSource for Arc<T> {
    fn bytes_transferred(&self) -> u64 {
        (**self).bytes_transferred()
    }
}

/// Lock-free cumulative byte counter shared between transfers
#[derive(Debug, Clone, Default)]
pub struct ByteCounter {
    total: Arc<AtomicU64>,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `bytes` more bytes transferred
    pub fn add(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl ProgressSource for ByteCounter {
    fn bytes_transferred(&self) -> u64 {
        self.get()
    }
}

/// Reader adapter that adds every byte read to a [`ByteCounter`]
pub struct ProgressReader<R> {
    inner: R,
    counter: ByteCounter,
    read: u64,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, counter: ByteCounter) -> Self {
        Self {
            inner,
            counter,
            read: 0,
        }
    }

    /// Bytes read through this adapter alone
    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        self.counter.add(n as u64);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;

    #[test]
    fn test_counter_starts_at_zero() {
        let counter = ByteCounter::new();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.bytes_transferred(), 0);
    }

    #[test]
    fn test_clones_share_total() {
        let counter = ByteCounter::new();
        let clone = counter.clone();
        clone.add(512);
        counter.add(512);
        assert_eq!(counter.get(), 1024);
        assert_eq!(clone.get(), 1024);
    }

    #[test]
    fn test_concurrent_adds() {
        let counter = ByteCounter::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.add(3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.get(), 8 * 1000 * 3);
    }

    #[test]
    fn test_progress_reader_counts_bytes() {
        let counter = ByteCounter::new();
        let data = vec![7u8; 10_000];
        let mut reader = ProgressReader::new(Cursor::new(data), counter.clone());

        let mut sink = Vec::new();
        io::copy(&mut reader, &mut sink).unwrap();

        assert_eq!(sink.len(), 10_000);
        assert_eq!(reader.bytes_read(), 10_000);
        assert_eq!(counter.get(), 10_000);
    }

    #[test]
    fn test_arc_dyn_source() {
        let counter = ByteCounter::new();
        counter.add(42);
        let source: Arc<dyn ProgressSource> = Arc::new(counter);
        assert_eq!(source.bytes_transferred(), 42);
    }
}
