//! Counters for the async queue
//!
//! Every counter is a relaxed atomic; a `clone()` is a point-in-time
//! snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Queue statistics for one thread pool
///
/// # Example
///
/// ```
/// use sinklog::QueueMetrics;
///
/// let metrics = QueueMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_discarded_new();
///
/// assert_eq!(metrics.enqueued(), 1);
/// assert_eq!(metrics.lost(), 1);
/// ```
#[derive(Debug)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    /// New records dropped because the queue was full
    discarded_new: AtomicU64,
    /// Queued records evicted to make room
    overrun: AtomicU64,
    queue_full_events: AtomicU64,
    block_events: AtomicU64,
    discarded_on_shutdown: AtomicU64,
}

impl QueueMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            discarded_new: AtomicU64::new(0),
            overrun: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            discarded_on_shutdown: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn discarded_new(&self) -> u64 {
        self.discarded_new.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn overrun(&self) -> u64 {
        self.overrun.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn discarded_on_shutdown(&self) -> u64 {
        self.discarded_on_shutdown.load(Ordering::Relaxed)
    }

    /// Records lost to overflow, new and evicted together
    pub fn lost(&self) -> u64 {
        self.discarded_new() + self.overrun()
    }

    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_discarded_new(&self) -> u64 {
        self.discarded_new.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_overrun(&self) -> u64 {
        self.overrun.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_discarded_on_shutdown(&self, count: u64) {
        self.discarded_on_shutdown.fetch_add(count, Ordering::Relaxed);
    }

    /// Percentage (0.0 - 100.0) of submitted records lost to overflow
    pub fn drop_rate(&self) -> f64 {
        let lost = self.lost() as f64;
        let total = self.enqueued() as f64 + self.discarded_new() as f64;
        if total == 0.0 {
            0.0
        } else {
            (lost / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.enqueued.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.discarded_new.store(0, Ordering::Relaxed);
        self.overrun.store(0, Ordering::Relaxed);
        self.queue_full_events.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
        self.discarded_on_shutdown.store(0, Ordering::Relaxed);
    }
}

impl Default for QueueMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for QueueMetrics {
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            delivered: AtomicU64::new(self.delivered()),
            discarded_new: AtomicU64::new(self.discarded_new()),
            overrun: AtomicU64::new(self.overrun()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            block_events: AtomicU64::new(self.block_events()),
            discarded_on_shutdown: AtomicU64::new(self.discarded_on_shutdown()),
        }
    }
}
