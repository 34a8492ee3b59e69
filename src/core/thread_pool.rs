//! Bounded queue and worker threads behind async loggers
//!
//! Every slot owns what the worker needs: a record plus the sink group the
//! logger had when the record was posted. A logger dropped while its records
//! are still queued therefore never leaves a worker with a dangling sink
//! list.

use super::{
    error::{LoggerError, Result},
    log_record::LogRecord,
    logger::SinkGroup,
    metrics::QueueMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy, ShutdownPolicy},
};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default number of queued slots
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;

pub(crate) enum AsyncMessage {
    Log(LogRecord, Arc<SinkGroup>),
    /// Flush every sink of the group, then ack the waiter
    Flush(Arc<SinkGroup>, Sender<()>),
    Terminate,
}

/// Thread pool settings
///
/// # Example
///
/// ```
/// use sinklog::{OverflowPolicy, ThreadPoolConfig};
///
/// let config = ThreadPoolConfig::new(1024, 2).overflow_policy(OverflowPolicy::DropOldest);
/// assert_eq!(config.workers, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Queue capacity in slots
    pub capacity: usize,
    pub workers: usize,
    pub overflow_policy: OverflowPolicy,
    pub shutdown_policy: ShutdownPolicy,
    /// Worker threads are named `<prefix>-<index>`
    pub thread_name_prefix: String,
}

impl ThreadPoolConfig {
    pub fn new(capacity: usize, workers: usize) -> Self {
        Self {
            capacity,
            workers,
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(LoggerError::config(
                "ThreadPool",
                "queue capacity must be at least 1",
            ));
        }
        if self.workers == 0 {
            return Err(LoggerError::config(
                "ThreadPool",
                "worker count must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            workers: 1,
            overflow_policy: OverflowPolicy::default(),
            shutdown_policy: ShutdownPolicy::default(),
            thread_name_prefix: "sinklog".to_string(),
        }
    }
}

/// One worker's slice of the queue
struct Shard {
    sender: Sender<AsyncMessage>,
    /// Producer-side handle used to evict under `DropOldest` and to discard
    /// on shutdown
    receiver: Receiver<AsyncMessage>,
}

/// Fixed set of worker threads, each consuming its own bounded FIFO
///
/// A producer thread always posts to the same worker's queue (picked by its
/// thread id), so records from one thread reach the sinks in the order they
/// were logged whatever the worker count. The configured capacity is split
/// evenly between the workers, and overflow is judged per queue.
///
/// Workers are joined when the pool is dropped. With
/// [`ShutdownPolicy::Drain`] everything queued before that point is
/// delivered first.
pub struct ThreadPool {
    shards: Vec<Shard>,
    workers: Vec<JoinHandle<()>>,
    config: ThreadPoolConfig,
    metrics: Arc<QueueMetrics>,
    on_overflow: Option<OverflowCallback>,
}

impl ThreadPool {
    /// Start the workers
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid config or when a thread cannot be
    /// spawned; workers already started are joined before returning.
    pub fn new(config: ThreadPoolConfig) -> Result<Self> {
        Self::with_overflow_callback(config, None)
    }

    /// Same as [`ThreadPool::new`], calling `on_overflow` whenever a record
    /// is lost to a full queue
    pub fn with_overflow_callback(
        config: ThreadPoolConfig,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<Self> {
        config.validate()?;

        let shard_capacity = config.capacity.div_ceil(config.workers);
        let shards = (0..config.workers)
            .map(|_| {
                let (sender, receiver) = bounded(shard_capacity);
                Shard { sender, receiver }
            })
            .collect();

        let mut pool = Self {
            shards,
            workers: Vec::with_capacity(config.workers),
            config,
            metrics: Arc::new(QueueMetrics::new()),
            on_overflow,
        };

        for index in 0..pool.config.workers {
            let receiver = pool.shards[index].receiver.clone();
            let metrics = Arc::clone(&pool.metrics);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", pool.config.thread_name_prefix, index))
                .spawn(move || worker_loop(receiver, metrics))
                .map_err(|e| {
                    LoggerError::ThreadPool(format!("failed to spawn worker {}: {}", index, e))
                })?;
            pool.workers.push(handle);
        }

        Ok(pool)
    }

    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    /// Slots currently waiting for a worker, across all queues
    pub fn queue_len(&self) -> usize {
        self.shards.iter().map(|shard| shard.sender.len()).sum()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn shard_for(&self, thread_id: u64) -> &Shard {
        &self.shards[(thread_id % self.shards.len() as u64) as usize]
    }

    pub(crate) fn post_log(&self, record: LogRecord, group: Arc<SinkGroup>) {
        let shard = self.shard_for(record.thread_id);
        if self.enqueue(shard, AsyncMessage::Log(record, group)) {
            self.metrics.record_enqueued();
        }
    }

    /// Post one flush slot to every queue
    ///
    /// Each worker sends on its clone of `ack` once everything queued ahead
    /// of the slot is delivered. The receiver sees a disconnect once every
    /// clone is gone. Flush slots always wait for room.
    pub(crate) fn post_flush(&self, group: Arc<SinkGroup>, ack: Sender<()>) {
        for shard in &self.shards {
            let _ = shard
                .sender
                .send(AsyncMessage::Flush(Arc::clone(&group), ack.clone()));
        }
    }

    /// Returns whether the message made it into the queue
    fn enqueue(&self, shard: &Shard, message: AsyncMessage) -> bool {
        match shard.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => self.handle_overflow(shard, message),
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn handle_overflow(&self, shard: &Shard, message: AsyncMessage) -> bool {
        let is_record = matches!(message, AsyncMessage::Log(..));
        self.metrics.record_queue_full();

        match self.config.overflow_policy {
            OverflowPolicy::Block => {
                self.metrics.record_block();
                shard.sender.send(message).is_ok()
            }

            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match shard.sender.send_timeout(message, timeout) {
                    Ok(()) => true,
                    Err(SendTimeoutError::Timeout(_)) => {
                        if is_record {
                            self.metrics.record_discarded_new();
                            self.notify_overflow();
                        }
                        false
                    }
                    Err(SendTimeoutError::Disconnected(_)) => false,
                }
            }

            OverflowPolicy::DropNewest => {
                if is_record {
                    self.metrics.record_discarded_new();
                    self.notify_overflow();
                }
                false
            }

            OverflowPolicy::DropOldest => self.evict_oldest(shard, message),
        }
    }

    /// Evict the oldest queued record to make room for `message`
    ///
    /// Flush slots are never evicted; one found at the head moves to the
    /// back, which still orders it after every record posted before it.
    fn evict_oldest(&self, shard: &Shard, mut message: AsyncMessage) -> bool {
        let mut moved = 0;
        loop {
            match shard.receiver.try_recv() {
                Ok(AsyncMessage::Log(..)) => {
                    self.metrics.record_overrun();
                    self.notify_overflow();
                }
                Ok(control) => {
                    if shard.sender.send(control).is_err() {
                        return false;
                    }
                    moved += 1;
                    // Nothing but control slots left to evict
                    if moved > shard.sender.capacity().unwrap_or(0) {
                        return shard.sender.send(message).is_ok();
                    }
                    continue;
                }
                Err(_) => {}
            }
            match shard.sender.try_send(message) {
                Ok(()) => return true,
                Err(TrySendError::Full(rejected)) => message = rejected,
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    fn notify_overflow(&self) {
        if let Some(ref callback) = self.on_overflow {
            callback(self.metrics.lost());
        }
    }
}

fn worker_loop(receiver: Receiver<AsyncMessage>, metrics: Arc<QueueMetrics>) {
    while let Ok(message) = receiver.recv() {
        match message {
            AsyncMessage::Log(record, group) => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| group.dispatch(&record)));
                if let Err(panic_info) = result {
                    eprintln!(
                        "[LOGGER CRITICAL] Error handler of logger '{}' panicked: {}",
                        group.name(),
                        panic_message(&*panic_info)
                    );
                }
                metrics.record_delivered();
            }
            AsyncMessage::Flush(group, ack) => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| group.flush_sinks()));
                if let Err(panic_info) = result {
                    eprintln!(
                        "[LOGGER CRITICAL] Flush of logger '{}' panicked: {}",
                        group.name(),
                        panic_message(&*panic_info)
                    );
                }
                let _ = ack.send(());
            }
            AsyncMessage::Terminate => break,
        }
    }
}

pub(crate) fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.config.shutdown_policy == ShutdownPolicy::Discard {
            let mut discarded = 0;
            for shard in &self.shards {
                while let Ok(message) = shard.receiver.try_recv() {
                    if let AsyncMessage::Log(..) = message {
                        discarded += 1;
                    }
                }
            }
            self.metrics.record_discarded_on_shutdown(discarded);
        }

        // Sentinels queue behind every pending slot, so Drain needs no
        // extra step
        for shard in self.shards.iter().take(self.workers.len()) {
            let _ = shard.sender.send(AsyncMessage::Terminate);
        }

        let current = thread::current().id();
        for handle in self.workers.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            if let Err(e) = handle.join() {
                eprintln!(
                    "[LOGGER ERROR] Async worker thread panicked during shutdown: {}",
                    panic_message(&*e)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogLevel, Logger, PatternFormatter, Sink};
    use crate::sinks::RingBufferSink;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Barrier;

    fn ring() -> Arc<RingBufferSink> {
        Arc::new(
            RingBufferSink::new(10_000)
                .unwrap()
                .with_formatter(Arc::new(PatternFormatter::new("%v").with_eol(""))),
        )
    }

    /// Sink that parks every worker on a barrier so the queue can be filled
    /// deterministically
    struct GateSink {
        base: crate::core::SinkBase,
        gate: Arc<Barrier>,
        passed: AtomicU64,
    }

    impl Sink for GateSink {
        fn log(&self, _record: &LogRecord) -> Result<()> {
            if self.passed.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.wait();
            }
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "gate"
        }

        crate::core::sink::forward_sink_base!();
    }

    #[test]
    fn test_config_validation() {
        assert!(ThreadPoolConfig::new(0, 1).validate().is_err());
        assert!(ThreadPoolConfig::new(1, 0).validate().is_err());
        assert!(ThreadPool::new(ThreadPoolConfig::new(16, 0)).is_err());
        assert!(ThreadPoolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ThreadPoolConfig =
            serde_json::from_str(r#"{"capacity": 64, "overflow_policy": "DropNewest"}"#).unwrap();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.workers, 1);
        assert_eq!(config.overflow_policy, OverflowPolicy::DropNewest);
        assert_eq!(config.shutdown_policy, ShutdownPolicy::Drain);
    }

    #[test]
    fn test_drop_drains_queue() {
        let sink = ring();
        {
            let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::new(4, 1)).unwrap());
            let logger = Logger::builder("drain")
                .sink(sink.clone())
                .level(LogLevel::Trace)
                .thread_pool(pool)
                .build();
            for i in 0..100 {
                logger.info(format!("{}", i));
            }
        }
        let lines = sink.last_formatted(0);
        assert_eq!(lines.len(), 100);
        assert_eq!(lines[0], "0");
        assert_eq!(lines[99], "99");
    }

    #[test]
    fn test_drop_newest_counts_losses() {
        let gate = Arc::new(Barrier::new(2));
        let sink = Arc::new(GateSink {
            base: crate::core::SinkBase::new(),
            gate: Arc::clone(&gate),
            passed: AtomicU64::new(0),
        });
        let lost = Arc::new(AtomicU64::new(0));
        let lost_clone = Arc::clone(&lost);
        let callback: OverflowCallback =
            Arc::new(move |total: u64| lost_clone.store(total, Ordering::SeqCst));

        let pool = Arc::new(
            ThreadPool::with_overflow_callback(
                ThreadPoolConfig::new(2, 1).overflow_policy(OverflowPolicy::DropNewest),
                Some(callback),
            )
            .unwrap(),
        );
        let logger = Logger::builder("drop")
            .sink(sink.clone())
            .thread_pool(Arc::clone(&pool))
            .build();

        // First record parks the worker; two more fill the queue
        logger.info("parked");
        while pool.queue_len() > 0 {
            thread::yield_now();
        }
        logger.info("a");
        logger.info("b");
        logger.info("dropped 1");
        logger.info("dropped 2");

        assert_eq!(pool.metrics().discarded_new(), 2);
        assert_eq!(lost.load(Ordering::SeqCst), 2);

        gate.wait();
        logger.flush();
        assert_eq!(sink.passed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_drop_oldest_evicts_queued_records() {
        let gate = Arc::new(Barrier::new(2));
        let gate_sink = Arc::new(GateSink {
            base: crate::core::SinkBase::new(),
            gate: Arc::clone(&gate),
            passed: AtomicU64::new(0),
        });
        let sink = ring();

        let pool = Arc::new(
            ThreadPool::new(ThreadPoolConfig::new(2, 1).overflow_policy(OverflowPolicy::DropOldest))
                .unwrap(),
        );
        let logger = Logger::builder("oldest")
            .sinks(vec![gate_sink as Arc<dyn Sink>, sink.clone()])
            .thread_pool(Arc::clone(&pool))
            .build();

        logger.info("parked");
        while pool.queue_len() > 0 {
            thread::yield_now();
        }
        for name in ["a", "b", "c", "d"] {
            logger.info(name);
        }
        assert_eq!(pool.metrics().overrun(), 2);

        gate.wait();
        logger.flush();
        assert_eq!(sink.last_formatted(0), vec!["parked", "c", "d"]);
    }

    #[test]
    fn test_drop_oldest_never_evicts_flush() {
        use std::sync::atomic::AtomicBool;
        use std::time::Duration;

        let gate = Arc::new(Barrier::new(2));
        let gate_sink = Arc::new(GateSink {
            base: crate::core::SinkBase::new(),
            gate: Arc::clone(&gate),
            passed: AtomicU64::new(0),
        });
        let sink = ring();

        let pool = Arc::new(
            ThreadPool::new(ThreadPoolConfig::new(2, 1).overflow_policy(OverflowPolicy::DropOldest))
                .unwrap(),
        );
        let logger = Arc::new(
            Logger::builder("flush-kept")
                .sinks(vec![gate_sink as Arc<dyn Sink>, sink.clone()])
                .thread_pool(Arc::clone(&pool))
                .build(),
        );

        logger.info("parked");
        while pool.queue_len() > 0 {
            thread::yield_now();
        }
        logger.info("a");

        let flushed = Arc::new(AtomicBool::new(false));
        let flusher = {
            let logger = Arc::clone(&logger);
            let flushed = Arc::clone(&flushed);
            thread::spawn(move || {
                logger.flush();
                flushed.store(true, Ordering::SeqCst);
            })
        };
        while pool.queue_len() < 2 {
            thread::yield_now();
        }

        // Queue is [a, flush]; both records evict around the flush slot
        logger.info("b");
        logger.info("c");
        assert_eq!(pool.metrics().overrun(), 2);

        thread::sleep(Duration::from_millis(50));
        assert!(!flushed.load(Ordering::SeqCst));

        gate.wait();
        flusher.join().unwrap();
        assert!(flushed.load(Ordering::SeqCst));

        logger.flush();
        assert_eq!(sink.last_formatted(0), vec!["parked", "c"]);
    }

    #[test]
    fn test_producer_order_kept_across_workers() {
        let sink = ring();
        let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::new(16, 4)).unwrap());
        let logger = Arc::new(
            Logger::builder("ordered")
                .sink(sink.clone())
                .thread_pool(Arc::clone(&pool))
                .build(),
        );

        let handles: Vec<_> = (0..6)
            .map(|p| {
                let logger = Arc::clone(&logger);
                thread::spawn(move || {
                    for i in 0..1_000 {
                        logger.info(format!("{}:{}", p, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        logger.flush();

        let lines = sink.last_formatted(0);
        assert_eq!(lines.len(), 6_000);
        let mut next = [0usize; 6];
        for line in &lines {
            let (p, i) = line.split_once(':').unwrap();
            let (p, i): (usize, usize) = (p.parse().unwrap(), i.parse().unwrap());
            assert_eq!(i, next[p], "producer {} out of order", p);
            next[p] += 1;
        }
    }

    #[test]
    fn test_discard_on_shutdown() {
        let gate = Arc::new(Barrier::new(2));
        let sink = Arc::new(GateSink {
            base: crate::core::SinkBase::new(),
            gate: Arc::clone(&gate),
            passed: AtomicU64::new(0),
        });

        let pool = Arc::new(
            ThreadPool::new(ThreadPoolConfig::new(16, 1).shutdown_policy(ShutdownPolicy::Discard))
                .unwrap(),
        );
        let logger = Logger::builder("discard")
            .sink(sink.clone())
            .thread_pool(Arc::clone(&pool))
            .build();

        logger.info("parked");
        while pool.queue_len() > 0 {
            thread::yield_now();
        }
        for _ in 0..5 {
            logger.info("queued");
        }
        drop(logger);

        let pool = Arc::try_unwrap(pool).ok().expect("logger released the pool");
        let metrics = Arc::clone(&pool.metrics);
        // Worker stays parked until the queue is emptied by the drop
        let releaser = thread::spawn(move || {
            while metrics.discarded_on_shutdown() == 0 {
                thread::yield_now();
            }
            gate.wait();
        });
        let metrics = Arc::clone(&pool.metrics);
        drop(pool);
        releaser.join().unwrap();

        assert_eq!(metrics.discarded_on_shutdown(), 5);
        assert_eq!(sink.passed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_named_workers() {
        let pool = ThreadPool::new(
            ThreadPoolConfig::new(8, 3).thread_name_prefix("io-log"),
        )
        .unwrap();
        assert_eq!(pool.worker_count(), 3);
        let names: Vec<_> = pool
            .workers
            .iter()
            .map(|h| h.thread().name().map(str::to_string))
            .collect();
        assert_eq!(names[0].as_deref(), Some("io-log-0"));
        assert_eq!(names[2].as_deref(), Some("io-log-2"));
    }
}
