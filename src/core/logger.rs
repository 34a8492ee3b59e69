//! Main logger implementation

use super::{
    error::LoggerError,
    log_level::{AtomicLevel, LogLevel},
    log_record::{LogRecord, SourceLocation},
    pattern::{PatternFormatter, SharedFormatter},
    sink::Sink,
    thread_pool::{panic_message, ThreadPool},
};
use crossbeam_channel::bounded;
use parking_lot::RwLock;
use std::fmt::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Receives diagnostic text for failures that happen during a log call
pub type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Snapshot of everything needed to deliver a record
///
/// Loggers replace their group wholesale on reconfiguration. Queued records
/// keep the group they were posted with.
#[derive(Clone)]
pub(crate) struct SinkGroup {
    name: Arc<str>,
    sinks: Vec<Arc<dyn Sink>>,
    error_handler: Option<ErrorHandler>,
    flush_level: LogLevel,
}

impl SinkGroup {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Deliver to every sink whose level admits the record
    ///
    /// **Per-sink panic isolation**: each sink runs under `catch_unwind` so a
    /// failing sink never keeps the record from the others.
    pub(crate) fn dispatch(&self, record: &LogRecord) {
        for sink in &self.sinks {
            if !sink.should_log(record.level) {
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| sink.log(record)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.report(&e.to_string()),
                Err(panic_info) => {
                    let err = LoggerError::sink_panic(sink.name(), panic_message(&*panic_info));
                    self.report(&err.to_string());
                }
            }
        }

        if self.flush_level != LogLevel::Off && record.level >= self.flush_level {
            self.flush_sinks();
        }
    }

    pub(crate) fn flush_sinks(&self) {
        for sink in &self.sinks {
            let result = panic::catch_unwind(AssertUnwindSafe(|| sink.flush()));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.report(&e.to_string()),
                Err(panic_info) => {
                    let err = LoggerError::sink_panic(sink.name(), panic_message(&*panic_info));
                    self.report(&err.to_string());
                }
            }
        }
    }

    pub(crate) fn report(&self, message: &str) {
        match self.error_handler {
            Some(ref handler) => handler(message),
            None => eprintln!("[*** LOG ERROR ***] [{}] {}", self.name, message),
        }
    }
}

/// A named entry point delivering records to its sinks
///
/// Synchronous loggers call their sinks on the calling thread. A logger
/// built with a [`ThreadPool`] posts records to the pool instead.
///
/// # Example
///
/// ```
/// use sinklog::prelude::*;
/// use sinklog::sinks::RingBufferSink;
/// use std::sync::Arc;
///
/// let sink = Arc::new(RingBufferSink::new(16).unwrap());
/// let logger = Logger::builder("app")
///     .level(LogLevel::Debug)
///     .sink(sink.clone())
///     .pattern("%l: %v")
///     .build();
///
/// logger.debug("starting");
/// assert_eq!(sink.last_formatted(0)[0].trim_end(), "debug: starting");
/// ```
pub struct Logger {
    name: Arc<str>,
    level: AtomicLevel,
    group: RwLock<Arc<SinkGroup>>,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl Logger {
    /// Synchronous logger at the default `info` level
    pub fn new(name: impl Into<String>, sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self::builder(name).sinks(sinks).build()
    }

    #[must_use]
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.level.load()
    }

    #[inline]
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level);
    }

    /// The only check made before any formatting
    #[inline]
    pub fn should_log(&self, level: LogLevel) -> bool {
        self.level.should_log(level)
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.should_log(level) {
            return;
        }
        self.deliver(LogRecord::new(Arc::clone(&self.name), level, message.into()));
    }

    /// Log preformatted arguments, as produced by `format_args!`
    pub fn log_fmt(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if !self.should_log(level) {
            return;
        }
        if let Some(payload) = self.render(args) {
            self.deliver(LogRecord::new(Arc::clone(&self.name), level, payload));
        }
    }

    /// [`Logger::log_fmt`] with the call site attached
    pub fn log_at(&self, level: LogLevel, source: SourceLocation, args: fmt::Arguments<'_>) {
        if !self.should_log(level) {
            return;
        }
        if let Some(payload) = self.render(args) {
            let record =
                LogRecord::new(Arc::clone(&self.name), level, payload).with_source(source);
            self.deliver(record);
        }
    }

    /// A `Display` impl that fails is reported, and the record is skipped
    fn render(&self, args: fmt::Arguments<'_>) -> Option<String> {
        if let Some(text) = args.as_str() {
            return Some(text.to_string());
        }
        let mut payload = String::new();
        match payload.write_fmt(args) {
            Ok(()) => Some(payload),
            Err(_) => {
                let err = LoggerError::render("a formatting trait implementation returned an error");
                self.group.read().report(&err.to_string());
                None
            }
        }
    }

    fn deliver(&self, record: LogRecord) {
        let group = Arc::clone(&self.group.read());
        match self.thread_pool {
            Some(ref pool) => pool.post_log(record, group),
            None => group.dispatch(&record),
        }
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn critical(&self, message: impl Into<String>) {
        self.log(LogLevel::Critical, message);
    }

    /// Flush every sink
    ///
    /// An async logger waits until the workers have delivered everything
    /// posted before this call and flushed. Must not be called from a sink or
    /// error handler running on the pool's own worker.
    pub fn flush(&self) {
        let group = Arc::clone(&self.group.read());
        match self.thread_pool {
            Some(ref pool) => {
                let (ack_tx, ack_rx) = bounded(pool.worker_count().max(1));
                pool.post_flush(group, ack_tx);
                // Ends once every worker has acked and dropped its sender
                while ack_rx.recv().is_ok() {}
            }
            None => group.flush_sinks(),
        }
    }

    /// Flush automatically after any record at or above `level`
    ///
    /// `LogLevel::Off` disables automatic flushing.
    pub fn flush_on(&self, level: LogLevel) {
        self.update_group(|group| group.flush_level = level);
    }

    pub fn flush_level(&self) -> LogLevel {
        self.group.read().flush_level
    }

    /// Compile `pattern` once and give it to every sink
    pub fn set_pattern(&self, pattern: &str) {
        self.set_formatter(Arc::new(PatternFormatter::new(pattern)));
    }

    /// Give `formatter` to every sink currently attached
    pub fn set_formatter(&self, formatter: SharedFormatter) {
        for sink in self.group.read().sinks.iter() {
            sink.set_formatter(Arc::clone(&formatter));
        }
    }

    pub fn set_error_handler(&self, handler: ErrorHandler) {
        self.update_group(|group| group.error_handler = Some(handler));
    }

    pub fn sinks(&self) -> Vec<Arc<dyn Sink>> {
        self.group.read().sinks.clone()
    }

    /// Attach another sink; records already queued keep the old sink list
    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        self.update_group(|group| group.sinks.push(sink));
    }

    pub fn is_async(&self) -> bool {
        self.thread_pool.is_some()
    }

    pub fn thread_pool(&self) -> Option<&Arc<ThreadPool>> {
        self.thread_pool.as_ref()
    }

    /// A new logger sharing this one's sinks, pool and settings
    pub fn clone_with_name(&self, name: impl Into<String>) -> Logger {
        let name: Arc<str> = Arc::from(name.into());
        let mut group = (**self.group.read()).clone();
        group.name = Arc::clone(&name);

        Logger {
            name,
            level: AtomicLevel::new(self.level()),
            group: RwLock::new(Arc::new(group)),
            thread_pool: self.thread_pool.clone(),
        }
    }

    fn update_group(&self, f: impl FnOnce(&mut SinkGroup)) {
        let mut guard = self.group.write();
        let mut next = (**guard).clone();
        f(&mut next);
        *guard = Arc::new(next);
    }
}

impl Drop for Logger {
    /// Synchronous loggers flush their sinks; an async logger's queued
    /// records are delivered by the pool on its own schedule
    fn drop(&mut self) {
        if self.thread_pool.is_none() {
            self.group.get_mut().flush_sinks();
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("sinks", &self.group.read().sinks.len())
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use sinklog::prelude::*;
/// use sinklog::sinks::ConsoleSink;
/// use std::sync::Arc;
///
/// let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::default()).unwrap());
/// let logger = Logger::builder("net")
///     .level(LogLevel::Debug)
///     .sink(Arc::new(ConsoleSink::stdout()))
///     .flush_on(LogLevel::Error)
///     .thread_pool(pool)
///     .build();
/// assert!(logger.is_async());
/// ```
pub struct LoggerBuilder {
    name: String,
    level: LogLevel,
    sinks: Vec<Arc<dyn Sink>>,
    formatter: Option<SharedFormatter>,
    error_handler: Option<ErrorHandler>,
    flush_level: LogLevel,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl LoggerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: LogLevel::default(),
            sinks: Vec::new(),
            formatter: None,
            error_handler: None,
            flush_level: LogLevel::Off,
            thread_pool: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sinks(mut self, sinks: impl IntoIterator<Item = Arc<dyn Sink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// Applied to every sink at build time
    #[must_use = "builder methods return a new value"]
    pub fn pattern(self, pattern: &str) -> Self {
        self.formatter(Arc::new(PatternFormatter::new(pattern)))
    }

    /// Applied to every sink at build time
    #[must_use = "builder methods return a new value"]
    pub fn formatter(mut self, formatter: SharedFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flush_on(mut self, level: LogLevel) -> Self {
        self.flush_level = level;
        self
    }

    /// Deliver through `pool` instead of on the calling thread
    #[must_use = "builder methods return a new value"]
    pub fn thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.thread_pool = Some(pool);
        self
    }

    pub fn build(self) -> Logger {
        if let Some(ref formatter) = self.formatter {
            for sink in &self.sinks {
                sink.set_formatter(Arc::clone(formatter));
            }
        }

        let name: Arc<str> = Arc::from(self.name);
        Logger {
            level: AtomicLevel::new(self.level),
            group: RwLock::new(Arc::new(SinkGroup {
                name: Arc::clone(&name),
                sinks: self.sinks,
                error_handler: self.error_handler,
                flush_level: self.flush_level,
            })),
            name,
            thread_pool: self.thread_pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::{forward_sink_base, SinkBase};
    use crate::core::{Result, ThreadPoolConfig};
    use crate::sinks::RingBufferSink;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ring() -> Arc<RingBufferSink> {
        Arc::new(
            RingBufferSink::new(1024)
                .unwrap()
                .with_formatter(Arc::new(PatternFormatter::new("%v").with_eol(""))),
        )
    }

    fn collecting_handler() -> (ErrorHandler, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let handler: ErrorHandler = Arc::new(move |msg: &str| seen_clone.lock().push(msg.to_string()));
        (handler, seen)
    }

    struct FailingSink {
        base: SinkBase,
        panic: bool,
        flushes: AtomicUsize,
    }

    impl FailingSink {
        fn new(panic: bool) -> Self {
            Self {
                base: SinkBase::new(),
                panic,
                flushes: AtomicUsize::new(0),
            }
        }
    }

    impl Sink for FailingSink {
        fn log(&self, _record: &LogRecord) -> Result<()> {
            if self.panic {
                panic!("disk on fire");
            }
            Err(LoggerError::other("write refused"))
        }

        fn flush(&self) -> Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "failing"
        }

        forward_sink_base!();
    }

    struct BadDisplay;

    impl fmt::Display for BadDisplay {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn test_level_filtering() {
        let sink = ring();
        let logger = Logger::builder("lvl").sink(sink.clone()).level(LogLevel::Warn).build();

        logger.info("hidden");
        logger.warn("shown");
        logger.critical("also shown");

        assert_eq!(sink.last_formatted(0), vec!["shown", "also shown"]);
        assert!(!logger.should_log(LogLevel::Debug));
    }

    #[test]
    fn test_sink_level_applies_after_logger_level() {
        let verbose = ring();
        let quiet = ring();
        quiet.set_level(LogLevel::Error);

        let logger = Logger::builder("two")
            .level(LogLevel::Trace)
            .sinks(vec![verbose.clone() as Arc<dyn Sink>, quiet.clone()])
            .build();
        logger.debug("d");
        logger.error("e");

        assert_eq!(verbose.last_formatted(0), vec!["d", "e"]);
        assert_eq!(quiet.last_formatted(0), vec!["e"]);
    }

    #[test]
    fn test_failing_sink_reports_once_per_call() {
        let (handler, seen) = collecting_handler();
        let healthy = ring();
        let logger = Logger::builder("err")
            .sinks(vec![Arc::new(FailingSink::new(false)) as Arc<dyn Sink>, healthy.clone()])
            .error_handler(handler)
            .build();

        logger.info("one");
        logger.info("two");

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains("write refused"));
        assert_eq!(healthy.last_formatted(0), vec!["one", "two"]);
    }

    #[test]
    fn test_panicking_sink_is_isolated() {
        let (handler, seen) = collecting_handler();
        let healthy = ring();
        let logger = Logger::builder("panic")
            .sinks(vec![Arc::new(FailingSink::new(true)) as Arc<dyn Sink>, healthy.clone()])
            .error_handler(handler)
            .build();

        logger.error("still delivered");

        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].contains("disk on fire"));
        assert_eq!(healthy.last_formatted(0), vec!["still delivered"]);
    }

    #[test]
    fn test_render_error_goes_to_handler() {
        let (handler, seen) = collecting_handler();
        let sink = ring();
        let logger = Logger::builder("render")
            .sink(sink.clone())
            .error_handler(handler)
            .build();

        logger.log_fmt(LogLevel::Info, format_args!("value: {}", BadDisplay));
        logger.log_fmt(LogLevel::Info, format_args!("fine {}", 1));

        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].contains("Failed to render"));
        assert_eq!(sink.last_formatted(0), vec!["fine 1"]);
    }

    #[test]
    fn test_flush_on_level() {
        let sink = Arc::new(FailingSink::new(false));
        let logger = Logger::builder("flush")
            .sink(sink.clone())
            .error_handler(Arc::new(|_: &str| {}))
            .flush_on(LogLevel::Warn)
            .build();

        logger.info("no flush");
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 0);
        logger.warn("flush");
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);

        logger.flush_on(LogLevel::Off);
        logger.critical("no flush");
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_flushes_sync_logger() {
        let sink = Arc::new(FailingSink::new(false));
        let logger = Logger::builder("dropped")
            .sink(sink.clone())
            .error_handler(Arc::new(|_: &str| {}))
            .build();

        logger.info("buffered");
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 0);
        drop(logger);
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_async_flush_waits_on_every_worker() {
        let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::new(64, 4)).unwrap());
        let sink = ring();
        let logger = Arc::new(
            Logger::builder("async-many")
                .sink(sink.clone())
                .thread_pool(pool)
                .build(),
        );

        let handles: Vec<_> = (0..4)
            .map(|p| {
                let logger = Arc::clone(&logger);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        logger.info(format!("{}:{}", p, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        logger.flush();

        assert_eq!(sink.len(), 400);
    }

    #[test]
    fn test_set_pattern_reaches_every_sink() {
        let a = ring();
        let b = ring();
        let logger = Logger::builder("pat")
            .sinks(vec![a.clone() as Arc<dyn Sink>, b.clone()])
            .build();
        logger.set_pattern("<%n> %v");
        logger.info("x");

        assert_eq!(a.last_formatted(0)[0].trim_end(), "<pat> x");
        assert_eq!(b.last_formatted(0)[0].trim_end(), "<pat> x");
    }

    #[test]
    fn test_source_location_is_recorded() {
        let sink = ring();
        sink.set_pattern("%@ %v");
        let logger = Logger::new("src", vec![sink.clone() as Arc<dyn Sink>]);
        logger.log_at(
            LogLevel::Info,
            SourceLocation::new("src/main.rs", 7, "app"),
            format_args!("hi"),
        );
        assert_eq!(sink.last_formatted(0)[0].trim_end(), "src/main.rs:7 hi");
    }

    #[test]
    fn test_async_logger_flush_waits_for_delivery() {
        let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::new(64, 1)).unwrap());
        let sink = ring();
        let logger = Logger::builder("async")
            .sink(sink.clone())
            .thread_pool(pool)
            .build();
        assert!(logger.is_async());

        for i in 0..500 {
            logger.info(format!("{}", i));
        }
        logger.flush();

        let lines = sink.last_formatted(0);
        assert_eq!(lines.len(), 500);
        assert!(lines.iter().enumerate().all(|(i, l)| *l == i.to_string()));
    }

    #[test]
    fn test_added_sink_does_not_see_earlier_records() {
        let first = ring();
        let second = ring();
        let logger = Logger::new("add", vec![first.clone() as Arc<dyn Sink>]);

        logger.info("before");
        logger.add_sink(second.clone());
        logger.info("after");

        assert_eq!(first.last_formatted(0), vec!["before", "after"]);
        assert_eq!(second.last_formatted(0), vec!["after"]);
        assert_eq!(logger.sinks().len(), 2);
    }

    #[test]
    fn test_clone_with_name_shares_sinks() {
        let sink = ring();
        sink.set_pattern("%n:%v");
        let logger = Logger::new("orig", vec![sink.clone() as Arc<dyn Sink>]);
        let other = logger.clone_with_name("copy");

        logger.info("a");
        other.info("b");
        assert_eq!(other.name(), "copy");
        assert_eq!(
            sink.last_formatted(0)
                .iter()
                .map(|l| l.trim_end().to_string())
                .collect::<Vec<_>>(),
            vec!["orig:a", "copy:b"]
        );
    }
}
