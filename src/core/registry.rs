//! Name → logger directory
//!
//! A `Registry` is an ordinary value owned by the application. Loggers
//! created through its factories pick up the registry-wide level, formatter,
//! error handler and flush level current at creation time; the bulk setters
//! push new values to every registered logger and remember them for later
//! ones.

use super::{
    error::{LoggerError, Result},
    log_level::{AtomicLevel, LogLevel},
    logger::{ErrorHandler, Logger, LoggerBuilder},
    pattern::{PatternFormatter, SharedFormatter},
    sink::Sink,
    thread_pool::{ThreadPool, ThreadPoolConfig},
};
use crate::config::{LoggerSpec, WILDCARD};
use crate::sinks::{ColorMode, ConsoleSink, ConsoleTarget, DailyFileSink, FileSink, RotatingFileSink};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub struct Registry {
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
    level: AtomicLevel,
    formatter: RwLock<Option<SharedFormatter>>,
    error_handler: RwLock<Option<ErrorHandler>>,
    flush_level: AtomicLevel,
    thread_pool: Mutex<Option<Arc<ThreadPool>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            loggers: RwLock::new(HashMap::new()),
            level: AtomicLevel::new(LogLevel::default()),
            formatter: RwLock::new(None),
            error_handler: RwLock::new(None),
            flush_level: AtomicLevel::new(LogLevel::Off),
            thread_pool: Mutex::new(None),
        }
    }

    /// Add an already built logger under its own name
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::DuplicateLogger`] when the name is taken.
    pub fn register(&self, logger: Arc<Logger>) -> Result<()> {
        let mut loggers = self.loggers.write();
        if loggers.contains_key(logger.name()) {
            return Err(LoggerError::duplicate(logger.name()));
        }
        loggers.insert(logger.name().to_string(), logger);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        self.loggers.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loggers.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Logger>> {
        self.loggers.write().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.loggers.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.loggers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.read().is_empty()
    }

    /// Call `f` once per registered logger, in no particular order
    ///
    /// Runs on a snapshot, so `f` may use the registry itself.
    pub fn apply_all(&self, mut f: impl FnMut(&Arc<Logger>)) {
        let loggers: Vec<Arc<Logger>> = self.loggers.read().values().cloned().collect();
        for logger in &loggers {
            f(logger);
        }
    }

    pub fn flush_all(&self) {
        self.apply_all(|logger| logger.flush());
    }

    /// Flush and forget every logger
    pub fn drop_all(&self) {
        self.flush_all();
        self.loggers.write().clear();
    }

    /// Drop every logger and release the registry's thread pool
    ///
    /// The pool's workers are joined here unless an async logger is still
    /// held elsewhere, in which case they are joined when it is dropped.
    pub fn shutdown(&self) {
        self.drop_all();
        let pool = self.thread_pool.lock().take();
        drop(pool);
    }

    pub fn level(&self) -> LogLevel {
        self.level.load()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level);
        self.apply_all(|logger| logger.set_level(level));
    }

    pub fn set_pattern(&self, pattern: &str) {
        self.set_formatter(Arc::new(PatternFormatter::new(pattern)));
    }

    pub fn set_formatter(&self, formatter: SharedFormatter) {
        *self.formatter.write() = Some(Arc::clone(&formatter));
        self.apply_all(|logger| logger.set_formatter(Arc::clone(&formatter)));
    }

    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.write() = Some(Arc::clone(&handler));
        self.apply_all(|logger| logger.set_error_handler(Arc::clone(&handler)));
    }

    pub fn flush_on(&self, level: LogLevel) {
        self.flush_level.store(level);
        self.apply_all(|logger| logger.flush_on(level));
    }

    /// Replace the pool used by [`Registry::create_async`]
    ///
    /// Async loggers created earlier keep the pool they were built with.
    pub fn init_thread_pool(&self, config: ThreadPoolConfig) -> Result<()> {
        let pool = Arc::new(ThreadPool::new(config)?);
        self.set_thread_pool(pool);
        Ok(())
    }

    pub fn set_thread_pool(&self, pool: Arc<ThreadPool>) {
        let previous = self.thread_pool.lock().replace(pool);
        drop(previous);
    }

    pub fn thread_pool(&self) -> Option<Arc<ThreadPool>> {
        self.thread_pool.lock().clone()
    }

    fn thread_pool_or_init(&self) -> Result<Arc<ThreadPool>> {
        let mut slot = self.thread_pool.lock();
        if let Some(ref pool) = *slot {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::default())?);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Apply a merged level/pattern map
    ///
    /// The `*` entry sets registry-wide values first; named entries then
    /// override their logger, and names with no registered logger are
    /// skipped.
    pub fn apply_specs(&self, specs: &HashMap<String, LoggerSpec>) {
        if let Some(spec) = specs.get(WILDCARD) {
            self.set_level(spec.level);
            self.set_pattern(&spec.pattern);
        }
        for (name, spec) in specs {
            if name == WILDCARD {
                continue;
            }
            if let Some(logger) = self.get(name) {
                logger.set_level(spec.level);
                logger.set_pattern(&spec.pattern);
            }
        }
    }

    /// Builder preloaded with the registry-wide settings
    fn builder(&self, name: &str) -> LoggerBuilder {
        let mut builder = Logger::builder(name)
            .level(self.level.load())
            .flush_on(self.flush_level.load());
        if let Some(ref formatter) = *self.formatter.read() {
            builder = builder.formatter(Arc::clone(formatter));
        }
        if let Some(ref handler) = *self.error_handler.read() {
            builder = builder.error_handler(Arc::clone(handler));
        }
        builder
    }

    fn ensure_free(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(LoggerError::duplicate(name));
        }
        Ok(())
    }

    fn finish(&self, builder: LoggerBuilder) -> Result<Arc<Logger>> {
        let logger = Arc::new(builder.build());
        self.register(Arc::clone(&logger))?;
        Ok(logger)
    }

    /// Create and register a synchronous logger
    pub fn create(&self, name: &str, sinks: Vec<Arc<dyn Sink>>) -> Result<Arc<Logger>> {
        self.ensure_free(name)?;
        self.finish(self.builder(name).sinks(sinks))
    }

    /// Create and register a logger on the registry's thread pool
    ///
    /// A default pool is started on first use.
    pub fn create_async(&self, name: &str, sinks: Vec<Arc<dyn Sink>>) -> Result<Arc<Logger>> {
        self.ensure_free(name)?;
        let pool = self.thread_pool_or_init()?;
        self.finish(self.builder(name).sinks(sinks).thread_pool(pool))
    }

    /// Logger writing to one file, appending unless `truncate` is set
    pub fn basic_logger(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        truncate: bool,
    ) -> Result<Arc<Logger>> {
        self.ensure_free(name)?;
        let sink: Arc<dyn Sink> = Arc::new(FileSink::with_truncate(path.as_ref(), truncate)?);
        self.create(name, vec![sink])
    }

    /// Logger writing to a size-rotated file set
    pub fn rotating_logger(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        max_size: u64,
        max_files: usize,
    ) -> Result<Arc<Logger>> {
        self.ensure_free(name)?;
        let sink: Arc<dyn Sink> = Arc::new(RotatingFileSink::new(path, max_size, max_files)?);
        self.create(name, vec![sink])
    }

    /// Logger writing to a new file every day at `hour:minute`
    pub fn daily_logger(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        hour: u32,
        minute: u32,
    ) -> Result<Arc<Logger>> {
        self.ensure_free(name)?;
        let sink: Arc<dyn Sink> = Arc::new(DailyFileSink::new(path, hour, minute)?);
        self.create(name, vec![sink])
    }

    /// Logger on stdout, coloured when stdout is a terminal
    pub fn stdout_logger(&self, name: &str) -> Result<Arc<Logger>> {
        let sink: Arc<dyn Sink> =
            Arc::new(ConsoleSink::new(ConsoleTarget::Stdout, ColorMode::Automatic));
        self.create(name, vec![sink])
    }

    /// Logger on stderr, coloured when stderr is a terminal
    pub fn stderr_logger(&self, name: &str) -> Result<Arc<Logger>> {
        let sink: Arc<dyn Sink> =
            Arc::new(ConsoleSink::new(ConsoleTarget::Stderr, ColorMode::Automatic));
        self.create(name, vec![sink])
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for logger in self.loggers.get_mut().values() {
            logger.flush();
        }
    }
}
