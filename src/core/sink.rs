//! Sink trait for log output destinations
//!
//! Sinks are shared: one sink may sit behind several loggers and be driven
//! from several threads at once, so every method takes `&self` and each
//! implementation locks its own mutable state.

use super::{
    error::Result,
    log_level::{AtomicLevel, LogLevel},
    log_record::LogRecord,
    pattern::{default_formatter, PatternFormatter, SharedFormatter},
};
use parking_lot::RwLock;
use std::sync::Arc;

pub trait Sink: Send + Sync {
    /// Render and write one record
    ///
    /// Callers only pass records that cleared `should_log`.
    fn log(&self, record: &LogRecord) -> Result<()>;

    fn flush(&self) -> Result<()>;

    fn level(&self) -> LogLevel;

    fn set_level(&self, level: LogLevel);

    fn formatter(&self) -> SharedFormatter;

    fn set_formatter(&self, formatter: SharedFormatter);

    fn name(&self) -> &str;

    #[inline]
    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    fn set_pattern(&self, pattern: &str) {
        self.set_formatter(Arc::new(PatternFormatter::new(pattern)));
    }
}

/// Level threshold and formatter slot every sink carries
///
/// A sink built without an explicit formatter gets its own `%+` formatter
/// here; it never follows later changes to a logger's pattern unless the
/// logger pushes one explicitly.
pub struct SinkBase {
    level: AtomicLevel,
    formatter: RwLock<SharedFormatter>,
}

impl SinkBase {
    pub fn new() -> Self {
        Self::with_formatter(default_formatter())
    }

    pub fn with_formatter(formatter: SharedFormatter) -> Self {
        Self {
            level: AtomicLevel::new(LogLevel::Trace),
            formatter: RwLock::new(formatter),
        }
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.level.load()
    }

    #[inline]
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level);
    }

    #[inline]
    pub fn should_log(&self, level: LogLevel) -> bool {
        self.level.should_log(level)
    }

    pub fn formatter(&self) -> SharedFormatter {
        Arc::clone(&self.formatter.read())
    }

    pub fn set_formatter(&self, formatter: SharedFormatter) {
        *self.formatter.write() = formatter;
    }
}

impl Default for SinkBase {
    fn default() -> Self {
        Self::new()
    }
}

/// Implements the level/formatter half of [`Sink`] by forwarding to a
/// `base: SinkBase` field.
macro_rules! forward_sink_base {
    () => {
        fn level(&self) -> $crate::core::LogLevel {
            self.base.level()
        }

        fn set_level(&self, level: $crate::core::LogLevel) {
            self.base.set_level(level);
        }

        fn should_log(&self, level: $crate::core::LogLevel) -> bool {
            self.base.should_log(level)
        }

        fn formatter(&self) -> $crate::core::SharedFormatter {
            self.base.formatter()
        }

        fn set_formatter(&self, formatter: $crate::core::SharedFormatter) {
            self.base.set_formatter(formatter);
        }
    };
}

pub(crate) use forward_sink_base;
