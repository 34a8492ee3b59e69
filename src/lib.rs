//! # sinklog
//!
//! A fast logging library built around shared sinks and compiled patterns.
//!
//! ## Features
//!
//! - **Cheap when disabled**: the level check runs before any formatting
//! - **Pattern formatting**: `%`-flag patterns compiled once, rendered into reusable buffers
//! - **Sinks**: console, basic file, size-rotated file, daily file, in-memory ring buffer
//! - **Async delivery**: bounded queue with block / drop-newest / drop-oldest policies
//!   serviced by a fixed set of worker threads
//! - **Registry**: name → logger directory with bulk configuration
//!
//! ## Example
//!
//! ```
//! use sinklog::prelude::*;
//! use sinklog::sinks::RingBufferSink;
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! let sink = Arc::new(RingBufferSink::new(8).unwrap());
//! let logger = registry.create("app", vec![sink.clone() as Arc<dyn Sink>]).unwrap();
//!
//! sinklog::info!(logger, "listening on port {}", 8080);
//! assert_eq!(sink.len(), 1);
//! ```

pub mod config;
pub mod core;
pub mod macros;
pub mod sinks;

/// Compile-time floor applied by the logging macros
///
/// Selected with the `static-level-debug`, `static-level-info` and
/// `static-level-off` features; the most restrictive one enabled wins.
#[cfg(feature = "static-level-off")]
pub const STATIC_LEVEL: LogLevel = LogLevel::Off;
#[cfg(all(feature = "static-level-info", not(feature = "static-level-off")))]
pub const STATIC_LEVEL: LogLevel = LogLevel::Info;
#[cfg(all(
    feature = "static-level-debug",
    not(any(feature = "static-level-info", feature = "static-level-off"))
))]
pub const STATIC_LEVEL: LogLevel = LogLevel::Debug;
#[cfg(not(any(
    feature = "static-level-debug",
    feature = "static-level-info",
    feature = "static-level-off"
)))]
pub const STATIC_LEVEL: LogLevel = LogLevel::Trace;

pub mod prelude {
    pub use crate::core::{
        ErrorHandler, LogLevel, Logger, LoggerBuilder, LoggerError, OverflowPolicy,
        PatternFormatter, Registry, Result, ShutdownPolicy, Sink, ThreadPool, ThreadPoolConfig,
    };
}

pub use crate::core::{
    current_thread_id, AtomicLevel, Clock, ErrorHandler, FormattedRecord, Formatter, LogLevel,
    LogRecord, Logger, LoggerBuilder, LoggerError, OverflowCallback, OverflowPolicy,
    PatternFormatter, QueueMetrics, Registry, Result, SharedFormatter, ShutdownPolicy, Sink,
    SourceLocation, SystemClock, ThreadPool, ThreadPoolConfig,
};
