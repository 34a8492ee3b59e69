//! Core logging pipeline types and traits

pub mod clock;
pub mod error;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod pattern;
pub mod registry;
pub mod sink;
pub mod thread_pool;

pub use clock::{Clock, SystemClock};
pub use error::{LoggerError, Result};
pub use log_level::{AtomicLevel, LogLevel};
pub use log_record::{current_thread_id, LogRecord, SourceLocation};
pub use logger::{ErrorHandler, Logger, LoggerBuilder};
pub use metrics::QueueMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy, ShutdownPolicy};
pub use pattern::{
    default_formatter, Flag, FormattedRecord, Formatter, PatternFormatter, PatternItem,
    SharedFormatter,
};
pub use registry::Registry;
pub use sink::{Sink, SinkBase};
pub use thread_pool::{ThreadPool, ThreadPoolConfig, DEFAULT_QUEUE_CAPACITY};
