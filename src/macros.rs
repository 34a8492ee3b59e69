//! Logging macros for ergonomic log message formatting.
//!
//! The level checks come first: a call below [`STATIC_LEVEL`](crate::STATIC_LEVEL)
//! or below the logger's runtime level never evaluates its format arguments.
//! Every call records its file, line and module path.
//!
//! # Examples
//!
//! ```
//! use sinklog::prelude::*;
//! use sinklog::info;
//!
//! let logger = Logger::new("app", Vec::new());
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log a message at a given level.
///
/// # Examples
///
/// ```
/// # use sinklog::prelude::*;
/// # let logger = Logger::new("app", Vec::new());
/// use sinklog::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let level: $crate::LogLevel = $level;
        let logger = &$logger;
        if level >= $crate::STATIC_LEVEL && logger.should_log(level) {
            logger.log_at(
                level,
                $crate::SourceLocation::new(file!(), line!(), module_path!()),
                format_args!($($arg)+),
            );
        }
    }};
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use sinklog::prelude::*;
/// # let logger = Logger::builder("app").level(LogLevel::Trace).build();
/// use sinklog::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// # use sinklog::prelude::*;
/// # let logger = Logger::new("app", Vec::new());
/// use sinklog::warn;
/// warn!(logger, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level message.
///
/// # Examples
///
/// ```
/// # use sinklog::prelude::*;
/// # let logger = Logger::new("app", Vec::new());
/// use sinklog::critical;
/// critical!(logger, "Unable to recover from error: {}", "disk full");
/// ```
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $($arg)+)
    };
}

#[cfg(all(
    test,
    not(any(
        feature = "static-level-debug",
        feature = "static-level-info",
        feature = "static-level-off"
    ))
))]
mod tests {
    use crate::core::{LogLevel, Logger, PatternFormatter, Sink};
    use crate::sinks::RingBufferSink;
    use std::cell::Cell;
    use std::sync::Arc;

    fn setup(level: LogLevel) -> (Logger, Arc<RingBufferSink>) {
        let sink = Arc::new(
            RingBufferSink::new(16)
                .unwrap()
                .with_formatter(Arc::new(PatternFormatter::new("%L %v").with_eol(""))),
        );
        let logger = Logger::builder("macros")
            .level(level)
            .sink(sink.clone() as Arc<dyn Sink>)
            .build();
        (logger, sink)
    }

    #[test]
    fn test_level_macros() {
        let (logger, sink) = setup(LogLevel::Trace);
        trace!(logger, "t {}", 1);
        debug!(logger, "d");
        info!(logger, "i");
        warn!(logger, "w");
        error!(logger, "e {}-{}", 4, 5);
        critical!(logger, "c");
        log!(logger, LogLevel::Info, "plain");

        assert_eq!(
            sink.last_formatted(0),
            vec!["T t 1", "D d", "I i", "W w", "E e 4-5", "C c", "I plain"]
        );
    }

    #[test]
    fn test_suppressed_call_skips_arguments() {
        let (logger, sink) = setup(LogLevel::Warn);
        let evaluated = Cell::new(0);
        let count = || {
            evaluated.set(evaluated.get() + 1);
            evaluated.get()
        };

        debug!(logger, "never {}", count());
        info!(logger, "never {}", count());
        assert_eq!(evaluated.get(), 0);

        warn!(logger, "seen {}", count());
        assert_eq!(evaluated.get(), 1);
        assert_eq!(sink.last_formatted(0), vec!["W seen 1"]);
    }

    #[test]
    fn test_macro_records_call_site() {
        let (logger, sink) = setup(LogLevel::Trace);
        info!(logger, "x");
        let raw = sink.last_raw(1);
        let source = raw[0].source.expect("macro attaches a source location");
        assert!(source.file.ends_with("macros.rs"));
        assert!(source.module_path.ends_with("macros::tests"));
    }

    #[test]
    fn test_macros_accept_shared_logger() {
        let (logger, sink) = setup(LogLevel::Info);
        let shared = Arc::new(logger);
        info!(shared, "through arc");
        assert_eq!(sink.len(), 1);
    }
}
