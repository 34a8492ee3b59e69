//! Error types for the logger system
//!
//! Only sink, logger and thread pool construction report errors to the caller.
//! Failures that happen while a record is being delivered are turned into
//! diagnostic text and handed to the logger's error handler instead.

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A sink could not open its target file
    #[error("Failed to open log file '{path}': {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotation { path: String, message: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// A logger with the same name is already registered
    #[error("Logger with name '{name}' already exists")]
    DuplicateLogger { name: String },

    /// Worker threads could not be started
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// The message arguments could not be rendered
    #[error("Failed to render log message: {0}")]
    Render(String),

    /// A sink panicked while handling a record
    #[error("Sink '{sink}' panicked: {message}")]
    SinkPanic { sink: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a file open error
    pub fn file_open(path: impl Into<String>, source: std::io::Error) -> Self {
        LoggerError::FileOpen {
            path: path.into(),
            source,
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate logger name error
    pub fn duplicate(name: impl Into<String>) -> Self {
        LoggerError::DuplicateLogger { name: name.into() }
    }

    /// Create a render error
    pub fn render<S: Into<String>>(msg: S) -> Self {
        LoggerError::Render(msg.into())
    }

    /// Create a sink panic error
    pub fn sink_panic(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::SinkPanic {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Whether this error belongs to sink/logger/pool construction
    ///
    /// These are the only errors a caller ever sees as a `Result`.
    #[must_use]
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            LoggerError::FileOpen { .. }
                | LoggerError::InvalidConfiguration { .. }
                | LoggerError::DuplicateLogger { .. }
                | LoggerError::ThreadPool(_)
                | LoggerError::IoOperation { .. }
        )
    }
}
