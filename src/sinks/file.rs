//! Basic file sink: one file opened in append mode, never rotated

use crate::core::sink::{forward_sink_base, SinkBase};
use crate::core::{FormattedRecord, LogRecord, LoggerError, Result, SharedFormatter, Sink};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Open `path` for appending (or truncating), creating parent directories
pub(crate) fn open_log_file(path: &Path, truncate: bool) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    options
        .open(path)
        .map_err(|e| LoggerError::file_open(path.display().to_string(), e))
}

struct FileState {
    writer: BufWriter<File>,
    buffer: FormattedRecord,
}

pub struct FileSink {
    base: SinkBase,
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileSink {
    /// Open `path` in append mode
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_truncate(path, false)
    }

    /// Open `path`, discarding existing content when `truncate` is set
    pub fn with_truncate(path: impl Into<PathBuf>, truncate: bool) -> Result<Self> {
        let path = path.into();
        let file = open_log_file(&path, truncate)?;

        Ok(Self {
            base: SinkBase::new(),
            path,
            state: Mutex::new(FileState {
                writer: BufWriter::new(file),
                buffer: FormattedRecord::new(),
            }),
        })
    }

    /// Use `formatter` instead of the default `%+` layout
    #[must_use]
    pub fn with_formatter(self, formatter: SharedFormatter) -> Self {
        self.base.set_formatter(formatter);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn log(&self, record: &LogRecord) -> Result<()> {
        let formatter = self.base.formatter();
        let mut state = self.state.lock();
        let FileState { writer, buffer } = &mut *state;

        buffer.clear();
        formatter.format(record, buffer);
        writer.write_all(buffer.as_bytes()).map_err(|e| {
            LoggerError::io_operation(
                "writing log file",
                format!("Failed to write to '{}'", self.path.display()),
                e,
            )
        })?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.state.lock().writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }

    forward_sink_base!();
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.state.get_mut().writer.flush();
    }
}
