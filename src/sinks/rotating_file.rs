//! Rotating file sink with size-based rotation
//!
//! The active file is `base.ext`; backups are `base.1.ext` (newest) up to
//! `base.<max_files>.ext` (oldest). Rotation happens before a record is
//! written whenever that record would push the active file past `max_size`,
//! so a file only grows beyond the limit when a single record is larger
//! than the limit on its own.

use super::file::open_log_file;
use crate::core::sink::{forward_sink_base, SinkBase};
use crate::core::{FormattedRecord, LogRecord, LoggerError, Result, SharedFormatter, Sink};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Upper bound on retained backups
pub const MAX_BACKUP_FILES: usize = 200_000;

/// Configuration for rotating file sink
///
/// # Examples
///
/// ```
/// use sinklog::sinks::RotationPolicy;
///
/// // 5 MB per file, keep 3 backups, start with a fresh file
/// let policy = RotationPolicy::new(5 * 1024 * 1024, 3).with_rotate_on_open(true);
/// assert_eq!(policy.max_files, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Maximum size of one file in bytes
    pub max_size: u64,
    /// Number of backups kept next to the active file
    pub max_files: usize,
    /// Rotate once at construction if the active file is not empty
    pub rotate_on_open: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size: 10 * 1024 * 1024, // 10 MB
            max_files: 5,
            rotate_on_open: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new(max_size: u64, max_files: usize) -> Self {
        Self {
            max_size,
            max_files,
            rotate_on_open: false,
        }
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_rotate_on_open(mut self, enabled: bool) -> Self {
        self.rotate_on_open = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(LoggerError::config(
                "RotatingFileSink",
                "max_size must be greater than zero",
            ));
        }
        if self.max_files > MAX_BACKUP_FILES {
            return Err(LoggerError::config(
                "RotatingFileSink",
                format!("max_files must not exceed {}", MAX_BACKUP_FILES),
            ));
        }
        Ok(())
    }
}

/// Split `dir/name.ext` into (`dir/name`, `.ext`)
///
/// Dot files (`.hidden`) and names ending in a dot have no extension.
pub(crate) fn split_by_extension(path: &Path) -> (PathBuf, String) {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return (path.to_path_buf(), String::new()),
    };

    match file_name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < file_name.len() => {
            let stem = &file_name[..dot];
            let ext = &file_name[dot..];
            (path.with_file_name(stem), ext.to_string())
        }
        _ => (path.to_path_buf(), String::new()),
    }
}

/// `base.ext` for index 0, `base.<index>.ext` otherwise
pub fn rotated_filename(base_path: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return base_path.to_path_buf();
    }

    let (stem, ext) = split_by_extension(base_path);
    let mut name = stem.into_os_string();
    name.push(format!(".{}{}", index, ext));
    PathBuf::from(name)
}

struct RotatingState {
    writer: Option<BufWriter<File>>,
    current_size: u64,
    buffer: FormattedRecord,
}

/// Size-based rotating file sink
///
/// # Examples
///
/// ```no_run
/// use sinklog::sinks::RotatingFileSink;
///
/// // 5 MB per file, 3 backups
/// let sink = RotatingFileSink::new("logs/rotating.txt", 5 * 1024 * 1024, 3).unwrap();
/// ```
pub struct RotatingFileSink {
    base: SinkBase,
    base_path: PathBuf,
    policy: RotationPolicy,
    state: Mutex<RotatingState>,
}

impl RotatingFileSink {
    /// Create a new rotating file sink
    ///
    /// # Errors
    ///
    /// Returns error if `max_size` is zero or the file cannot be created or opened
    pub fn new(path: impl AsRef<Path>, max_size: u64, max_files: usize) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::new(max_size, max_files))
    }

    /// Create a new rotating file sink with custom policy
    ///
    /// # Errors
    ///
    /// Returns error if the policy is invalid or the file cannot be created or opened
    pub fn with_policy(path: impl AsRef<Path>, policy: RotationPolicy) -> Result<Self> {
        policy.validate()?;
        let base_path = path.as_ref().to_path_buf();

        let file = open_log_file(&base_path, false)?;
        let current_size = file
            .metadata()
            .map_err(|e| LoggerError::file_open(base_path.display().to_string(), e))?
            .len();

        let sink = Self {
            base: SinkBase::new(),
            base_path,
            policy,
            state: Mutex::new(RotatingState {
                writer: Some(BufWriter::new(file)),
                current_size,
                buffer: FormattedRecord::new(),
            }),
        };

        if sink.policy.rotate_on_open && current_size > 0 {
            let mut state = sink.state.lock();
            sink.rotate(&mut state).map_err(|e| {
                LoggerError::file_open(
                    sink.base_path.display().to_string(),
                    io::Error::new(io::ErrorKind::Other, e.to_string()),
                )
            })?;
        }

        Ok(sink)
    }

    /// Use `formatter` instead of the default `%+` layout
    #[must_use]
    pub fn with_formatter(self, formatter: SharedFormatter) -> Self {
        self.base.set_formatter(formatter);
        self
    }

    /// Bytes written to the active file so far
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    /// Path of the active file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Shift every backup up by one index and start an empty active file
    fn rotate(&self, state: &mut RotatingState) -> Result<()> {
        // Release the handle before renaming the file underneath it
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        if self.policy.max_files == 0 {
            let file = open_log_file(&self.base_path, true).map_err(|e| {
                LoggerError::file_rotation(self.base_path.display().to_string(), e.to_string())
            })?;
            state.writer = Some(BufWriter::new(file));
            state.current_size = 0;
            return Ok(());
        }

        for i in (1..=self.policy.max_files).rev() {
            let src = rotated_filename(&self.base_path, i - 1);
            if !src.exists() {
                continue;
            }
            let target = rotated_filename(&self.base_path, i);

            // The oldest backup falls off the end here
            if target.exists() {
                if let Err(e) = fs::remove_file(&target) {
                    if e.kind() != io::ErrorKind::NotFound {
                        return Err(LoggerError::file_rotation(
                            target.display().to_string(),
                            format!("Failed to remove old backup: {}", e),
                        ));
                    }
                }
            }

            fs::rename(&src, &target).map_err(|e| {
                LoggerError::file_rotation(
                    src.display().to_string(),
                    format!("Failed to rename to '{}': {}", target.display(), e),
                )
            })?;
        }

        let file = open_log_file(&self.base_path, true).map_err(|e| {
            LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!("Failed to create new log file: {}", e),
            )
        })?;
        state.writer = Some(BufWriter::new(file));
        state.current_size = 0;
        Ok(())
    }

    /// Try to reopen the active file (used for recovery after rotation failure)
    fn try_reopen_file(&self, state: &mut RotatingState) -> Result<()> {
        let file = open_log_file(&self.base_path, false)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        state.writer = Some(BufWriter::new(file));
        state.current_size = size;
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn log(&self, record: &LogRecord) -> Result<()> {
        let formatter = self.base.formatter();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.buffer.clear();
        formatter.format(record, &mut state.buffer);
        let len = state.buffer.len() as u64;

        if state.current_size > 0 && state.current_size + len > self.policy.max_size {
            if let Err(e) = self.rotate(state) {
                if state.writer.is_none() {
                    if let Err(reopen_err) = self.try_reopen_file(state) {
                        eprintln!(
                            "[LOGGER ERROR] Failed to reopen '{}' after rotation failure: {}",
                            self.base_path.display(),
                            reopen_err
                        );
                    }
                }
                // The record that triggered the failed rotation is lost
                return Err(e);
            }
        }

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::other("Rotating file writer not initialized"))?;
        writer.write_all(state.buffer.as_bytes()).map_err(|e| {
            LoggerError::io_operation(
                "writing log file",
                format!("Failed to write to '{}'", self.base_path.display()),
                e,
            )
        })?;
        state.current_size += len;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(ref mut writer) = self.state.lock().writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rotating_file"
    }

    forward_sink_base!();
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.state.get_mut().writer.take() {
            // Best effort flush - ignore errors during drop
            let _ = writer.flush();
        }
    }
}
