//! Daily file sink: a new `base_YYYY-MM-DD.ext` file every day at a fixed time
//!
//! Rotation is lazy. The sink remembers the next rotation instant and the
//! first record logged at or after it opens the new file; nothing runs on a
//! timer.

use super::file::open_log_file;
use super::rotating_file::split_by_extension;
use crate::core::clock::{Clock, SystemClock};
use crate::core::sink::{forward_sink_base, SinkBase};
use crate::core::{FormattedRecord, LogRecord, LoggerError, Result, SharedFormatter, Sink};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `dir/name.ext` → `dir/name_YYYY-MM-DD.ext`
pub fn daily_filename(base_path: &Path, date: NaiveDate) -> PathBuf {
    let (stem, ext) = split_by_extension(base_path);
    let mut name = stem.into_os_string();
    name.push(format!("_{}{}", date.format("%Y-%m-%d"), ext));
    PathBuf::from(name)
}

/// First `hour:minute` strictly after `now`
fn next_rotation_after(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    let naive = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .unwrap_or_else(|| now.naive_local());
    // A wall time skipped by a DST jump has no local mapping; read it as UTC
    let candidate = Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive));

    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

struct DailyState {
    writer: Option<BufWriter<File>>,
    current_path: PathBuf,
    next_rotation: DateTime<Local>,
    buffer: FormattedRecord,
}

/// Time-based rotating file sink
///
/// # Examples
///
/// ```no_run
/// use sinklog::sinks::DailyFileSink;
///
/// // A new file every day at 2:30am
/// let sink = DailyFileSink::new("logs/daily.txt", 2, 30).unwrap();
/// ```
pub struct DailyFileSink {
    base: SinkBase,
    base_path: PathBuf,
    rotation_hour: u32,
    rotation_minute: u32,
    clock: Arc<dyn Clock>,
    state: Mutex<DailyState>,
}

impl DailyFileSink {
    /// # Errors
    ///
    /// Returns an error for an out-of-range rotation time or when today's
    /// file cannot be opened.
    pub fn new(path: impl AsRef<Path>, rotation_hour: u32, rotation_minute: u32) -> Result<Self> {
        Self::with_clock(path, rotation_hour, rotation_minute, Arc::new(SystemClock))
    }

    /// Same as [`DailyFileSink::new`] with an explicit time source
    pub fn with_clock(
        path: impl AsRef<Path>,
        rotation_hour: u32,
        rotation_minute: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if rotation_hour > 23 || rotation_minute > 59 {
            return Err(LoggerError::config(
                "DailyFileSink",
                format!(
                    "invalid rotation time {:02}:{:02}, expected hour 0-23 and minute 0-59",
                    rotation_hour, rotation_minute
                ),
            ));
        }

        let base_path = path.as_ref().to_path_buf();
        let now = clock.now();
        let current_path = daily_filename(&base_path, now.date_naive());
        let file = open_log_file(&current_path, false)?;

        Ok(Self {
            base: SinkBase::new(),
            base_path,
            rotation_hour,
            rotation_minute,
            clock,
            state: Mutex::new(DailyState {
                writer: Some(BufWriter::new(file)),
                current_path,
                next_rotation: next_rotation_after(now, rotation_hour, rotation_minute),
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

    /// When the next record will switch files
    pub fn next_rotation(&self) -> DateTime<Local> {
        self.state.lock().next_rotation
    }

    /// The file currently written to
    pub fn current_path(&self) -> PathBuf {
        self.state.lock().current_path.clone()
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn rotation_time(&self) -> (u32, u32) {
        (self.rotation_hour, self.rotation_minute)
    }

    fn rotate(&self, state: &mut DailyState, now: DateTime<Local>) -> Result<()> {
        if let Some(mut writer) = state.writer.take() {
            if let Err(e) = writer.flush() {
                eprintln!(
                    "[LOGGER WARNING] Failed to flush '{}' before daily rotation: {}",
                    state.current_path.display(),
                    e
                );
            }
        }

        let path = daily_filename(&self.base_path, now.date_naive());
        match open_log_file(&path, false) {
            Ok(file) => {
                state.writer = Some(BufWriter::new(file));
                state.current_path = path;
            }
            Err(e) => {
                // Keep writing to the previous day's file and retry on the next record
                if let Ok(file) = open_log_file(&state.current_path, false) {
                    state.writer = Some(BufWriter::new(file));
                }
                return Err(LoggerError::file_rotation(
                    path.display().to_string(),
                    e.to_string(),
                ));
            }
        }

        // Catch up when the process slept across several boundaries
        while state.next_rotation <= now {
            state.next_rotation = state.next_rotation + Duration::days(1);
        }
        Ok(())
    }
}

impl Sink for DailyFileSink {
    fn log(&self, record: &LogRecord) -> Result<()> {
        let formatter = self.base.formatter();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let now = self.clock.now();
        // A failed rotation still writes the record to the previous file,
        // then reports the failure
        let rotation_error = if now >= state.next_rotation {
            self.rotate(state, now).err()
        } else {
            None
        };

        state.buffer.clear();
        formatter.format(record, &mut state.buffer);

        let writer = match state.writer.as_mut() {
            Some(writer) => writer,
            None => {
                return Err(rotation_error
                    .unwrap_or_else(|| LoggerError::other("Daily file writer not initialized")))
            }
        };
        writer.write_all(state.buffer.as_bytes()).map_err(|e| {
            LoggerError::io_operation(
                "writing log file",
                format!("Failed to write to '{}'", state.current_path.display()),
                e,
            )
        })?;

        match rotation_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn flush(&self) -> Result<()> {
        if let Some(ref mut writer) = self.state.lock().writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "daily_file"
    }

    forward_sink_base!();
}

impl Drop for DailyFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.state.get_mut().writer.take() {
            let _ = writer.flush();
        }
    }
}
