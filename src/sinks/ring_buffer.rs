//! In-memory sink keeping the most recent records

use crate::core::sink::{forward_sink_base, SinkBase};
use crate::core::{FormattedRecord, LogRecord, LoggerError, Result, SharedFormatter, Sink};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Keeps the last `capacity` records; older ones are overwritten
///
/// Records are stored unformatted and rendered on demand with the sink's
/// current formatter.
pub struct RingBufferSink {
    base: SinkBase,
    capacity: usize,
    records: Mutex<VecDeque<LogRecord>>,
}

impl RingBufferSink {
    /// # Errors
    ///
    /// Returns an error when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(LoggerError::config(
                "RingBufferSink",
                "capacity must be at least 1",
            ));
        }
        Ok(Self {
            base: SinkBase::new(),
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// Use `formatter` instead of the default `%+` layout
    #[must_use]
    pub fn with_formatter(self, formatter: SharedFormatter) -> Self {
        self.base.set_formatter(formatter);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// The newest `limit` records, oldest first (`0` means all)
    pub fn last_raw(&self, limit: usize) -> Vec<LogRecord> {
        let records = self.records.lock();
        let skip = Self::skip_for(records.len(), limit);
        records.iter().skip(skip).cloned().collect()
    }

    /// Same as [`RingBufferSink::last_raw`] but rendered
    pub fn last_formatted(&self, limit: usize) -> Vec<String> {
        let formatter = self.base.formatter();
        let records = self.records.lock();
        let skip = Self::skip_for(records.len(), limit);

        let mut buffer = FormattedRecord::new();
        records
            .iter()
            .skip(skip)
            .map(|record| {
                buffer.clear();
                formatter.format(record, &mut buffer);
                buffer.as_str().to_string()
            })
            .collect()
    }

    fn skip_for(len: usize, limit: usize) -> usize {
        if limit == 0 {
            0
        } else {
            len.saturating_sub(limit)
        }
    }
}

impl Sink for RingBufferSink {
    fn log(&self, record: &LogRecord) -> Result<()> {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "ring_buffer"
    }

    forward_sink_base!();
}
