//! Log record structure

use super::log_level::LogLevel;
use chrono::{DateTime, Local};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

// Thread-local cache so the id is assigned once per thread
thread_local! {
    static THREAD_ID_CACHE: Cell<u64> = const { Cell::new(0) };
}

/// Small numeric id of the calling thread, stable for the thread's lifetime
pub fn current_thread_id() -> u64 {
    THREAD_ID_CACHE.with(|cache| {
        let id = cache.get();
        if id != 0 {
            return id;
        }
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        cache.set(id);
        id
    })
}

/// Where a log call was made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub module_path: &'static str,
}

impl SourceLocation {
    pub const fn new(file: &'static str, line: u32, module_path: &'static str) -> Self {
        Self {
            file,
            line,
            module_path,
        }
    }
}

/// One log event, immutable once built
///
/// The record is moved into the async queue as a whole, so it owns its
/// payload and shares the logger name.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub logger_name: Arc<str>,
    pub level: LogLevel,
    pub time: DateTime<Local>,
    pub thread_id: u64,
    pub payload: String,
    pub source: Option<SourceLocation>,
}

impl LogRecord {
    pub fn new(logger_name: Arc<str>, level: LogLevel, payload: String) -> Self {
        Self {
            logger_name,
            level,
            time: Local::now(),
            thread_id: current_thread_id(),
            payload,
            source: None,
        }
    }

    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_time(mut self, time: DateTime<Local>) -> Self {
        self.time = time;
        self
    }
}
