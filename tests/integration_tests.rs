//! Integration tests for the logging pipeline
//!
//! These tests verify:
//! - File, rotating and async delivery end to end
//! - Level filtering before argument evaluation
//! - Runtime failures routed to the error handler
//! - Registry lifecycle and configuration loading

use sinklog::config;
use sinklog::core::sink::SinkBase;
use sinklog::prelude::*;
use sinklog::sinks::{rotated_filename, FileSink, RingBufferSink, RotatingFileSink};
use sinklog::{info, LogRecord, PatternFormatter as Pattern};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn plain(pattern: &str) -> Arc<Pattern> {
    Arc::new(Pattern::new(pattern).with_eol("\n"))
}

fn count_files(dir: &TempDir) -> usize {
    fs::read_dir(dir.path()).expect("Failed to read dir").count()
}

#[test]
fn test_file_logger_writes_default_layout() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("basic.log");

    let registry = Registry::new();
    let logger = registry
        .basic_logger("basic", &log_file, false)
        .expect("Failed to create logger");
    logger.info("service started");
    logger.debug("below info, dropped");
    logger.flush();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with('['));
    assert!(lines[0].ends_with("[basic] [info] service started"));
}

#[test]
fn test_rotation_file_count() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let base = temp_dir.path().join("rotating.log");

    // "record-NN\n" is 10 bytes; three fit in one file
    let sink = RotatingFileSink::new(&base, 30, 10)
        .expect("Failed to create sink")
        .with_formatter(plain("%v"));
    let logger = Logger::new("rot", vec![Arc::new(sink) as Arc<dyn Sink>]);

    for i in 0..10 {
        logger.info(format!("record-{:02}", i));
    }
    logger.flush();

    assert_eq!(count_files(&temp_dir), 4);
    for index in 0..4 {
        let path = rotated_filename(&base, index);
        let size = fs::metadata(&path).expect("rotated file exists").len();
        assert!(size <= 30, "{} is {} bytes", path.display(), size);
    }
    // Newest record in the active file, oldest in the highest backup
    assert_eq!(fs::read_to_string(&base).unwrap(), "record-09\n");
    assert!(fs::read_to_string(rotated_filename(&base, 3))
        .unwrap()
        .starts_with("record-00"));
}

#[test]
fn test_rotation_keeps_max_files_backups() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let base = temp_dir.path().join("bounded.log");

    let sink = RotatingFileSink::new(&base, 30, 2)
        .expect("Failed to create sink")
        .with_formatter(plain("%v"));
    let logger = Logger::new("bounded", vec![Arc::new(sink) as Arc<dyn Sink>]);

    for i in 0..10 {
        logger.info(format!("record-{:02}", i));
        assert!(count_files(&temp_dir) <= 3);
    }
    logger.flush();

    assert_eq!(count_files(&temp_dir), 3);
    assert!(!rotated_filename(&base, 3).exists());
}

#[test]
fn test_async_file_logging() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("async.log");

    let registry = Registry::new();
    registry
        .init_thread_pool(ThreadPoolConfig::new(16, 1))
        .expect("Failed to start pool");
    let sink = FileSink::new(&log_file)
        .expect("Failed to create sink")
        .with_formatter(plain("%v"));
    let logger = registry
        .create_async("async", vec![Arc::new(sink) as Arc<dyn Sink>])
        .expect("Failed to create logger");

    for i in 0..200 {
        logger.info(format!("Message {}", i));
    }
    logger.flush();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 200, "Should have 200 log entries");
    assert_eq!(lines[0], "Message 0");
    assert_eq!(lines[199], "Message 199");
}

#[test]
fn test_records_outlive_dropped_async_logger() {
    let sink = Arc::new(RingBufferSink::new(1_000).unwrap());
    let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::new(1_000, 1)).unwrap());

    {
        let logger = Logger::builder("short-lived")
            .sink(sink.clone())
            .thread_pool(Arc::clone(&pool))
            .build();
        for i in 0..500 {
            logger.info(format!("{}", i));
        }
    }

    // Joining the workers drains whatever the dropped logger left queued
    drop(pool);
    assert_eq!(sink.len(), 500);
}

#[test]
fn test_suppressed_level_skips_argument_evaluation() {
    let sink = Arc::new(RingBufferSink::new(8).unwrap());
    let logger = Logger::builder("lazy")
        .level(LogLevel::Error)
        .sink(sink.clone())
        .build();

    let calls = AtomicUsize::new(0);
    let expensive = || {
        calls.fetch_add(1, Ordering::SeqCst);
        "payload"
    };

    for _ in 0..100 {
        info!(logger, "{}", expensive());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(sink.is_empty());
}

struct RefusingSink {
    base: SinkBase,
}

impl Sink for RefusingSink {
    fn log(&self, _record: &LogRecord) -> Result<()> {
        Err(LoggerError::other("device unavailable"))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "refusing"
    }

    fn level(&self) -> LogLevel {
        self.base.level()
    }

    fn set_level(&self, level: LogLevel) {
        self.base.set_level(level);
    }

    fn formatter(&self) -> sinklog::SharedFormatter {
        self.base.formatter()
    }

    fn set_formatter(&self, formatter: sinklog::SharedFormatter) {
        self.base.set_formatter(formatter);
    }
}

#[test]
fn test_failing_sink_calls_handler_once_per_log() {
    let failures = Arc::new(AtomicUsize::new(0));
    let failures_clone = Arc::clone(&failures);

    let registry = Registry::new();
    registry.set_error_handler(Arc::new(move |msg: &str| {
        assert!(msg.contains("device unavailable"));
        failures_clone.fetch_add(1, Ordering::SeqCst);
    }));
    let logger = registry
        .create(
            "failing",
            vec![Arc::new(RefusingSink {
                base: SinkBase::new(),
            }) as Arc<dyn Sink>],
        )
        .expect("Failed to create logger");

    for _ in 0..7 {
        logger.warn("still returns normally");
    }
    assert_eq!(failures.load(Ordering::SeqCst), 7);
}

#[test]
fn test_async_failures_reach_handler() {
    let failures = Arc::new(AtomicUsize::new(0));
    let failures_clone = Arc::clone(&failures);

    let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::default()).unwrap());
    let logger = Logger::builder("async-failing")
        .sink(Arc::new(RefusingSink {
            base: SinkBase::new(),
        }))
        .error_handler(Arc::new(move |_: &str| {
            failures_clone.fetch_add(1, Ordering::SeqCst);
        }))
        .thread_pool(pool)
        .build();

    for _ in 0..20 {
        logger.error("x");
    }
    logger.flush();
    assert_eq!(failures.load(Ordering::SeqCst), 20);
}

#[test]
fn test_unwritable_path_fails_at_construction() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let registry = Registry::new();

    // The temp dir itself is a directory, not a writable file
    let err = registry
        .basic_logger("dir", temp_dir.path(), false)
        .expect_err("directory path must be rejected");
    assert!(err.is_construction());
    assert!(!registry.contains("dir"));
}

#[test]
fn test_duplicate_logger_name() {
    let registry = Registry::new();
    registry.create("svc", Vec::new()).unwrap();

    let err = registry.stdout_logger("svc").unwrap_err();
    assert!(matches!(err, LoggerError::DuplicateLogger { ref name } if name == "svc"));
}

#[test]
fn test_drop_all_releases_every_logger() {
    let registry = Registry::new();
    let names = ["a", "b", "c", "d"];
    for name in names {
        registry.create(name, Vec::new()).unwrap();
    }

    let mut visited = 0;
    registry.apply_all(|_| visited += 1);
    assert_eq!(visited, names.len());

    registry.drop_all();
    for name in names {
        assert!(registry.get(name).is_none());
    }
}

#[test]
fn test_config_specs_applied_through_registry() {
    let registry = Registry::new();
    let sink = Arc::new(RingBufferSink::new(8).unwrap());
    let logger1 = registry
        .create("logger1", vec![sink.clone() as Arc<dyn Sink>])
        .unwrap();
    let logger2 = registry.create("logger2", Vec::new()).unwrap();
    let other = registry.create("other", Vec::new()).unwrap();

    let specs = config::merge_specs("off,logger1=debug,logger2=info", "logger1=%l|%v");
    registry.apply_specs(&specs);

    assert_eq!(logger1.level(), LogLevel::Debug);
    assert_eq!(logger2.level(), LogLevel::Info);
    assert_eq!(other.level(), LogLevel::Off);

    logger1.debug("configured");
    assert_eq!(sink.last_formatted(0)[0].trim_end(), "debug|configured");
}

#[test]
fn test_shared_sink_across_loggers_and_threads() {
    let sink = Arc::new(RingBufferSink::new(10_000).unwrap());
    let loggers: Vec<Arc<Logger>> = (0..4)
        .map(|i| Arc::new(Logger::new(format!("worker-{}", i), vec![sink.clone() as Arc<dyn Sink>])))
        .collect();

    let handles: Vec<_> = loggers
        .iter()
        .cloned()
        .map(|logger| {
            std::thread::spawn(move || {
                for j in 0..250 {
                    logger.info(format!("{}", j));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(sink.len(), 1_000);
}
