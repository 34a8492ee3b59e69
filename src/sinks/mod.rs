//! Sink implementations

pub mod console;
pub mod daily_file;
pub mod file;
pub mod ring_buffer;
pub mod rotating_file;

pub use console::{ColorMode, ConsoleSink, ConsoleTarget};
pub use daily_file::{daily_filename, DailyFileSink};
pub use file::FileSink;
pub use ring_buffer::RingBufferSink;
pub use rotating_file::{rotated_filename, RotatingFileSink, RotationPolicy};

pub use crate::core::Sink;
