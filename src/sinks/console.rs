//! Console sinks writing to stdout or stderr
//!
//! The span a pattern marks with `%^`...`%$` is wrapped in the level's ANSI
//! colour when colouring is on. Colour codes come from [`LogLevel::color_code`]
//! and are only available with the `console` feature.

use crate::core::sink::{forward_sink_base, SinkBase};
use crate::core::{FormattedRecord, LogLevel, LogRecord, Result, SharedFormatter, Sink};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{self, IsTerminal, Write};

/// Which standard stream a console sink writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

/// When to emit colour escapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Always,
    Never,
    /// Colour only when the stream is a terminal
    #[default]
    Automatic,
}

impl ColorMode {
    fn resolve(self, target: ConsoleTarget) -> bool {
        if !cfg!(feature = "console") {
            return false;
        }
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Automatic => match target {
                ConsoleTarget::Stdout => io::stdout().is_terminal(),
                ConsoleTarget::Stderr => io::stderr().is_terminal(),
            },
        }
    }
}

#[cfg(feature = "console")]
fn write_colored(out: &mut impl Write, formatted: &FormattedRecord, level: LogLevel) -> io::Result<()> {
    let text = formatted.as_str();
    match formatted.color_range() {
        Some(range) if range.start < range.end => {
            out.write_all(text[..range.start].as_bytes())?;
            write!(out, "\x1b[{}m", level.color_code().to_fg_str())?;
            out.write_all(text[range.clone()].as_bytes())?;
            out.write_all(b"\x1b[0m")?;
            out.write_all(text[range.end..].as_bytes())
        }
        _ => out.write_all(text.as_bytes()),
    }
}

#[cfg(not(feature = "console"))]
fn write_colored(out: &mut impl Write, formatted: &FormattedRecord, _level: LogLevel) -> io::Result<()> {
    out.write_all(formatted.as_bytes())
}

pub struct ConsoleSink {
    base: SinkBase,
    target: ConsoleTarget,
    colored: bool,
    buffer: Mutex<FormattedRecord>,
}

impl ConsoleSink {
    pub fn new(target: ConsoleTarget, color_mode: ColorMode) -> Self {
        Self {
            base: SinkBase::new(),
            target,
            colored: color_mode.resolve(target),
            buffer: Mutex::new(FormattedRecord::new()),
        }
    }

    pub fn stdout() -> Self {
        Self::new(ConsoleTarget::Stdout, ColorMode::Never)
    }

    pub fn stderr() -> Self {
        Self::new(ConsoleTarget::Stderr, ColorMode::Never)
    }

    pub fn stdout_color() -> Self {
        Self::new(ConsoleTarget::Stdout, ColorMode::Automatic)
    }

    pub fn stderr_color() -> Self {
        Self::new(ConsoleTarget::Stderr, ColorMode::Automatic)
    }

    /// Use `formatter` instead of the default `%+` layout
    #[must_use]
    pub fn with_formatter(self, formatter: SharedFormatter) -> Self {
        self.base.set_formatter(formatter);
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    pub fn is_colored(&self) -> bool {
        self.colored
    }

    fn write_to(&self, out: &mut impl Write, formatted: &FormattedRecord, level: LogLevel) -> io::Result<()> {
        if self.colored {
            write_colored(out, formatted, level)
        } else {
            out.write_all(formatted.as_bytes())
        }
    }
}

impl Sink for ConsoleSink {
    fn log(&self, record: &LogRecord) -> Result<()> {
        let formatter = self.base.formatter();
        let mut buffer = self.buffer.lock();
        buffer.clear();
        formatter.format(record, &mut buffer);

        // The std stream lock keeps one record from interleaving with another
        match self.target {
            ConsoleTarget::Stdout => self.write_to(&mut io::stdout().lock(), &buffer, record.level)?,
            ConsoleTarget::Stderr => self.write_to(&mut io::stderr().lock(), &buffer, record.level)?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().flush()?,
            ConsoleTarget::Stderr => io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        match self.target {
            ConsoleTarget::Stdout => "stdout",
            ConsoleTarget::Stderr => "stderr",
        }
    }

    forward_sink_base!();
}
