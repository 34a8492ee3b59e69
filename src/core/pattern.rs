//! Pattern formatter
//!
//! A pattern such as `"[%H:%M:%S %z] [%^%L%$] [thread %t] %v"` is compiled
//! once into a list of literal runs and flag renderers. Rendering walks that
//! list and appends into a caller-owned [`FormattedRecord`], so a sink can
//! reuse one buffer for every record it writes.
//!
//! Unknown flags compile to the literal text `%<char>`.

use super::log_record::LogRecord;
use chrono::{Datelike, Timelike};
use std::fmt::{self, Write};
use std::ops::Range;
use std::sync::Arc;

/// Renders a log record into text
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord, dest: &mut FormattedRecord);
}

/// Formatters are immutable once built and shared between sinks by reference
pub type SharedFormatter = Arc<dyn Formatter>;

/// Reusable output buffer for one rendered record
///
/// `color_range` marks the bytes between `%^` and `%$`; only terminal
/// sinks look at it.
#[derive(Debug, Default, Clone)]
pub struct FormattedRecord {
    text: String,
    color_range: Option<Range<usize>>,
    color_start: Option<usize>,
}

impl FormattedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for the next record, keeping the allocation
    pub fn clear(&mut self) {
        self.text.clear();
        self.color_range = None;
        self.color_start = None;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn color_range(&self) -> Option<Range<usize>> {
        self.color_range.clone()
    }

    /// Append raw text
    pub fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    pub fn begin_color(&mut self) {
        self.color_start = Some(self.text.len());
    }

    pub fn end_color(&mut self) {
        if let Some(start) = self.color_start.take() {
            self.color_range = Some(start..self.text.len());
        }
    }
}

impl Write for FormattedRecord {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.text.push_str(s);
        Ok(())
    }
}

/// A single `%` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// `%Y`
    Year,
    /// `%y`
    ShortYear,
    /// `%m`
    Month,
    /// `%d`
    Day,
    /// `%H`
    Hour,
    /// `%I`
    Hour12,
    /// `%M`
    Minute,
    /// `%S`
    Second,
    /// `%e`
    Millis,
    /// `%f`
    Micros,
    /// `%F`
    Nanos,
    /// `%p`
    AmPm,
    /// `%a`
    ShortWeekday,
    /// `%A`
    Weekday,
    /// `%b`
    ShortMonthName,
    /// `%B`
    MonthName,
    /// `%T`
    Time,
    /// `%D`
    Date,
    /// `%z`
    UtcOffset,
    /// `%E`
    Epoch,
    /// `%t`
    ThreadId,
    /// `%P`
    ProcessId,
    /// `%n`
    LoggerName,
    /// `%L`
    ShortLevel,
    /// `%l`
    Level,
    /// `%v`
    Payload,
    /// `%+`
    FullLayout,
    /// `%s`
    SourceFile,
    /// `%#`
    SourceLine,
    /// `%@`
    SourceLocation,
    /// `%^`
    ColorStart,
    /// `%$`
    ColorEnd,
}

impl Flag {
    pub fn from_char(c: char) -> Option<Self> {
        let flag = match c {
            'Y' => Flag::Year,
            'y' => Flag::ShortYear,
            'm' => Flag::Month,
            'd' => Flag::Day,
            'H' => Flag::Hour,
            'I' => Flag::Hour12,
            'M' => Flag::Minute,
            'S' => Flag::Second,
            'e' => Flag::Millis,
            'f' => Flag::Micros,
            'F' => Flag::Nanos,
            'p' => Flag::AmPm,
            'a' => Flag::ShortWeekday,
            'A' => Flag::Weekday,
            'b' => Flag::ShortMonthName,
            'B' => Flag::MonthName,
            'T' => Flag::Time,
            'D' => Flag::Date,
            'z' => Flag::UtcOffset,
            'E' => Flag::Epoch,
            't' => Flag::ThreadId,
            'P' => Flag::ProcessId,
            'n' => Flag::LoggerName,
            'L' => Flag::ShortLevel,
            'l' => Flag::Level,
            'v' => Flag::Payload,
            '+' => Flag::FullLayout,
            's' => Flag::SourceFile,
            '#' => Flag::SourceLine,
            '@' => Flag::SourceLocation,
            '^' => Flag::ColorStart,
            '$' => Flag::ColorEnd,
            _ => return None,
        };
        Some(flag)
    }
}

/// One compiled element of a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternItem {
    Literal(String),
    Flag(Flag),
}

const SHORT_WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];
const SHORT_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[cfg(windows)]
const DEFAULT_EOL: &str = "\r\n";
#[cfg(not(windows))]
const DEFAULT_EOL: &str = "\n";

/// Formatter compiled from a `%`-flag pattern
///
/// # Example
///
/// ```
/// use sinklog::core::{FormattedRecord, Formatter, LogLevel, LogRecord, PatternFormatter};
/// use std::sync::Arc;
///
/// let formatter = PatternFormatter::new("[%n] [%l] %v");
/// let record = LogRecord::new(Arc::from("app"), LogLevel::Info, "ready".to_string());
///
/// let mut out = FormattedRecord::new();
/// formatter.format(&record, &mut out);
/// assert_eq!(out.as_str().trim_end(), "[app] [info] ready");
/// ```
#[derive(Debug, Clone)]
pub struct PatternFormatter {
    pattern: String,
    eol: String,
    items: Vec<PatternItem>,
}

impl PatternFormatter {
    /// `%+`: `[%Y-%m-%d %H:%M:%S.%e] [%n] [%l] %v`
    pub const DEFAULT_PATTERN: &'static str = "%+";

    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            eol: DEFAULT_EOL.to_string(),
            items: Self::compile(pattern),
        }
    }

    /// Replace the line terminator appended after every record
    #[must_use]
    pub fn with_eol(mut self, eol: impl Into<String>) -> Self {
        self.eol = eol.into();
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn items(&self) -> &[PatternItem] {
        &self.items
    }

    /// Scan `pattern` once into literal runs and flags
    pub fn compile(pattern: &str) -> Vec<PatternItem> {
        let mut items = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            match chars.next() {
                Some('%') => literal.push('%'),
                Some(flag_char) => match Flag::from_char(flag_char) {
                    Some(flag) => {
                        if !literal.is_empty() {
                            items.push(PatternItem::Literal(std::mem::take(&mut literal)));
                        }
                        items.push(PatternItem::Flag(flag));
                    }
                    None => {
                        literal.push('%');
                        literal.push(flag_char);
                    }
                },
                None => literal.push('%'),
            }
        }

        if !literal.is_empty() {
            items.push(PatternItem::Literal(literal));
        }
        items
    }

    fn render_flag(flag: Flag, record: &LogRecord, dest: &mut FormattedRecord) {
        let t = &record.time;
        // Writes into a String never fail
        let _ = match flag {
            Flag::Year => write!(dest, "{:04}", t.year()),
            Flag::ShortYear => write!(dest, "{:02}", t.year().rem_euclid(100)),
            Flag::Month => write!(dest, "{:02}", t.month()),
            Flag::Day => write!(dest, "{:02}", t.day()),
            Flag::Hour => write!(dest, "{:02}", t.hour()),
            Flag::Hour12 => write!(dest, "{:02}", t.hour12().1),
            Flag::Minute => write!(dest, "{:02}", t.minute()),
            Flag::Second => write!(dest, "{:02}", t.second()),
            Flag::Millis => write!(dest, "{:03}", t.timestamp_subsec_millis() % 1_000),
            Flag::Micros => write!(dest, "{:06}", t.timestamp_subsec_micros() % 1_000_000),
            Flag::Nanos => write!(dest, "{:09}", t.timestamp_subsec_nanos() % 1_000_000_000),
            Flag::AmPm => dest.write_str(if t.hour12().0 { "PM" } else { "AM" }),
            Flag::ShortWeekday => {
                dest.write_str(SHORT_WEEKDAYS[t.weekday().num_days_from_sunday() as usize])
            }
            Flag::Weekday => dest.write_str(WEEKDAYS[t.weekday().num_days_from_sunday() as usize]),
            Flag::ShortMonthName => dest.write_str(SHORT_MONTHS[t.month0() as usize]),
            Flag::MonthName => dest.write_str(MONTHS[t.month0() as usize]),
            Flag::Time => write!(dest, "{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second()),
            Flag::Date => write!(
                dest,
                "{:02}/{:02}/{:02}",
                t.month(),
                t.day(),
                t.year().rem_euclid(100)
            ),
            Flag::UtcOffset => {
                let offset = t.offset().local_minus_utc();
                let sign = if offset < 0 { '-' } else { '+' };
                let minutes = offset.abs() / 60;
                write!(dest, "{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
            }
            Flag::Epoch => write!(dest, "{}", t.timestamp()),
            Flag::ThreadId => write!(dest, "{}", record.thread_id),
            Flag::ProcessId => write!(dest, "{}", std::process::id()),
            Flag::LoggerName => dest.write_str(&record.logger_name),
            Flag::ShortLevel => dest.write_str(record.level.short_str()),
            Flag::Level => dest.write_str(record.level.as_str()),
            Flag::Payload => dest.write_str(&record.payload),
            Flag::FullLayout => Self::render_full(record, dest),
            Flag::SourceFile => match record.source {
                Some(source) => dest.write_str(source.file),
                None => Ok(()),
            },
            Flag::SourceLine => match record.source {
                Some(source) => write!(dest, "{}", source.line),
                None => Ok(()),
            },
            Flag::SourceLocation => match record.source {
                Some(source) => write!(dest, "{}:{}", source.file, source.line),
                None => Ok(()),
            },
            Flag::ColorStart => {
                dest.begin_color();
                Ok(())
            }
            Flag::ColorEnd => {
                dest.end_color();
                Ok(())
            }
        };
    }

    fn render_full(record: &LogRecord, dest: &mut FormattedRecord) -> fmt::Result {
        let t = &record.time;
        write!(
            dest,
            "[{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
            t.year(),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second(),
            t.timestamp_subsec_millis() % 1_000
        )?;
        if !record.logger_name.is_empty() {
            write!(dest, "[{}] ", record.logger_name)?;
        }
        dest.write_str("[")?;
        dest.begin_color();
        dest.write_str(record.level.as_str())?;
        dest.end_color();
        dest.write_str("] ")?;
        dest.write_str(&record.payload)
    }
}

impl Default for PatternFormatter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATTERN)
    }
}

impl Formatter for PatternFormatter {
    fn format(&self, record: &LogRecord, dest: &mut FormattedRecord) {
        for item in &self.items {
            match item {
                PatternItem::Literal(text) => dest.push_str(text),
                PatternItem::Flag(flag) => Self::render_flag(*flag, record, dest),
            }
        }
        dest.push_str(&self.eol);
    }
}

/// A fresh `%+` formatter, the default for every sink
pub fn default_formatter() -> SharedFormatter {
    Arc::new(PatternFormatter::default())
}
