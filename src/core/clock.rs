//! Wall-clock source for time-based rotation

use chrono::{DateTime, Local};

/// Source of "now" for sinks that rotate on a schedule
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The system wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
