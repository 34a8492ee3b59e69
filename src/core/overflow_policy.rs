//! Queue policies for the async thread pool
//!
//! `OverflowPolicy` decides what a producer does when the bounded queue is
//! full; `ShutdownPolicy` decides what happens to records still queued when
//! the pool is torn down.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What a producer does when the async queue is full
///
/// # Example
///
/// ```
/// use sinklog::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default: wait for room, never lose a record
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
///
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Wait until a worker frees a slot
    #[default]
    Block,

    /// Wait up to the timeout, then drop the new record
    BlockWithTimeout(Duration),

    /// Drop the new record immediately
    DropNewest,

    /// Evict the oldest queued record to make room for the new one
    DropOldest,
}

impl OverflowPolicy {
    /// Whether this policy may lose records
    pub fn is_lossy(&self) -> bool {
        !matches!(self, OverflowPolicy::Block)
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
        }
    }
}

/// What happens to queued records when the pool shuts down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShutdownPolicy {
    /// Deliver everything already queued before the workers exit
    #[default]
    Drain,

    /// Throw queued records away and count them
    Discard,
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownPolicy::Drain => write!(f, "Drain"),
            ShutdownPolicy::Discard => write!(f, "Discard"),
        }
    }
}

/// Called when records are lost to overflow
///
/// The argument is the total number of records lost so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
        assert_eq!(ShutdownPolicy::default(), ShutdownPolicy::Drain);
    }

    #[test]
    fn test_display() {
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "DropNewest");
        assert_eq!(OverflowPolicy::DropOldest.to_string(), "DropOldest");
        assert_eq!(OverflowPolicy::Block.to_string(), "Block");
        assert_eq!(
            OverflowPolicy::BlockWithTimeout(Duration::from_millis(100)).to_string(),
            "BlockWithTimeout(100ms)"
        );
        assert_eq!(ShutdownPolicy::Discard.to_string(), "Discard");
    }

    #[test]
    fn test_lossy() {
        assert!(!OverflowPolicy::Block.is_lossy());
        assert!(OverflowPolicy::DropOldest.is_lossy());
        assert!(OverflowPolicy::BlockWithTimeout(Duration::ZERO).is_lossy());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&OverflowPolicy::DropOldest).unwrap();
        assert_eq!(json, "\"DropOldest\"");
        let policy: ShutdownPolicy = serde_json::from_str("\"Discard\"").unwrap();
        assert_eq!(policy, ShutdownPolicy::Discard);
    }
}
