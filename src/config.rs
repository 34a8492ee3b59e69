//! Level and pattern configuration from `name=value` lists
//!
//! Grammar: `TOKEN(,TOKEN)*` with `TOKEN := NAME "=" VALUE | VALUE`. A bare
//! value belongs to the wildcard name `*`, which supplies the default for
//! every logger without its own entry.
//!
//! ```
//! use sinklog::config;
//! use sinklog::LogLevel;
//!
//! let specs = config::merge_specs("warn,net=debug", "net=[%n] %v");
//! assert_eq!(specs["*"].level, LogLevel::Warn);
//! assert_eq!(specs["net"].level, LogLevel::Debug);
//! assert_eq!(specs["net"].pattern, "[%n] %v");
//! assert_eq!(specs["*"].pattern, "%+");
//! ```

use crate::core::{LogLevel, PatternFormatter, Registry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Environment variable holding the level list
pub const LEVEL_ENV: &str = "SINKLOG_LEVEL";
/// Environment variable holding the pattern list
pub const PATTERN_ENV: &str = "SINKLOG_PATTERN";
/// Name that applies to every logger
pub const WILDCARD: &str = "*";

const SPACES: &[char] = &[' ', '\n', '\r', '\t'];

/// Level and pattern for one logger name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSpec {
    pub level: LogLevel,
    pub pattern: String,
}

/// Split `a=1,b=2,3` into `{a: 1, b: 2, *: 3}`
///
/// Keys and values are trimmed, empty tokens skipped, and the first
/// occurrence of a key wins.
pub fn parse_key_values(input: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    for token in input.split(',') {
        if token.is_empty() {
            continue;
        }
        let (key, value) = match token.split_once('=') {
            Some((key, value)) => (key.trim_matches(SPACES), value.trim_matches(SPACES)),
            None => ("", token.trim_matches(SPACES)),
        };
        let key = if key.is_empty() { WILDCARD } else { key };
        pairs
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }
    pairs
}

/// Merge a level list and a pattern list into one spec per name
///
/// A name missing one half takes it from the `*` entry, else from the
/// defaults `info` and `%+`. Unknown level names read as `info`.
pub fn merge_specs(levels: &str, patterns: &str) -> HashMap<String, LoggerSpec> {
    let levels: HashMap<String, String> = parse_key_values(levels)
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name, value.to_lowercase()))
        .collect();
    let patterns: HashMap<String, String> = parse_key_values(patterns)
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();

    let default_level = levels
        .get(WILDCARD)
        .map(|name| LogLevel::from_name_or_info(name))
        .unwrap_or_default();
    let default_pattern = patterns
        .get(WILDCARD)
        .cloned()
        .unwrap_or_else(|| PatternFormatter::DEFAULT_PATTERN.to_string());

    let mut specs = HashMap::new();
    for name in levels.keys().chain(patterns.keys()) {
        if specs.contains_key(name) {
            continue;
        }
        let level = levels
            .get(name)
            .map(|value| LogLevel::from_name_or_info(value))
            .unwrap_or(default_level);
        let pattern = patterns
            .get(name)
            .cloned()
            .unwrap_or_else(|| default_pattern.clone());
        specs.insert(name.clone(), LoggerSpec { level, pattern });
    }
    specs
}

/// Read and merge [`LEVEL_ENV`] and [`PATTERN_ENV`]; unset variables are empty
pub fn from_env() -> HashMap<String, LoggerSpec> {
    let levels = env::var(LEVEL_ENV).unwrap_or_default();
    let patterns = env::var(PATTERN_ENV).unwrap_or_default();
    merge_specs(&levels, &patterns)
}

/// Apply the environment configuration to `registry`
///
/// Only loggers already registered are touched, so call this after
/// creating them.
pub fn load_env(registry: &Registry) {
    registry.apply_specs(&from_env());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_and_named_levels() {
        let specs = merge_specs("off,logger1=debug,logger2=info", "");

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[WILDCARD].level, LogLevel::Off);
        assert_eq!(specs["logger1"].level, LogLevel::Debug);
        assert_eq!(specs["logger2"].level, LogLevel::Info);
        for spec in specs.values() {
            assert_eq!(spec.pattern, "%+");
        }
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let pairs = parse_key_values(" key = val ");
        assert_eq!(pairs.get("key").map(String::as_str), Some("val"));

        let pairs = parse_key_values("\tdebug\n");
        assert_eq!(pairs.get(WILDCARD).map(String::as_str), Some("debug"));
    }

    #[test]
    fn test_first_occurrence_wins_and_empty_tokens_skipped() {
        let pairs = parse_key_values("a=1,,a=2,b=3,");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs["a"], "1");
        assert_eq!(pairs["b"], "3");
    }

    #[test]
    fn test_levels_are_case_insensitive_with_info_fallback() {
        let specs = merge_specs("net=DEBUG,db=Warning,x=loud", "");
        assert_eq!(specs["net"].level, LogLevel::Debug);
        assert_eq!(specs["db"].level, LogLevel::Warn);
        assert_eq!(specs["x"].level, LogLevel::Info);
    }

    #[test]
    fn test_wildcard_fills_missing_halves() {
        let specs = merge_specs("error,net=trace", "[%l] %v,db=%v");

        assert_eq!(specs["net"].pattern, "[%l] %v");
        assert_eq!(specs["db"].level, LogLevel::Error);
        assert_eq!(specs["db"].pattern, "%v");
        assert_eq!(specs[WILDCARD].pattern, "[%l] %v");
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_specs("", "").is_empty());
        // Blank tokens parse as an empty wildcard value, which merging ignores
        assert_eq!(parse_key_values(" , ,")[WILDCARD], "");
        assert!(merge_specs(" , ,", "").is_empty());
    }
}
