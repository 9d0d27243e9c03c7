//! Runtime configuration for `pcloud`.
//!
//! Loaded from environment variables with sensible defaults. Unparseable
//! values fall back to the default rather than failing the run.

use std::time::Duration;

/// Tuning knobs that are not part of the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Log filter used when `RUST_LOG` is not set (e.g. `info`, `debug`).
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
    /// Bound on every vault round trip.
    pub deadline: Duration,
    /// Retries for transient failures of HTTP reads and deletes. Zero
    /// disables retrying.
    pub max_retries: u32,
    /// Timeout of a single HTTP request.
    pub request_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_json: false,
            deadline: pcloud_core::DEFAULT_DEADLINE,
            max_retries: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `PCLOUD_LOG_LEVEL`: log filter (default: `info`)
    /// - `PCLOUD_LOG_FORMAT`: `json` for JSON lines, anything else for text
    /// - `PCLOUD_DEADLINE_SECS`: per round trip deadline (default: `30`)
    /// - `PCLOUD_MAX_RETRIES`: HTTP retries (default: `3`)
    /// - `PCLOUD_REQUEST_TIMEOUT_SECS`: HTTP request timeout (default: `10`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `get`.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let secs = |name: &str| {
            get(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
        };

        Self {
            log_level: get("PCLOUD_LOG_LEVEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.log_level),
            log_json: get("PCLOUD_LOG_FORMAT")
                .is_some_and(|v| v.eq_ignore_ascii_case("json")),
            deadline: secs("PCLOUD_DEADLINE_SECS").unwrap_or(defaults.deadline),
            max_retries: get("PCLOUD_MAX_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_retries),
            request_timeout: secs("PCLOUD_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> RuntimeConfig {
        let env: HashMap<&str, &str> = pairs.iter().copied().collect();
        RuntimeConfig::from_lookup(|name| env.get(name).map(|v| (*v).to_owned()))
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(load(&[]), RuntimeConfig::default());
        assert_eq!(load(&[]).deadline, Duration::from_secs(30));
    }

    #[test]
    fn values_are_read() {
        let cfg = load(&[
            ("PCLOUD_LOG_LEVEL", "debug"),
            ("PCLOUD_LOG_FORMAT", "JSON"),
            ("PCLOUD_DEADLINE_SECS", "5"),
            ("PCLOUD_MAX_RETRIES", "0"),
            ("PCLOUD_REQUEST_TIMEOUT_SECS", "2"),
        ]);
        assert_eq!(cfg.log_level, "debug");
        assert!(cfg.log_json);
        assert_eq!(cfg.deadline, Duration::from_secs(5));
        assert_eq!(cfg.max_retries, 0);
        assert_eq!(cfg.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let cfg = load(&[
            ("PCLOUD_DEADLINE_SECS", "soon"),
            ("PCLOUD_MAX_RETRIES", "-1"),
            ("PCLOUD_REQUEST_TIMEOUT_SECS", "0"),
            ("PCLOUD_LOG_LEVEL", "  "),
        ]);
        assert_eq!(cfg, RuntimeConfig::default());
    }
}
