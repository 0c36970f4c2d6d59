//! # Controller Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_LOG_FILTER, DEFAULT_METRICS_PORT,
    DEFAULT_WATCH_WINDOW_SECS, MAX_WATCH_WINDOW_SECS,
};

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// The target list itself lives in the YAML file passed to `run --config-file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    /// Only used when `RUST_LOG` is not set
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Serve `/metrics`, `/healthz` and `/readyz`
    pub enable_metrics: bool,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Bound of each per-target change event channel
    pub event_channel_capacity: usize,
    /// Length of one kube watch request window (seconds)
    /// A window that elapses cleanly is reopened from the last seen resourceVersion
    pub watch_window_secs: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            enable_metrics: true,
            metrics_port: DEFAULT_METRICS_PORT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            watch_window_secs: DEFAULT_WATCH_WINDOW_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", true),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            event_channel_capacity: env_var_or_default(
                "EVENT_CHANNEL_CAPACITY",
                DEFAULT_EVENT_CHANNEL_CAPACITY,
            )
            .max(1),
            watch_window_secs: env_var_or_default("WATCH_WINDOW_SECS", DEFAULT_WATCH_WINDOW_SECS)
                .clamp(1, MAX_WATCH_WINDOW_SECS),
        }
    }

    /// Whether logs should be emitted as JSON lines
    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Tracing filter directive derived from `log_level`
    #[must_use]
    pub fn log_filter(&self) -> String {
        let level = self.log_level.trim();
        if level.is_empty() {
            return DEFAULT_LOG_FILTER.to_string();
        }
        format!("kube_secret_pipe={}", level.to_lowercase())
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.metrics_port, 5000);
        assert_eq!(config.event_channel_capacity, 16);
        assert_eq!(config.watch_window_secs, 290);
        assert!(config.enable_metrics);
        assert!(!config.json_logs());
    }

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        for value in ["true", "TRUE", "1", "yes", "On"] {
            assert!(parse_bool(value), "'{value}' should be true");
        }
        for value in ["false", "0", "no", "off", ""] {
            assert!(!parse_bool(value), "'{value}' should be false");
        }
    }

    #[test]
    fn test_log_filter_lowercases_level() {
        let config = ControllerConfig {
            log_level: "DEBUG".to_string(),
            ..ControllerConfig::default()
        };
        assert_eq!(config.log_filter(), "kube_secret_pipe=debug");
    }

    #[test]
    fn test_empty_log_level_uses_default_filter() {
        let config = ControllerConfig {
            log_level: " ".to_string(),
            ..ControllerConfig::default()
        };
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_json_logs_is_case_insensitive() {
        let config = ControllerConfig {
            log_format: "JSON".to_string(),
            ..ControllerConfig::default()
        };
        assert!(config.json_logs());
    }
}
