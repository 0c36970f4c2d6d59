//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config::ControllerConfig`]).

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default bound of each per-target change event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 16;

/// Default length of a single watch request window (seconds)
pub const DEFAULT_WATCH_WINDOW_SECS: u32 = 290;

/// kube-rs rejects watch timeouts of 295s and above
pub const MAX_WATCH_WINDOW_SECS: u32 = 294;

/// Directory mounted into pods that run with a service account
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Tracing filter used when neither `RUST_LOG` nor `LOG_LEVEL` select one
pub const DEFAULT_LOG_FILTER: &str = "kube_secret_pipe=info";
