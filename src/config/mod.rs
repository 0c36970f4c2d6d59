//! # Configuration
//!
//! - `controller`: process settings from environment variables
//! - `targets`: the YAML list of targets to keep in sync

pub mod controller;
pub mod targets;

pub use controller::ControllerConfig;
pub use targets::{ConfigError, ObjectRef, PipeConfig, SecretSource, TargetConfig};
