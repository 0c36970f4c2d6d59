//! # Runtime
//!
//! - `initialization`: rustls, tracing, metrics and probe server setup
//! - `orchestrator`: starts every target and waits for them
//! - `shutdown`: the process-wide shutdown signal

pub mod initialization;
pub mod orchestrator;
pub mod shutdown;
