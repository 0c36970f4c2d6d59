//! # Controller
//!
//! Core controller modules for kube-secret-pipe.
//!
//! - `digest`: content fingerprint used for change detection
//! - `reconciler`: per-target initial reconciliation and update loop
//! - `render`: template rendering of the output Secret
//! - `server`: HTTP server for metrics and health checks
//! - `watch`: per-input watches fanned into a target's event channels

pub mod digest;
pub mod reconciler;
pub mod render;
pub mod server;
pub mod watch;
