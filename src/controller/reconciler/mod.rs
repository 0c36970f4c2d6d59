//! # Reconciler
//!
//! Per-target reconciliation engine.
//!
//! ## Reconciliation Flow
//!
//! 1. `start`: read the output, the template source and every secret source,
//!    publish the first rendered version, open one watch per input
//! 2. Update loop: for every change event, replace the snapshot, re-render,
//!    and publish only when the output digest moved
//!
//! Publishing is Create while the output is not known to exist and Update
//! afterwards. Failed writes are never retried on their own; the next change
//! event recomputes and tries again.

mod start;
pub(crate) mod state;
pub mod types;
mod update_loop;


pub use types::{Operation, PassOutcome, ReconcilerError, RunningTarget, TargetReconciler};
