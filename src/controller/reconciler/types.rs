//! # Types
//!
//! Core types for the reconciler.

use crate::config::{ObjectRef, TargetConfig};
use crate::controller::watch::WatchError;
use crate::store::{ControlPlane, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("template source ConfigMap {object} not found")]
    TemplateSourceMissing { object: ObjectRef },
    #[error("failed to read template source ConfigMap {object}: {source}")]
    TemplateSource {
        object: ObjectRef,
        #[source]
        source: StoreError,
    },
    #[error("secret source {object} (alias '{alias}') not found")]
    SecretSourceMissing { alias: String, object: ObjectRef },
    #[error("failed to read secret source {object} (alias '{alias}'): {source}")]
    SecretSource {
        alias: String,
        object: ObjectRef,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Write issued against the output Secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
        }
    }
}

/// Result of one render -> digest -> conditional publish pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Output already matches; nothing written
    Unchanged,
    Created,
    Updated,
    /// The write failed; the last published digest is kept
    Failed(Operation),
}

/// Owns one target: initial reconciliation, then the live update loop
#[derive(Clone)]
pub struct TargetReconciler {
    pub(crate) target: Arc<TargetConfig>,
    pub(crate) store: Arc<dyn ControlPlane>,
    pub(crate) event_capacity: usize,
}

impl std::fmt::Debug for TargetReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetReconciler")
            .field("output", &self.target.output_ref())
            .field("event_capacity", &self.event_capacity)
            .finish_non_exhaustive()
    }
}

impl TargetReconciler {
    pub fn new(target: TargetConfig, store: Arc<dyn ControlPlane>, event_capacity: usize) -> Self {
        Self {
            target: Arc::new(target),
            store,
            event_capacity,
        }
    }
}

/// Handle to a started target
#[derive(Debug)]
pub struct RunningTarget {
    pub(crate) output: ObjectRef,
    pub(crate) update_loop: JoinHandle<()>,
    pub(crate) producers: Vec<JoinHandle<()>>,
}

impl RunningTarget {
    pub fn output(&self) -> &ObjectRef {
        &self.output
    }

    /// Wait for the update loop and every watch producer to finish
    pub async fn wait(self) {
        if let Err(e) = self.update_loop.await {
            tracing::error!(output = %self.output, error = %e, "Update loop task failed");
        }
        for producer in self.producers {
            if let Err(e) = producer.await {
                tracing::error!(output = %self.output, error = %e, "Watch task failed");
            }
        }
    }
}
