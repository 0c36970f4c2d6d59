//! # Target State
//!
//! Latest input snapshots and the digest of the last successful publish.
//! Owned by exactly one task at a time, so it needs no locking.

use super::types::{Operation, PassOutcome};
use crate::config::{ObjectRef, TargetConfig};
use crate::controller::digest::{digest, Digest};
use crate::controller::render::{render, TemplateContext};
use crate::controller::watch::ChangeEvent;
use crate::observability::metrics;
use crate::store::{ControlPlane, StoreError};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub(crate) struct TargetState {
    pub(crate) template: ConfigMap,
    pub(crate) secrets: BTreeMap<ObjectRef, Secret>,
    pub(crate) published: Digest,
    pub(crate) output_exists: bool,
}

impl TargetState {
    /// Replace the snapshot the event carries
    pub(crate) fn apply(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Template(config_map) => self.template = config_map,
            ChangeEvent::Secret { source, secret } => {
                self.secrets.insert(source, secret);
            }
        }
    }

    /// Render the output Secret from the current snapshots
    pub(crate) fn compile(&self, target: &TargetConfig) -> (Secret, Digest) {
        let context = TemplateContext::for_target(target, &self.secrets);
        let outcome = render(&target.target_name, &self.template, &context);

        if !outcome.failures.is_empty() {
            metrics::increment_render_failures(outcome.failures.len());
            for failure in &outcome.failures {
                error!(key = failure.key(), error = %failure, "Template key dropped from output");
            }
        }

        let output_digest = digest(&outcome.data);
        let secret = Secret {
            metadata: ObjectMeta {
                namespace: Some(target.target_namespace.clone()),
                name: Some(target.target_name.clone()),
                ..ObjectMeta::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(outcome.data),
            ..Secret::default()
        };
        (secret, output_digest)
    }

    /// Render, compare against the last published digest and write if needed
    ///
    /// Write failures are logged and counted; the published digest only moves
    /// on success, so the next pass retries with fresh content.
    pub(crate) async fn reconcile(
        &mut self,
        store: &dyn ControlPlane,
        target: &TargetConfig,
    ) -> PassOutcome {
        metrics::increment_reconciliations();
        let (secret, output_digest) = self.compile(target);

        let operation = if !self.output_exists {
            Operation::Create
        } else if output_digest != self.published {
            Operation::Update
        } else {
            debug!(digest = %output_digest, "Output unchanged, skipping publish");
            return PassOutcome::Unchanged;
        };

        match publish(store, &secret, operation).await {
            Ok(applied) => {
                metrics::increment_publishes(applied.as_str());
                info!(
                    operation = applied.as_str(),
                    digest = %output_digest,
                    "Published new version of output Secret"
                );
                self.published = output_digest;
                self.output_exists = true;
                match applied {
                    Operation::Create => PassOutcome::Created,
                    Operation::Update => PassOutcome::Updated,
                }
            }
            Err(e) => {
                metrics::increment_publish_errors(operation.as_str());
                error!(
                    operation = operation.as_str(),
                    error = %e,
                    "Failed to publish output Secret"
                );
                PassOutcome::Failed(operation)
            }
        }
    }
}

/// Issue the write; a create that loses to an existing object becomes an update
async fn publish(
    store: &dyn ControlPlane,
    secret: &Secret,
    operation: Operation,
) -> Result<Operation, StoreError> {
    match operation {
        Operation::Create => match store.create_secret(secret).await {
            Ok(()) => Ok(Operation::Create),
            Err(StoreError::AlreadyExists { object, .. }) => {
                warn!(output = %object, "Output Secret already exists, updating it instead");
                store.update_secret(secret).await?;
                Ok(Operation::Update)
            }
            Err(e) => Err(e),
        },
        Operation::Update => {
            store.update_secret(secret).await?;
            Ok(Operation::Update)
        }
    }
}
