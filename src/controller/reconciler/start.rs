//! # Start
//!
//! Initial reconciliation of one target. Everything here runs before the
//! target's update loop exists:
//!
//! 1. Read the current output Secret (absent or unreadable means "no prior output")
//! 2. Read the template source and every secret source; each is required
//! 3. Render and publish the first version
//! 4. Open every watch from the version each input was read at, then hand
//!    the state to the update loop

use super::state::TargetState;
use super::types::{ReconcilerError, RunningTarget, TargetReconciler};
use super::update_loop::run_update_loop;
use crate::config::ObjectRef;
use crate::controller::digest::secret_digest;
use crate::controller::watch::TargetWatches;
use crate::runtime::shutdown::ShutdownRx;
use crate::store::resource_version;
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

impl TargetReconciler {
    /// Run the initial reconciliation and spawn the update loop
    ///
    /// Fails without opening any watch when an input cannot be read, and
    /// without spawning the loop when a watch cannot be opened. A failed first
    /// publish is logged and does not fail the start.
    pub async fn start(self, shutdown: &ShutdownRx) -> Result<RunningTarget, ReconcilerError> {
        let output = self.target.output_ref();
        let span = info_span!(
            "target",
            target.namespace = output.namespace.as_str(),
            target.name = output.name.as_str()
        );

        let (state, watches) = self
            .initialize(&output, shutdown)
            .instrument(span.clone())
            .await?;

        let update_loop = tokio::spawn(
            run_update_loop(
                Arc::clone(&self.store),
                Arc::clone(&self.target),
                state,
                watches.template,
                watches.secrets,
                shutdown.clone(),
            )
            .instrument(span),
        );

        Ok(RunningTarget {
            output,
            update_loop,
            producers: watches.producers,
        })
    }

    async fn initialize(
        &self,
        output: &ObjectRef,
        shutdown: &ShutdownRx,
    ) -> Result<(TargetState, TargetWatches), ReconcilerError> {
        info!(input = %self.target.input_config_map, "Starting target");

        let existing = match self.store.get_secret(output).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "Could not read output Secret, treating it as absent");
                None
            }
        };

        let template_ref = &self.target.input_config_map;
        let template = match self.store.get_config_map(template_ref).await {
            Ok(Some(template)) => template,
            Ok(None) => {
                return Err(ReconcilerError::TemplateSourceMissing {
                    object: template_ref.clone(),
                })
            }
            Err(source) => {
                return Err(ReconcilerError::TemplateSource {
                    object: template_ref.clone(),
                    source,
                })
            }
        };

        let mut secrets: BTreeMap<ObjectRef, Secret> = BTreeMap::new();
        for (alias, source) in &self.target.secrets {
            let object = source.object_ref();
            if secrets.contains_key(&object) {
                continue;
            }
            match self.store.get_secret(&object).await {
                Ok(Some(secret)) => {
                    secrets.insert(object, secret);
                }
                Ok(None) => {
                    return Err(ReconcilerError::SecretSourceMissing {
                        alias: alias.clone(),
                        object,
                    })
                }
                Err(source) => {
                    return Err(ReconcilerError::SecretSource {
                        alias: alias.clone(),
                        object,
                        source,
                    })
                }
            }
        }

        let advisory = self.target.aliases_with_key_lists();
        if !advisory.is_empty() {
            warn!(
                aliases = ?advisory,
                "Secret key lists are not enforced; every key of these secrets is available to templates"
            );
        }

        let mut state = TargetState {
            template,
            secrets,
            published: secret_digest(existing.as_ref()),
            output_exists: existing.is_some(),
        };
        state.reconcile(self.store.as_ref(), &self.target).await;

        let secret_versions: BTreeMap<ObjectRef, String> = self
            .target
            .secret_sources()
            .into_iter()
            .map(|object| {
                let version = state
                    .secrets
                    .get(&object)
                    .map(resource_version)
                    .unwrap_or_default()
                    .to_string();
                (object, version)
            })
            .collect();
        let watches = TargetWatches::open(
            self.store.as_ref(),
            template_ref,
            resource_version(&state.template),
            &secret_versions,
            self.event_capacity,
            shutdown,
        )
        .await?;
        info!(
            watches = watches.producers.len(),
            "Initial reconciliation complete, watching inputs"
        );

        Ok((state, watches))
    }
}
