//! # Watch Multiplexer
//!
//! One producer task per watched input object. Producers translate raw watch
//! events into [`ChangeEvent`]s and forward them to the target's update loop:
//! the template source into its own channel, every secret source into one
//! shared channel.
//!
//! Only `Added` and `Modified` snapshots are forwarded. Deletions do not clear
//! the last known content. A watch that ends is not reopened; its source stays
//! silent until the process restarts.

use crate::config::ObjectRef;
use crate::observability::metrics;
use crate::runtime::shutdown::ShutdownRx;
use crate::store::{ControlPlane, StoreError, WatchStream};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::WatchEvent;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A new snapshot of one input
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Template(ConfigMap),
    Secret { source: ObjectRef, secret: Secret },
}

#[derive(Debug, Error)]
#[error("failed to watch {kind} {object}: {source}")]
pub struct WatchError {
    pub kind: &'static str,
    pub object: ObjectRef,
    #[source]
    pub source: StoreError,
}

/// Receiving ends of one target's watches
#[derive(Debug)]
pub struct TargetWatches {
    pub template: mpsc::Receiver<ChangeEvent>,
    pub secrets: mpsc::Receiver<ChangeEvent>,
    pub producers: Vec<JoinHandle<()>>,
}

impl TargetWatches {
    /// Open a watch on the template source and on every secret source
    ///
    /// Each watch starts after the resource version the object was read at.
    /// Either every watch is opened and its producer running, or an error is
    /// returned and nothing was spawned.
    pub async fn open(
        store: &dyn ControlPlane,
        template: &ObjectRef,
        template_version: &str,
        secrets: &BTreeMap<ObjectRef, String>,
        capacity: usize,
        shutdown: &ShutdownRx,
    ) -> Result<Self, WatchError> {
        let template_stream =
            store
                .watch_config_map(template, template_version)
                .await
                .map_err(|source| WatchError {
                    kind: "ConfigMap",
                    object: template.clone(),
                    source,
                })?;

        let mut secret_streams = Vec::with_capacity(secrets.len());
        for (object, version) in secrets {
            let stream = store
                .watch_secret(object, version)
                .await
                .map_err(|source| WatchError {
                    kind: "Secret",
                    object: object.clone(),
                    source,
                })?;
            secret_streams.push((object.clone(), stream));
        }

        let capacity = capacity.max(1);
        let (template_tx, template_rx) = mpsc::channel(capacity);
        let (secrets_tx, secrets_rx) = mpsc::channel(capacity);

        let mut producers = Vec::with_capacity(secret_streams.len() + 1);
        producers.push(tokio::spawn(forward(
            "ConfigMap",
            template.clone(),
            template_stream,
            template_tx,
            shutdown.clone(),
            |_, config_map| ChangeEvent::Template(config_map),
        )));
        for (object, stream) in secret_streams {
            producers.push(tokio::spawn(forward(
                "Secret",
                object,
                stream,
                secrets_tx.clone(),
                shutdown.clone(),
                |source, secret| ChangeEvent::Secret {
                    source: source.clone(),
                    secret,
                },
            )));
        }
        // the secret channel closes once every secret producer has finished
        drop(secrets_tx);

        Ok(Self {
            template: template_rx,
            secrets: secrets_rx,
            producers,
        })
    }
}

async fn forward<K>(
    kind: &'static str,
    object: ObjectRef,
    mut stream: WatchStream<K>,
    tx: mpsc::Sender<ChangeEvent>,
    mut shutdown: ShutdownRx,
    into_event: fn(&ObjectRef, K) -> ChangeEvent,
) where
    K: std::fmt::Debug + Send + 'static,
{
    debug!(kind, object = %object, "Watch started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!(kind, object = %object, "Shutdown requested, stopping watch");
                return;
            }
            next = stream.next() => match next {
                Some(Ok(WatchEvent::Added(snapshot) | WatchEvent::Modified(snapshot))) => {
                    if tx.send(into_event(&object, snapshot)).await.is_err() {
                        debug!(kind, object = %object, "Update loop gone, stopping watch");
                        return;
                    }
                }
                Some(Ok(WatchEvent::Deleted(_))) => {
                    info!(kind, object = %object, "Input was deleted; keeping last known content");
                }
                Some(Ok(WatchEvent::Bookmark(_))) => {}
                Some(Ok(WatchEvent::Error(status))) => {
                    warn!(kind, object = %object, ?status, "Watch returned an error event");
                }
                Some(Err(e)) => {
                    warn!(kind, object = %object, error = %e, "Watch failed");
                }
                None => {
                    metrics::increment_watch_streams_closed(kind);
                    warn!(
                        kind,
                        object = %object,
                        "Watch closed; changes to this input are ignored until restart"
                    );
                    return;
                }
            }
        }
    }
}
