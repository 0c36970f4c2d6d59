//! # Kubernetes Control Plane
//!
//! [`ControlPlane`] backed by a `kube::Client`.
//!
//! Watches are single-object (`metadata.name` field selector). A kube watch
//! request lives for at most one window; when a window elapses cleanly the
//! watch is reopened from the last seen `resourceVersion`, so consumers see one
//! continuous sequence. Any error from the API server (including `410 Gone`)
//! ends the sequence for good.

use super::{secret_ref, ControlPlane, StoreError, WatchStream};
use crate::config::ObjectRef;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, PostParams, WatchEvent, WatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
    watch_window_secs: u32,
}

impl Debug for KubeControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeControlPlane")
            .field("watch_window_secs", &self.watch_window_secs)
            .finish_non_exhaustive()
    }
}

impl KubeControlPlane {
    pub fn new(client: Client, watch_window_secs: u32) -> Self {
        Self {
            client,
            watch_window_secs,
        }
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn get_config_map(&self, object: &ObjectRef) -> Result<Option<ConfigMap>, StoreError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &object.namespace);
        Ok(api.get_opt(&object.name).await?)
    }

    async fn get_secret(&self, object: &ObjectRef) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &object.namespace);
        Ok(api.get_opt(&object.name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        let object = secret_ref(secret)?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &object.namespace);
        match api.create(&PostParams::default(), secret).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                Err(StoreError::AlreadyExists {
                    kind: "Secret",
                    object,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        let object = secret_ref(secret)?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &object.namespace);
        api.replace(&object.name, &PostParams::default(), secret)
            .await?;
        Ok(())
    }

    async fn watch_config_map(
        &self,
        object: &ObjectRef,
        resource_version: &str,
    ) -> Result<WatchStream<ConfigMap>, StoreError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &object.namespace);
        open_watch(api, &object.name, resource_version, self.watch_window_secs).await
    }

    async fn watch_secret(
        &self,
        object: &ObjectRef,
        resource_version: &str,
    ) -> Result<WatchStream<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &object.namespace);
        open_watch(api, &object.name, resource_version, self.watch_window_secs).await
    }
}

/// State carried between watch windows
struct WatchWindow<K> {
    api: Api<K>,
    params: WatchParams,
    resource_version: String,
    events: Option<BoxStream<'static, kube::Result<WatchEvent<K>>>>,
}

async fn open_watch<K>(
    api: Api<K>,
    name: &str,
    resource_version: &str,
    window_secs: u32,
) -> Result<WatchStream<K>, StoreError>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let params = WatchParams::default()
        .fields(&format!("metadata.name={name}"))
        .timeout(window_secs);
    // Continue from the version that was read, so nothing between the read
    // and the watch is missed. An empty version starts from a consistent read
    // of the current object.
    let events = api.watch(&params, resource_version).await?.boxed();

    let window = WatchWindow {
        api,
        params,
        resource_version: resource_version.to_string(),
        events: Some(events),
    };
    Ok(futures::stream::unfold(window, next_event).boxed())
}

async fn next_event<K>(
    mut window: WatchWindow<K>,
) -> Option<(Result<WatchEvent<K>, StoreError>, WatchWindow<K>)>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    loop {
        let next = window.events.as_mut()?.next().await;
        match next {
            Some(Ok(event)) => {
                if matches!(event, WatchEvent::Error(_)) {
                    window.events = None;
                } else if let Some(version) = resource_version_of(&event) {
                    window.resource_version = version;
                }
                return Some((Ok(event), window));
            }
            Some(Err(err)) => {
                window.events = None;
                return Some((Err(err.into()), window));
            }
            None => {
                debug!(
                    resource_version = window.resource_version.as_str(),
                    "Watch window elapsed, reopening"
                );
                match window
                    .api
                    .watch(&window.params, &window.resource_version)
                    .await
                {
                    Ok(events) => window.events = Some(events.boxed()),
                    Err(err) => {
                        window.events = None;
                        return Some((Err(err.into()), window));
                    }
                }
            }
        }
    }
}

fn resource_version_of<K: Resource>(event: &WatchEvent<K>) -> Option<String> {
    match event {
        WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => {
            obj.resource_version()
        }
        WatchEvent::Bookmark(bookmark) => Some(bookmark.metadata.resource_version.clone()),
        WatchEvent::Error(_) => None,
    }
}
