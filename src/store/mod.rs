//! # Control Plane
//!
//! The capability contract the reconciliation engine needs from the cluster:
//! read, create and update named objects, and open a watch on one named object.
//!
//! `cluster::KubeControlPlane` implements it against the Kubernetes API.

pub mod cluster;
#[cfg(test)]
pub(crate) mod fake;

use crate::config::ObjectRef;
use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::WatchEvent;
use kube::Resource;
use thiserror::Error;

pub use cluster::KubeControlPlane;

/// Raw change notifications for one watched object, in provider order
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>, StoreError>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {object} already exists")]
    AlreadyExists { kind: &'static str, object: ObjectRef },
    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        kind: &'static str,
        field: &'static str,
    },
    #[error("Kubernetes API request failed: {0}")]
    Api(#[from] kube::Error),
    #[error("control plane unavailable: {0}")]
    Unavailable(String),
}

/// Object access the reconciler depends on
///
/// Reads return `Ok(None)` for objects that do not exist; every other failure
/// is an error.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get_config_map(&self, object: &ObjectRef) -> Result<Option<ConfigMap>, StoreError>;

    async fn get_secret(&self, object: &ObjectRef) -> Result<Option<Secret>, StoreError>;

    /// Create a Secret; fails with [`StoreError::AlreadyExists`] if the name is taken
    async fn create_secret(&self, secret: &Secret) -> Result<(), StoreError>;

    /// Replace a Secret's content unconditionally
    async fn update_secret(&self, secret: &Secret) -> Result<(), StoreError>;

    /// Open a watch on a single ConfigMap, starting after `resource_version`
    async fn watch_config_map(
        &self,
        object: &ObjectRef,
        resource_version: &str,
    ) -> Result<WatchStream<ConfigMap>, StoreError>;

    /// Open a watch on a single Secret, starting after `resource_version`
    async fn watch_secret(
        &self,
        object: &ObjectRef,
        resource_version: &str,
    ) -> Result<WatchStream<Secret>, StoreError>;
}

/// Version to resume a watch from; empty when the object never came from the API server
pub(crate) fn resource_version<K: Resource>(object: &K) -> &str {
    object.meta().resource_version.as_deref().unwrap_or_default()
}

/// Namespaced reference of a Secret about to be written
pub(crate) fn secret_ref(secret: &Secret) -> Result<ObjectRef, StoreError> {
    let namespace = secret
        .metadata
        .namespace
        .as_deref()
        .ok_or(StoreError::MissingMetadata {
            kind: "Secret",
            field: "namespace",
        })?;
    let name = secret
        .metadata
        .name
        .as_deref()
        .ok_or(StoreError::MissingMetadata {
            kind: "Secret",
            field: "name",
        })?;
    Ok(ObjectRef::new(namespace, name))
}
