//! In-memory [`ControlPlane`] for reconciler tests.
//!
//! Objects live in maps; watches are channels the test drives explicitly with
//! `emit_*` and `close_*`. Every write is recorded and can be awaited.

use super::{secret_ref, ControlPlane, StoreError, WatchStream};
use crate::config::ObjectRef;
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::WatchEvent;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

type EventTx<K> = mpsc::UnboundedSender<Result<WatchEvent<K>, StoreError>>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Write {
    Create(Secret),
    Update(Secret),
}

impl Write {
    pub(crate) fn secret(&self) -> &Secret {
        match self {
            Write::Create(secret) | Write::Update(secret) => secret,
        }
    }

    /// Rendered value of one output key as UTF-8
    pub(crate) fn value(&self, key: &str) -> Option<String> {
        self.secret()
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
    }
}

#[derive(Debug, Default)]
struct FakeState {
    config_maps: HashMap<ObjectRef, ConfigMap>,
    secrets: HashMap<ObjectRef, Secret>,
    unreachable: Vec<ObjectRef>,
    reads: Vec<ObjectRef>,
    writes: Vec<Write>,
    failing_writes: usize,
    watches_opened: Vec<(ObjectRef, String)>,
    config_map_watchers: HashMap<ObjectRef, Vec<EventTx<ConfigMap>>>,
    secret_watchers: HashMap<ObjectRef, Vec<EventTx<Secret>>>,
}

#[derive(Debug)]
pub(crate) struct FakeControlPlane {
    state: Mutex<FakeState>,
    write_count: watch::Sender<usize>,
}

impl Default for FakeControlPlane {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            write_count: watch::Sender::new(0),
        }
    }
}

impl FakeControlPlane {
    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }

    pub(crate) fn insert_config_map(&self, object: &ObjectRef, config_map: ConfigMap) {
        self.state().config_maps.insert(object.clone(), config_map);
    }

    pub(crate) fn insert_secret(&self, object: &ObjectRef, secret: Secret) {
        self.state().secrets.insert(object.clone(), secret);
    }

    /// Reads of this object fail with a transport error
    pub(crate) fn make_unreachable(&self, object: &ObjectRef) {
        self.state().unreachable.push(object.clone());
    }

    /// The next `count` create/update calls fail
    pub(crate) fn fail_next_writes(&self, count: usize) {
        self.state().failing_writes = count;
    }

    pub(crate) fn reads(&self) -> Vec<ObjectRef> {
        self.state().reads.clone()
    }

    pub(crate) fn writes(&self) -> Vec<Write> {
        self.state().writes.clone()
    }

    pub(crate) fn watches_opened(&self) -> Vec<ObjectRef> {
        self.watch_versions()
            .into_iter()
            .map(|(object, _)| object)
            .collect()
    }

    /// Watched objects with the resource version each watch started from
    pub(crate) fn watch_versions(&self) -> Vec<(ObjectRef, String)> {
        self.state().watches_opened.clone()
    }

    /// Wait until at least `count` writes were attempted (failed ones included)
    pub(crate) async fn wait_for_writes(&self, count: usize) -> Vec<Write> {
        let mut rx = self.write_count.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|n| *n >= count))
            .await
            .expect("timed out waiting for writes")
            .expect("write counter closed");
        self.writes()
    }

    /// Store the new ConfigMap snapshot and notify open watches
    pub(crate) fn emit_config_map(&self, object: &ObjectRef, event: WatchEvent<ConfigMap>) {
        let mut state = self.state();
        if let WatchEvent::Added(cm) | WatchEvent::Modified(cm) = &event {
            state.config_maps.insert(object.clone(), cm.clone());
        }
        if let Some(watchers) = state.config_map_watchers.get(object) {
            for tx in watchers {
                let _ = tx.send(Ok(event.clone()));
            }
        }
    }

    /// Store the new Secret snapshot and notify open watches
    pub(crate) fn emit_secret(&self, object: &ObjectRef, event: WatchEvent<Secret>) {
        let mut state = self.state();
        if let WatchEvent::Added(secret) | WatchEvent::Modified(secret) = &event {
            state.secrets.insert(object.clone(), secret.clone());
        }
        if let Some(watchers) = state.secret_watchers.get(object) {
            for tx in watchers {
                let _ = tx.send(Ok(event.clone()));
            }
        }
    }

    /// End every open watch on this Secret, as a provider-side close would
    pub(crate) fn close_secret_watch(&self, object: &ObjectRef) {
        self.state().secret_watchers.remove(object);
    }

    pub(crate) fn close_config_map_watch(&self, object: &ObjectRef) {
        self.state().config_map_watchers.remove(object);
    }

    fn record_write(&self, object: ObjectRef, write: Write) -> Result<(), StoreError> {
        let result = {
            let mut state = self.state();
            let result = if state.failing_writes > 0 {
                state.failing_writes -= 1;
                Err(StoreError::Unavailable("injected write failure".to_string()))
            } else {
                state.secrets.insert(object, write.secret().clone());
                Ok(())
            };
            state.writes.push(write);
            result
        };
        self.write_count.send_modify(|n| *n += 1);
        result
    }

    fn check_reachable(state: &FakeState, object: &ObjectRef) -> Result<(), StoreError> {
        if state.unreachable.contains(object) {
            return Err(StoreError::Unavailable(format!("{object} unreachable")));
        }
        Ok(())
    }
}

fn channel_stream<K: Send + 'static>() -> (EventTx<K>, WatchStream<K>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
    .boxed();
    (tx, stream)
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn get_config_map(&self, object: &ObjectRef) -> Result<Option<ConfigMap>, StoreError> {
        let mut state = self.state();
        state.reads.push(object.clone());
        Self::check_reachable(&state, object)?;
        Ok(state.config_maps.get(object).cloned())
    }

    async fn get_secret(&self, object: &ObjectRef) -> Result<Option<Secret>, StoreError> {
        let mut state = self.state();
        state.reads.push(object.clone());
        Self::check_reachable(&state, object)?;
        Ok(state.secrets.get(object).cloned())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        let object = secret_ref(secret)?;
        if self.state().secrets.contains_key(&object) {
            return Err(StoreError::AlreadyExists {
                kind: "Secret",
                object,
            });
        }
        self.record_write(object, Write::Create(secret.clone()))
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        let object = secret_ref(secret)?;
        self.record_write(object, Write::Update(secret.clone()))
    }

    async fn watch_config_map(
        &self,
        object: &ObjectRef,
        resource_version: &str,
    ) -> Result<WatchStream<ConfigMap>, StoreError> {
        let (tx, stream) = channel_stream();
        let mut state = self.state();
        state
            .watches_opened
            .push((object.clone(), resource_version.to_string()));
        state
            .config_map_watchers
            .entry(object.clone())
            .or_default()
            .push(tx);
        Ok(stream)
    }

    async fn watch_secret(
        &self,
        object: &ObjectRef,
        resource_version: &str,
    ) -> Result<WatchStream<Secret>, StoreError> {
        let (tx, stream) = channel_stream();
        let mut state = self.state();
        state
            .watches_opened
            .push((object.clone(), resource_version.to_string()));
        state
            .secret_watchers
            .entry(object.clone())
            .or_default()
            .push(tx);
        Ok(stream)
    }
}
