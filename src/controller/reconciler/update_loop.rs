//! # Update Loop
//!
//! Single consumer of a target's change events. Each event is applied and
//! fully reconciled before the next one is received, so publishes for one
//! target never overlap or reorder.

use super::state::TargetState;
use crate::config::TargetConfig;
use crate::controller::watch::ChangeEvent;
use crate::observability::metrics;
use crate::runtime::shutdown::ShutdownRx;
use crate::store::ControlPlane;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(crate) async fn run_update_loop(
    store: Arc<dyn ControlPlane>,
    target: Arc<TargetConfig>,
    mut state: TargetState,
    mut template_events: mpsc::Receiver<ChangeEvent>,
    mut secret_events: mpsc::Receiver<ChangeEvent>,
    mut shutdown: ShutdownRx,
) {
    metrics::increment_targets_running();

    let mut template_open = true;
    let mut secrets_open = true;
    while template_open || secrets_open {
        let next = tokio::select! {
            _ = shutdown.changed() => {
                info!("Shutdown requested, stopping update loop");
                break;
            }
            event = template_events.recv(), if template_open => {
                template_open = event.is_some();
                event
            }
            event = secret_events.recv(), if secrets_open => {
                secrets_open = event.is_some();
                event
            }
        };

        let Some(event) = next else {
            continue;
        };
        match &event {
            ChangeEvent::Template(_) => debug!("Template source changed"),
            ChangeEvent::Secret { source, .. } => debug!(source = %source, "Secret source changed"),
        }
        state.apply(event);
        state.reconcile(store.as_ref(), &target).await;
    }

    if !template_open && !secrets_open {
        warn!("Every input watch has closed, stopping update loop");
    }
    metrics::decrement_targets_running();
}
