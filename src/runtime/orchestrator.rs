//! # Orchestrator
//!
//! Starts one [`TargetReconciler`] per configured target, in file order, and
//! waits for all of them.
//!
//! Startup is fail-fast: the first target that cannot start stops the
//! startup of every target after it. Targets that already started keep
//! running; their failure is reported once they have all stopped.

use crate::cli::RunArgs;
use crate::config::{ControllerConfig, ObjectRef, PipeConfig, TargetConfig};
use crate::controller::reconciler::{ReconcilerError, RunningTarget, TargetReconciler};
use crate::controller::server::ServerState;
use crate::runtime::initialization::start_observability;
use crate::runtime::shutdown::{
    create_shutdown_channel, shutdown_requested, ShutdownRx, ShutdownTx,
};
use crate::store::{ControlPlane, KubeControlPlane};
use anyhow::{Context, Result};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
#[error("error starting target {output}: {source}")]
pub struct StartupFailure {
    pub output: ObjectRef,
    #[source]
    pub source: ReconcilerError,
}

/// Targets started so far, and why startup stopped early (if it did)
#[derive(Debug)]
pub struct Startup {
    pub running: Vec<RunningTarget>,
    pub failure: Option<StartupFailure>,
}

impl Startup {
    /// Wait for every started target, then report a startup failure if there was one
    pub async fn wait(self) -> Result<(), StartupFailure> {
        if !self.running.is_empty() {
            if self.failure.is_some() {
                warn!(
                    running = self.running.len(),
                    "Startup aborted; targets already started keep running"
                );
            }
            futures::future::join_all(self.running.into_iter().map(RunningTarget::wait)).await;
        }
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Start every target in order, stopping at the first failure
pub async fn spawn_targets(
    targets: Vec<TargetConfig>,
    store: &Arc<dyn ControlPlane>,
    event_capacity: usize,
    shutdown: &ShutdownRx,
) -> Startup {
    let mut running = Vec::with_capacity(targets.len());

    for target in targets {
        let output = target.output_ref();
        let reconciler = TargetReconciler::new(target, Arc::clone(store), event_capacity);
        match reconciler.start(shutdown).await {
            Ok(target) => {
                info!(output = %output, "Target started");
                running.push(target);
            }
            Err(source) => {
                error!(output = %output, error = %source, "Error starting target");
                return Startup {
                    running,
                    failure: Some(StartupFailure { output, source }),
                };
            }
        }
    }

    Startup {
        running,
        failure: None,
    }
}

/// The `run` command: load targets, connect, start everything and wait
pub async fn run(args: RunArgs, settings: ControllerConfig) -> Result<()> {
    let pipe = PipeConfig::load(&args.config_file).context("Error parsing config file")?;
    let client = args.client().await?;
    let server_state = start_observability(&settings).await?;

    let store: Arc<dyn ControlPlane> =
        Arc::new(KubeControlPlane::new(client, settings.watch_window_secs));
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let signal_handler = spawn_signal_handler(shutdown_tx.clone(), Arc::clone(&server_state));

    if pipe.targets.is_empty() {
        warn!("Config file lists no targets, nothing to do");
    }
    info!(targets = pipe.targets.len(), "Starting targets");
    let startup = spawn_targets(
        pipe.targets,
        &store,
        settings.event_channel_capacity,
        &shutdown_rx,
    )
    .await;
    mark_started(&server_state, &shutdown_rx);

    let result = startup.wait().await;
    signal_handler.abort();
    drop(shutdown_tx);

    result?;
    info!("All targets stopped");
    Ok(())
}

/// Report ready once startup has finished, unless shutdown already began
///
/// The signal handler sends shutdown before marking not ready, so checking
/// again after marking ready leaves the probe failing in every ordering.
fn mark_started(server_state: &ServerState, shutdown: &ShutdownRx) {
    server_state.mark_ready();
    if shutdown_requested(shutdown) {
        info!("Shutdown requested during startup, staying not ready");
        server_state.mark_not_ready();
    }
}

fn spawn_signal_handler(shutdown: ShutdownTx, server_state: Arc<ServerState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        if shutdown.shutdown().is_err() {
            debug!("No running targets to stop");
        }
        server_state.mark_not_ready();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler, only SIGINT stops the controller: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
