//! # Command Line
//!
//! ```bash
//! # In a pod: the service account is picked up automatically
//! kube-secret-pipe run --config-file /etc/kube-secret-pipe/config.yaml
//!
//! # Outside the cluster
//! kube-secret-pipe run -c config.yaml --in-cluster-creds=false --kubeconfig-creds ~/.kube/config
//! ```

use crate::constants::SERVICE_ACCOUNT_DIR;
use clap::{ArgAction, Parser, Subcommand};
use kube::config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Client, Config};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Renders Kubernetes Secrets from ConfigMap templates and keeps them in sync
#[derive(Debug, Parser)]
#[command(name = "kube-secret-pipe", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the controller for every target in the config file
    Run(RunArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// The YAML config file listing the targets
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config_file: PathBuf,

    /// Use the pod service account to connect to the cluster
    /// (defaults to true when running inside Kubernetes)
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value_t = has_service_account(),
        value_name = "BOOL"
    )]
    pub in_cluster_creds: bool,

    /// Path to a kubeconfig file to use to connect to the cluster
    #[arg(long, value_name = "FILE")]
    pub kubeconfig_creds: Option<PathBuf>,
}

/// Where cluster credentials come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    InCluster,
    Kubeconfig(PathBuf),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("only one of `--in-cluster-creds, --kubeconfig-creds` can be specified at a time")]
    ConflictingCredentials,
    #[error("you must specify one credentials flag (`--in-cluster-creds` or `--kubeconfig-creds`)")]
    MissingCredentials,
    #[error("error reading Kubernetes cluster credentials: {0}")]
    InCluster(#[from] InClusterError),
    #[error("error reading Kubernetes config file '{}': {source}", path.display())]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },
    #[error("error creating Kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

impl RunArgs {
    /// Exactly one credential source must be selected
    pub fn credential_source(&self) -> Result<CredentialSource, CliError> {
        match (self.in_cluster_creds, &self.kubeconfig_creds) {
            (true, Some(_)) => Err(CliError::ConflictingCredentials),
            (true, None) => Ok(CredentialSource::InCluster),
            (false, Some(path)) => Ok(CredentialSource::Kubeconfig(path.clone())),
            (false, None) => Err(CliError::MissingCredentials),
        }
    }

    /// Build a Kubernetes client from the selected credential source
    pub async fn client(&self) -> Result<Client, CliError> {
        let config = match self.credential_source()? {
            CredentialSource::InCluster => {
                info!("Using in-cluster service account credentials");
                Config::incluster()?
            }
            CredentialSource::Kubeconfig(path) => {
                info!(path = %path.display(), "Using kubeconfig credentials");
                load_kubeconfig(&path).await?
            }
        };
        Ok(Client::try_from(config)?)
    }
}

async fn load_kubeconfig(path: &Path) -> Result<Config, CliError> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|source| CliError::Kubeconfig {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|source| CliError::Kubeconfig {
            path: path.to_path_buf(),
            source,
        })
}

fn has_service_account() -> bool {
    Path::new(SERVICE_ACCOUNT_DIR).exists()
}
