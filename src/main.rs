//! # kube-secret-pipe
//!
//! A Kubernetes controller that keeps derived Secrets in sync with their inputs.
//!
//! For every configured target it:
//!
//! 1. **Reads the inputs** - one template ConfigMap and any number of source Secrets
//! 2. **Renders the output** - each ConfigMap `data` entry is a Go-style template
//!    over the source Secrets; `binaryData` is copied as is
//! 3. **Publishes on change** - the output Secret is written only when its
//!    content digest changes
//! 4. **Watches every input** - and repeats steps 2-3 on each change

use anyhow::Result;
use clap::Parser;
use kube_secret_pipe::cli::{Cli, Commands};
use kube_secret_pipe::config::ControllerConfig;
use kube_secret_pipe::runtime::{initialization, orchestrator};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = ControllerConfig::from_env();

    initialization::install_crypto_provider();
    initialization::init_tracing(&settings);

    match cli.command {
        Commands::Run(args) => {
            if let Err(e) = orchestrator::run(args, settings).await {
                error!("{:#}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
