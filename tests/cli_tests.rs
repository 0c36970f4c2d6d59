//! # Command Line Tests
//!
//! Argument parsing and credential-source selection for `run`.

use clap::Parser;
use kube_secret_pipe::cli::{Cli, CliError, Commands, CredentialSource, RunArgs};
use std::path::PathBuf;

fn parse(args: &[&str]) -> Result<RunArgs, clap::Error> {
    let argv = std::iter::once("kube-secret-pipe").chain(args.iter().copied());
    Cli::try_parse_from(argv).map(|cli| match cli.command {
        Commands::Run(run) => run,
    })
}

#[test]
fn test_long_config_file_flag() {
    let args = parse(&[
        "run",
        "--config-file",
        "/etc/pipe/config.yaml",
        "--in-cluster-creds",
    ])
    .unwrap();
    assert_eq!(args.config_file, PathBuf::from("/etc/pipe/config.yaml"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    assert!(parse(&["serve", "-c", "config.yaml"]).is_err());
}

#[test]
fn test_kubeconfig_only() {
    let args = parse(&[
        "run",
        "-c",
        "config.yaml",
        "--in-cluster-creds=false",
        "--kubeconfig-creds",
        "/home/me/.kube/config",
    ])
    .unwrap();
    assert_eq!(
        args.credential_source().unwrap(),
        CredentialSource::Kubeconfig(PathBuf::from("/home/me/.kube/config"))
    );
}

#[test]
fn test_both_sources_is_an_error() {
    let args = parse(&[
        "run",
        "-c",
        "config.yaml",
        "--in-cluster-creds",
        "--kubeconfig-creds",
        "/home/me/.kube/config",
    ])
    .unwrap();
    assert!(matches!(
        args.credential_source(),
        Err(CliError::ConflictingCredentials)
    ));
}

#[test]
fn test_no_source_is_an_error() {
    let args = parse(&["run", "-c", "config.yaml", "--in-cluster-creds=false"]).unwrap();
    let err = args.credential_source().unwrap_err();
    assert!(matches!(err, CliError::MissingCredentials));
    assert!(err.to_string().contains("credentials flag"));
}
