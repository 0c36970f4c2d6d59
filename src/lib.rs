//! kube-secret-pipe library
//!
//! Renders Kubernetes Secrets from ConfigMap templates and source Secrets,
//! and re-publishes them whenever an input changes.

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod runtime;
pub mod store;
