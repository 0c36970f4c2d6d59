//! Shared fixtures for integration tests

use std::io::Write;
use tempfile::NamedTempFile;

/// Target configuration used across tests: one target, one secret alias
pub const SINGLE_TARGET_YAML: &str = r"
targets:
  - inputConfigMap:
      namespace: apps
      name: app-config-template
    secrets:
      db:
        namespace: apps
        name: postgres-credentials
        keys: [user, password]
    targetNamespace: apps
    targetName: app-config
";

/// Write `contents` to a temporary YAML file that lives as long as the handle
pub fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create temp config file");
    file.write_all(contents.as_bytes())
        .expect("write temp config file");
    file
}
