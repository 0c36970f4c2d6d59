//! # Target Configuration
//!
//! The YAML file that lists every target the controller keeps in sync:
//!
//! ```yaml
//! targets:
//!   - inputConfigMap: {namespace: apps, name: app-config-template}
//!     secrets:
//!       db: {namespace: apps, name: postgres-credentials, keys: [user, password]}
//!     targetNamespace: apps
//!     targetName: app-config
//! ```
//!
//! The per-secret `keys` list is accepted but advisory: every key of a
//! referenced secret is exposed to templates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Namespaced reference to a single control-plane object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ObjectRef {
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A secret a target reads its template data from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    pub namespace: String,
    pub name: String,
    /// Key allow-list. Accepted for forward compatibility, not enforced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl SecretSource {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.namespace, &self.name)
    }
}

/// One reconciliation unit: template source, secret sources, output
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    /// ConfigMap whose `data` entries are templates and whose `binaryData` is copied verbatim
    pub input_config_map: ObjectRef,
    /// Template alias -> secret source
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretSource>,
    pub target_namespace: String,
    pub target_name: String,
}

impl TargetConfig {
    /// Reference to the Secret this target produces
    pub fn output_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.target_namespace, &self.target_name)
    }

    /// Distinct secret objects this target reads; several aliases may share one
    pub fn secret_sources(&self) -> BTreeSet<ObjectRef> {
        self.secrets.values().map(SecretSource::object_ref).collect()
    }

    /// Aliases that configure a key allow-list (which is not enforced)
    pub fn aliases_with_key_lists(&self) -> Vec<&str> {
        self.secrets
            .iter()
            .filter(|(_, source)| !source.keys.is_empty())
            .map(|(alias, _)| alias.as_str())
            .collect()
    }
}

/// Root of the target configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipeConfig {
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing YAML data for config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("target #{index}: {field} must not be empty")]
    EmptyField { index: usize, field: String },
    #[error("target #{index}: secret alias '{alias}' is not a valid template identifier")]
    InvalidAlias { index: usize, alias: String },
    #[error("target #{index}: output Secret {output} is already produced by target #{first}")]
    DuplicateOutput {
        index: usize,
        first: usize,
        output: ObjectRef,
    },
}

impl PipeConfig {
    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check references are complete, aliases are addressable from templates,
    /// and no two targets write the same output Secret
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut outputs: HashMap<ObjectRef, usize> = HashMap::new();

        for (index, target) in self.targets.iter().enumerate() {
            let mut required = vec![
                ("inputConfigMap.namespace".to_string(), &target.input_config_map.namespace),
                ("inputConfigMap.name".to_string(), &target.input_config_map.name),
                ("targetNamespace".to_string(), &target.target_namespace),
                ("targetName".to_string(), &target.target_name),
            ];
            for (alias, source) in &target.secrets {
                required.push((format!("secrets.{alias}.namespace"), &source.namespace));
                required.push((format!("secrets.{alias}.name"), &source.name));
            }
            if let Some((field, _)) = required.into_iter().find(|(_, value)| value.trim().is_empty())
            {
                return Err(ConfigError::EmptyField { index, field });
            }

            if let Some(alias) = target.secrets.keys().find(|alias| !is_template_identifier(alias)) {
                return Err(ConfigError::InvalidAlias {
                    index,
                    alias: alias.clone(),
                });
            }

            let output = target.output_ref();
            if let Some(&first) = outputs.get(&output) {
                return Err(ConfigError::DuplicateOutput {
                    index,
                    first,
                    output,
                });
            }
            outputs.insert(output, index);
        }

        Ok(())
    }
}

/// `.alias` field access only works for identifier-shaped names
fn is_template_identifier(alias: &str) -> bool {
    let mut chars = alias.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
