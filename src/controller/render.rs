//! # Template Rendering
//!
//! Turns a template ConfigMap into the `data` of the output Secret:
//!
//! - `binaryData` entries are copied verbatim
//! - every `data` entry is a Go-style text template, executed against the
//!   secret sources of the target (`{{ .alias.key }}`)
//!
//! A key whose template fails to parse or execute is left out of the output;
//! the remaining keys still render. Referencing a secret key or alias that
//! does not exist is an execution failure, so no placeholder text ever
//! reaches the output.

use crate::config::{ObjectRef, TargetConfig};
use gtmpl::{Context, Template, Value};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderFailure {
    #[error("failed to parse template '{template}' for key '{key}': {message}")]
    Parse {
        template: String,
        key: String,
        message: String,
    },
    #[error("failed to execute template '{template}' for key '{key}': {message}")]
    Execute {
        template: String,
        key: String,
        message: String,
    },
}

impl RenderFailure {
    pub fn key(&self) -> &str {
        match self {
            RenderFailure::Parse { key, .. } | RenderFailure::Execute { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    pub data: BTreeMap<String, ByteString>,
    pub failures: Vec<RenderFailure>,
}

/// Values templates can reach: alias -> secret key -> decoded value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    aliases: BTreeMap<String, BTreeMap<String, String>>,
}

impl TemplateContext {
    /// Build the context for a target from the latest secret snapshots
    ///
    /// Every key of every referenced secret is exposed, whatever its `keys`
    /// list says. An alias whose secret has no snapshot maps to an empty map.
    pub fn for_target(target: &TargetConfig, secrets: &BTreeMap<ObjectRef, Secret>) -> Self {
        let aliases = target
            .secrets
            .iter()
            .map(|(alias, source)| {
                let values = secrets
                    .get(&source.object_ref())
                    .map(secret_values)
                    .unwrap_or_default();
                (alias.clone(), values)
            })
            .collect();
        Self { aliases }
    }

    pub fn insert(&mut self, alias: impl Into<String>, values: BTreeMap<String, String>) {
        self.aliases.insert(alias.into(), values);
    }

    // Objects rather than maps: gtmpl fails on a missing object field but
    // prints `<no value>` for a missing map key.
    fn to_gtmpl(&self) -> Context {
        let root: HashMap<String, Value> = self
            .aliases
            .iter()
            .map(|(alias, values)| {
                let entries: HashMap<String, Value> = values
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect();
                (alias.clone(), Value::Object(entries))
            })
            .collect();
        Context::from(Value::Object(root))
    }
}

/// Secret data decoded as (lossy) UTF-8 text
fn secret_values(secret: &Secret) -> BTreeMap<String, String> {
    secret
        .data
        .iter()
        .flatten()
        .map(|(key, value)| (key.clone(), String::from_utf8_lossy(&value.0).into_owned()))
        .collect()
}

/// Render every entry of `source`; `template_name` identifies the template in failures
pub fn render(template_name: &str, source: &ConfigMap, context: &TemplateContext) -> RenderOutcome {
    let mut outcome = RenderOutcome::default();

    if let Some(binary) = &source.binary_data {
        outcome
            .data
            .extend(binary.iter().map(|(key, value)| (key.clone(), value.clone())));
    }

    let Some(templates) = &source.data else {
        return outcome;
    };

    let gtmpl_context = context.to_gtmpl();
    for (key, text) in templates {
        match render_one(template_name, key, text, &gtmpl_context) {
            Ok(rendered) => {
                outcome
                    .data
                    .insert(key.clone(), ByteString(rendered.into_bytes()));
            }
            Err(failure) => outcome.failures.push(failure),
        }
    }

    outcome
}

fn render_one(
    template_name: &str,
    key: &str,
    text: &str,
    context: &Context,
) -> Result<String, RenderFailure> {
    // gtmpl never returns on some unterminated actions, so they are rejected up front
    if has_unclosed_action(text) {
        return Err(RenderFailure::Parse {
            template: template_name.to_string(),
            key: key.to_string(),
            message: "unclosed action".to_string(),
        });
    }

    let mut tmpl = Template::default();
    tmpl.parse(text).map_err(|e| RenderFailure::Parse {
        template: template_name.to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })?;
    tmpl.render(context).map_err(|e| RenderFailure::Execute {
        template: template_name.to_string(),
        key: key.to_string(),
        message: format!("{e:?}"),
    })
}

/// True when the last `{{` in `text` is never followed by `}}`
fn has_unclosed_action(text: &str) -> bool {
    text.rfind("{{")
        .is_some_and(|open| !text[open + 2..].contains("}}"))
}
