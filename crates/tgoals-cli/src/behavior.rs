//! Behavior files: a declarative starting state for the stores.
//!
//! ```toml
//! [values]
//! ball_distance = 1.5
//! target = [1.0, -0.5]
//!
//! [literals]
//! near = false
//!
//! [fluents]
//! ball_seen = false
//!
//! [actions]
//! kick = "Kick"
//!
//! [[templates]]
//! name = "walk"
//! skill = "Walk"
//! selection = [0]
//!
//! [[aliases]]
//! store = "literal"
//! alias = "close"
//! target = "near"
//! ```
//!
//! Arrays of two or three scalars load as tuples, other arrays as lists.
//! Computed items are registered from Rust.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tgoals_registry::{ActionTemplate, Registries};
use tgoals_types::{GoalError, ParamValue, StoreKind};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AliasEntry {
    pub store: StoreKind,
    pub alias: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Behavior {
    #[serde(default)]
    pub values: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub literals: BTreeMap<String, bool>,
    #[serde(default)]
    pub fluents: BTreeMap<String, bool>,
    /// Action name → skill.
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
    #[serde(default)]
    pub templates: Vec<ActionTemplate>,
    #[serde(default)]
    pub aliases: Vec<AliasEntry>,
}

impl Behavior {
    pub fn from_toml(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| format!("Failed to parse behavior file: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read behavior file at {}: {}", path.display(), e))?;
        Self::from_toml(&raw)
    }

    /// Write everything into `registries`. Returns how many entries were
    /// applied.
    pub fn apply(&self, registries: &mut Registries) -> Result<usize, GoalError> {
        let mut applied = 0;
        for (name, raw) in &self.values {
            registries.set(StoreKind::Value, name, to_param(name, raw)?, None)?;
            applied += 1;
        }
        for (name, value) in &self.literals {
            registries.set(StoreKind::Literal, name, *value, None)?;
            applied += 1;
        }
        for (name, value) in &self.fluents {
            registries.set(StoreKind::Fluent, name, *value, None)?;
            applied += 1;
        }
        for (name, skill) in &self.actions {
            registries.register_action(name, skill, Vec::new(), None)?;
            applied += 1;
        }
        for template in &self.templates {
            registries.register_action_template(template.clone())?;
            applied += 1;
        }
        for entry in &self.aliases {
            registries.register_alias(entry.store, &entry.alias, &entry.target)?;
            applied += 1;
        }
        info!(applied, "behavior applied");
        Ok(applied)
    }
}

fn to_param(name: &str, raw: &toml::Value) -> Result<ParamValue, GoalError> {
    match raw {
        toml::Value::Boolean(b) => Ok(ParamValue::Bool(*b)),
        toml::Value::Integer(i) => Ok(ParamValue::Int(*i)),
        toml::Value::Float(f) => Ok(ParamValue::Float(*f)),
        toml::Value::String(s) => Ok(ParamValue::Str(s.clone())),
        toml::Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| to_param(name, item))
                .collect::<Result<Vec<_>, _>>()?;
            if (2..=3).contains(&items.len()) && items.iter().all(ParamValue::is_scalar) {
                ParamValue::tuple(items)
            } else {
                ParamValue::list(items)
            }
        }
        other => Err(GoalError::InvalidValue(format!(
            "'{name}': {} values are not supported",
            other.type_str()
        ))),
    }
}
