//! [`ActionStore`] – named robot actions, action templates, and the idle action.
//!
//! Every action is also registered in an inner [`ParameterStore`] as a
//! [`Constant`](crate::RegistryItem::Constant) holding its skill name, so
//! actions share name resolution, aliases and scope removal with the other
//! stores.
//!
//! | Concept | Meaning |
//! |---------|---------|
//! | [`Action`] | Concrete action: skill name plus ordered parameters |
//! | [`ActionTemplate`] | Recipe used by planners to mint actions from `<template> <arg>…` labels |
//! | idle action | `action_idle`, registered on construction with the configured idle skill |
//! | `check*` templates | Any template name starting with `check` mints an idle-skill action |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tgoals_types::{GoalError, ParamValue, Scope, StoreKind};
use tracing::debug;
use uuid::Uuid;

use crate::registries::Registries;
use crate::store::ParameterStore;

/// Canonical name of the action issued when nothing else qualifies.
pub const IDLE_ACTION: &str = "action_idle";

/// Template names starting with this prefix map to the idle skill.
pub const CHECK_TEMPLATE_PREFIX: &str = "check";

/// Where a labeled parameter takes its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    Value(ParamValue),
    /// Name of a registry item, resolved through every store at send time.
    Item(String),
}

/// One entry of an action's parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionParam {
    /// Unlabeled constant, rendered under its position.
    Constant(ParamValue),
    Labeled { label: String, source: ParamSource },
    /// Bare registry name; the name doubles as the label.
    Named(String),
}

impl ActionParam {
    pub fn labeled(label: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        ActionParam::Labeled {
            label: label.into(),
            source: ParamSource::Value(value.into()),
        }
    }

    pub fn reference(label: impl Into<String>, item: impl Into<String>) -> Self {
        ActionParam::Labeled {
            label: label.into(),
            source: ParamSource::Item(item.into()),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        ActionParam::Named(name.into())
    }

    /// Registry name this parameter depends on, if any.
    pub fn referenced_name(&self) -> Option<&str> {
        match self {
            ActionParam::Named(name)
            | ActionParam::Labeled {
                source: ParamSource::Item(name),
                ..
            } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    name: String,
    base_name: String,
    skill: String,
    parameters: Vec<ActionParam>,
    completed: bool,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template or registration name the action was created from.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn skill(&self) -> &str {
        &self.skill
    }

    pub fn parameters(&self) -> &[ActionParam] {
        &self.parameters
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn referenced_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().filter_map(ActionParam::referenced_name)
    }

    /// Render the parameter list as `label:value,type` joined by `/`.
    /// Tuple values expand into one `label_i:value,type` entry per element.
    pub fn render_parameters(&self, registries: &Registries) -> Result<String, GoalError> {
        let mut parts = Vec::new();
        for (position, param) in self.parameters.iter().enumerate() {
            let (label, value) = match param {
                ActionParam::Constant(value) => (position.to_string(), value.clone()),
                ActionParam::Labeled {
                    label,
                    source: ParamSource::Value(value),
                } => (label.clone(), value.clone()),
                ActionParam::Labeled {
                    label,
                    source: ParamSource::Item(item),
                } => (label.clone(), registries.value_of(item)?),
                ActionParam::Named(name) => (name.clone(), registries.value_of(name)?),
            };
            match &value {
                ParamValue::Tuple(items) => {
                    for (i, item) in items.iter().enumerate() {
                        parts.push(format!("{label}_{i}:{item},{}", item.type_name()));
                    }
                }
                other => parts.push(format!("{label}:{other},{}", other.type_name())),
            }
        }
        Ok(parts.join("/"))
    }
}

/// Picks one template argument by position, or names a registry item directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamSelector {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub name: String,
    pub skill: String,
    /// `None` mints actions without parameters.
    #[serde(default)]
    pub selection: Option<Vec<ParamSelector>>,
}

impl ActionTemplate {
    pub fn new(name: impl Into<String>, skill: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            skill: skill.into(),
            selection: None,
        }
    }

    pub fn with_selection(mut self, selection: Vec<ParamSelector>) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Build the parameter list for the planner arguments `args`.
    pub fn select(&self, args: &[String]) -> Result<Vec<ActionParam>, GoalError> {
        let Some(selection) = &self.selection else {
            return Ok(Vec::new());
        };
        selection
            .iter()
            .map(|selector| match selector {
                ParamSelector::Index(i) => args.get(*i).map(ActionParam::named).ok_or_else(|| {
                    GoalError::InvalidValue(format!(
                        "template '{}' selects argument {i} but only {} were given",
                        self.name,
                        args.len()
                    ))
                }),
                ParamSelector::Name(name) => Ok(ActionParam::named(name.clone())),
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ActionStore {
    store: ParameterStore,
    actions: BTreeMap<String, Action>,
    templates: BTreeMap<String, ActionTemplate>,
    idle_skill: String,
    idle_parameters: Vec<ActionParam>,
    pending: Vec<String>,
}

impl ActionStore {
    /// Create a store holding only the idle action.
    pub fn new(idle_skill: impl Into<String>, idle_parameters: Vec<ActionParam>) -> Self {
        let mut store = Self {
            store: ParameterStore::new(StoreKind::Action),
            actions: BTreeMap::new(),
            templates: BTreeMap::new(),
            idle_skill: idle_skill.into(),
            idle_parameters,
            pending: Vec::new(),
        };
        store.register_idle();
        store
    }

    fn register_idle(&mut self) {
        let skill = self.idle_skill.clone();
        let parameters = self.idle_parameters.clone();
        self.insert(IDLE_ACTION, &skill, parameters, None, None);
    }

    /// Underlying name store (skill constants, aliases, scope indices).
    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ParameterStore {
        &mut self.store
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        let canonical = self.store.resolve_name(name)?;
        self.actions.get(&canonical)
    }

    pub fn idle(&self) -> Option<&Action> {
        self.actions.get(IDLE_ACTION)
    }

    pub fn idle_skill(&self) -> &str {
        &self.idle_skill
    }

    pub fn is_idle(&self, action: &Action) -> bool {
        action.skill == self.idle_skill
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn template(&self, name: &str) -> Option<&ActionTemplate> {
        let key = name.to_lowercase();
        self.templates
            .get(&key)
            .or_else(|| self.templates.get(&key.replace('-', "_")))
    }

    pub fn templates(&self) -> impl Iterator<Item = &ActionTemplate> {
        self.templates.values()
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.store
            .resolve_name(name)
            .is_some_and(|c| self.pending.contains(&c))
    }

    // ────────────────────────────────────────────────────────────────────────
    // Mutation (driven by `Registries`, which runs the parameter checks)
    // ────────────────────────────────────────────────────────────────────────

    pub(crate) fn insert(
        &mut self,
        name: &str,
        skill: &str,
        parameters: Vec<ActionParam>,
        base_name: Option<&str>,
        scope: Option<&Scope>,
    ) -> String {
        let canonical = self
            .store
            .insert_constant(name, ParamValue::Str(skill.to_string()), scope);
        let base_name = base_name
            .map(str::to_lowercase)
            .unwrap_or_else(|| canonical.clone());
        debug!(action = %canonical, skill = %skill, "action registered");
        self.actions.insert(
            canonical.clone(),
            Action {
                name: canonical.clone(),
                base_name,
                skill: skill.to_string(),
                parameters,
                completed: false,
            },
        );
        canonical
    }

    pub(crate) fn add_template(&mut self, mut template: ActionTemplate) -> Result<(), GoalError> {
        template.name = template.name.to_lowercase();
        if self.templates.contains_key(&template.name) {
            return Err(GoalError::InvalidValue(format!(
                "action template '{}' is already registered",
                template.name
            )));
        }
        debug!(template = %template.name, skill = %template.skill, "action template registered");
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Mint a uniquely named action from `template` and the planner
    /// arguments `args`.
    pub(crate) fn instantiate(&mut self, template: &str, args: &[String]) -> Result<String, GoalError> {
        let key = template.to_lowercase();
        if key.starts_with(CHECK_TEMPLATE_PREFIX) {
            let skill = self.idle_skill.clone();
            return Ok(self.insert(&unique_name(&key), &skill, Vec::new(), Some(key.as_str()), None));
        }
        let template = self
            .template(&key)
            .cloned()
            .ok_or_else(|| GoalError::UnknownTemplate(template.to_string()))?;
        let parameters = template.select(args)?;
        Ok(self.insert(
            &unique_name(&template.name),
            &template.skill,
            parameters,
            Some(template.name.as_str()),
            None,
        ))
    }

    /// Copy `name` under a fresh unique name, optionally swapping its parameters.
    pub(crate) fn duplicate(
        &mut self,
        name: &str,
        parameters: Option<Vec<ActionParam>>,
    ) -> Result<String, GoalError> {
        let source = self
            .get(name)
            .cloned()
            .ok_or_else(|| GoalError::UnknownParameter(name.to_string()))?;
        let parameters = parameters.unwrap_or(source.parameters);
        Ok(self.insert(
            &unique_name(&source.base_name),
            &source.skill,
            parameters,
            Some(source.base_name.as_str()),
            None,
        ))
    }

    pub(crate) fn set_completed(&mut self, name: &str, completed: bool) -> Result<(), GoalError> {
        let canonical = self
            .store
            .resolve_name(name)
            .ok_or_else(|| GoalError::UnknownParameter(name.to_string()))?;
        let action = self
            .actions
            .get_mut(&canonical)
            .ok_or(GoalError::UnknownParameter(canonical))?;
        action.completed = completed;
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> Result<Action, GoalError> {
        let canonical = self
            .store
            .resolve_name(name)
            .ok_or_else(|| GoalError::UnknownParameter(name.to_string()))?;
        self.store.remove_canonical(&canonical);
        self.pending.retain(|p| *p != canonical);
        self.actions
            .remove(&canonical)
            .ok_or(GoalError::UnknownParameter(canonical))
    }

    pub(crate) fn remove_all_for_role(&mut self, role: &str) -> Vec<String> {
        let removed = self.store.remove_all_for_role(role);
        self.forget(&removed);
        removed
    }

    pub(crate) fn remove_all_for_number(&mut self, number: u32) -> Vec<String> {
        let removed = self.store.remove_all_for_number(number);
        self.forget(&removed);
        removed
    }

    fn forget(&mut self, names: &[String]) {
        for name in names {
            self.actions.remove(name);
        }
        self.pending.retain(|p| !names.contains(p));
    }

    /// Drop every action and template, then re-register the idle action.
    pub(crate) fn reset(&mut self) {
        self.store.reset();
        self.actions.clear();
        self.templates.clear();
        self.pending.clear();
        self.register_idle();
    }

    pub(crate) fn schedule(&mut self, canonical: String) {
        if !self.pending.contains(&canonical) {
            self.pending.push(canonical);
        }
    }

    pub(crate) fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }
}

fn unique_name(base: &str) -> String {
    format!("{base}_{}", Uuid::new_v4().simple())
}
