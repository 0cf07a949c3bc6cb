//! [`Registries`] – composition root owning the four parameter stores.
//!
//! All mutation goes through this type so that every write can:
//!
//! 1. run the dependency / cycle check for the item it touched, and
//! 2. retry every check that was deferred because a parameter was missing.
//!
//! Reads that cross store boundaries (computed items and action parameters)
//! use the global resolver [`Registries::resolve`], which searches every
//! store and reports ambiguity instead of guessing.
//!
//! # Example
//!
//! ```rust
//! use tgoals_registry::{Computed, Registries, RegistryConfig};
//! use tgoals_types::{ParamValue, StoreKind};
//!
//! let mut reg = Registries::new(RegistryConfig::default());
//! let near = Computed::new("ball_near", ["ball_distance"], |args| {
//!     Ok((args.float("ball_distance")? < 0.5).into())
//! });
//! reg.add_computed(StoreKind::Literal, near, &[]).unwrap();
//! assert!(reg.is_pending(StoreKind::Literal, "ball_near"));
//!
//! reg.set(StoreKind::Value, "ball_distance", 0.2, None).unwrap();
//! assert!(!reg.is_pending(StoreKind::Literal, "ball_near"));
//! assert_eq!(reg.get_bool(StoreKind::Literal, "ball_near").unwrap(), true);
//! ```

use chrono::{DateTime, Utc};
use tgoals_types::{GoalError, ParamValue, Scope, StoreKind};
use tracing::{debug, error, warn};

use crate::action::{Action, ActionParam, ActionStore, ActionTemplate};
use crate::config::RegistryConfig;
use crate::item::{Arguments, Computed, RegistryItem};
use crate::store::{ParameterStore, PendingCheck};

/// Outcome of a dependency walk that found no cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyStatus {
    Resolved,
    /// Some names reachable from the root are not registered yet.
    Pending { missing: Vec<String> },
}

#[derive(Debug)]
pub struct Registries {
    config: RegistryConfig,
    values: ParameterStore,
    literals: ParameterStore,
    fluents: ParameterStore,
    actions: ActionStore,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Registries {
    pub fn new(config: RegistryConfig) -> Self {
        let actions = ActionStore::new(
            config.idle_skill.clone(),
            config.idle_skill_parameters.clone(),
        );
        Self {
            config,
            values: ParameterStore::new(StoreKind::Value),
            literals: ParameterStore::new(StoreKind::Literal),
            fluents: ParameterStore::new(StoreKind::Fluent),
            actions,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self, kind: StoreKind) -> &ParameterStore {
        match kind {
            StoreKind::Value => &self.values,
            StoreKind::Literal => &self.literals,
            StoreKind::Fluent => &self.fluents,
            StoreKind::Action => self.actions.store(),
        }
    }

    fn store_mut(&mut self, kind: StoreKind) -> &mut ParameterStore {
        match kind {
            StoreKind::Value => &mut self.values,
            StoreKind::Literal => &mut self.literals,
            StoreKind::Fluent => &mut self.fluents,
            StoreKind::Action => self.actions.store_mut(),
        }
    }

    pub fn actions(&self) -> &ActionStore {
        &self.actions
    }

    // ────────────────────────────────────────────────────────────────────────
    // Writes
    // ────────────────────────────────────────────────────────────────────────

    /// Write a terminal value. For the action store the value is the skill
    /// name of a parameterless action.
    pub fn set(
        &mut self,
        kind: StoreKind,
        name: &str,
        value: impl Into<ParamValue>,
        scope: Option<&Scope>,
    ) -> Result<String, GoalError> {
        let value = value.into();
        if kind == StoreKind::Action {
            let skill = value.as_str().ok_or_else(|| GoalError::TypeMismatch {
                name: name.to_string(),
                expected: "str".to_string(),
                found: value.value_type().to_string(),
            })?;
            return self.register_action(name, skill, Vec::new(), scope);
        }
        let canonical = self.store_mut(kind).set_value(name, value, scope)?;
        self.retry_pending()?;
        Ok(canonical)
    }

    /// Register a computed item under `scope`.
    pub fn set_computed(
        &mut self,
        kind: StoreKind,
        computed: Computed,
        scope: Option<&Scope>,
    ) -> Result<String, GoalError> {
        self.register_computed(kind, computed, scope, &[])
    }

    /// Register a computed item together with its aliases.
    pub fn add_computed(
        &mut self,
        kind: StoreKind,
        computed: Computed,
        aliases: &[&str],
    ) -> Result<String, GoalError> {
        self.register_computed(kind, computed, None, aliases)
    }

    fn register_computed(
        &mut self,
        kind: StoreKind,
        computed: Computed,
        scope: Option<&Scope>,
        aliases: &[&str],
    ) -> Result<String, GoalError> {
        if kind == StoreKind::Action {
            return Err(GoalError::InvalidValue(format!(
                "action '{}' cannot be computed",
                computed.name()
            )));
        }
        let parameters = computed.parameters().to_vec();
        let canonical = self.store_mut(kind).insert_computed(computed, scope)?;
        for alias in aliases {
            if let Err(e) = self.store_mut(kind).register_alias(alias, &canonical) {
                self.store_mut(kind).remove_canonical(&canonical);
                return Err(e);
            }
        }
        self.check_new_item(kind, &canonical, parameters)?;
        self.retry_pending()?;
        Ok(canonical)
    }

    fn check_new_item(
        &mut self,
        kind: StoreKind,
        canonical: &str,
        parameters: Vec<String>,
    ) -> Result<(), GoalError> {
        match self.check_dependencies(canonical, &parameters) {
            Ok(DependencyStatus::Resolved) => {
                debug!(name = %canonical, "dependencies resolved");
                Ok(())
            }
            Ok(DependencyStatus::Pending { missing }) => {
                if self.config.strict_dependencies {
                    self.store_mut(kind).remove_canonical(canonical);
                    return Err(GoalError::UnknownParameter(missing.join(", ")));
                }
                warn!(name = %canonical, missing = ?missing, "dependency check deferred");
                self.store_mut(kind).schedule(PendingCheck {
                    name: canonical.to_string(),
                    parameters,
                });
                Ok(())
            }
            Err(e) => {
                error!(name = %canonical, error = %e, "computed item rejected");
                self.store_mut(kind).remove_canonical(canonical);
                Err(e)
            }
        }
    }

    pub fn remove(&mut self, kind: StoreKind, name: &str, scope: Option<&Scope>) -> Result<(), GoalError> {
        if kind == StoreKind::Action {
            self.actions.remove(name)?;
        } else {
            self.store_mut(kind).remove(name, scope)?;
        }
        self.retry_pending()
    }

    /// Remove every item registered under `role` from every store.
    pub fn remove_all_for_role(&mut self, role: &str) -> Vec<String> {
        let mut removed = Vec::new();
        for kind in [StoreKind::Value, StoreKind::Literal, StoreKind::Fluent] {
            removed.extend(self.store_mut(kind).remove_all_for_role(role));
        }
        removed.extend(self.actions.remove_all_for_role(role));
        debug!(role = %role, count = removed.len(), "role scope removed");
        removed
    }

    /// Remove every item registered under robot `number` from every store.
    pub fn remove_all_for_number(&mut self, number: u32) -> Vec<String> {
        let mut removed = Vec::new();
        for kind in [StoreKind::Value, StoreKind::Literal, StoreKind::Fluent] {
            removed.extend(self.store_mut(kind).remove_all_for_number(number));
        }
        removed.extend(self.actions.remove_all_for_number(number));
        debug!(number, count = removed.len(), "number scope removed");
        removed
    }

    pub fn register_alias(&mut self, kind: StoreKind, alias: &str, target: &str) -> Result<(), GoalError> {
        self.store_mut(kind).register_alias(alias, target)?;
        self.retry_pending()
    }

    /// Empty every store. The idle action is registered again.
    pub fn reset_all(&mut self) {
        self.values.reset();
        self.literals.reset();
        self.fluents.reset();
        self.actions.reset();
        debug!("all stores reset");
    }

    // ────────────────────────────────────────────────────────────────────────
    // Actions
    // ────────────────────────────────────────────────────────────────────────

    pub fn register_action(
        &mut self,
        name: &str,
        skill: &str,
        parameters: Vec<ActionParam>,
        scope: Option<&Scope>,
    ) -> Result<String, GoalError> {
        let canonical = self.actions.insert(name, skill, parameters, Some(name), scope);
        self.check_new_action(&canonical)?;
        self.retry_pending()?;
        Ok(canonical)
    }

    pub fn register_action_template(&mut self, template: ActionTemplate) -> Result<(), GoalError> {
        self.actions.add_template(template)
    }

    /// Mint a new action from `template` with positional planner arguments.
    pub fn instantiate_action(&mut self, template: &str, args: &[String]) -> Result<String, GoalError> {
        let canonical = self.actions.instantiate(template, args)?;
        self.check_new_action(&canonical)?;
        self.retry_pending()?;
        Ok(canonical)
    }

    /// Copy an action under a fresh name, optionally with new parameters.
    pub fn duplicate_with_new_parameters(
        &mut self,
        name: &str,
        parameters: Option<Vec<ActionParam>>,
    ) -> Result<String, GoalError> {
        let canonical = self.actions.duplicate(name, parameters)?;
        self.check_new_action(&canonical)?;
        self.retry_pending()?;
        Ok(canonical)
    }

    /// Drop actions minted for an automaton that failed to build.
    pub fn discard_actions(&mut self, names: &[String]) {
        for name in names {
            if self.actions.remove(name).is_ok() {
                debug!(action = %name, "minted action discarded");
            }
        }
    }

    /// Mark the action as finished by the robot.
    pub fn signal_action_completed(&mut self, name: &str) -> Result<(), GoalError> {
        self.actions.set_completed(name, true)?;
        debug!(action = %name, "action completed");
        Ok(())
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn idle_action(&self) -> Result<&Action, GoalError> {
        self.actions
            .idle()
            .ok_or_else(|| GoalError::UnknownParameter(crate::action::IDLE_ACTION.to_string()))
    }

    fn check_new_action(&mut self, canonical: &str) -> Result<(), GoalError> {
        match self.blocking_action_parameter(canonical) {
            Ok(None) => Ok(()),
            Ok(Some(missing)) => {
                if self.config.strict_dependencies {
                    self.actions.remove(canonical).ok();
                    return Err(GoalError::UnknownParameter(missing));
                }
                warn!(action = %canonical, missing = %missing, "action parameter check deferred");
                self.actions.schedule(canonical.to_string());
                Ok(())
            }
            Err(e) => {
                self.actions.remove(canonical).ok();
                Err(e)
            }
        }
    }

    /// First referenced parameter that is unknown or itself pending.
    fn blocking_action_parameter(&self, canonical: &str) -> Result<Option<String>, GoalError> {
        let Some(action) = self.actions.get(canonical) else {
            return Ok(None);
        };
        for name in action.referenced_names() {
            match self.resolve(name) {
                Ok((kind, item)) => {
                    if self.is_pending(kind, &item) {
                        return Ok(Some(name.to_string()));
                    }
                }
                Err(GoalError::UnknownParameter(_)) => return Ok(Some(name.to_string())),
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Reads
    // ────────────────────────────────────────────────────────────────────────

    /// Value of `name` in the store `kind`. Computed items are evaluated now.
    pub fn get(&self, kind: StoreKind, name: &str, scope: Option<&Scope>) -> Result<ParamValue, GoalError> {
        let store = self.store(kind);
        let canonical = store
            .resolve_scoped(name, scope)
            .ok_or_else(|| GoalError::UnknownParameter(store.canonical_name(name, scope)))?;
        self.evaluate(kind, &canonical)
    }

    pub fn get_bool(&self, kind: StoreKind, name: &str) -> Result<bool, GoalError> {
        let value = self.get(kind, name, None)?;
        value.as_bool().ok_or_else(|| GoalError::TypeMismatch {
            name: name.to_string(),
            expected: "bool".to_string(),
            found: value.value_type().to_string(),
        })
    }

    /// Find the single store owning `name`.
    pub fn resolve(&self, name: &str) -> Result<(StoreKind, String), GoalError> {
        let mut found: Vec<(StoreKind, String)> = StoreKind::ALL
            .iter()
            .filter_map(|kind| self.store(*kind).resolve_name(name).map(|c| (*kind, c)))
            .collect();
        if found.len() > 1 {
            return Err(GoalError::AmbiguousParameter {
                name: name.to_string(),
                stores: found.iter().map(|(kind, _)| *kind).collect(),
            });
        }
        found
            .pop()
            .ok_or_else(|| GoalError::UnknownParameter(name.to_string()))
    }

    /// Value of `name` wherever it lives.
    pub fn value_of(&self, name: &str) -> Result<ParamValue, GoalError> {
        let (kind, canonical) = self.resolve(name)?;
        self.evaluate(kind, &canonical)
    }

    fn evaluate(&self, kind: StoreKind, canonical: &str) -> Result<ParamValue, GoalError> {
        match self.store(kind).item(canonical) {
            None => Err(GoalError::UnknownParameter(canonical.to_string())),
            Some(RegistryItem::Constant(value)) | Some(RegistryItem::Mutable { value, .. }) => {
                Ok(value.clone())
            }
            Some(RegistryItem::Computed(computed)) => match self.compute(computed) {
                Err(GoalError::UnknownParameter(missing)) => match computed.default_value() {
                    Some(default) => {
                        debug!(name = %canonical, missing = %missing, "computed item fell back to default");
                        Ok(default.clone())
                    }
                    None => Err(GoalError::UnknownParameter(missing)),
                },
                other => other,
            },
        }
    }

    fn compute(&self, computed: &Computed) -> Result<ParamValue, GoalError> {
        let mut args = Arguments::new();
        for parameter in computed.parameters() {
            args.insert(parameter.clone(), self.value_of(parameter)?);
        }
        computed.evaluate(&args)
    }

    pub fn contains(&self, kind: StoreKind, name: &str) -> bool {
        self.store(kind).contains(name)
    }

    pub fn is_alias(&self, kind: StoreKind, name: &str) -> bool {
        self.store(kind).is_alias(name)
    }

    pub fn aliased_name(&self, kind: StoreKind, alias: &str) -> Option<&str> {
        self.store(kind).aliased_name(alias)
    }

    pub fn aliases_for(&self, kind: StoreKind, name: &str) -> Vec<String> {
        self.store(kind).aliases_for(name)
    }

    pub fn is_pending(&self, kind: StoreKind, name: &str) -> bool {
        match kind {
            StoreKind::Action => self.actions.is_pending(name),
            _ => self.store(kind).is_pending(name),
        }
    }

    pub fn last_updated(&self, kind: StoreKind, name: &str) -> Option<DateTime<Utc>> {
        self.store(kind).last_updated(name)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Dependency checking
    // ────────────────────────────────────────────────────────────────────────

    /// Depth-first walk from `root` through the declared parameters of
    /// computed items. Reaching `root` again is a cycle.
    pub fn check_dependencies(
        &self,
        root: &str,
        parameters: &[String],
    ) -> Result<DependencyStatus, GoalError> {
        let mut missing = Vec::new();
        let mut path = vec![root.to_string()];
        for parameter in parameters {
            self.walk(root, parameter, &mut path, &mut missing)?;
        }
        if missing.is_empty() {
            Ok(DependencyStatus::Resolved)
        } else {
            Ok(DependencyStatus::Pending { missing })
        }
    }

    fn walk(
        &self,
        root: &str,
        parameter: &str,
        path: &mut Vec<String>,
        missing: &mut Vec<String>,
    ) -> Result<(), GoalError> {
        let (kind, canonical) = match self.resolve(parameter) {
            Ok(found) => found,
            Err(GoalError::UnknownParameter(_)) => {
                missing.push(parameter.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if canonical == root {
            path.push(canonical);
            return Err(GoalError::CyclicDependency {
                name: root.to_string(),
                path: path.clone(),
            });
        }
        if path.contains(&canonical) {
            return Ok(());
        }
        let Some(RegistryItem::Computed(computed)) = self.store(kind).item(&canonical) else {
            return Ok(());
        };
        path.push(canonical);
        for next in computed.parameters() {
            self.walk(root, next, path, missing)?;
        }
        path.pop();
        Ok(())
    }

    /// Re-run every deferred check. Items that turn out cyclic or ambiguous
    /// are removed; the first such error is returned after the whole queue
    /// was processed.
    fn retry_pending(&mut self) -> Result<(), GoalError> {
        let mut first_error = None;
        for kind in [StoreKind::Value, StoreKind::Literal, StoreKind::Fluent] {
            for check in self.store_mut(kind).take_pending() {
                if !self.store(kind).contains(&check.name) {
                    continue;
                }
                match self.check_dependencies(&check.name, &check.parameters) {
                    Ok(DependencyStatus::Resolved) => {
                        debug!(name = %check.name, "deferred dependency check resolved");
                    }
                    Ok(DependencyStatus::Pending { .. }) => self.store_mut(kind).schedule(check),
                    Err(e) => {
                        error!(name = %check.name, error = %e, "deferred computed item rejected");
                        self.store_mut(kind).remove_canonical(&check.name);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        for name in self.actions.take_pending() {
            match self.blocking_action_parameter(&name) {
                Ok(None) => debug!(action = %name, "deferred action parameters resolved"),
                Ok(Some(_)) => self.actions.schedule(name),
                Err(e) => {
                    error!(action = %name, error = %e, "deferred action rejected");
                    self.actions.remove(&name).ok();
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registries() -> Registries {
        Registries::new(RegistryConfig::default())
    }

    fn copy_of(name: &str, source: &'static str) -> Computed {
        Computed::new(name, [source], move |args| args.get(source).cloned())
    }

    #[test]
    fn pending_item_resolves_when_parameter_arrives() {
        let mut reg = registries();
        let near = Computed::new("near", ["distance"], |args| {
            Ok((args.float("distance")? < 1.0).into())
        });
        reg.add_computed(StoreKind::Literal, near, &[]).unwrap();
        assert!(reg.is_pending(StoreKind::Literal, "near"));
        assert!(matches!(
            reg.get(StoreKind::Literal, "near", None),
            Err(GoalError::UnknownParameter(_))
        ));

        reg.set(StoreKind::Value, "distance", 0.5, None).unwrap();
        assert!(!reg.is_pending(StoreKind::Literal, "near"));
        assert!(reg.get_bool(StoreKind::Literal, "near").unwrap());

        reg.set(StoreKind::Value, "distance", 4.0, None).unwrap();
        assert!(!reg.get_bool(StoreKind::Literal, "near").unwrap());
    }

    #[test]
    fn cycle_is_rejected_and_stays_rejected() {
        let mut reg = registries();
        reg.add_computed(StoreKind::Value, copy_of("a", "b"), &[]).unwrap();
        assert!(reg.is_pending(StoreKind::Value, "a"));

        let err = reg
            .add_computed(StoreKind::Value, copy_of("b", "a"), &[])
            .unwrap_err();
        match err {
            GoalError::CyclicDependency { name, path } => {
                assert_eq!(name, "value_b");
                assert_eq!(path, vec!["value_b", "value_a", "value_b"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!reg.contains(StoreKind::Value, "b"));

        // A later unrelated write does not bring the cycle back.
        reg.set(StoreKind::Value, "c", 1, None).unwrap();
        assert!(!reg.contains(StoreKind::Value, "b"));
        assert!(reg.is_pending(StoreKind::Value, "a"));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut reg = registries();
        let err = reg
            .add_computed(StoreKind::Value, copy_of("x", "x"), &[])
            .unwrap_err();
        assert!(matches!(err, GoalError::CyclicDependency { .. }));
    }

    #[test]
    fn type_stability_across_writes() {
        let mut reg = registries();
        reg.set(StoreKind::Value, "speed", 0.5, None).unwrap();
        assert!(matches!(
            reg.set(StoreKind::Value, "speed", "fast", None),
            Err(GoalError::TypeMismatch { .. })
        ));
        assert_eq!(
            reg.get(StoreKind::Value, "speed", None).unwrap(),
            ParamValue::Float(0.5)
        );
    }

    #[test]
    fn alias_reads_and_writes_hit_the_target() {
        let mut reg = registries();
        reg.set(StoreKind::Literal, "ball_near", false, None).unwrap();
        reg.register_alias(StoreKind::Literal, "close", "ball_near").unwrap();
        reg.set(StoreKind::Literal, "close", true, None).unwrap();
        assert!(reg.get_bool(StoreKind::Literal, "ball_near").unwrap());
        assert_eq!(
            reg.aliased_name(StoreKind::Literal, "close"),
            Some("literal_ball_near")
        );
        assert_eq!(reg.value_of("close").unwrap(), ParamValue::Bool(true));
    }

    #[test]
    fn alias_follows_every_later_write() {
        let mut reg = registries();
        reg.set(StoreKind::Value, "x", 0, None).unwrap();
        reg.register_alias(StoreKind::Value, "y", "x").unwrap();
        for v in [1, -4, 17, 0] {
            reg.set(StoreKind::Value, "x", v, None).unwrap();
            assert_eq!(
                reg.get(StoreKind::Value, "y", None).unwrap(),
                reg.get(StoreKind::Value, "x", None).unwrap()
            );
            assert_eq!(reg.get(StoreKind::Value, "y", None).unwrap(), ParamValue::Int(v.into()));
        }
    }

    #[test]
    fn rejected_computed_item_releases_its_aliases() {
        let mut reg = registries();
        assert!(matches!(
            reg.add_computed(StoreKind::Literal, copy_of("x", "x"), &["near"]),
            Err(GoalError::CyclicDependency { .. })
        ));
        assert!(!reg.is_alias(StoreKind::Literal, "near"));

        reg.set(StoreKind::Literal, "raw", true, None).unwrap();
        reg.add_computed(StoreKind::Literal, copy_of("y", "raw"), &["near"])
            .unwrap();
        assert!(reg.get_bool(StoreKind::Literal, "near").unwrap());
    }

    #[test]
    fn removing_an_item_drops_aliases_to_it() {
        let mut reg = registries();
        reg.set(StoreKind::Fluent, "seen", true, None).unwrap();
        reg.register_alias(StoreKind::Fluent, "visible", "seen").unwrap();
        reg.remove(StoreKind::Fluent, "seen", None).unwrap();
        assert!(!reg.is_alias(StoreKind::Fluent, "visible"));
    }

    #[test]
    fn computed_alias_registration() {
        let mut reg = registries();
        reg.set(StoreKind::Value, "d", 2, None).unwrap();
        reg.add_computed(StoreKind::Value, copy_of("d_copy", "d"), &["dc"])
            .unwrap();
        assert_eq!(reg.value_of("dc").unwrap(), ParamValue::Int(2));
        assert_eq!(reg.aliases_for(StoreKind::Value, "d_copy"), vec!["value_dc"]);
    }

    #[test]
    fn ambiguous_bare_name_is_fatal() {
        let mut reg = registries();
        reg.set(StoreKind::Value, "near", 1, None).unwrap();
        reg.set(StoreKind::Literal, "near", true, None).unwrap();
        assert!(matches!(
            reg.value_of("near"),
            Err(GoalError::AmbiguousParameter { .. })
        ));
        assert!(matches!(
            reg.add_computed(StoreKind::Fluent, copy_of("f", "near"), &[]),
            Err(GoalError::AmbiguousParameter { .. })
        ));
        assert!(!reg.contains(StoreKind::Fluent, "f"));
    }

    #[test]
    fn default_covers_unknown_parameters() {
        let mut reg = registries();
        let c = copy_of("seen", "ball_seen_raw").with_default(false);
        reg.add_computed(StoreKind::Fluent, c, &[]).unwrap();
        assert!(!reg.get_bool(StoreKind::Fluent, "seen").unwrap());
    }

    #[test]
    fn strict_mode_rejects_missing_parameters() {
        let mut reg = Registries::new(RegistryConfig {
            strict_dependencies: true,
            ..RegistryConfig::default()
        });
        assert!(matches!(
            reg.add_computed(StoreKind::Value, copy_of("a", "b"), &[]),
            Err(GoalError::UnknownParameter(_))
        ));
        assert!(!reg.contains(StoreKind::Value, "a"));
    }

    #[test]
    fn action_parameters_are_deferred_until_known() {
        let mut reg = registries();
        let name = reg
            .register_action("walk", "WalkTo", vec![ActionParam::named("target")], None)
            .unwrap();
        assert!(reg.is_pending(StoreKind::Action, &name));
        let target = ParamValue::tuple(vec![1.0.into(), (-0.5).into()]).unwrap();
        reg.set(StoreKind::Value, "target", target, None).unwrap();
        assert!(!reg.is_pending(StoreKind::Action, &name));

        let action = reg.action("walk").unwrap();
        assert_eq!(
            action.render_parameters(&reg).unwrap(),
            "target_0:1,float/target_1:-0.5,float"
        );
    }

    #[test]
    fn ambiguous_action_parameter_is_dropped_once() {
        let mut reg = registries();
        let kick = reg
            .register_action(
                "kick",
                "Kick",
                vec![ActionParam::named("dist"), ActionParam::named("missing")],
                None,
            )
            .unwrap();
        reg.set(StoreKind::Value, "dist", 1.0, None).unwrap();
        assert!(reg.is_pending(StoreKind::Action, &kick));

        assert!(matches!(
            reg.set(StoreKind::Literal, "dist", true, None),
            Err(GoalError::AmbiguousParameter { .. })
        ));
        assert!(reg.action(&kick).is_none());

        reg.set(StoreKind::Value, "unrelated", 2.0, None).unwrap();
        reg.set(StoreKind::Fluent, "other", false, None).unwrap();
        assert_eq!(
            reg.get(StoreKind::Value, "unrelated", None).unwrap(),
            ParamValue::Float(2.0)
        );
    }

    #[test]
    fn action_rendering_mixes_parameter_kinds() {
        let mut reg = registries();
        reg.set(StoreKind::Value, "speed", 3, None).unwrap();
        reg.register_action(
            "dribble",
            "Dribble",
            vec![
                ActionParam::labeled("mode", "fast"),
                ActionParam::reference("v", "speed"),
                ActionParam::Constant(true.into()),
            ],
            None,
        )
        .unwrap();
        let rendered = reg
            .action("dribble")
            .unwrap()
            .render_parameters(&reg)
            .unwrap();
        assert_eq!(rendered, "mode:fast,str/v:3,int/2:true,bool");
    }

    #[test]
    fn set_on_action_store_registers_skill() {
        let mut reg = registries();
        reg.set(StoreKind::Action, "kick_ball", "Kick", None).unwrap();
        assert_eq!(reg.action("kick_ball").unwrap().skill(), "Kick");
        assert_eq!(
            reg.get(StoreKind::Action, "kick_ball", None).unwrap(),
            ParamValue::from("Kick")
        );
        assert!(matches!(
            reg.set(StoreKind::Action, "bad", 1, None),
            Err(GoalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn completion_signal() {
        let mut reg = registries();
        reg.set(StoreKind::Action, "kick", "Kick", None).unwrap();
        assert!(!reg.action("kick").unwrap().completed());
        reg.signal_action_completed("kick").unwrap();
        assert!(reg.action("kick").unwrap().completed());
        assert!(reg.signal_action_completed("dance").is_err());
    }

    #[test]
    fn template_instances_and_duplicates() {
        let mut reg = registries();
        reg.register_action_template(ActionTemplate::new("kick", "Kick")).unwrap();
        let first = reg.instantiate_action("kick", &[]).unwrap();
        let copy = reg
            .duplicate_with_new_parameters(&first, Some(vec![ActionParam::labeled("power", 0.8)]))
            .unwrap();
        assert_ne!(first, copy);
        assert_eq!(reg.action(&copy).unwrap().base_name(), "kick");
    }

    #[test]
    fn scope_removal_spans_all_stores() {
        let mut reg = registries();
        let striker = Scope::Role("striker".into());
        reg.set(StoreKind::Value, "pose", 1, Some(&striker)).unwrap();
        reg.set(StoreKind::Fluent, "has_ball", true, Some(&striker)).unwrap();
        reg.set(StoreKind::Action, "shoot", "Kick", Some(&striker)).unwrap();
        let removed = reg.remove_all_for_role("striker");
        assert_eq!(removed.len(), 3);
        assert!(reg.action("shoot").is_none());
        assert!(!reg.contains(StoreKind::Value, "striker_pose"));
    }

    #[test]
    fn reset_all_keeps_idle_action() {
        let mut reg = registries();
        reg.set(StoreKind::Value, "x", 1, None).unwrap();
        reg.set(StoreKind::Action, "kick", "Kick", None).unwrap();
        reg.reset_all();
        assert!(reg.store(StoreKind::Value).is_empty());
        assert!(reg.action("kick").is_none());
        assert_eq!(reg.idle_action().unwrap().skill(), "Idle");
    }

    #[test]
    fn remove_unknown_name_is_an_error() {
        let mut reg = registries();
        assert!(matches!(
            reg.remove(StoreKind::Literal, "ghost", None),
            Err(GoalError::UnknownParameter(_))
        ));
    }
}
