//! [`ParameterStore`] – one named store of registry items.
//!
//! A store owns the canonical names for its [`StoreKind`], a one-level alias
//! table, scope indices for bulk removal, per-item update timestamps, and the
//! queue of dependency checks that could not complete yet.
//!
//! Stores never resolve names across each other; that is the job of
//! [`Registries`](crate::Registries), which owns all four.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tgoals_types::{GoalError, ParamValue, Scope, StoreKind};
use tracing::debug;

use crate::item::{Computed, RegistryItem};

/// A dependency check waiting for a parameter that is not registered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCheck {
    pub name: String,
    pub parameters: Vec<String>,
}

#[derive(Debug)]
pub struct ParameterStore {
    kind: StoreKind,
    items: BTreeMap<String, RegistryItem>,
    aliases: BTreeMap<String, String>,
    updated_at: HashMap<String, DateTime<Utc>>,
    role_index: HashMap<String, Vec<String>>,
    number_index: HashMap<u32, Vec<String>>,
    pending: Vec<PendingCheck>,
}

impl ParameterStore {
    pub fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            items: BTreeMap::new(),
            aliases: BTreeMap::new(),
            updated_at: HashMap::new(),
            role_index: HashMap::new(),
            number_index: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Lower-case `name`, then prepend the scope prefix and the store prefix
    /// unless the name already carries the store prefix.
    pub fn canonical_name(&self, name: &str, scope: Option<&Scope>) -> String {
        let mut name = name.to_lowercase();
        let prefix = self.kind.prefix();
        if name.starts_with(prefix) {
            return name;
        }
        if self.kind != StoreKind::Action {
            if let Some(scope) = scope {
                let scope_prefix = scope.prefix();
                if !name.starts_with(&scope_prefix) {
                    name = format!("{scope_prefix}{name}");
                }
            }
        }
        format!("{prefix}{name}")
    }

    /// Canonical name of the item `name` refers to, following one alias hop.
    /// `None` when nothing is registered under it.
    pub fn resolve_name(&self, name: &str) -> Option<String> {
        self.resolve_scoped(name, None)
    }

    pub(crate) fn resolve_scoped(&self, name: &str, scope: Option<&Scope>) -> Option<String> {
        let canonical = self.canonical_name(name, scope);
        if self.items.contains_key(&canonical) {
            return Some(canonical);
        }
        let target = self.aliases.get(&canonical)?;
        self.items.contains_key(target).then(|| target.clone())
    }

    /// `true` when `name` (or the alias `name`) names a live item.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve_name(name).is_some()
    }

    pub fn item(&self, name: &str) -> Option<&RegistryItem> {
        let canonical = self.resolve_name(name)?;
        self.items.get(&canonical)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &RegistryItem)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_updated(&self, name: &str) -> Option<DateTime<Utc>> {
        let canonical = self.resolve_name(name)?;
        self.updated_at.get(&canonical).copied()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Mutation
    // ────────────────────────────────────────────────────────────────────────

    /// Write a terminal value. Creates a [`RegistryItem::Mutable`] on first
    /// write and enforces its type on every later one.
    pub fn set_value(
        &mut self,
        name: &str,
        value: ParamValue,
        scope: Option<&Scope>,
    ) -> Result<String, GoalError> {
        value.validate()?;
        let canonical = self
            .resolve_scoped(name, scope)
            .unwrap_or_else(|| self.canonical_name(name, scope));
        if self.kind.is_boolean() && value.as_bool().is_none() {
            return Err(GoalError::TypeMismatch {
                name: canonical,
                expected: "bool".to_string(),
                found: value.value_type().to_string(),
            });
        }
        match self.items.get_mut(&canonical) {
            Some(RegistryItem::Mutable {
                value: current,
                established,
            }) => {
                if value.value_type() != *established {
                    return Err(GoalError::TypeMismatch {
                        name: canonical,
                        expected: established.to_string(),
                        found: value.value_type().to_string(),
                    });
                }
                *current = value;
            }
            Some(other) => {
                return Err(GoalError::TypeMismatch {
                    name: canonical,
                    expected: other.describe().to_string(),
                    found: value.value_type().to_string(),
                });
            }
            None => {
                let established = value.value_type();
                self.items
                    .insert(canonical.clone(), RegistryItem::Mutable { value, established });
                self.index_scope(&canonical, scope);
            }
        }
        self.touch(&canonical);
        debug!(store = %self.kind, name = %canonical, "value set");
        Ok(canonical)
    }

    /// Register a computed item, replacing an earlier computed item of the
    /// same name. Replacing a terminal is a type mismatch.
    pub fn insert_computed(
        &mut self,
        computed: Computed,
        scope: Option<&Scope>,
    ) -> Result<String, GoalError> {
        let canonical = self
            .resolve_scoped(computed.name(), scope)
            .unwrap_or_else(|| self.canonical_name(computed.name(), scope));
        if let Some(existing) = self.items.get(&canonical) {
            if !existing.is_computed() {
                return Err(GoalError::TypeMismatch {
                    name: canonical,
                    expected: existing.describe().to_string(),
                    found: "computed".to_string(),
                });
            }
        }
        self.items
            .insert(canonical.clone(), RegistryItem::Computed(computed));
        self.index_scope(&canonical, scope);
        self.touch(&canonical);
        debug!(store = %self.kind, name = %canonical, "computed item registered");
        Ok(canonical)
    }

    /// Register (or overwrite) a constant.
    pub fn insert_constant(&mut self, name: &str, value: ParamValue, scope: Option<&Scope>) -> String {
        let canonical = self.canonical_name(name, scope);
        self.items
            .insert(canonical.clone(), RegistryItem::Constant(value));
        self.index_scope(&canonical, scope);
        self.touch(&canonical);
        canonical
    }

    pub fn remove(&mut self, name: &str, scope: Option<&Scope>) -> Result<RegistryItem, GoalError> {
        let canonical = self
            .resolve_scoped(name, scope)
            .ok_or_else(|| GoalError::UnknownParameter(self.canonical_name(name, scope)))?;
        self.remove_canonical(&canonical)
            .ok_or(GoalError::UnknownParameter(canonical))
    }

    pub(crate) fn remove_canonical(&mut self, canonical: &str) -> Option<RegistryItem> {
        let item = self.items.remove(canonical)?;
        self.updated_at.remove(canonical);
        self.pending.retain(|p| p.name != canonical);
        self.aliases.retain(|_, target| target != canonical);
        for names in self.role_index.values_mut() {
            names.retain(|n| n != canonical);
        }
        for names in self.number_index.values_mut() {
            names.retain(|n| n != canonical);
        }
        debug!(store = %self.kind, name = %canonical, "item removed");
        Some(item)
    }

    /// Remove every item registered under `role`. Returns the removed names.
    pub fn remove_all_for_role(&mut self, role: &str) -> Vec<String> {
        let names = self
            .role_index
            .remove(&role.to_lowercase())
            .unwrap_or_default();
        names
            .into_iter()
            .filter(|n| self.remove_canonical(n).is_some())
            .collect()
    }

    /// Remove every item registered under robot `number`.
    pub fn remove_all_for_number(&mut self, number: u32) -> Vec<String> {
        let names = self.number_index.remove(&number).unwrap_or_default();
        names
            .into_iter()
            .filter(|n| self.remove_canonical(n).is_some())
            .collect()
    }

    /// Drop every item, alias, index and queued check.
    pub fn reset(&mut self) {
        *self = Self::new(self.kind);
    }

    fn touch(&mut self, canonical: &str) {
        self.updated_at.insert(canonical.to_string(), Utc::now());
    }

    fn index_scope(&mut self, canonical: &str, scope: Option<&Scope>) {
        let names = match scope {
            Some(Scope::Role(role)) => self.role_index.entry(role.to_lowercase()).or_default(),
            Some(Scope::Number(n)) => self.number_index.entry(*n).or_default(),
            None => return,
        };
        if !names.iter().any(|n| n == canonical) {
            names.push(canonical.to_string());
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Aliases
    // ────────────────────────────────────────────────────────────────────────

    /// Make `alias` a second name for `target`. Aliases are one level deep.
    pub fn register_alias(&mut self, alias: &str, target: &str) -> Result<(), GoalError> {
        let alias = self.canonical_name(alias, None);
        let target = self
            .resolve_name(target)
            .ok_or_else(|| GoalError::UnknownParameter(target.to_string()))?;
        if self.aliases.contains_key(&alias) || self.items.contains_key(&alias) {
            return Err(GoalError::DuplicateAlias(alias));
        }
        debug!(store = %self.kind, alias = %alias, target = %target, "alias registered");
        self.aliases.insert(alias, target);
        Ok(())
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(&self.canonical_name(name, None))
    }

    pub fn aliased_name(&self, alias: &str) -> Option<&str> {
        self.aliases
            .get(&self.canonical_name(alias, None))
            .map(String::as_str)
    }

    pub fn aliases_for(&self, name: &str) -> Vec<String> {
        let Some(canonical) = self.resolve_name(name) else {
            return Vec::new();
        };
        self.aliases
            .iter()
            .filter(|(_, target)| **target == canonical)
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Pending checks
    // ────────────────────────────────────────────────────────────────────────

    pub fn is_pending(&self, name: &str) -> bool {
        self.resolve_name(name)
            .is_some_and(|c| self.pending.iter().any(|p| p.name == c))
    }

    pub fn pending(&self) -> &[PendingCheck] {
        &self.pending
    }

    pub(crate) fn schedule(&mut self, check: PendingCheck) {
        if !self.pending.iter().any(|p| p.name == check.name) {
            self.pending.push(check);
        }
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingCheck> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgoals_types::ValueType;

    #[test]
    fn canonical_names_follow_prefix_rules() {
        let store = ParameterStore::new(StoreKind::Value);
        assert_eq!(store.canonical_name("Ball_Distance", None), "value_ball_distance");
        assert_eq!(store.canonical_name("value_x", None), "value_x");
        let role = Scope::Role("Striker".into());
        assert_eq!(store.canonical_name("pose", Some(&role)), "value_striker_pose");
        assert_eq!(store.canonical_name("striker_pose", Some(&role)), "value_striker_pose");
        assert_eq!(
            store.canonical_name("pose", Some(&Scope::Number(3))),
            "value_robot#3_pose"
        );
    }

    #[test]
    fn action_store_ignores_scope_in_names() {
        let store = ParameterStore::new(StoreKind::Action);
        assert_eq!(
            store.canonical_name("kick", Some(&Scope::Number(1))),
            "action_kick"
        );
    }

    #[test]
    fn mutable_type_is_locked_on_first_write() {
        let mut store = ParameterStore::new(StoreKind::Value);
        store.set_value("d", 1.5.into(), None).unwrap();
        store.set_value("d", 2.5.into(), None).unwrap();
        let err = store.set_value("d", "far".into(), None).unwrap_err();
        assert!(matches!(err, GoalError::TypeMismatch { .. }));
        match store.item("d") {
            Some(RegistryItem::Mutable { value, established }) => {
                assert_eq!(*value, ParamValue::Float(2.5));
                assert_eq!(*established, ValueType::Float);
            }
            other => panic!("unexpected item {other:?}"),
        }
        assert!(store.last_updated("d").is_some());
    }

    #[test]
    fn boolean_stores_reject_other_types() {
        let mut store = ParameterStore::new(StoreKind::Literal);
        assert!(matches!(
            store.set_value("near", 1.into(), None),
            Err(GoalError::TypeMismatch { .. })
        ));
        assert!(store.set_value("near", true.into(), None).is_ok());
    }

    #[test]
    fn alias_is_transparent_and_unique() {
        let mut store = ParameterStore::new(StoreKind::Fluent);
        store.set_value("ball_seen", false.into(), None).unwrap();
        store.register_alias("seen", "ball_seen").unwrap();
        assert!(store.is_alias("seen"));
        assert_eq!(store.aliased_name("seen"), Some("fluent_ball_seen"));
        assert_eq!(store.resolve_name("seen").as_deref(), Some("fluent_ball_seen"));
        store.set_value("seen", true.into(), None).unwrap();
        assert!(matches!(
            store.item("ball_seen"),
            Some(RegistryItem::Mutable { value: ParamValue::Bool(true), .. })
        ));
        assert_eq!(store.aliases_for("ball_seen"), vec!["fluent_seen".to_string()]);
        assert!(matches!(
            store.register_alias("seen", "ball_seen"),
            Err(GoalError::DuplicateAlias(_))
        ));
    }

    #[test]
    fn dangling_alias_is_not_contained() {
        let mut store = ParameterStore::new(StoreKind::Value);
        store.set_value("x", 1.into(), None).unwrap();
        store.register_alias("y", "x").unwrap();
        store.remove("x", None).unwrap();
        assert!(!store.contains("y"));
    }

    #[test]
    fn scoped_removal() {
        let mut store = ParameterStore::new(StoreKind::Value);
        let goalie = Scope::Role("goalie".into());
        store.set_value("pose", 1.into(), Some(&goalie)).unwrap();
        store.set_value("pose", 2.into(), Some(&Scope::Number(2))).unwrap();
        store.set_value("pose", 3.into(), None).unwrap();

        assert_eq!(store.remove_all_for_role("Goalie"), vec!["value_goalie_pose"]);
        assert_eq!(store.remove_all_for_number(2), vec!["value_robot#2_pose"]);
        assert!(store.remove_all_for_number(9).is_empty());
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["value_pose"]);
    }

    #[test]
    fn remove_unknown_is_an_error() {
        let mut store = ParameterStore::new(StoreKind::Value);
        assert!(matches!(
            store.remove("ghost", None),
            Err(GoalError::UnknownParameter(_))
        ));
    }

    #[test]
    fn computed_cannot_replace_terminal() {
        let mut store = ParameterStore::new(StoreKind::Value);
        store.set_value("x", 1.into(), None).unwrap();
        let c = Computed::new("x", ["y"], |_| Ok(0.into()));
        assert!(matches!(
            store.insert_computed(c, None),
            Err(GoalError::TypeMismatch { .. })
        ));
    }
}
