//! Edge guards and their evaluation against the live stores.
//!
//! A guard is one `(item, expected value)` condition. An edge is *verified*
//! when every literal and fluent guard currently holds. Action guards are
//! not conditions on the world; they name what the edge makes the robot do
//! and are skipped during verification.

use std::fmt;

use serde::{Deserialize, Serialize};
use tgoals_registry::Registries;
use tgoals_types::{GoalError, StoreKind};
use tracing::debug;

/// Store a guard reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuardTarget {
    Literal,
    Fluent,
    Action,
}

impl GuardTarget {
    pub fn store(&self) -> StoreKind {
        match self {
            GuardTarget::Literal => StoreKind::Literal,
            GuardTarget::Fluent => StoreKind::Fluent,
            GuardTarget::Action => StoreKind::Action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard {
    /// Canonical item name.
    pub name: String,
    pub expected: bool,
    pub target: GuardTarget,
}

impl Guard {
    pub fn new(name: impl Into<String>, expected: bool, target: GuardTarget) -> Self {
        Self {
            name: name.into(),
            expected,
            target,
        }
    }

    pub fn is_action(&self) -> bool {
        self.target == GuardTarget::Action
    }

    /// Whether the item currently has the expected value.
    pub fn holds(&self, registries: &Registries) -> Result<bool, GoalError> {
        Ok(registries.get_bool(self.target.store(), &self.name)? == self.expected)
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.expected {
            f.write_str(&self.name)
        } else {
            write!(f, "!{}", self.name)
        }
    }
}

/// `true` when every non-action guard holds. An item that cannot be
/// resolved makes the guard list unverified instead of failing.
pub fn guards_hold(guards: &[Guard], registries: &Registries) -> Result<bool, GoalError> {
    for guard in guards.iter().filter(|g| !g.is_action()) {
        match guard.holds(registries) {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(GoalError::UnknownParameter(missing)) => {
                debug!(guard = %guard, missing = %missing, "guard not evaluable, edge not verified");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgoals_registry::{Computed, RegistryConfig};

    fn registries() -> Registries {
        let mut reg = Registries::new(RegistryConfig::default());
        reg.set(StoreKind::Literal, "near", true, None).unwrap();
        reg.set(StoreKind::Fluent, "has_ball", false, None).unwrap();
        reg
    }

    #[test]
    fn all_guards_must_hold() {
        let reg = registries();
        let guards = vec![
            Guard::new("literal_near", true, GuardTarget::Literal),
            Guard::new("fluent_has_ball", false, GuardTarget::Fluent),
        ];
        assert!(guards_hold(&guards, &reg).unwrap());

        let guards = vec![Guard::new("literal_near", false, GuardTarget::Literal)];
        assert!(!guards_hold(&guards, &reg).unwrap());
    }

    #[test]
    fn action_guards_are_ignored() {
        let reg = registries();
        let guards = vec![Guard::new("action_kick", true, GuardTarget::Action)];
        assert!(guards_hold(&guards, &reg).unwrap());
    }

    #[test]
    fn unknown_item_means_not_verified() {
        let reg = registries();
        let guards = vec![Guard::new("literal_far", true, GuardTarget::Literal)];
        assert!(!guards_hold(&guards, &reg).unwrap());
    }

    #[test]
    fn other_errors_propagate() {
        let mut reg = registries();
        let broken = Computed::new("broken", Vec::<String>::new(), |_| Ok(3.into()));
        reg.add_computed(StoreKind::Literal, broken, &[]).unwrap();
        let guards = vec![Guard::new("literal_broken", true, GuardTarget::Literal)];
        assert!(matches!(
            guards_hold(&guards, &reg),
            Err(GoalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn display_marks_negation() {
        assert_eq!(Guard::new("literal_a", false, GuardTarget::Literal).to_string(), "!literal_a");
    }
}
