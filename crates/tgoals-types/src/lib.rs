//! `tgoals-types` – shared vocabulary for the behavior runtime.
//!
//! Every other crate in the workspace speaks in terms of these types:
//!
//! | Type | Role |
//! |------|------|
//! | [`ParamValue`] | Terminal value stored in a registry item |
//! | [`ValueType`] | Shape of a value, fixed on the first write of a mutable item |
//! | [`Scope`] | Robot role or robot number an item is registered under |
//! | [`StoreKind`] | Which of the four stores owns an item |
//! | [`GoalError`] | Error taxonomy shared by the stores, the automaton and the runtime |
//!
//! # Example
//!
//! ```rust
//! use tgoals_types::{ParamValue, Scope, StoreKind, ValueType};
//!
//! let v = ParamValue::from(3.5);
//! assert_eq!(v.value_type(), ValueType::Float);
//! assert_eq!(StoreKind::Fluent.prefix(), "fluent_");
//! assert_eq!(Scope::Number(2).prefix(), "robot#2_");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Stores and scopes
// ────────────────────────────────────────────────────────────────────────────

/// The four parameter stores. Each owns a disjoint set of canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Numeric and string inputs (distances, ids, poses).
    Value,
    /// Boolean atoms referenced by label automata.
    Literal,
    /// Boolean atoms referenced by planner policies.
    Fluent,
    /// Named robot actions.
    Action,
}

impl StoreKind {
    /// Lookup order used by the cross-store resolver.
    pub const ALL: [StoreKind; 4] = [
        StoreKind::Value,
        StoreKind::Literal,
        StoreKind::Fluent,
        StoreKind::Action,
    ];

    /// Prefix carried by every canonical name in this store.
    pub fn prefix(&self) -> &'static str {
        match self {
            StoreKind::Value => "value_",
            StoreKind::Literal => "literal_",
            StoreKind::Fluent => "fluent_",
            StoreKind::Action => "action_",
        }
    }

    /// Literal and fluent stores only hold booleans.
    pub fn is_boolean(&self) -> bool {
        matches!(self, StoreKind::Literal | StoreKind::Fluent)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreKind::Value => "value",
            StoreKind::Literal => "literal",
            StoreKind::Fluent => "fluent",
            StoreKind::Action => "action",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for StoreKind {
    type Err = GoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "value" | "values" => Ok(StoreKind::Value),
            "literal" | "literals" => Ok(StoreKind::Literal),
            "fluent" | "fluents" => Ok(StoreKind::Fluent),
            "action" | "actions" => Ok(StoreKind::Action),
            other => Err(GoalError::InvalidValue(format!("unknown store '{other}'"))),
        }
    }
}

/// Scope an item is registered under, used for bulk removal when a robot
/// leaves the team or changes role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Role(String),
    Number(u32),
}

impl Scope {
    /// Name prefix inserted between the store prefix and the base name.
    pub fn prefix(&self) -> String {
        match self {
            Scope::Role(role) => format!("{}_", role.to_lowercase()),
            Scope::Number(n) => format!("robot#{n}_"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Values
// ────────────────────────────────────────────────────────────────────────────

/// A terminal value held by a registry item.
///
/// Tuples have a fixed arity of 2 or 3 and lists are homogeneous; use
/// [`ParamValue::tuple`] and [`ParamValue::list`] to build them checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
    Tuple(Vec<ParamValue>),
}

impl ParamValue {
    /// Build a tuple of scalars. Arity must be 2 or 3.
    pub fn tuple(items: Vec<ParamValue>) -> Result<Self, GoalError> {
        if !(2..=3).contains(&items.len()) {
            return Err(GoalError::InvalidValue(format!(
                "tuple arity must be 2 or 3, got {}",
                items.len()
            )));
        }
        if items.iter().any(|i| !i.is_scalar()) {
            return Err(GoalError::InvalidValue(
                "tuple elements must be scalars".to_string(),
            ));
        }
        Ok(ParamValue::Tuple(items))
    }

    /// Build a list whose elements all share one type.
    pub fn list(items: Vec<ParamValue>) -> Result<Self, GoalError> {
        let value = ParamValue::List(items);
        value.validate()?;
        Ok(value)
    }

    /// Check tuple arity and list homogeneity, recursively.
    pub fn validate(&self) -> Result<(), GoalError> {
        match self {
            ParamValue::Tuple(items) => {
                Self::tuple(items.clone())?;
                Ok(())
            }
            ParamValue::List(items) => {
                if let Some(first) = items.first() {
                    let expected = first.value_type();
                    if let Some(odd) = items.iter().find(|i| i.value_type() != expected) {
                        return Err(GoalError::InvalidValue(format!(
                            "list mixes {expected} and {}",
                            odd.value_type()
                        )));
                    }
                }
                items.iter().try_for_each(ParamValue::validate)
            }
            _ => Ok(()),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            ParamValue::Bool(_) => ValueType::Bool,
            ParamValue::Int(_) => ValueType::Int,
            ParamValue::Float(_) => ValueType::Float,
            ParamValue::Str(_) => ValueType::Str,
            ParamValue::Tuple(items) => ValueType::Tuple(items.len()),
            ParamValue::List(_) => ValueType::List,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, ParamValue::Tuple(_) | ParamValue::List(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Type tag used in the `label:value,type` wire rendering.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "str",
            ParamValue::Tuple(_) => "tuple",
            ParamValue::List(_) => "list",
        }
    }

    /// Parse a loosely typed token: `true`/`false`, integers, floats, and
    /// anything else as a string.
    pub fn parse_loose(raw: &str) -> ParamValue {
        let raw = raw.trim();
        match raw.to_lowercase().as_str() {
            "true" => return ParamValue::Bool(true),
            "false" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return ParamValue::Float(f);
        }
        ParamValue::Str(raw.trim_matches('"').to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Tuple(items) | ParamValue::List(items) => {
                let (open, close) = if matches!(self, ParamValue::Tuple(_)) {
                    ("(", ")")
                } else {
                    ("[", "]")
                };
                f.write_str(open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(close)
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Shape of a [`ParamValue`]. A mutable item keeps the shape of its first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Str,
    Tuple(usize),
    List,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int => f.write_str("int"),
            ValueType::Float => f.write_str("float"),
            ValueType::Str => f.write_str("str"),
            ValueType::Tuple(n) => write!(f, "tuple/{n}"),
            ValueType::List => f.write_str("list"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type for stores, automata and the runtime.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GoalError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Ambiguous parameter '{name}': found in stores {stores:?}")]
    AmbiguousParameter { name: String, stores: Vec<StoreKind> },

    #[error("Cyclic dependency on '{name}' via {}", path.join(" -> "))]
    CyclicDependency { name: String, path: Vec<String> },

    #[error("Type mismatch on '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Consistency violation at node {node}: {details}")]
    ConsistencyViolation { node: u32, details: String },

    #[error("Malformed automaton: {0}")]
    MalformedAutomaton(String),

    #[error("Alias '{0}' is already registered")]
    DuplicateAlias(String),

    #[error("Unknown action template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl GoalError {
    /// Only a missing name can clear up later; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, GoalError::UnknownParameter(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_prefixes_are_distinct() {
        let prefixes: Vec<_> = StoreKind::ALL.iter().map(|k| k.prefix()).collect();
        assert_eq!(prefixes, vec!["value_", "literal_", "fluent_", "action_"]);
        assert!(StoreKind::Literal.is_boolean());
        assert!(!StoreKind::Value.is_boolean());
    }

    #[test]
    fn store_kind_parses_plural_and_case() {
        assert_eq!("Fluents".parse::<StoreKind>().unwrap(), StoreKind::Fluent);
        assert!(matches!(
            "widgets".parse::<StoreKind>(),
            Err(GoalError::InvalidValue(_))
        ));
    }

    #[test]
    fn scope_prefix_lowercases_roles() {
        assert_eq!(Scope::Role("Striker".into()).prefix(), "striker_");
        assert_eq!(Scope::Number(4).prefix(), "robot#4_");
    }

    #[test]
    fn tuple_arity_is_checked() {
        assert!(ParamValue::tuple(vec![1.into(), 2.into()]).is_ok());
        assert!(ParamValue::tuple(vec![1.0.into(), 2.0.into(), 0.5.into()]).is_ok());
        assert!(matches!(
            ParamValue::tuple(vec![1.into()]),
            Err(GoalError::InvalidValue(_))
        ));
    }

    #[test]
    fn list_must_be_homogeneous() {
        assert!(ParamValue::list(vec![1.into(), 2.into()]).is_ok());
        assert!(ParamValue::list(vec![]).is_ok());
        assert!(matches!(
            ParamValue::list(vec![1.into(), "two".into()]),
            Err(GoalError::InvalidValue(_))
        ));
    }

    #[test]
    fn value_types_and_widening() {
        let t = ParamValue::tuple(vec![1.0.into(), 2.0.into()]).unwrap();
        assert_eq!(t.value_type(), ValueType::Tuple(2));
        assert_eq!(ParamValue::Int(3).as_float(), Some(3.0));
        assert_eq!(ParamValue::Float(3.0).as_int(), None);
    }

    #[test]
    fn parse_loose_picks_narrowest_type() {
        assert_eq!(ParamValue::parse_loose("TRUE"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse_loose("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::parse_loose("0.25"), ParamValue::Float(0.25));
        assert_eq!(ParamValue::parse_loose("\"goal\""), ParamValue::Str("goal".into()));
    }

    #[test]
    fn untagged_json_roundtrip() {
        let v = ParamValue::list(vec![1.5.into(), 2.5.into()]).unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[1.5,2.5]");
        let back: ParamValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn goal_error_display() {
        let err = GoalError::CyclicDependency {
            name: "value_a".into(),
            path: vec!["value_a".into(), "value_b".into(), "value_a".into()],
        };
        assert!(err.to_string().contains("value_a -> value_b -> value_a"));
        assert!(GoalError::UnknownParameter("x".into()).is_transient());
        assert!(!GoalError::DuplicateAlias("x".into()).is_transient());
    }
}
