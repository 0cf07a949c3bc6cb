//! Registry items: constants, mutable terminals, and computed values.
//!
//! A [`Computed`] item wraps a function over other registry items. Its
//! parameter names are declared once at construction; at read time each name
//! is resolved through the cross-store resolver and handed to the function as
//! [`Arguments`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tgoals_types::{GoalError, ParamValue, ValueType};

/// Signature of a computed item's function.
pub type ComputeFn = Arc<dyn Fn(&Arguments) -> Result<ParamValue, GoalError> + Send + Sync>;

/// Resolved parameter values passed to a [`Computed`] function, keyed by the
/// names the item declared.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: BTreeMap<String, ParamValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<&ParamValue, GoalError> {
        self.values
            .get(name)
            .ok_or_else(|| GoalError::UnknownParameter(name.to_string()))
    }

    pub fn bool(&self, name: &str) -> Result<bool, GoalError> {
        let value = self.get(name)?;
        value.as_bool().ok_or_else(|| mismatch(name, "bool", value))
    }

    pub fn int(&self, name: &str) -> Result<i64, GoalError> {
        let value = self.get(name)?;
        value.as_int().ok_or_else(|| mismatch(name, "int", value))
    }

    /// Integers are accepted and widened.
    pub fn float(&self, name: &str) -> Result<f64, GoalError> {
        let value = self.get(name)?;
        value.as_float().ok_or_else(|| mismatch(name, "float", value))
    }

    pub fn str(&self, name: &str) -> Result<&str, GoalError> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| mismatch(name, "str", value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn mismatch(name: &str, expected: &str, found: &ParamValue) -> GoalError {
    GoalError::TypeMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        found: found.value_type().to_string(),
    }
}

/// A value derived on every read from other registry items.
///
/// ```rust
/// use tgoals_registry::Computed;
///
/// let near = Computed::new("ball_near", ["ball_distance"], |args| {
///     Ok((args.float("ball_distance")? < 0.3).into())
/// })
/// .with_default(false);
/// assert_eq!(near.parameters(), ["ball_distance"]);
/// ```
#[derive(Clone)]
pub struct Computed {
    name: String,
    parameters: Vec<String>,
    function: ComputeFn,
    default: Option<ParamValue>,
}

impl Computed {
    pub fn new<I, S, F>(name: impl Into<String>, parameters: I, function: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Arguments) -> Result<ParamValue, GoalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            function: Arc::new(function),
            default: None,
        }
    }

    /// Value returned when a declared parameter cannot be resolved.
    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn default_value(&self) -> Option<&ParamValue> {
        self.default.as_ref()
    }

    pub fn evaluate(&self, args: &Arguments) -> Result<ParamValue, GoalError> {
        (self.function)(args)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

/// One entry of a [`ParameterStore`](crate::ParameterStore).
#[derive(Debug, Clone)]
pub enum RegistryItem {
    /// Fixed at registration. Action skill names live here.
    Constant(ParamValue),
    /// Terminal value whose type is locked by the first write.
    Mutable {
        value: ParamValue,
        established: ValueType,
    },
    Computed(Computed),
}

impl RegistryItem {
    pub fn is_computed(&self) -> bool {
        matches!(self, RegistryItem::Computed(_))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RegistryItem::Constant(_) => "constant",
            RegistryItem::Mutable { .. } => "mutable",
            RegistryItem::Computed(_) => "computed",
        }
    }

    /// Declared parameters of a computed item, empty otherwise.
    pub fn parameters(&self) -> &[String] {
        match self {
            RegistryItem::Computed(c) => c.parameters(),
            _ => &[],
        }
    }
}
