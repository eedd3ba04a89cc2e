//! Parameter - Desired-state reconciliation of name/value parameter sets
//!
//! Given the parameters last applied to a configuration resource and the
//! parameters now desired, [`reconcile`] computes which parameters have to be
//! reset to their defaults and which have to be written.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameter the remote API refuses to reset.
///
/// `reconcile` still reports it in `to_remove`; callers decide how to
/// converge it (see the parameter group handler).
pub const RESERVED_MEMORY_PARAMETER: &str = "reserved-memory";

/// Sibling of [`RESERVED_MEMORY_PARAMETER`] that can be reset normally
pub const RESERVED_MEMORY_PERCENT_PARAMETER: &str = "reserved-memory-percent";

/// A single name/value pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("Parameter '{name}' is declared with conflicting values '{first}' and '{second}'")]
    Conflict {
        name: String,
        first: String,
        second: String,
    },
}

/// Parameters attached to a configuration resource, unique by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, rejecting a name declared twice with different values
    pub fn from_parameters(
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self, ParameterError> {
        let mut set = Self::new();
        for parameter in parameters {
            set.insert(parameter)?;
        }
        Ok(set)
    }

    /// Add a parameter. Re-inserting an identical parameter is a no-op.
    pub fn insert(&mut self, parameter: Parameter) -> Result<(), ParameterError> {
        match self.values.get(&parameter.name) {
            Some(existing) if *existing != parameter.value => Err(ParameterError::Conflict {
                name: parameter.name,
                first: existing.clone(),
                second: parameter.value,
            }),
            Some(_) => Ok(()),
            None => {
                self.values.insert(parameter.name, parameter.value);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, parameter: &Parameter) -> bool {
        self.get(&parameter.name) == Some(parameter.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn to_vec(&self) -> Vec<Parameter> {
        self.iter().map(|(n, v)| Parameter::new(n, v)).collect()
    }
}

/// Operations needed to move a parameter set from old to new
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Present in old, absent by name from new (carrying the old value)
    pub to_remove: Vec<Parameter>,
    /// Present in new and absent or different-valued in old
    pub to_add_or_update: Vec<Parameter>,
}

impl ReconciliationResult {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add_or_update.is_empty()
    }
}

/// Compute the minimal remove and add-or-update lists to converge `old` on `new`.
///
/// A value change is reported only as an update, never as remove-then-add.
/// Both lists are ordered by name.
pub fn reconcile(old: &ParameterSet, new: &ParameterSet) -> ReconciliationResult {
    let to_remove = old
        .iter()
        .filter(|(name, _)| new.get(name).is_none())
        .map(|(name, value)| Parameter::new(name, value))
        .collect();

    let to_add_or_update = new
        .iter()
        .filter(|(name, value)| old.get(name) != Some(*value))
        .map(|(name, value)| Parameter::new(name, value))
        .collect();

    ReconciliationResult {
        to_remove,
        to_add_or_update,
    }
}
