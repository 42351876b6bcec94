/// Variable store — the single owner of every variable's current value.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::core::stage;
use crate::schema::stage::StageDescriptor;
use crate::schema::variable::{UpdateType, Variable, VariableType};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("variable not found: {0}")]
    NotFound(String),
    #[error("duplicate variable: {0}")]
    Duplicate(String),
    #[error("snapshot does not match configured variables (missing: {missing:?}, unexpected: {unexpected:?})")]
    SnapshotMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

/// Result of a write: the stored value and what was asked for.
///
/// Clamping is an expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampedValue {
    pub value: f64,
    /// The requested value after rounding, before clamping.
    pub requested: f64,
}

impl ClampedValue {
    pub fn is_clamped(&self) -> bool {
        self.value != self.requested
    }
}

/// Serializable name → value map for callers that persist state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub values: BTreeMap<String, f64>,
}

/// Read-only summary of one variable for reports and prompt building.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    pub value: f64,
    pub var_type: VariableType,
    pub update_type: UpdateType,
    pub pre_update: bool,
    pub initial_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub relative_name: Option<String>,
    pub stage: Option<StageDescriptor>,
}

/// Registry of validated variables in configuration order.
#[derive(Debug, Clone)]
pub struct VariableStore {
    variables: Vec<Variable>,
    index: FxHashMap<String, usize>,
    precision: Option<u32>,
}

impl VariableStore {
    /// Build a store. `precision` is the number of decimal places kept
    /// on every write; `None` keeps full precision.
    pub fn new(variables: Vec<Variable>, precision: Option<u32>) -> Result<Self, StoreError> {
        let mut index = FxHashMap::default();
        for (i, var) in variables.iter().enumerate() {
            if index.insert(var.name.clone(), i).is_some() {
                return Err(StoreError::Duplicate(var.name.clone()));
            }
        }
        Ok(Self {
            variables,
            index,
            precision: precision.map(|p| p.min(MAX_PRECISION)),
        })
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Variables in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn get(&self, name: &str) -> Result<&Variable, StoreError> {
        self.index
            .get(name)
            .map(|&i| &self.variables[i])
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub fn value(&self, name: &str) -> Result<f64, StoreError> {
        self.get(name).map(Variable::current_value)
    }

    /// Write a new value, rounded to the store precision and clamped to
    /// the variable's bounds.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<ClampedValue, StoreError> {
        let precision = self.precision;
        let var = self.get_mut(name)?;
        let requested = round_to(value, precision);
        let stored = requested.clamp(var.min_value, var.max_value);
        if stored != requested {
            debug!(variable = name, requested, stored, "value clamped");
        }
        var.current_value = stored;
        Ok(ClampedValue {
            value: stored,
            requested,
        })
    }

    /// Set the variable back to its reset value.
    pub fn reset(&mut self, name: &str) -> Result<f64, StoreError> {
        let var = self.get_mut(name)?;
        var.current_value = var.reset_value;
        Ok(var.current_value)
    }

    /// Current stage of a variable; `Ok(None)` when it has no stages.
    pub fn stage(&self, name: &str) -> Result<Option<StageDescriptor>, StoreError> {
        self.get(name).map(stage::resolve_variable)
    }

    pub fn info(&self, name: &str) -> Result<VariableInfo, StoreError> {
        let var = self.get(name)?;
        Ok(VariableInfo {
            name: var.name.clone(),
            value: var.current_value(),
            var_type: var.var_type,
            update_type: var.update_type,
            pre_update: var.pre_update,
            initial_value: var.initial_value,
            min_value: var.min_value,
            max_value: var.max_value,
            relative_name: var.relative_name.clone(),
            stage: stage::resolve_variable(var),
        })
    }

    pub fn snapshot(&self) -> ValueSnapshot {
        ValueSnapshot {
            values: self
                .variables
                .iter()
                .map(|v| (v.name.clone(), v.current_value()))
                .collect(),
        }
    }

    /// Load values from a snapshot covering exactly the configured
    /// variables. Values pass through the normal write path.
    pub fn restore(&mut self, snapshot: &ValueSnapshot) -> Result<(), StoreError> {
        let missing: Vec<String> = self
            .variables
            .iter()
            .filter(|v| !snapshot.values.contains_key(&v.name))
            .map(|v| v.name.clone())
            .collect();
        let unexpected: Vec<String> = snapshot
            .values
            .keys()
            .filter(|name| !self.contains(name))
            .cloned()
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(StoreError::SnapshotMismatch { missing, unexpected });
        }
        for (name, value) in &snapshot.values {
            self.set_value(name, *value)?;
        }
        Ok(())
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Variable, StoreError> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.variables[i]),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}

/// Largest number of decimal places the store rounds to.
pub const MAX_PRECISION: u32 = 15;

fn round_to(value: f64, precision: Option<u32>) -> f64 {
    let Some(places) = precision else {
        return value;
    };
    let factor = 10f64.powi(places.min(MAX_PRECISION) as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}
