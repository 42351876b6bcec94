/// Stage resolver — ladder buckets and multi-level cycle decomposition.
///
/// Everything here is a pure function of a value and a validated
/// `StageSpec`; nothing reads or writes the variable store.

use crate::schema::stage::{StageDescription, StageDescriptor, StageValue};
use crate::schema::variable::{StageSpec, Variable};

/// Bucket index of `value` against strictly increasing thresholds.
///
/// A value equal to a threshold belongs to the bucket above it, so `k`
/// thresholds yield indices `0..=k`.
pub fn ladder_index(thresholds: &[f64], value: f64) -> usize {
    thresholds.partition_point(|t| *t <= value)
}

/// Decompose `value` (in base units) into one index per enclosing
/// period, outermost first.
///
/// `periods[0]` is the base unit size; each following entry is how many
/// of the previous level make up one of the next. The outermost index
/// wraps modulo its period forever.
pub fn cycle_indices(periods: &[f64], value: f64) -> Vec<usize> {
    let Some((base, levels)) = periods.split_first() else {
        return Vec::new();
    };
    let mut quotient = (value / base).floor() as i64;
    let mut indices = Vec::with_capacity(levels.len());
    for period in levels {
        let period = *period as i64;
        indices.push(quotient.rem_euclid(period) as usize);
        quotient = quotient.div_euclid(period);
    }
    indices.reverse();
    indices
}

/// Stage value and labels for `value` under `spec`.
pub fn resolve(spec: &StageSpec, value: f64) -> StageDescriptor {
    match spec {
        StageSpec::Ladder {
            thresholds,
            descriptions,
        } => {
            let idx = ladder_index(thresholds, value);
            StageDescriptor {
                relative_value: StageValue::Ladder(idx),
                relative_current_description: StageDescription::Single(label(descriptions, idx)),
            }
        }
        StageSpec::Cycle { periods, levels } => {
            let indices = cycle_indices(periods, value);
            // `levels` is innermost first while `indices` is outermost first
            let labels = indices
                .iter()
                .zip(levels.iter().rev())
                .map(|(idx, names)| label(names, *idx))
                .collect();
            StageDescriptor {
                relative_value: StageValue::Cycle(indices),
                relative_current_description: StageDescription::Levels(labels),
            }
        }
    }
}

/// Stage descriptor for a variable's current value; `None` for variables
/// without stages.
pub fn resolve_variable(variable: &Variable) -> Option<StageDescriptor> {
    variable
        .stage
        .as_ref()
        .map(|spec| resolve(spec, variable.current_value()))
}

fn label(names: &[String], idx: usize) -> String {
    // Validated specs always have a label; hand-built ones may not.
    names
        .get(idx)
        .cloned()
        .unwrap_or_else(|| format!("stage {}", idx))
}
