/// Constraint evaluator — AND/OR range tests over other variables' stages.
///
/// Update constraints read the ladder index of other variables. Batches
/// evaluate them against a `StageSnapshot` captured before any variable
/// in the batch changes, so results never depend on processing order.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::core::stage;
use crate::core::store::VariableStore;
use crate::schema::constraint::{
    ConstraintExpr, ConstraintNode, RangeTest, RawBranch, RawConstraintItem, RawTest,
};
use crate::schema::number::ConfigNumber;
use crate::schema::variable::Variable;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConstraintError {
    #[error("constraint references undefined variable '{0}'")]
    UnresolvedVariable(String),
    #[error("constraint references cycle-staged variable '{0}'; only ladder stages can be compared")]
    CycleReference(String),
    #[error("constraint references variable '{0}', which has no stages")]
    Unstaged(String),
    #[error("malformed constraint {test}: {reason}")]
    Malformed { test: String, reason: String },
}

/// Source of stage scalars for constraint evaluation.
pub trait StageLookup {
    /// Ladder index of `name` as a float, or why it cannot be compared.
    fn stage_scalar(&self, name: &str) -> Result<f64, ConstraintError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotEntry {
    Ladder(usize),
    Cycle,
    Unstaged,
}

impl SnapshotEntry {
    fn of(variable: &Variable) -> Self {
        match stage::resolve_variable(variable) {
            Some(d) => d.relative_value.ladder_index().map_or(Self::Cycle, Self::Ladder),
            None => Self::Unstaged,
        }
    }

    fn scalar(self, name: &str) -> Result<f64, ConstraintError> {
        match self {
            Self::Ladder(idx) => Ok(idx as f64),
            Self::Cycle => Err(ConstraintError::CycleReference(name.to_string())),
            Self::Unstaged => Err(ConstraintError::Unstaged(name.to_string())),
        }
    }
}

/// Immutable view of every variable's stage at one instant.
#[derive(Debug, Clone, Default)]
pub struct StageSnapshot {
    entries: FxHashMap<String, SnapshotEntry>,
}

impl StageSnapshot {
    pub fn capture<'a>(variables: impl IntoIterator<Item = &'a Variable>) -> Self {
        Self {
            entries: variables
                .into_iter()
                .map(|v| (v.name.clone(), SnapshotEntry::of(v)))
                .collect(),
        }
    }
}

impl StageLookup for StageSnapshot {
    fn stage_scalar(&self, name: &str) -> Result<f64, ConstraintError> {
        self.entries
            .get(name)
            .ok_or_else(|| ConstraintError::UnresolvedVariable(name.to_string()))?
            .scalar(name)
    }
}

impl StageLookup for VariableStore {
    fn stage_scalar(&self, name: &str) -> Result<f64, ConstraintError> {
        let variable = self
            .get(name)
            .map_err(|_| ConstraintError::UnresolvedVariable(name.to_string()))?;
        SnapshotEntry::of(variable).scalar(name)
    }
}

/// Evaluate a constraint. Every reference is resolved even after a test
/// has failed, so a bad reference always surfaces as an error.
pub fn evaluate<L: StageLookup + ?Sized>(expr: &ConstraintExpr, lookup: &L) -> Result<bool, ConstraintError> {
    let mut pass = true;
    for node in &expr.nodes {
        let node_pass = match node {
            ConstraintNode::Test(test) => check(test, lookup)?,
            ConstraintNode::Or(branches) => {
                let mut any = false;
                for branch in branches {
                    any |= all_pass(branch, lookup)?;
                }
                any
            }
        };
        pass &= node_pass;
    }
    Ok(pass)
}

fn all_pass<L: StageLookup + ?Sized>(tests: &[RangeTest], lookup: &L) -> Result<bool, ConstraintError> {
    let mut pass = true;
    for test in tests {
        pass &= check(test, lookup)?;
    }
    Ok(pass)
}

fn check<L: StageLookup + ?Sized>(test: &RangeTest, lookup: &L) -> Result<bool, ConstraintError> {
    Ok(test.admits(lookup.stage_scalar(&test.variable)?))
}

/// Parse the written form of an update constraint.
pub fn parse(items: &[RawConstraintItem]) -> Result<ConstraintExpr, ConstraintError> {
    let mut nodes = Vec::with_capacity(items.len());
    for item in items {
        let node = match item {
            RawConstraintItem::Test(raw) => ConstraintNode::Test(parse_test(raw)?),
            RawConstraintItem::Or { or } => {
                if or.is_empty() {
                    return Err(ConstraintError::Malformed {
                        test: "{\"or\": []}".to_string(),
                        reason: "or-group needs at least one branch".to_string(),
                    });
                }
                let mut branches = Vec::with_capacity(or.len());
                for branch in or {
                    branches.push(match branch {
                        RawBranch::Test(raw) => vec![parse_test(raw)?],
                        RawBranch::All(raws) => raws.iter().map(parse_test).collect::<Result<Vec<_>, _>>()?,
                    });
                }
                ConstraintNode::Or(branches)
            }
        };
        nodes.push(node);
    }
    Ok(ConstraintExpr::new(nodes))
}

fn parse_test(raw: &RawTest) -> Result<RangeTest, ConstraintError> {
    let malformed = |reason: &str| ConstraintError::Malformed {
        test: render_raw(raw),
        reason: reason.to_string(),
    };
    match raw.as_slice() {
        [lower, name, upper] => {
            let name = as_name(name).ok_or_else(|| malformed("middle element must be a variable name"))?;
            let lower = as_bound(lower).ok_or_else(|| malformed("lower bound must be numeric"))?;
            let upper = as_bound(upper).ok_or_else(|| malformed("upper bound must be numeric"))?;
            Ok(RangeTest::new(Some(lower), name, Some(upper)))
        }
        [first, second] => match (as_name(first), as_name(second)) {
            (Some(name), None) => {
                let upper = as_bound(second).ok_or_else(|| malformed("upper bound must be numeric"))?;
                Ok(RangeTest::new(None, name, Some(upper)))
            }
            (None, Some(name)) => {
                let lower = as_bound(first).ok_or_else(|| malformed("lower bound must be numeric"))?;
                Ok(RangeTest::new(Some(lower), name, None))
            }
            _ => Err(malformed("expected [lower, \"name\"] or [\"name\", upper]")),
        },
        _ => Err(malformed("expected 2 or 3 elements")),
    }
}

/// Text that is not a number or sentinel names a variable.
fn as_name(term: &ConfigNumber) -> Option<&str> {
    match term {
        ConfigNumber::Text(text) if term.to_f64().is_none() => Some(text.as_str()),
        _ => None,
    }
}

fn as_bound(term: &ConfigNumber) -> Option<f64> {
    term.to_f64()
}

fn render_raw(raw: &RawTest) -> String {
    let parts: Vec<String> = raw
        .iter()
        .map(|term| match term {
            ConfigNumber::Number(n) => n.to_string(),
            ConfigNumber::Text(t) => format!("\"{}\"", t),
        })
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Find a chain of two or more variables whose constraints read each
/// other's stages. Self references are allowed: they read the pre-cycle
/// value and need no ordering.
///
/// Returns the chain with its first name repeated at the end.
pub fn find_circular_dependency(variables: &[Variable]) -> Option<Vec<String>> {
    let index: FxHashMap<&str, usize> = variables
        .iter()
        .enumerate()
        .map(|(i, v)| (v.name.as_str(), i))
        .collect();
    let edges: Vec<Vec<usize>> = variables
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let mut out: Vec<usize> = v
                .update_constraint
                .iter()
                .flat_map(|expr| expr.references())
                .filter_map(|name| index.get(name).copied())
                .filter(|&j| j != i)
                .collect();
            out.dedup();
            out
        })
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    fn visit(node: usize, edges: &[Vec<usize>], marks: &mut [Mark], stack: &mut Vec<usize>) -> Option<Vec<usize>> {
        marks[node] = Mark::OnStack;
        stack.push(node);
        for &next in &edges[node] {
            match marks[next] {
                Mark::OnStack => {
                    let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(next, edges, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; variables.len()];
    let mut stack = Vec::new();
    for start in 0..variables.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(cycle) = visit(start, &edges, &mut marks, &mut stack) {
                return Some(cycle.into_iter().map(|i| variables[i].name.clone()).collect());
            }
        }
    }
    None
}
