use serde::{Deserialize, Serialize};
use std::fmt;

use super::number::ConfigNumber;

/// Open-interval test on another variable's stage scalar.
///
/// Written as `[lower, "name", upper]`, `[lower, "name"]` or
/// `["name", upper]`. All comparisons are strict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTest {
    pub lower: Option<f64>,
    pub variable: String,
    pub upper: Option<f64>,
}

impl RangeTest {
    pub fn new(lower: Option<f64>, variable: impl Into<String>, upper: Option<f64>) -> Self {
        Self {
            lower,
            variable: variable.into(),
            upper,
        }
    }

    pub fn admits(&self, scalar: f64) -> bool {
        self.lower.map_or(true, |lo| lo < scalar) && self.upper.map_or(true, |hi| scalar < hi)
    }
}

impl fmt::Display for RangeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(lo) = self.lower {
            write!(f, "{} < ", lo)?;
        }
        f.write_str(&self.variable)?;
        if let Some(hi) = self.upper {
            write!(f, " < {}", hi)?;
        }
        Ok(())
    }
}

/// One element of a top-level constraint list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintNode {
    Test(RangeTest),
    /// Passes when any branch passes; each branch is an AND-list.
    Or(Vec<Vec<RangeTest>>),
}

/// A parsed update constraint: every node must pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConstraintExpr {
    pub nodes: Vec<ConstraintNode>,
}

impl ConstraintExpr {
    pub fn new(nodes: Vec<ConstraintNode>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every range test in the expression, in declaration order.
    pub fn tests(&self) -> Vec<&RangeTest> {
        let mut out = Vec::new();
        for node in &self.nodes {
            match node {
                ConstraintNode::Test(test) => out.push(test),
                ConstraintNode::Or(branches) => out.extend(branches.iter().flatten()),
            }
        }
        out
    }

    /// Names of all variables the expression reads.
    pub fn references(&self) -> Vec<&str> {
        self.tests().into_iter().map(|t| t.variable.as_str()).collect()
    }
}

/// An atomic test as written: two or three numbers / names.
pub type RawTest = Vec<ConfigNumber>;

/// A constraint element as written in the variables document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawConstraintItem {
    Or { or: Vec<RawBranch> },
    Test(RawTest),
}

/// A branch of an OR-group: either a list of tests or a single test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBranch {
    All(Vec<RawTest>),
    Test(RawTest),
}
