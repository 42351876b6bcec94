use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved stage position of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageValue {
    /// Ladder bucket index.
    Ladder(usize),
    /// One index per enclosing cycle level, outermost first.
    Cycle(Vec<usize>),
}

impl StageValue {
    /// The single scalar constraints compare against. Only ladders have one.
    pub fn ladder_index(&self) -> Option<usize> {
        match self {
            Self::Ladder(idx) => Some(*idx),
            Self::Cycle(_) => None,
        }
    }
}

impl fmt::Display for StageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ladder(idx) => write!(f, "{}", idx),
            Self::Cycle(levels) => {
                let parts: Vec<String> = levels.iter().map(|l| l.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// Labels matching a `StageValue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageDescription {
    Single(String),
    /// Outermost level first, parallel to `StageValue::Cycle`.
    Levels(Vec<String>),
}

impl fmt::Display for StageDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(label) => f.write_str(label),
            Self::Levels(labels) => f.write_str(&labels.join(" ")),
        }
    }
}

/// Stage view of a variable for downstream prompt templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub relative_value: StageValue,
    pub relative_current_description: StageDescription,
}

/// Stage change caused by one applied update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: StageValue,
    pub to: StageValue,
}
