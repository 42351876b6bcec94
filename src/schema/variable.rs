use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::constraint::ConstraintExpr;
use super::keyword::KeywordGroup;

/// Whether a variable only records a number or also exposes stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Record,
    StageIndependent,
}

/// How the text of a cycle drives a variable's delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Every keyword occurrence draws one delta.
    KeywordCount,
    /// Each matching group draws one delta, however often it matched.
    KeywordAppear,
    /// Judged by an external language model; never applied here.
    LlmFuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetType {
    #[default]
    None,
    Keyword,
    /// Judged by an external language model; never applied here.
    Llm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeMethod {
    Ladder,
    Cycle,
}

/// Error returned when an enum name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub value: String,
    pub expected: &'static [&'static str],
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' (expected one of: {})", self.value, self.expected.join(", "))
    }
}

impl std::error::Error for UnknownVariant {}

/// Implements `FromStr` and `Display` for a config enum. Names match
/// case-insensitively, so both `keyword_count` and `KEYWORD_COUNT` work.
macro_rules! config_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const NAMES: &'static [&'static str] = &[$($name),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        value: s.to_string(),
                        expected: Self::NAMES,
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

config_enum!(VariableType {
    Record => "record",
    StageIndependent => "stage_independent",
});

config_enum!(UpdateType {
    KeywordCount => "keyword_count",
    KeywordAppear => "keyword_appear",
    LlmFuzzy => "llm_fuzzy",
});

config_enum!(ResetType {
    None => "none",
    Keyword => "keyword",
    Llm => "llm",
});

config_enum!(RelativeMethod {
    Ladder => "ladder",
    Cycle => "cycle",
});

/// Validated stage configuration of a `stage_independent` variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageSpec {
    /// `k` strictly increasing thresholds split the range into `k + 1`
    /// buckets, one description each.
    Ladder {
        thresholds: Vec<f64>,
        descriptions: Vec<String>,
    },
    /// Base unit first, then each enclosing period. `levels[i]` labels
    /// the indices of `periods[i + 1]`, innermost level first.
    Cycle {
        periods: Vec<f64>,
        levels: Vec<Vec<String>>,
    },
}

impl StageSpec {
    pub fn method(&self) -> RelativeMethod {
        match self {
            Self::Ladder { .. } => RelativeMethod::Ladder,
            Self::Cycle { .. } => RelativeMethod::Cycle,
        }
    }
}

/// A fully validated variable. Built once by the config loader and owned
/// by the variable store for the rest of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub var_type: VariableType,
    pub update_type: UpdateType,
    pub pre_update: bool,
    pub initial_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub reset_type: ResetType,
    pub reset_value: f64,
    pub update_constraint: Option<ConstraintExpr>,
    pub keyword_groups: Vec<KeywordGroup>,
    /// Case-folded reset keywords; empty unless `reset_type` is keyword.
    pub reset_keywords: Vec<String>,
    /// Label the stage is published under; defaults to `name`.
    pub relative_name: Option<String>,
    pub stage: Option<StageSpec>,
    pub(crate) current_value: f64,
}

impl Variable {
    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    /// Name the stage descriptor is published under.
    pub fn stage_label(&self) -> &str {
        self.relative_name.as_deref().unwrap_or(&self.name)
    }

    pub fn has_keyword_reset(&self) -> bool {
        self.reset_type == ResetType::Keyword && !self.reset_keywords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_value_or_name() {
        assert_eq!("keyword_count".parse::<UpdateType>(), Ok(UpdateType::KeywordCount));
        assert_eq!("KEYWORD_APPEAR".parse::<UpdateType>(), Ok(UpdateType::KeywordAppear));
        assert_eq!(" Stage_Independent ".parse::<VariableType>(), Ok(VariableType::StageIndependent));
        assert_eq!("CYCLE".parse::<RelativeMethod>(), Ok(RelativeMethod::Cycle));
        assert_eq!("llm".parse::<ResetType>(), Ok(ResetType::Llm));
    }

    #[test]
    fn unknown_enum_lists_expected_names() {
        let err = "spiral".parse::<RelativeMethod>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("spiral"));
        assert!(msg.contains("ladder, cycle"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for t in [UpdateType::KeywordCount, UpdateType::KeywordAppear, UpdateType::LlmFuzzy] {
            assert_eq!(t.to_string().parse::<UpdateType>(), Ok(t));
        }
    }

    #[test]
    fn stage_label_falls_back_to_name() {
        let mut var = Variable {
            name: "affection".to_string(),
            var_type: VariableType::Record,
            update_type: UpdateType::KeywordCount,
            pre_update: true,
            initial_value: 0.0,
            min_value: 0.0,
            max_value: 100.0,
            reset_type: ResetType::None,
            reset_value: 0.0,
            update_constraint: None,
            keyword_groups: Vec::new(),
            reset_keywords: Vec::new(),
            relative_name: None,
            stage: None,
            current_value: 0.0,
        };
        assert_eq!(var.stage_label(), "affection");
        var.relative_name = Some("relationship".to_string());
        assert_eq!(var.stage_label(), "relationship");
    }
}
