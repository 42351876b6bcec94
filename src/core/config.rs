/// Configuration loading and validation.
///
/// Turns the declarative variables document and keyword document into
/// validated `Variable`s. Every problem is reported with the variable
/// and field it came from; nothing is silently defaulted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::constraint::{self, ConstraintError, StageLookup, StageSnapshot};
use crate::core::sampler;
use crate::schema::constraint::RawConstraintItem;
use crate::schema::keyword::{classify_section_key, KeywordGroup, KeywordSection, SectionKind};
use crate::schema::number::ConfigNumber;
use crate::schema::variable::{
    RelativeMethod, ResetType, StageSpec, UnknownVariant, UpdateType, Variable, VariableType,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("variable record has an empty name")]
    EmptyName,
    #[error("duplicate variable name: {0}")]
    DuplicateName(String),
    #[error("variable '{variable}': field '{field}' is not a valid value: {source}")]
    UnknownVariant {
        variable: String,
        field: &'static str,
        source: UnknownVariant,
    },
    #[error("variable '{variable}': field '{field}' is required")]
    MissingField {
        variable: String,
        field: &'static str,
    },
    #[error("{context}: '{value}' is not numeric")]
    NonNumeric { context: String, value: String },
    #[error("{context}: value {value} must be finite")]
    NonFinite { context: String, value: f64 },
    #[error("malformed range for {context}: [{min}, {max}]")]
    MalformedRange { context: String, min: f64, max: f64 },
    #[error("variable '{variable}': {field} {value} lies outside [{min}, {max}]")]
    OutOfBounds {
        variable: String,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("variable '{variable}': ladder thresholds must be finite and strictly increasing")]
    ThresholdOrder { variable: String },
    #[error("variable '{variable}': {context} needs {expected} descriptions, found {found}")]
    DescriptionCount {
        variable: String,
        context: String,
        expected: usize,
        found: usize,
    },
    #[error("variable '{variable}': cycle has {expected} levels but {found} label lists; levels cannot be skipped")]
    MissingCycleLevel {
        variable: String,
        expected: usize,
        found: usize,
    },
    #[error("variable '{variable}': cycle period #{index} ({value}) must be {requirement}")]
    InvalidPeriod {
        variable: String,
        index: usize,
        value: f64,
        requirement: &'static str,
    },
    #[error("variable '{variable}': group '{group}' contains an empty keyword")]
    EmptyKeyword { variable: String, group: String },
    #[error("keyword section '{0}' does not belong to any configured variable")]
    UnknownKeywordTarget(String),
    #[error("keyword section '{key}' has the wrong shape (expected {expected})")]
    SectionShape { key: String, expected: &'static str },
    #[error("variable '{0}' uses keyword resets but has no reset keywords")]
    MissingResetKeywords(String),
    #[error("variable '{variable}': invalid update constraint: {source}")]
    InvalidConstraint {
        variable: String,
        source: ConstraintError,
    },
    #[error("circular update constraints: {}", .0.join(" -> "))]
    CircularConstraint(Vec<String>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// One variable as written in the variables document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub var_type: String,
    pub update_type: String,
    #[serde(default = "default_pre_update")]
    pub pre_update: bool,
    #[serde(default)]
    pub initial_value: Option<ConfigNumber>,
    #[serde(default)]
    pub min_value: Option<ConfigNumber>,
    #[serde(default)]
    pub max_value: Option<ConfigNumber>,
    #[serde(default)]
    pub update_constraint: Option<Vec<RawConstraintItem>>,
    #[serde(default)]
    pub reset_type: Option<String>,
    #[serde(default)]
    pub reset_value: Option<ConfigNumber>,
    #[serde(default)]
    pub relative_name: Option<String>,
    #[serde(default)]
    pub relative_method: Option<String>,
    #[serde(default)]
    pub relative_stage_config: Option<Vec<ConfigNumber>>,
    #[serde(default)]
    pub relative_description: Option<RawDescriptions>,
}

fn default_pre_update() -> bool {
    true
}

/// Stage labels: a flat list for ladders, nested lists for cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDescriptions {
    Flat(Vec<String>),
    Nested(Vec<Vec<String>>),
}

/// The variables document: a bare list or `{ "variables": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariablesDocument {
    List(Vec<VariableRecord>),
    Wrapped { variables: Vec<VariableRecord> },
}

impl VariablesDocument {
    pub fn into_records(self) -> Vec<VariableRecord> {
        match self {
            Self::List(records) | Self::Wrapped { variables: records } => records,
        }
    }
}

/// Unvalidated engine configuration: variable records plus the keyword
/// document keyed by `<name>_keywords` / `<name>_reset`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub variables: Vec<VariableRecord>,
    #[serde(default)]
    pub keywords: BTreeMap<String, KeywordSection>,
}

impl EngineConfig {
    /// Parse both documents from JSON text.
    pub fn from_json(variables: &str, keywords: &str) -> Result<Self, ConfigError> {
        let doc: VariablesDocument = serde_json::from_str(variables)?;
        Ok(Self {
            variables: doc.into_records(),
            keywords: serde_json::from_str(keywords)?,
        })
    }

    /// Parse both documents from RON text.
    pub fn from_ron(variables: &str, keywords: &str) -> Result<Self, ConfigError> {
        let doc: VariablesDocument = ron::from_str(variables)?;
        Ok(Self {
            variables: doc.into_records(),
            keywords: ron::from_str(keywords)?,
        })
    }

    /// Load both documents from files; `.ron` files are read as RON,
    /// everything else as JSON.
    pub fn load(variables_path: &Path, keywords_path: &Path) -> Result<Self, ConfigError> {
        let variables = std::fs::read_to_string(variables_path)?;
        let keywords = std::fs::read_to_string(keywords_path)?;
        let doc: VariablesDocument = if is_ron(variables_path) {
            ron::from_str(&variables)?
        } else {
            serde_json::from_str(&variables)?
        };
        let keywords = if is_ron(keywords_path) {
            ron::from_str(&keywords)?
        } else {
            serde_json::from_str(&keywords)?
        };
        Ok(Self {
            variables: doc.into_records(),
            keywords,
        })
    }

    /// Validate every record and attach keyword groups, reset rules and
    /// constraints. Variables keep their document order.
    pub fn validate(&self) -> Result<Vec<Variable>, ConfigError> {
        let mut seen = HashSet::new();
        let mut variables = Vec::with_capacity(self.variables.len());
        for record in &self.variables {
            let var = build_variable(record)?;
            if !seen.insert(var.name.clone()) {
                return Err(ConfigError::DuplicateName(var.name));
            }
            variables.push(var);
        }

        self.attach_keywords(&mut variables)?;

        // Constraints are resolved after every variable exists so that
        // records may reference variables declared later.
        for (i, record) in self.variables.iter().enumerate() {
            if let Some(raw) = &record.update_constraint {
                let expr = constraint::parse(raw).map_err(|source| ConfigError::InvalidConstraint {
                    variable: record.name.clone(),
                    source,
                })?;
                variables[i].update_constraint = (!expr.is_empty()).then_some(expr);
            }
        }
        let shapes = StageSnapshot::capture(&variables);
        for var in &variables {
            if let Some(expr) = &var.update_constraint {
                for name in expr.references() {
                    shapes
                        .stage_scalar(name)
                        .map_err(|source| ConfigError::InvalidConstraint {
                            variable: var.name.clone(),
                            source,
                        })?;
                }
            }
        }
        if let Some(chain) = constraint::find_circular_dependency(&variables) {
            return Err(ConfigError::CircularConstraint(chain));
        }

        for var in &variables {
            if var.keyword_groups.is_empty() && var.update_type != UpdateType::LlmFuzzy {
                warn!(variable = %var.name, "keyword-driven variable has no keyword groups");
            }
            if var.reset_type == ResetType::Keyword && var.reset_keywords.is_empty() {
                return Err(ConfigError::MissingResetKeywords(var.name.clone()));
            }
        }
        debug!(count = variables.len(), "validated variable configuration");
        Ok(variables)
    }

    fn attach_keywords(&self, variables: &mut [Variable]) -> Result<(), ConfigError> {
        for (key, section) in &self.keywords {
            let kind = classify_section_key(key)
                .ok_or_else(|| ConfigError::UnknownKeywordTarget(key.clone()))?;
            let name = match kind {
                SectionKind::Update(name) | SectionKind::Reset(name) => name,
            };
            let var = variables
                .iter_mut()
                .find(|v| v.name == name)
                .ok_or_else(|| ConfigError::UnknownKeywordTarget(key.clone()))?;
            match (kind, section) {
                (SectionKind::Update(_), KeywordSection::Groups(groups)) => {
                    for (group_name, raw) in groups {
                        let context = format!("variable '{}' group '{}'", var.name, group_name);
                        let min_value = number(&context, "min_value", &raw.min_value)?;
                        let max_value = number(&context, "max_value", &raw.max_value)?;
                        sampler::check_range(&context, min_value, max_value)?;
                        let keywords = fold_keywords(&raw.keywords).ok_or_else(|| ConfigError::EmptyKeyword {
                            variable: var.name.clone(),
                            group: group_name.clone(),
                        })?;
                        var.keyword_groups.push(KeywordGroup {
                            name: group_name.clone(),
                            keywords,
                            min_value,
                            max_value,
                        });
                    }
                }
                (SectionKind::Reset(_), KeywordSection::Reset(rule)) => {
                    var.reset_keywords = fold_keywords(&rule.keywords).ok_or_else(|| ConfigError::EmptyKeyword {
                        variable: var.name.clone(),
                        group: key.clone(),
                    })?;
                }
                // an empty object parses as an empty group map
                (SectionKind::Reset(_), KeywordSection::Groups(groups)) if groups.is_empty() => {}
                (SectionKind::Update(_), _) => {
                    return Err(ConfigError::SectionShape {
                        key: key.clone(),
                        expected: "a map of keyword groups",
                    })
                }
                (SectionKind::Reset(_), _) => {
                    return Err(ConfigError::SectionShape {
                        key: key.clone(),
                        expected: "{ keywords: [...] }",
                    })
                }
            }
        }
        Ok(())
    }
}

fn is_ron(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("ron")
}

/// Case-fold keywords; `None` if any keyword is blank.
fn fold_keywords(raw: &[String]) -> Option<Vec<String>> {
    raw.iter()
        .map(|k| (!k.trim().is_empty()).then(|| k.to_lowercase()))
        .collect()
}

fn number(context: &str, field: &str, raw: &ConfigNumber) -> Result<f64, ConfigError> {
    raw.to_f64().ok_or_else(|| ConfigError::NonNumeric {
        context: format!("{} field '{}'", context, field),
        value: match raw {
            ConfigNumber::Number(n) => n.to_string(),
            ConfigNumber::Text(t) => t.clone(),
        },
    })
}

fn optional_number(name: &str, field: &str, raw: &Option<ConfigNumber>, default: f64) -> Result<f64, ConfigError> {
    match raw {
        Some(raw) => number(&format!("variable '{}'", name), field, raw),
        None => Ok(default),
    }
}

fn parse_enum<T>(name: &str, field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = UnknownVariant>,
{
    raw.parse().map_err(|source| ConfigError::UnknownVariant {
        variable: name.to_string(),
        field,
        source,
    })
}

/// Empty or whitespace-only optional strings count as absent.
fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn build_variable(record: &VariableRecord) -> Result<Variable, ConfigError> {
    let name = record.name.trim();
    if name.is_empty() {
        return Err(ConfigError::EmptyName);
    }
    let var_type: VariableType = parse_enum(name, "var_type", &record.var_type)?;
    let update_type: UpdateType = parse_enum(name, "update_type", &record.update_type)?;
    let reset_type = match present(&record.reset_type) {
        Some(raw) => parse_enum(name, "reset_type", raw)?,
        None => ResetType::None,
    };

    let min_value = optional_number(name, "min_value", &record.min_value, f64::NEG_INFINITY)?;
    let max_value = optional_number(name, "max_value", &record.max_value, f64::INFINITY)?;
    if min_value.is_nan() || max_value.is_nan() || min_value >= max_value {
        return Err(ConfigError::MalformedRange {
            context: format!("variable '{}'", name),
            min: min_value,
            max: max_value,
        });
    }
    let initial_value = optional_number(name, "initial_value", &record.initial_value, 0.0)?;
    let reset_value = optional_number(name, "reset_value", &record.reset_value, 0.0)?;
    for (field, value) in [("initial_value", initial_value), ("reset_value", reset_value)] {
        if !value.is_finite() {
            return Err(ConfigError::NonFinite {
                context: format!("variable '{}' field '{}'", name, field),
                value,
            });
        }
        // reset values of variables that never reset are unused
        if field == "reset_value" && reset_type == ResetType::None {
            continue;
        }
        if value < min_value || value > max_value {
            return Err(ConfigError::OutOfBounds {
                variable: name.to_string(),
                field,
                value,
                min: min_value,
                max: max_value,
            });
        }
    }

    let (stage, relative_name) = match var_type {
        VariableType::StageIndependent => (Some(build_stage(name, record)?), present(&record.relative_name).map(str::to_string)),
        VariableType::Record => (None, None),
    };

    Ok(Variable {
        name: name.to_string(),
        var_type,
        update_type,
        pre_update: record.pre_update,
        initial_value,
        min_value,
        max_value,
        reset_type,
        reset_value,
        update_constraint: None,
        keyword_groups: Vec::new(),
        reset_keywords: Vec::new(),
        relative_name,
        stage,
        current_value: initial_value,
    })
}

fn build_stage(name: &str, record: &VariableRecord) -> Result<StageSpec, ConfigError> {
    let missing = |field| ConfigError::MissingField {
        variable: name.to_string(),
        field,
    };
    let method: RelativeMethod = parse_enum(
        name,
        "relative_method",
        present(&record.relative_method).ok_or_else(|| missing("relative_method"))?,
    )?;
    let raw_config = record
        .relative_stage_config
        .as_ref()
        .ok_or_else(|| missing("relative_stage_config"))?;
    let context = format!("variable '{}'", name);
    let config = raw_config
        .iter()
        .map(|raw| number(&context, "relative_stage_config", raw))
        .collect::<Result<Vec<f64>, _>>()?;
    let descriptions = record
        .relative_description
        .as_ref()
        .ok_or_else(|| missing("relative_description"))?;

    match method {
        RelativeMethod::Ladder => {
            if config.is_empty() {
                return Err(missing("relative_stage_config"));
            }
            let increasing = config.iter().all(|t| t.is_finite()) && config.windows(2).all(|w| w[0] < w[1]);
            if !increasing {
                return Err(ConfigError::ThresholdOrder {
                    variable: name.to_string(),
                });
            }
            let labels = match descriptions {
                RawDescriptions::Flat(labels) => labels.clone(),
                // a single nested list is accepted for ladders
                RawDescriptions::Nested(levels) if levels.len() == 1 => levels[0].clone(),
                RawDescriptions::Nested(levels) => {
                    return Err(ConfigError::DescriptionCount {
                        variable: name.to_string(),
                        context: "ladder description lists".to_string(),
                        expected: 1,
                        found: levels.len(),
                    })
                }
            };
            if labels.len() != config.len() + 1 {
                return Err(ConfigError::DescriptionCount {
                    variable: name.to_string(),
                    context: format!("{} thresholds", config.len()),
                    expected: config.len() + 1,
                    found: labels.len(),
                });
            }
            Ok(StageSpec::Ladder {
                thresholds: config,
                descriptions: labels,
            })
        }
        RelativeMethod::Cycle => {
            if config.len() < 2 {
                return Err(ConfigError::MissingCycleLevel {
                    variable: name.to_string(),
                    expected: 1,
                    found: 0,
                });
            }
            for (index, &value) in config.iter().enumerate() {
                let valid_size = value.is_finite() && value > 0.0;
                // enclosing levels count whole units of the level below
                let whole = index == 0 || (value.fract() == 0.0 && value >= 1.0);
                if !valid_size || !whole {
                    return Err(ConfigError::InvalidPeriod {
                        variable: name.to_string(),
                        index,
                        value,
                        requirement: if index == 0 {
                            "a positive finite number"
                        } else {
                            "a positive whole number"
                        },
                    });
                }
            }
            let levels = match descriptions {
                RawDescriptions::Nested(levels) => levels.clone(),
                RawDescriptions::Flat(labels) => vec![labels.clone()],
            };
            let expected_levels = config.len() - 1;
            if levels.len() != expected_levels {
                return Err(ConfigError::MissingCycleLevel {
                    variable: name.to_string(),
                    expected: expected_levels,
                    found: levels.len(),
                });
            }
            for (level, labels) in levels.iter().enumerate() {
                let period = config[level + 1] as usize;
                if labels.len() != period {
                    return Err(ConfigError::DescriptionCount {
                        variable: name.to_string(),
                        context: format!("cycle level {} (period {})", level, period),
                        expected: period,
                        found: labels.len(),
                    });
                }
            }
            Ok(StageSpec::Cycle {
                periods: config,
                levels,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::constraint::{ConstraintNode, RangeTest};

    fn validate(vars: &str, keywords: &str) -> Result<Vec<Variable>, ConfigError> {
        EngineConfig::from_json(vars, keywords)?.validate()
    }

    const AFFECTION: &str = r#"{
        "name": "affection", "var_type": "stage_independent", "update_type": "keyword_appear",
        "initial_value": 0, "min_value": 0, "max_value": 100,
        "relative_method": "ladder", "relative_stage_config": [20, 50],
        "relative_description": ["stranger", "familiar", "close"]
    }"#;

    #[test]
    fn minimal_record_uses_defaults() {
        let vars = validate(r#"[{"name": "gold", "var_type": "record", "update_type": "keyword_count"}]"#, "{}").unwrap();
        let gold = &vars[0];
        assert_eq!(gold.min_value, f64::NEG_INFINITY);
        assert_eq!(gold.max_value, f64::INFINITY);
        assert_eq!(gold.current_value(), 0.0);
        assert!(gold.pre_update);
        assert_eq!(gold.reset_type, ResetType::None);
        assert!(gold.stage.is_none());
    }

    #[test]
    fn wrapped_document_and_string_sentinels() {
        let json = r#"{"variables": [{"name": "gold", "var_type": "RECORD", "update_type": "KEYWORD_COUNT",
            "min_value": "-inf", "max_value": "inf", "initial_value": "5"}]}"#;
        let vars = validate(json, "{}").unwrap();
        assert_eq!(vars[0].current_value(), 5.0);
        assert!(vars[0].max_value.is_infinite());
    }

    #[test]
    fn keyword_groups_are_case_folded() {
        let kw = r#"{"affection_keywords": {"like": {"keywords": ["Like", "喜欢"], "min_value": 4, "max_value": 6}}}"#;
        let vars = validate(&format!("[{}]", AFFECTION), kw).unwrap();
        assert_eq!(vars[0].keyword_groups[0].keywords, vec!["like".to_string(), "喜欢".to_string()]);
    }

    #[test]
    fn inverted_group_range_rejected() {
        let kw = r#"{"affection_keywords": {"like": {"keywords": ["x"], "min_value": 6, "max_value": 4}}}"#;
        let err = validate(&format!("[{}]", AFFECTION), kw).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedRange { ref context, .. } if context.contains("like")));
    }

    #[test]
    fn non_numeric_bound_rejected() {
        let err = validate(
            r#"[{"name": "gold", "var_type": "record", "update_type": "keyword_count", "max_value": "lots"}]"#,
            "{}",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NonNumeric { ref value, .. } if value == "lots"));
    }

    #[test]
    fn inverted_variable_bounds_rejected() {
        let err = validate(
            r#"[{"name": "gold", "var_type": "record", "update_type": "keyword_count", "min_value": 10, "max_value": 0}]"#,
            "{}",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedRange { .. }));
    }

    #[test]
    fn initial_value_outside_bounds_rejected() {
        let err = validate(
            r#"[{"name": "gold", "var_type": "record", "update_type": "keyword_count", "min_value": 0, "max_value": 10, "initial_value": 11}]"#,
            "{}",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfBounds { field: "initial_value", .. }));
    }

    #[test]
    fn unknown_enum_rejected() {
        let err = validate(r#"[{"name": "gold", "var_type": "ledger", "update_type": "keyword_count"}]"#, "{}").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariant { field: "var_type", .. }));
    }

    #[test]
    fn duplicate_names_rejected() {
        let rec = r#"{"name": "gold", "var_type": "record", "update_type": "keyword_count"}"#;
        let err = validate(&format!("[{}, {}]", rec, rec), "{}").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(ref n) if n == "gold"));
    }

    #[test]
    fn ladder_description_mismatch_rejected() {
        let json = AFFECTION.replace(r#"["stranger", "familiar", "close"]"#, r#"["stranger", "familiar"]"#);
        let err = validate(&format!("[{}]", json), "{}").unwrap_err();
        assert!(matches!(err, ConfigError::DescriptionCount { expected: 3, found: 2, .. }));
    }

    #[test]
    fn ladder_thresholds_must_increase() {
        let json = AFFECTION.replace("[20, 50]", "[50, 20]");
        let err = validate(&format!("[{}]", json), "{}").unwrap_err();
        assert!(matches!(err, ConfigError::ThresholdOrder { .. }));
    }

    #[test]
    fn stage_variable_needs_stage_fields() {
        let err = validate(
            r#"[{"name": "mood", "var_type": "stage_independent", "update_type": "keyword_count"}]"#,
            "{}",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "relative_method", .. }));
    }

    fn calendar(descriptions: &str) -> String {
        format!(
            r#"[{{"name": "time", "var_type": "stage_independent", "update_type": "keyword_count",
                "min_value": 0, "relative_method": "cycle", "relative_stage_config": [1440, 3, 2],
                "relative_description": {}}}]"#,
            descriptions
        )
    }

    #[test]
    fn cycle_levels_validated() {
        let vars = validate(&calendar(r#"[["d1", "d2", "d3"], ["m1", "m2"]]"#), "{}").unwrap();
        assert!(matches!(vars[0].stage, Some(StageSpec::Cycle { ref levels, .. }) if levels.len() == 2));
    }

    #[test]
    fn skipped_cycle_level_rejected() {
        let err = validate(&calendar(r#"[["m1", "m2"]]"#), "{}").unwrap_err();
        assert!(matches!(err, ConfigError::MissingCycleLevel { expected: 2, found: 1, .. }));
    }

    #[test]
    fn cycle_label_count_must_match_period() {
        let err = validate(&calendar(r#"[["d1", "d2"], ["m1", "m2"]]"#), "{}").unwrap_err();
        assert!(matches!(err, ConfigError::DescriptionCount { expected: 3, found: 2, .. }));
    }

    #[test]
    fn fractional_enclosing_period_rejected() {
        let json = calendar(r#"[["d1", "d2", "d3"], ["m1", "m2"]]"#).replace("[1440, 3, 2]", "[1440, 2.5, 2]");
        let err = validate(&json, "{}").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPeriod { index: 1, .. }));
    }

    #[test]
    fn keyword_section_for_unknown_variable_rejected() {
        let kw = r#"{"mana_keywords": {"g": {"keywords": ["x"], "min_value": 1, "max_value": 1}}}"#;
        let err = validate(&format!("[{}]", AFFECTION), kw).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKeywordTarget(ref k) if k == "mana_keywords"));
    }

    #[test]
    fn blank_keyword_rejected() {
        let kw = r#"{"affection_keywords": {"g": {"keywords": ["ok", "  "], "min_value": 1, "max_value": 1}}}"#;
        let err = validate(&format!("[{}]", AFFECTION), kw).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyKeyword { .. }));
    }

    #[test]
    fn keyword_reset_requires_keywords() {
        let json = r#"[{"name": "stamina", "var_type": "record", "update_type": "keyword_count", "reset_type": "keyword"}]"#;
        assert!(matches!(validate(json, "{}").unwrap_err(), ConfigError::MissingResetKeywords(_)));
        let vars = validate(json, r#"{"stamina_reset": {"keywords": ["Sleep"]}}"#).unwrap();
        assert_eq!(vars[0].reset_keywords, vec!["sleep".to_string()]);
        assert!(vars[0].has_keyword_reset());
    }

    #[test]
    fn constraints_may_reference_later_variables() {
        let json = format!(
            r#"[{{"name": "gift", "var_type": "record", "update_type": "keyword_count",
                 "update_constraint": [[0, "affection"]]}}, {}]"#,
            AFFECTION
        );
        let vars = validate(&json, "{}").unwrap();
        let expr = vars[0].update_constraint.as_ref().unwrap();
        assert_eq!(expr.nodes, vec![ConstraintNode::Test(RangeTest::new(Some(0.0), "affection", None))]);
    }

    #[test]
    fn constraint_on_unknown_variable_rejected() {
        let json = r#"[{"name": "gift", "var_type": "record", "update_type": "keyword_count",
            "update_constraint": [[0, "ghost"]]}]"#;
        let err = validate(json, "{}").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidConstraint { source: ConstraintError::UnresolvedVariable(ref n), .. } if n == "ghost"
        ));
    }

    #[test]
    fn constraint_on_cycle_variable_rejected() {
        let mut json = calendar(r#"[["d1", "d2", "d3"], ["m1", "m2"]]"#);
        json.truncate(json.trim_end().len() - 1);
        json.push_str(
            r#", {"name": "gift", "var_type": "record", "update_type": "keyword_count",
                "update_constraint": [["time", 1]]}]"#,
        );
        let err = validate(&json, "{}").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidConstraint { source: ConstraintError::CycleReference(_), .. }
        ));
    }

    #[test]
    fn circular_constraints_rejected() {
        let a = AFFECTION.replace(r#""initial_value": 0"#, r#""update_constraint": [[0, "trust"]], "initial_value": 0"#);
        let b = AFFECTION
            .replace("affection", "trust")
            .replace(r#""initial_value": 0"#, r#""update_constraint": [["affection", 2]], "initial_value": 0"#);
        let err = validate(&format!("[{}, {}]", a, b), "{}").unwrap_err();
        assert!(matches!(err, ConfigError::CircularConstraint(ref chain) if chain.len() == 3));
    }

    #[test]
    fn ron_documents_load() {
        let vars = r#"[(name: "gold", var_type: "record", update_type: "keyword_count", min_value: Some(0.0), max_value: Some(100.0))]"#;
        let kw = r#"{"gold_keywords": {"loot": (keywords: ["coin"], min_value: 1.0, max_value: 3.0)}}"#;
        let vars = EngineConfig::from_ron(vars, kw).unwrap().validate().unwrap();
        assert_eq!(vars[0].keyword_groups.len(), 1);
        assert_eq!(vars[0].max_value, 100.0);
    }
}
