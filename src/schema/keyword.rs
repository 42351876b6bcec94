use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::number::ConfigNumber;

/// Suffix of keyword-document keys holding update groups.
pub const KEYWORDS_SUFFIX: &str = "_keywords";
/// Suffix of keyword-document keys holding reset rules.
pub const RESET_SUFFIX: &str = "_reset";

/// A validated keyword group: trigger strings sharing one delta range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordGroup {
    /// Free-form label; only used in logs and errors.
    pub name: String,
    /// Case-folded, non-empty keywords in declaration order.
    pub keywords: Vec<String>,
    pub min_value: f64,
    pub max_value: f64,
}

impl KeywordGroup {
    /// True when the range collapses to a single fixed delta.
    pub fn is_fixed(&self) -> bool {
        self.min_value == self.max_value
    }
}

/// One group as written under `<name>_keywords`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawKeywordGroup {
    pub keywords: Vec<String>,
    pub min_value: ConfigNumber,
    pub max_value: ConfigNumber,
}

/// Reset rule as written under `<name>_reset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawResetRule {
    pub keywords: Vec<String>,
}

/// A single entry of the keyword document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordSection {
    Reset(RawResetRule),
    Groups(BTreeMap<String, RawKeywordGroup>),
}

/// What a keyword-document key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind<'a> {
    Update(&'a str),
    Reset(&'a str),
}

/// Split a keyword-document key into its variable name and kind.
pub fn classify_section_key(key: &str) -> Option<SectionKind<'_>> {
    if let Some(name) = key.strip_suffix(KEYWORDS_SUFFIX) {
        return Some(SectionKind::Update(name));
    }
    key.strip_suffix(RESET_SUFFIX).map(SectionKind::Reset)
}
