/// Keyword matcher — case-insensitive substring scans over narrative text.

use crate::schema::variable::UpdateType;

/// Narrative text prepared for repeated keyword scans.
///
/// Folds case once so every group scan reuses the lowered text.
#[derive(Debug, Clone)]
pub struct ScanText {
    lowered: String,
    blank: bool,
}

impl ScanText {
    pub fn new(text: &str) -> Self {
        Self {
            lowered: text.to_lowercase(),
            blank: text.trim().is_empty(),
        }
    }

    /// True for empty or whitespace-only input, which never matches.
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    pub fn as_str(&self) -> &str {
        &self.lowered
    }
}

/// How a group's hits are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Sum of non-overlapping occurrences of every keyword.
    Count,
    /// 1 if any keyword occurs, else 0.
    Appear,
}

impl MatchMode {
    pub fn for_update_type(update_type: UpdateType) -> Option<Self> {
        match update_type {
            UpdateType::KeywordCount => Some(Self::Count),
            UpdateType::KeywordAppear => Some(Self::Appear),
            UpdateType::LlmFuzzy => None,
        }
    }
}

/// Number of times `keyword` occurs in `text`. Keywords must already be
/// case-folded.
pub fn count_occurrences(text: &ScanText, keyword: &str) -> usize {
    if text.is_blank() || keyword.is_empty() {
        return 0;
    }
    text.as_str().matches(keyword).count()
}

/// True if any keyword occurs at least once.
pub fn any_keyword(text: &ScanText, keywords: &[String]) -> bool {
    keywords.iter().any(|k| count_occurrences(text, k) > 0)
}

/// Scan a keyword group. Returns the occurrence total in count mode,
/// 0 or 1 in appear mode.
pub fn match_group(text: &ScanText, keywords: &[String], mode: MatchMode) -> usize {
    match mode {
        MatchMode::Count => keywords.iter().map(|k| count_occurrences(text, k)).sum(),
        MatchMode::Appear => usize::from(any_keyword(text, keywords)),
    }
}
