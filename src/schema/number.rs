use serde::{Deserialize, Serialize};

/// A numeric configuration value as written in a config file.
///
/// Bounds may be plain numbers or one of the infinity sentinels
/// (`"inf"`, `"-inf"`, `"infinity"`, ...). Numeric text such as `"2.5"`
/// is accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigNumber {
    Number(f64),
    Text(String),
}

impl ConfigNumber {
    /// Resolve to a float. Returns `None` for text that is neither a
    /// sentinel nor a number.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(raw) => parse_sentinel(raw),
        }
    }
}

impl From<f64> for ConfigNumber {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

fn parse_sentinel(raw: &str) -> Option<f64> {
    let key = raw.trim().to_lowercase();
    match key.as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        // `f64::from_str` also accepts "nan", which is never a valid bound
        "nan" | "+nan" | "-nan" => None,
        _ => key.parse::<f64>().ok(),
    }
}
