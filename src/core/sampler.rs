/// Score randomizer — bounded uniform deltas for matched keyword groups.

use rand::Rng;

use crate::core::config::ConfigError;
use crate::core::matcher::MatchMode;
use crate::schema::keyword::KeywordGroup;

/// Draw a delta uniformly from `[min_value, max_value]`.
///
/// A degenerate range returns its constant without touching the RNG.
/// An inverted or non-finite range is a configuration error; the bounds
/// are never swapped.
pub fn sample<R: Rng>(min_value: f64, max_value: f64, rng: &mut R) -> Result<f64, ConfigError> {
    check_range("score range", min_value, max_value)?;
    if min_value == max_value {
        return Ok(min_value);
    }
    Ok(rng.gen_range(min_value..=max_value))
}

/// Validate a delta range, naming `context` in the error.
pub fn check_range(context: &str, min_value: f64, max_value: f64) -> Result<(), ConfigError> {
    for value in [min_value, max_value] {
        if !value.is_finite() {
            return Err(ConfigError::NonFinite {
                context: context.to_string(),
                value,
            });
        }
    }
    // a span that overflows f64 cannot be sampled uniformly
    if min_value > max_value || !(max_value - min_value).is_finite() {
        return Err(ConfigError::MalformedRange {
            context: context.to_string(),
            min: min_value,
            max: max_value,
        });
    }
    Ok(())
}

/// Total delta for a group that matched `hits` times.
///
/// Count mode draws once per occurrence; appear mode draws once per
/// matching group.
pub fn group_delta<R: Rng>(
    group: &KeywordGroup,
    hits: usize,
    mode: MatchMode,
    rng: &mut R,
) -> Result<f64, ConfigError> {
    let draws = match mode {
        MatchMode::Count => hits,
        MatchMode::Appear => hits.min(1),
    };
    let mut total = 0.0;
    for _ in 0..draws {
        total += sample(group.min_value, group.max_value, rng)?;
    }
    Ok(total)
}
