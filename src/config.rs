use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{
    COARSE_BRACKET_WIDTH, DEFAULT_ALPHA, DEFAULT_DECAY_TOLERANCE, FINE_BRACKET_WIDTH,
    HALF_LIFE_PERCENTILE, MAX_BRACKET_ITERATIONS, MAX_SOLVER_ITERATIONS, REBALANCE_RATIO,
};

/// Tuning knobs for [`EbisuEngine`](crate::EbisuEngine).
///
/// The defaults are the standard Ebisu settings; only change them when a
/// caller has a concrete numerical reason to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EbisuConfig {
    /// Rebalance when alpha > ratio·beta or beta > ratio·alpha
    pub rebalance_ratio: f64,
    /// Percentile used as the rebalancing anchor (0.5 = half-life)
    pub half_life_percentile: f64,
    /// Tolerance passed to the coarse decay search during rebalancing
    pub coarse_tolerance: f64,
    /// Tolerance for fine (root-solved) decay searches
    pub fine_tolerance: f64,
    pub coarse_bracket_width: f64,
    pub fine_bracket_width: f64,
    /// Cap on bracket shifts before giving up
    pub max_bracket_iterations: u32,
    /// Cap on root solver iterations
    pub max_solver_iterations: u32,
    /// Alpha (and beta) of the default prior
    pub default_alpha: f64,
}

impl Default for EbisuConfig {
    fn default() -> Self {
        Self {
            rebalance_ratio: REBALANCE_RATIO,
            half_life_percentile: HALF_LIFE_PERCENTILE,
            coarse_tolerance: DEFAULT_DECAY_TOLERANCE,
            fine_tolerance: DEFAULT_DECAY_TOLERANCE,
            coarse_bracket_width: COARSE_BRACKET_WIDTH,
            fine_bracket_width: FINE_BRACKET_WIDTH,
            max_bracket_iterations: MAX_BRACKET_ITERATIONS,
            max_solver_iterations: MAX_SOLVER_ITERATIONS,
            default_alpha: DEFAULT_ALPHA,
        }
    }
}

impl EbisuConfig {
    /// Build a config from `EBISU_*` environment variables, falling back to
    /// the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            rebalance_ratio: env_or("EBISU_REBALANCE_RATIO", defaults.rebalance_ratio),
            half_life_percentile: env_or(
                "EBISU_HALF_LIFE_PERCENTILE",
                defaults.half_life_percentile,
            ),
            coarse_tolerance: env_or("EBISU_COARSE_TOLERANCE", defaults.coarse_tolerance),
            fine_tolerance: env_or("EBISU_FINE_TOLERANCE", defaults.fine_tolerance),
            coarse_bracket_width: env_or(
                "EBISU_COARSE_BRACKET_WIDTH",
                defaults.coarse_bracket_width,
            ),
            fine_bracket_width: env_or("EBISU_FINE_BRACKET_WIDTH", defaults.fine_bracket_width),
            max_bracket_iterations: env_or(
                "EBISU_MAX_BRACKET_ITERATIONS",
                defaults.max_bracket_iterations,
            ),
            max_solver_iterations: env_or(
                "EBISU_MAX_SOLVER_ITERATIONS",
                defaults.max_solver_iterations,
            ),
            default_alpha: env_or("EBISU_DEFAULT_ALPHA", defaults.default_alpha),
        }
        .validated()
    }

    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EbisuConfig = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamp every field into a numerically safe range.
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        let positive = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };

        let percentile = if self.half_life_percentile > 0.0 && self.half_life_percentile < 1.0 {
            self.half_life_percentile
        } else {
            defaults.half_life_percentile
        };

        Self {
            rebalance_ratio: positive(self.rebalance_ratio, defaults.rebalance_ratio).max(1.0),
            half_life_percentile: percentile,
            coarse_tolerance: positive(self.coarse_tolerance, defaults.coarse_tolerance),
            fine_tolerance: positive(self.fine_tolerance, defaults.fine_tolerance),
            coarse_bracket_width: positive(
                self.coarse_bracket_width,
                defaults.coarse_bracket_width,
            ),
            fine_bracket_width: positive(self.fine_bracket_width, defaults.fine_bracket_width),
            max_bracket_iterations: self.max_bracket_iterations.clamp(1, 100_000),
            max_solver_iterations: self.max_solver_iterations.clamp(1, 10_000),
            default_alpha: positive(self.default_alpha, defaults.default_alpha),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EbisuConfig::default();
        assert_eq!(config.rebalance_ratio, 2.0);
        assert_eq!(config.half_life_percentile, 0.5);
        assert_eq!(config.coarse_bracket_width, 1.0);
        assert_eq!(config.fine_bracket_width, 6.0);
        assert_eq!(config.default_alpha, 3.0);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EbisuConfig::from_json(r#"{"rebalanceRatio": 3.0}"#).unwrap();
        assert_eq!(config.rebalance_ratio, 3.0);
        assert_eq!(config.fine_bracket_width, 6.0);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(EbisuConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_validated_clamps() {
        let config = EbisuConfig {
            rebalance_ratio: 0.5,
            half_life_percentile: 1.5,
            coarse_tolerance: -1.0,
            fine_tolerance: f64::NAN,
            max_bracket_iterations: 0,
            ..EbisuConfig::default()
        }
        .validated();

        assert_eq!(config.rebalance_ratio, 1.0);
        assert_eq!(config.half_life_percentile, 0.5);
        assert_eq!(config.coarse_tolerance, DEFAULT_DECAY_TOLERANCE);
        assert_eq!(config.fine_tolerance, DEFAULT_DECAY_TOLERANCE);
        assert_eq!(config.max_bracket_iterations, 1);
    }

    #[test]
    fn test_env_or_fallback() {
        let value: f64 = env_or("EBISU_TEST_UNSET_VARIABLE_FOR_CONFIG", 4.5);
        assert_eq!(value, 4.5);
    }
}
