//! Percentile decay: how long until expected recall falls to a target.
//!
//! Works in log-elapsed-time. With `δ = elapsed / reference_time`,
//!
//! ```text
//! f(ln δ) = ln B(α + δ, β) − ln B(α, β) − ln(percentile)
//! ```
//!
//! is strictly decreasing, so the root is found by walking a fixed-width
//! bracket until it straddles zero and then either averaging the endpoints
//! (coarse) or handing the bracket to the root solver (fine).

use tracing::trace;

use crate::error::{EbisuError, Result};
use crate::recall::EbisuEngine;
use crate::solver::RootFinder;
use crate::special::LogBeta;
use crate::types::{is_positive_finite, RecallModel, HALF_LIFE_PERCENTILE};

impl<B: LogBeta, R: RootFinder> EbisuEngine<B, R> {
    /// Elapsed time at which expected recall equals `percentile`.
    ///
    /// # Arguments
    /// * `percentile` - Target recall probability, strictly inside (0, 1)
    /// * `coarse` - Skip the solver and return the midpoint of the bracket
    /// * `tolerance` - Solver tolerance in log-time units (fine mode only)
    ///
    /// # Returns
    /// Elapsed time in the same unit as `model.reference_time`
    pub fn percentile_decay(
        &self,
        model: &RecallModel,
        percentile: f64,
        coarse: bool,
        tolerance: f64,
    ) -> Result<f64> {
        model.validate()?;
        if !(percentile > 0.0 && percentile < 1.0) {
            return Err(EbisuError::invalid(format!(
                "percentile must be in (0, 1), got {percentile}"
            )));
        }
        if !is_positive_finite(tolerance) {
            return Err(EbisuError::invalid(format!(
                "tolerance must be positive, got {tolerance}"
            )));
        }

        let log_beta = self.log_beta();
        let log_bab = log_beta.ln_beta(model.alpha, model.beta);
        let log_percentile = percentile.ln();
        let f = |ln_delta: f64| {
            log_beta.ln_beta(model.alpha + ln_delta.exp(), model.beta) - log_bab - log_percentile
        };

        let config = self.config();
        let width = if coarse {
            config.coarse_bracket_width
        } else {
            config.fine_bracket_width
        };
        let max_iterations = config.max_bracket_iterations;

        let mut low = -width / 2.0;
        let mut high = width / 2.0;
        let mut f_low = f(low);
        let mut f_high = f(high);
        let mut iterations = 0u32;

        let exhausted = |low: f64, high: f64, iterations: u32| EbisuError::BracketingFailure {
            reason: "bracket walk exceeded iteration cap".to_string(),
            model: Some(*model),
            percentile: Some(percentile),
            low,
            high,
            iterations,
        };

        // Recall still above target at both ends: move later
        while f_low > 0.0 && f_high > 0.0 {
            if iterations >= max_iterations {
                return Err(exhausted(low, high, iterations));
            }
            low = high;
            f_low = f_high;
            high += width;
            f_high = f(high);
            iterations += 1;
            trace!(low, high, f_high, "shifted decay bracket up");
        }

        // Already below target at both ends: move earlier
        while f_low < 0.0 && f_high < 0.0 {
            if iterations >= max_iterations {
                return Err(exhausted(low, high, iterations));
            }
            high = low;
            f_high = f_low;
            low -= width;
            f_low = f(low);
            iterations += 1;
            trace!(low, high, f_low, "shifted decay bracket down");
        }

        if f_low == 0.0 {
            return Ok(low.exp() * model.reference_time);
        }
        if f_high == 0.0 {
            return Ok(high.exp() * model.reference_time);
        }
        if !(f_low > 0.0 && f_high < 0.0) {
            return Err(EbisuError::BracketingFailure {
                reason: format!("no sign change: f(low)={f_low}, f(high)={f_high}"),
                model: Some(*model),
                percentile: Some(percentile),
                low,
                high,
                iterations,
            });
        }

        if coarse {
            return Ok((low.exp() + high.exp()) / 2.0 * model.reference_time);
        }

        let root = self
            .solver()
            .find_root(&f, low, high, tolerance)
            .map_err(|err| err.with_decay_target(model, percentile))?;

        Ok(root.exp() * model.reference_time)
    }

    /// Fine percentile decay with the configured tolerance.
    /// `percentile` defaults to 0.5 (the half-life).
    pub fn model_to_percentile_decay(
        &self,
        model: &RecallModel,
        percentile: Option<f64>,
    ) -> Result<f64> {
        self.percentile_decay(
            model,
            percentile.unwrap_or(HALF_LIFE_PERCENTILE),
            false,
            self.config().fine_tolerance,
        )
    }

    pub fn half_life(&self, model: &RecallModel) -> Result<f64> {
        self.model_to_percentile_decay(model, Some(HALF_LIFE_PERCENTILE))
    }
}

// ==================== Standalone Functions ====================

pub fn percentile_decay(
    model: &RecallModel,
    percentile: f64,
    coarse: bool,
    tolerance: f64,
) -> Result<f64> {
    EbisuEngine::new().percentile_decay(model, percentile, coarse, tolerance)
}

pub fn model_to_percentile_decay(model: &RecallModel, percentile: Option<f64>) -> Result<f64> {
    EbisuEngine::new().model_to_percentile_decay(model, percentile)
}

pub fn half_life(model: &RecallModel) -> Result<f64> {
    EbisuEngine::new().half_life(model)
}
