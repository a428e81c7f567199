//! Ebisu Memory Model - Recall Prediction and Bayesian Update
//!
//! Core theory:
//! - Recall probability `p` at the model's reference time `t` follows `Beta(α, β)`
//! - Exponential forgetting: recall after `δ·t` is `p^δ`, so it follows a
//!   Generalized Beta of the first kind
//! - A quiz is a binomial observation of `p^δ`; the exact posterior is
//!   projected back onto a Beta at a (possibly new) reference time by
//!   matching the first two moments
//!
//! Mathematical formulas:
//! - Expected recall: E[p^δ] = B(α + δ, β) / B(α, β)
//! - Posterior moment N after k successes in n trials, f = n − k failures,
//!   re-anchored at `t' = ε·t_now`:
//!   - M_N ∝ Σ_{i=0..f} (−1)^i C(f, i) B(β, α + δ(k + i) + N·δ·ε)
//!   - summed in the log domain because the alternating terms cancel heavily
//! - Moment matching: c = μ(1−μ)/σ² − 1, α' = μc, β' = (1−μ)c
//!
//! Rebalancing:
//! - When α' and β' drift apart the log-Beta terms become ill-conditioned, so
//!   the posterior is recomputed anchored at its own (coarse) half-life
//!
//! References:
//! - Fasih, A. (2017). Ebisu: intelligent quiz scheduling.
//! - McDonald, J. B. (1984). Some generalized functions for the size distribution of income.

use tracing::{debug, warn};

use crate::config::EbisuConfig;
use crate::error::{EbisuError, Result, ViolationContext};
use crate::numeric::{check_moments, log_sum_exp, moments_to_shape};
use crate::solver::{BrentSolver, RootFinder};
use crate::special::{binomial_ln, LogBeta, StatrsLogBeta};
use crate::types::{is_positive_finite, NoisyQuiz, RecallModel, HALF_LIFE_PERCENTILE};

// ==================== Engine ====================

/// Ebisu engine: configuration plus the two numerical backends.
///
/// Holds no mutable state; every method takes `&self` and returns a fresh
/// value, so one engine can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct EbisuEngine<B = StatrsLogBeta, R = BrentSolver> {
    config: EbisuConfig,
    log_beta: B,
    solver: R,
}

impl EbisuEngine {
    /// Engine with the default config and the `statrs` / Brent backends
    pub fn new() -> Self {
        Self::with_config(EbisuConfig::default())
    }

    pub fn with_config(config: EbisuConfig) -> Self {
        let config = config.validated();
        let solver = BrentSolver::new(config.max_solver_iterations);
        Self {
            config,
            log_beta: StatrsLogBeta,
            solver,
        }
    }
}

impl Default for EbisuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: LogBeta, R: RootFinder> EbisuEngine<B, R> {
    /// Engine with custom log-Beta and root-finding backends
    pub fn with_backends(config: EbisuConfig, log_beta: B, solver: R) -> Self {
        Self {
            config: config.validated(),
            log_beta,
            solver,
        }
    }

    pub fn config(&self) -> &EbisuConfig {
        &self.config
    }

    pub fn log_beta(&self) -> &B {
        &self.log_beta
    }

    pub fn solver(&self) -> &R {
        &self.solver
    }

    // ==================== Model Construction ====================

    /// Default prior: `Beta(a, a)` at `reference_time`, `a = config.default_alpha`
    pub fn default_model(&self, reference_time: f64) -> Result<RecallModel> {
        self.default_model_with(reference_time, None, None)
    }

    /// Prior with optional shape overrides; `beta` defaults to `alpha`
    pub fn default_model_with(
        &self,
        reference_time: f64,
        alpha: Option<f64>,
        beta: Option<f64>,
    ) -> Result<RecallModel> {
        let alpha = alpha.unwrap_or(self.config.default_alpha);
        RecallModel::new(reference_time, alpha, beta.unwrap_or(alpha))
    }

    // ==================== Prediction ====================

    /// Expected recall probability after `elapsed` time units.
    ///
    /// # Arguments
    /// * `elapsed` - Time since last review, same unit as `reference_time`
    /// * `exact` - Return the probability itself instead of its log
    ///
    /// # Returns
    /// `ln E[recall]` (default) or `E[recall]` when `exact` is set
    pub fn predict_recall(&self, model: &RecallModel, elapsed: f64, exact: bool) -> Result<f64> {
        model.validate()?;
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(EbisuError::invalid(format!(
                "elapsed must be non-negative and finite, got {elapsed}"
            )));
        }

        let dt = elapsed / model.reference_time;
        if !dt.is_finite() {
            return Err(EbisuError::invalid(format!(
                "elapsed {elapsed} overflows relative to reference time {}",
                model.reference_time
            )));
        }
        let log_recall = self.log_beta.ln_beta(model.alpha + dt, model.beta)
            - self.log_beta.ln_beta(model.alpha, model.beta);
        if log_recall.is_nan() {
            return Err(EbisuError::ConstraintViolation {
                quantity: "log recall",
                value: log_recall,
                context: ViolationContext {
                    model: Some(*model),
                    elapsed: Some(elapsed),
                    mean: model.mean(),
                    ..Default::default()
                },
            });
        }

        Ok(if exact { log_recall.exp() } else { log_recall })
    }

    // ==================== Binomial Update ====================

    /// Posterior after `successes` out of `total` quiz trials at `elapsed`,
    /// rebalanced and anchored at the prior's reference time.
    pub fn update_recall(
        &self,
        model: &RecallModel,
        successes: u32,
        total: u32,
        elapsed: f64,
    ) -> Result<RecallModel> {
        self.update_recall_with(model, successes, total, elapsed, true, None)
    }

    /// Posterior with explicit rebalancing and anchor control.
    ///
    /// # Arguments
    /// * `rebalance` - Re-anchor skewed posteriors at their half-life
    /// * `reference_back` - Reference time of the returned model;
    ///   `None` keeps `model.reference_time`
    pub fn update_recall_with(
        &self,
        model: &RecallModel,
        successes: u32,
        total: u32,
        elapsed: f64,
        rebalance: bool,
        reference_back: Option<f64>,
    ) -> Result<RecallModel> {
        model.validate()?;
        if total < 1 {
            return Err(EbisuError::invalid("total must be at least 1, got 0"));
        }
        if successes > total {
            return Err(EbisuError::invalid(format!(
                "successes must be in [0, total], got {successes} of {total}"
            )));
        }
        let reference_back = self.check_times(model, elapsed, reference_back)?;

        let candidate = self
            .binomial_posterior(model, successes, total, elapsed, reference_back)
            .map_err(|err| {
                warn!(
                    alpha = model.alpha,
                    beta = model.beta,
                    reference_time = model.reference_time,
                    successes,
                    total,
                    elapsed,
                    error = %err,
                    "binomial posterior rejected"
                );
                err.with_quiz(model, f64::from(successes), total, elapsed)
            })?;

        if rebalance {
            self.rebalance(model, successes, total, elapsed, &candidate)
        } else {
            Ok(candidate)
        }
    }

    /// Moment-matched posterior without rebalancing.
    fn binomial_posterior(
        &self,
        model: &RecallModel,
        successes: u32,
        total: u32,
        elapsed: f64,
        reference_back: f64,
    ) -> Result<RecallModel> {
        let failures = total - successes;
        let dt = elapsed / model.reference_time;
        let et = reference_back / elapsed;

        let binomials: Vec<f64> = (0..=failures)
            .map(|i| binomial_ln(&self.log_beta, failures, i))
            .collect();
        let signs: Vec<f64> = (0..=failures)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();

        // Denominator, first raw moment, second raw moment
        let mut logs = [0.0; 3];
        let mut moment_signs = [0.0; 3];
        for (m, (log, sign)) in logs.iter_mut().zip(moment_signs.iter_mut()).enumerate() {
            let shift = m as f64 * dt * et;
            let terms: Vec<f64> = binomials
                .iter()
                .enumerate()
                .map(|(i, &binomial)| {
                    let a = model.alpha + dt * (f64::from(successes) + i as f64) + shift;
                    binomial + self.log_beta.ln_beta(model.beta, a)
                })
                .collect();
            let (value, value_sign) = log_sum_exp(&terms, &signs)?;
            *log = value;
            *sign = value_sign;
        }

        self.project(logs, moment_signs, reference_back)
    }

    /// Turn log-domain raw moments into a Beta model at `reference_back`.
    fn project(
        &self,
        logs: [f64; 3],
        signs: [f64; 3],
        reference_back: f64,
    ) -> Result<RecallModel> {
        let mean = signs[1] * signs[0] * (logs[1] - logs[0]).exp();
        let second_moment = signs[2] * signs[0] * (logs[2] - logs[0]).exp();
        let variance = check_moments(mean, second_moment)?;
        let (alpha, beta) = moments_to_shape(mean, variance)?;

        Ok(RecallModel {
            reference_time: reference_back,
            alpha,
            beta,
        })
    }

    fn check_times(
        &self,
        model: &RecallModel,
        elapsed: f64,
        reference_back: Option<f64>,
    ) -> Result<f64> {
        if !is_positive_finite(elapsed) {
            return Err(EbisuError::invalid(format!(
                "elapsed must be positive and finite, got {elapsed}"
            )));
        }
        let reference_back = reference_back.unwrap_or(model.reference_time);
        if !is_positive_finite(reference_back) {
            return Err(EbisuError::invalid(format!(
                "reference time must be positive and finite, got {reference_back}"
            )));
        }
        Ok(reference_back)
    }

    // ==================== Rebalancing ====================

    /// Re-anchor a skewed binomial posterior at its coarse half-life.
    ///
    /// Balanced candidates (neither shape exceeds `rebalance_ratio` times the
    /// other) are returned unchanged.
    pub fn rebalance(
        &self,
        prior: &RecallModel,
        successes: u32,
        total: u32,
        elapsed: f64,
        candidate: &RecallModel,
    ) -> Result<RecallModel> {
        self.rebalance_by(candidate, |anchor| {
            self.update_recall_with(prior, successes, total, elapsed, false, Some(anchor))
        })
    }

    fn rebalance_by<F>(&self, candidate: &RecallModel, recompute: F) -> Result<RecallModel>
    where
        F: FnOnce(f64) -> Result<RecallModel>,
    {
        if !candidate.is_skewed(self.config.rebalance_ratio) {
            return Ok(*candidate);
        }

        let anchor = self.percentile_decay(
            candidate,
            self.config.half_life_percentile,
            true,
            self.config.coarse_tolerance,
        )?;
        debug!(
            alpha = candidate.alpha,
            beta = candidate.beta,
            from = candidate.reference_time,
            to = anchor,
            "rebalancing posterior"
        );

        recompute(anchor)
    }

    // ==================== Noisy Binary Update ====================

    /// Posterior after a single, possibly noisy, binary quiz.
    pub fn update_recall_noisy(
        &self,
        model: &RecallModel,
        quiz: NoisyQuiz,
        elapsed: f64,
    ) -> Result<RecallModel> {
        self.update_recall_noisy_with(model, quiz, elapsed, true, None)
    }

    /// Noisy update with explicit rebalancing and anchor control.
    ///
    /// `quiz.result > 0.5` counts as a pass; `q1 = max(result, 1 − result)` is
    /// the chance the quiz reports the truth when the fact was recalled and
    /// `q0` the chance it reports a pass when the fact was forgotten.
    pub fn update_recall_noisy_with(
        &self,
        model: &RecallModel,
        quiz: NoisyQuiz,
        elapsed: f64,
        rebalance: bool,
        reference_back: Option<f64>,
    ) -> Result<RecallModel> {
        model.validate()?;
        let result = quiz.result;
        if !(0.0..=1.0).contains(&result) {
            return Err(EbisuError::invalid(format!(
                "quiz result must be in [0, 1], got {result}"
            )));
        }
        let passed = result > 0.5;
        let q1 = result.max(1.0 - result);
        let q0 = quiz.q0.unwrap_or(1.0 - q1);
        if !(0.0..=1.0).contains(&q0) {
            return Err(EbisuError::invalid(format!("q0 must be in [0, 1], got {q0}")));
        }
        let reference_back = self.check_times(model, elapsed, reference_back)?;

        // Likelihood of the observation is d + c·p^δ
        let (c, d) = if passed { (q1 - q0, q0) } else { (q0 - q1, 1.0 - q0) };

        let candidate = self
            .noisy_posterior(model, c, d, elapsed, reference_back)
            .map_err(|err| {
                warn!(
                    alpha = model.alpha,
                    beta = model.beta,
                    reference_time = model.reference_time,
                    result,
                    q0,
                    elapsed,
                    error = %err,
                    "noisy posterior rejected"
                );
                err.with_quiz(model, result, 1, elapsed)
            })?;

        if rebalance {
            self.rebalance_by(&candidate, |anchor| {
                self.update_recall_noisy_with(model, quiz, elapsed, false, Some(anchor))
            })
        } else {
            Ok(candidate)
        }
    }

    fn noisy_posterior(
        &self,
        model: &RecallModel,
        c: f64,
        d: f64,
        elapsed: f64,
        reference_back: f64,
    ) -> Result<RecallModel> {
        let dt = elapsed / model.reference_time;
        let et = reference_back / elapsed;
        let log_c = c.abs().ln();

        let mut logs = [0.0; 3];
        let mut moment_signs = [0.0; 3];
        for (m, (log, sign)) in logs.iter_mut().zip(moment_signs.iter_mut()).enumerate() {
            let shift = m as f64 * dt * et;
            let mut terms = vec![log_c + self.log_beta.ln_beta(model.alpha + dt + shift, model.beta)];
            let mut term_signs = vec![c.signum()];
            if d != 0.0 {
                terms.push(d.ln() + self.log_beta.ln_beta(model.alpha + shift, model.beta));
                term_signs.push(1.0);
            }
            let (value, value_sign) = log_sum_exp(&terms, &term_signs)?;
            *log = value;
            *sign = value_sign;
        }

        self.project(logs, moment_signs, reference_back)
    }

    // ==================== Half-Life Rescaling ====================

    /// Balanced model (`alpha == beta`) anchored at `scale ×` the current
    /// half-life, keeping the second moment at that time.
    ///
    /// Useful when a learner flags a fact as too easy (`scale > 1`) or too
    /// hard (`scale < 1`).
    pub fn rescale_half_life(&self, model: &RecallModel, scale: f64) -> Result<RecallModel> {
        if !is_positive_finite(scale) {
            return Err(EbisuError::invalid(format!(
                "scale must be positive and finite, got {scale}"
            )));
        }

        let old_half_life = self.model_to_percentile_decay(model, Some(HALF_LIFE_PERCENTILE))?;
        let dt = old_half_life / model.reference_time;
        let log_m2 = self.log_beta.ln_beta(model.alpha + 2.0 * dt, model.beta)
            - self.log_beta.ln_beta(model.alpha, model.beta);
        let m2 = log_m2.exp();
        // Beta(a, a) has E[p²] = (a + 1) / (2(2a + 1))
        let alpha_beta = 1.0 / (8.0 * m2 - 2.0) - 0.5;

        if !is_positive_finite(alpha_beta) {
            return Err(EbisuError::ConstraintViolation {
                quantity: "rescaled alpha",
                value: alpha_beta,
                context: ViolationContext {
                    model: Some(*model),
                    mean: HALF_LIFE_PERCENTILE,
                    variance: m2 - HALF_LIFE_PERCENTILE * HALF_LIFE_PERCENTILE,
                    ..Default::default()
                },
            });
        }

        Ok(RecallModel {
            reference_time: old_half_life * scale,
            alpha: alpha_beta,
            beta: alpha_beta,
        })
    }
}

// ==================== Standalone Functions ====================

/// Default prior `Beta(3, 3)` at `reference_time`
pub fn default_model(reference_time: f64) -> Result<RecallModel> {
    EbisuEngine::new().default_model(reference_time)
}

pub fn predict_recall(model: &RecallModel, elapsed: f64, exact: bool) -> Result<f64> {
    EbisuEngine::new().predict_recall(model, elapsed, exact)
}

pub fn update_recall(
    model: &RecallModel,
    successes: u32,
    total: u32,
    elapsed: f64,
) -> Result<RecallModel> {
    EbisuEngine::new().update_recall(model, successes, total, elapsed)
}

pub fn update_recall_with(
    model: &RecallModel,
    successes: u32,
    total: u32,
    elapsed: f64,
    rebalance: bool,
    reference_back: Option<f64>,
) -> Result<RecallModel> {
    EbisuEngine::new().update_recall_with(model, successes, total, elapsed, rebalance, reference_back)
}

pub fn rebalance(
    prior: &RecallModel,
    successes: u32,
    total: u32,
    elapsed: f64,
    candidate: &RecallModel,
) -> Result<RecallModel> {
    EbisuEngine::new().rebalance(prior, successes, total, elapsed, candidate)
}

pub fn update_recall_noisy(
    model: &RecallModel,
    result: f64,
    q0: Option<f64>,
    elapsed: f64,
) -> Result<RecallModel> {
    EbisuEngine::new().update_recall_noisy(model, NoisyQuiz { result, q0 }, elapsed)
}

pub fn update_recall_noisy_with(
    model: &RecallModel,
    quiz: NoisyQuiz,
    elapsed: f64,
    rebalance: bool,
    reference_back: Option<f64>,
) -> Result<RecallModel> {
    EbisuEngine::new().update_recall_noisy_with(model, quiz, elapsed, rebalance, reference_back)
}

pub fn rescale_half_life(model: &RecallModel, scale: f64) -> Result<RecallModel> {
    EbisuEngine::new().rescale_half_life(model, scale)
}

// ==================== Unit Tests ====================
