use std::fmt;

use crate::types::RecallModel;

pub type Result<T> = std::result::Result<T, EbisuError>;

/// Coarse error classification for callers that only need to branch on the
/// kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed caller input (caller bug)
    InvalidArgument,
    /// A derived posterior quantity was non-positive (numerical breakdown)
    ConstraintViolation,
    /// The percentile-decay root could not be bracketed
    BracketingFailure,
    /// A conformance fixture could not be parsed
    Fixture,
}

/// Values that were in play when a posterior constraint failed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViolationContext {
    pub model: Option<RecallModel>,
    pub successes: Option<f64>,
    pub total: Option<u32>,
    pub elapsed: Option<f64>,
    pub mean: f64,
    pub variance: f64,
}

impl fmt::Display for ViolationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(model) = &self.model {
            write!(
                f,
                "alpha={}, beta={}, t={}, ",
                model.alpha, model.beta, model.reference_time
            )?;
        }
        if let Some(successes) = self.successes {
            write!(f, "successes={}, ", successes)?;
        }
        if let Some(total) = self.total {
            write!(f, "total={}, ", total)?;
        }
        if let Some(elapsed) = self.elapsed {
            write!(f, "elapsed={}, ", elapsed)?;
        }
        write!(f, "mean={}, variance={}", self.mean, self.variance)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EbisuError {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("constraint violation: {quantity} = {value} is not positive ({context})")]
    ConstraintViolation {
        quantity: &'static str,
        value: f64,
        context: ViolationContext,
    },

    #[error(
        "bracketing failure: {reason} (model={model:?}, percentile={percentile:?}, \
         bracket=[{low}, {high}], iterations={iterations})"
    )]
    BracketingFailure {
        reason: String,
        model: Option<RecallModel>,
        percentile: Option<f64>,
        low: f64,
        high: f64,
        iterations: u32,
    },

    #[error("fixture error: {0}")]
    Fixture(String),
}

impl EbisuError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        EbisuError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn violation(quantity: &'static str, value: f64, mean: f64, variance: f64) -> Self {
        EbisuError::ConstraintViolation {
            quantity,
            value,
            context: ViolationContext {
                mean,
                variance,
                ..ViolationContext::default()
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EbisuError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            EbisuError::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            EbisuError::BracketingFailure { .. } => ErrorKind::BracketingFailure,
            EbisuError::Fixture(_) => ErrorKind::Fixture,
        }
    }

    /// Attach the quiz that produced a constraint violation. Other variants
    /// pass through untouched.
    pub(crate) fn with_quiz(
        mut self,
        model: &RecallModel,
        successes: f64,
        total: u32,
        elapsed: f64,
    ) -> Self {
        if let EbisuError::ConstraintViolation { context, .. } = &mut self {
            context.model = Some(*model);
            context.successes = Some(successes);
            context.total = Some(total);
            context.elapsed = Some(elapsed);
        }
        self
    }

    /// Attach the model whose decay could not be bracketed.
    pub(crate) fn with_decay_target(mut self, target: &RecallModel, pct: f64) -> Self {
        if let EbisuError::BracketingFailure {
            model, percentile, ..
        } = &mut self
        {
            *model = Some(*target);
            *percentile = Some(pct);
        }
        self
    }
}

impl From<serde_json::Error> for EbisuError {
    fn from(err: serde_json::Error) -> Self {
        EbisuError::Fixture(err.to_string())
    }
}
