//! 参考向量 (conformance fixtures)
//!
//! 用于跨实现校验，不是生产数据格式。文件为 JSON 数组，每个元素是:
//!
//! ```text
//! ["update",  [alpha, beta, t0], [successes, total, elapsed], {"post": [alpha2, beta2, t1]}]
//! ["predict", [alpha, beta, t0], [elapsed],                   {"post": [meanRecall]}]
//! ```

use serde::Deserialize;

use crate::error::{EbisuError, Result};
use crate::recall::EbisuEngine;
use crate::solver::RootFinder;
use crate::special::LogBeta;
use crate::types::RecallModel;

/// 跨库浮点差异的默认相对容差
pub const CROSS_LIBRARY_TOLERANCE: f64 = 5e-2;
/// 自洽检查的相对容差
pub const SELF_CONSISTENCY_TOLERANCE: f64 = 5e-8;

#[derive(Debug, Clone, PartialEq)]
pub enum ConformanceCase {
    Update {
        prior: RecallModel,
        successes: u32,
        total: u32,
        elapsed: f64,
        expected: RecallModel,
    },
    Predict {
        model: RecallModel,
        elapsed: f64,
        expected: f64,
    },
}

impl ConformanceCase {
    pub fn label(&self) -> String {
        match self {
            ConformanceCase::Update {
                prior,
                successes,
                total,
                elapsed,
                ..
            } => format!(
                "update Beta({}, {}) @ {}: {}/{} at {}",
                prior.alpha, prior.beta, prior.reference_time, successes, total, elapsed
            ),
            ConformanceCase::Predict { model, elapsed, .. } => format!(
                "predict Beta({}, {}) @ {}: at {}",
                model.alpha, model.beta, model.reference_time, elapsed
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FixtureMismatch {
    #[error("{case}: {field} expected {expected}, got {actual}")]
    Value {
        case: String,
        field: &'static str,
        expected: f64,
        actual: f64,
    },

    #[error("{case}: {source}")]
    Engine {
        case: String,
        #[source]
        source: EbisuError,
    },
}

#[derive(Deserialize)]
struct Expected {
    post: Vec<f64>,
}

type RawCase = (String, Vec<f64>, Vec<f64>, Expected);

/// 解析参考向量文件
pub fn load_cases(json: &str) -> Result<Vec<ConformanceCase>> {
    let raw: Vec<RawCase> = serde_json::from_str(json)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, case)| {
            parse_case(case).map_err(|err| EbisuError::Fixture(format!("case {index}: {err}")))
        })
        .collect()
}

fn parse_case((kind, model, args, expected): RawCase) -> Result<ConformanceCase> {
    let [alpha, beta, t0] = take::<3>(&model, "model")?;
    let model = RecallModel::new(t0, alpha, beta)?;

    match kind.as_str() {
        "update" => {
            let [successes, total, elapsed] = take::<3>(&args, "quiz")?;
            let [alpha2, beta2, t1] = take::<3>(&expected.post, "post")?;
            Ok(ConformanceCase::Update {
                prior: model,
                successes: count(successes, "successes")?,
                total: count(total, "total")?,
                elapsed,
                expected: RecallModel::new(t1, alpha2, beta2)?,
            })
        }
        "predict" => {
            let [elapsed] = take::<1>(&args, "elapsed")?;
            let [recall] = take::<1>(&expected.post, "post")?;
            Ok(ConformanceCase::Predict {
                model,
                elapsed,
                expected: recall,
            })
        }
        other => Err(EbisuError::Fixture(format!("unknown case kind {other:?}"))),
    }
}

fn take<const N: usize>(values: &[f64], what: &str) -> Result<[f64; N]> {
    values.try_into().map_err(|_| {
        EbisuError::Fixture(format!(
            "{what} needs {N} numbers, got {}",
            values.len()
        ))
    })
}

fn count(value: f64, what: &str) -> Result<u32> {
    if value.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&value) {
        return Err(EbisuError::Fixture(format!(
            "{what} must be a non-negative integer, got {value}"
        )));
    }
    Ok(value as u32)
}

/// 重新计算一个用例，并按相对容差比较
pub fn check_case<B: LogBeta, R: RootFinder>(
    engine: &EbisuEngine<B, R>,
    case: &ConformanceCase,
    tolerance: f64,
) -> std::result::Result<(), FixtureMismatch> {
    let engine_error = |source| FixtureMismatch::Engine {
        case: case.label(),
        source,
    };

    match case {
        ConformanceCase::Update {
            prior,
            successes,
            total,
            elapsed,
            expected,
        } => {
            let actual = engine
                .update_recall(prior, *successes, *total, *elapsed)
                .map_err(engine_error)?;
            compare(case, "alpha", expected.alpha, actual.alpha, tolerance)?;
            compare(case, "beta", expected.beta, actual.beta, tolerance)?;
            compare(
                case,
                "reference time",
                expected.reference_time,
                actual.reference_time,
                tolerance,
            )
        }
        ConformanceCase::Predict {
            model,
            elapsed,
            expected,
        } => {
            let actual = engine
                .predict_recall(model, *elapsed, true)
                .map_err(engine_error)?;
            compare(case, "recall", *expected, actual, tolerance)
        }
    }
}

/// 校验全部用例，返回所有不匹配项
pub fn check_all<B: LogBeta, R: RootFinder>(
    engine: &EbisuEngine<B, R>,
    cases: &[ConformanceCase],
    tolerance: f64,
) -> Vec<FixtureMismatch> {
    cases
        .iter()
        .filter_map(|case| check_case(engine, case, tolerance).err())
        .collect()
}

fn compare(
    case: &ConformanceCase,
    field: &'static str,
    expected: f64,
    actual: f64,
    tolerance: f64,
) -> std::result::Result<(), FixtureMismatch> {
    let scale = expected.abs().max(f64::MIN_POSITIVE);
    if (actual - expected).abs() <= tolerance * scale {
        Ok(())
    } else {
        Err(FixtureMismatch::Value {
            case: case.label(),
            field,
            expected,
            actual,
        })
    }
}
