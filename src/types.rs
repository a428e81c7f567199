use serde::{Deserialize, Serialize};

use crate::error::{EbisuError, Result};

// 常量定义
pub const DEFAULT_ALPHA: f64 = 3.0;
pub const HALF_LIFE_PERCENTILE: f64 = 0.5;
pub const REBALANCE_RATIO: f64 = 2.0;
pub const DEFAULT_DECAY_TOLERANCE: f64 = 1e-4;
pub const COARSE_BRACKET_WIDTH: f64 = 1.0;
pub const FINE_BRACKET_WIDTH: f64 = 6.0;
pub const MAX_BRACKET_ITERATIONS: u32 = 1000;
pub const MAX_SOLVER_ITERATIONS: u32 = 200;

/// RecallModel 结构体 (字段命名与 JSON 对齐)
///
/// 表示在上次复习后 `reference_time` 时刻，回忆概率服从 `Beta(alpha, beta)`。
/// 值语义：所有操作都返回新的模型，不做原地修改。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallModel {
    /// 参考时间 (与 elapsed 使用相同单位)
    pub reference_time: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl RecallModel {
    /// 创建并校验模型
    pub fn new(reference_time: f64, alpha: f64, beta: f64) -> Result<Self> {
        let model = Self {
            reference_time,
            alpha,
            beta,
        };
        model.validate()?;
        Ok(model)
    }

    /// 检查 `alpha > 0 ∧ beta > 0 ∧ reference_time > 0`，且均为有限值
    pub fn validate(&self) -> Result<()> {
        if !is_positive_finite(self.alpha) {
            return Err(EbisuError::invalid(format!(
                "alpha must be positive and finite, got {}",
                self.alpha
            )));
        }
        if !is_positive_finite(self.beta) {
            return Err(EbisuError::invalid(format!(
                "beta must be positive and finite, got {}",
                self.beta
            )));
        }
        if !is_positive_finite(self.reference_time) {
            return Err(EbisuError::invalid(format!(
                "reference time must be positive and finite, got {}",
                self.reference_time
            )));
        }
        Ok(())
    }

    /// 参考时间处的期望回忆概率 alpha / (alpha + beta)
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// 是否超出再平衡阈值
    pub fn is_skewed(&self, ratio: f64) -> bool {
        self.alpha > ratio * self.beta || self.beta > ratio * self.alpha
    }
}

/// 二元测验结果 (可能带噪声)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoisyQuiz {
    /// 测验结果 [0, 1]，大于 0.5 视为答对
    pub result: f64,
    /// 已遗忘时仍被判为答对的概率；缺省为 1 - max(result, 1 - result)
    pub q0: Option<f64>,
}

pub(crate) fn is_positive_finite(x: f64) -> bool {
    x.is_finite() && x > 0.0
}
