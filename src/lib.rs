//! # danci-ebisu - Ebisu 贝叶斯记忆模型
//!
//! 本 crate 提供纯 Rust 实现的 Ebisu 记忆模型:
//!
//! - **PredictRecall** - 任意间隔后的回忆概率预测
//! - **UpdateRecall** - 二项测验结果后的精确贝叶斯后验
//! - **Rebalance** - 将模型重新锚定在半衰期附近，保持 alpha ≈ beta
//! - **PercentileDecay** - 回忆概率降到目标分位点所需的时间
//!
//! ## 设计理念
//!
//! - **纯函数** - 模型是不可变值，每次操作返回新值
//! - **可替换后端** - log-Beta 函数与求根器通过 trait 注入
//! - **显式错误** - 所有失败通过 [`EbisuError`] 返回，不 panic
//!
//! ## 模块结构
//!
//! - [`types`] - 公共类型和常量 ([`RecallModel`])
//! - [`error`] - 错误类型
//! - [`config`] - 引擎配置
//! - [`special`] - log-Beta 特殊函数后端
//! - [`solver`] - 有界区间求根器
//! - [`numeric`] - 对数域求和、矩匹配
//! - [`decay`] - 分位衰减 (半衰期) 求解
//! - [`recall`] - 预测、更新、再平衡
//! - [`fixtures`] - 参考向量读取与校验
//!
//! ## 使用示例
//!
//! ```rust
//! use danci_ebisu::{default_model, predict_recall, update_recall};
//!
//! // 初始先验: 24 小时后回忆概率服从 Beta(3, 3)
//! let prior = default_model(24.0).unwrap();
//! let p = predict_recall(&prior, 12.0, true).unwrap();
//! assert!(p > 0.5);
//!
//! // 30 小时后复习并答对
//! let posterior = update_recall(&prior, 1, 1, 30.0).unwrap();
//! assert!(posterior.alpha > 0.0 && posterior.beta > 0.0);
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod config;
pub mod decay;
pub mod error;
pub mod fixtures;
pub mod numeric;
pub mod recall;
pub mod solver;
pub mod special;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

/// 重新导出所有公共类型
pub use types::*;

pub use config::EbisuConfig;
pub use error::{EbisuError, ErrorKind, Result};

/// 重新导出数值后端
pub use solver::{BrentSolver, RootFinder};
pub use special::{LogBeta, StatrsLogBeta};

/// 重新导出记忆模型操作
pub use decay::{half_life, model_to_percentile_decay, percentile_decay};
pub use recall::{
    default_model, predict_recall, rebalance, rescale_half_life, update_recall,
    update_recall_noisy, update_recall_noisy_with, update_recall_with, EbisuEngine,
};
