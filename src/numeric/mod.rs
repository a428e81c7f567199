use crate::error::{EbisuError, Result};
use crate::types::is_positive_finite;

/// 对数域带符号求和: 返回 (ln|Σ b_i·exp(a_i)|, sign)
///
/// 先提取最大的 a_i 再取指数，避免大数溢出。
/// 空输入、全部为 -inf、或恰好抵消时返回 (-inf, 0.0)。
pub fn log_sum_exp(logs: &[f64], signs: &[f64]) -> Result<(f64, f64)> {
    if logs.len() != signs.len() {
        return Err(EbisuError::invalid(format!(
            "log_sum_exp: {} magnitudes but {} signs",
            logs.len(),
            signs.len()
        )));
    }

    let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Ok((f64::NEG_INFINITY, 0.0));
    }
    if !max.is_finite() {
        // +inf 或 NaN 无法安全提取
        return Ok((max, f64::NAN));
    }

    let sum: f64 = logs
        .iter()
        .zip(signs)
        .map(|(&a, &b)| b * (a - max).exp())
        .sum();

    if sum == 0.0 {
        return Ok((f64::NEG_INFINITY, 0.0));
    }

    Ok((sum.abs().ln() + max, sum.signum()))
}

/// 矩匹配: 由 (mean, variance) 求 Beta 分布的 (alpha, beta)
///
/// common = mean·(1−mean)/variance − 1
pub fn moments_to_shape(mean: f64, variance: f64) -> Result<(f64, f64)> {
    if !is_positive_finite(variance) {
        return Err(EbisuError::violation("variance", variance, mean, variance));
    }

    let common = mean * (1.0 - mean) / variance - 1.0;
    let alpha = mean * common;
    let beta = (1.0 - mean) * common;

    if !is_positive_finite(alpha) {
        return Err(EbisuError::violation("alpha", alpha, mean, variance));
    }
    if !is_positive_finite(beta) {
        return Err(EbisuError::violation("beta", beta, mean, variance));
    }

    Ok((alpha, beta))
}

/// 检查后验矩: mean、二阶矩、方差都必须为正
pub fn check_moments(mean: f64, second_moment: f64) -> Result<f64> {
    let variance = second_moment - mean * mean;

    if mean.is_nan() || mean <= 0.0 {
        return Err(EbisuError::violation("mean", mean, mean, variance));
    }
    if second_moment.is_nan() || second_moment <= 0.0 {
        return Err(EbisuError::violation("second moment", second_moment, mean, variance));
    }
    if variance.is_nan() || variance <= 0.0 {
        return Err(EbisuError::violation("variance", variance, mean, variance));
    }

    Ok(variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_log_sum_exp_positive() {
        let logs = [1.0_f64.ln(), 2.0_f64.ln(), 3.0_f64.ln()];
        let (value, sign) = log_sum_exp(&logs, &[1.0, 1.0, 1.0]).unwrap();
        assert!((value - 6.0_f64.ln()).abs() < EPSILON);
        assert_eq!(sign, 1.0);
    }

    #[test]
    fn test_log_sum_exp_signed() {
        // 2 - 5 = -3
        let logs = [2.0_f64.ln(), 5.0_f64.ln()];
        let (value, sign) = log_sum_exp(&logs, &[1.0, -1.0]).unwrap();
        assert!((value - 3.0_f64.ln()).abs() < EPSILON);
        assert_eq!(sign, -1.0);
    }

    #[test]
    fn test_log_sum_exp_large_magnitudes() {
        // exp(1000) 直接计算会溢出
        let (value, sign) = log_sum_exp(&[1000.0, 1000.0], &[1.0, 1.0]).unwrap();
        assert!((value - (1000.0 + 2.0_f64.ln())).abs() < 1e-9);
        assert_eq!(sign, 1.0);

        let (value, _) = log_sum_exp(&[-1000.0, -1001.0], &[1.0, 1.0]).unwrap();
        assert!(value.is_finite());
    }

    #[test]
    fn test_log_sum_exp_cancellation_and_empty() {
        let (value, sign) = log_sum_exp(&[0.5, 0.5], &[1.0, -1.0]).unwrap();
        assert_eq!(value, f64::NEG_INFINITY);
        assert_eq!(sign, 0.0);

        let (value, sign) = log_sum_exp(&[], &[]).unwrap();
        assert_eq!(value, f64::NEG_INFINITY);
        assert_eq!(sign, 0.0);
    }

    #[test]
    fn test_log_sum_exp_length_mismatch() {
        let err = log_sum_exp(&[0.0, 1.0], &[1.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_moments_to_shape_roundtrip_values() {
        // Beta(3, 2): mean = 0.6, var = 6 / (25 * 6) = 0.04
        let (alpha, beta) = moments_to_shape(0.6, 0.04).unwrap();
        assert!((alpha - 3.0).abs() < 1e-9);
        assert!((beta - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_moments_to_shape_rejects_bad_variance() {
        assert_eq!(
            moments_to_shape(0.5, 0.0).unwrap_err().kind(),
            ErrorKind::ConstraintViolation
        );
        // variance 大于 mean·(1−mean) 时 common < 0
        assert_eq!(
            moments_to_shape(0.5, 0.3).unwrap_err().kind(),
            ErrorKind::ConstraintViolation
        );
    }

    #[test]
    fn test_check_moments() {
        assert!((check_moments(0.6, 0.4).unwrap() - 0.04).abs() < EPSILON);
        assert!(check_moments(-0.1, 0.4).is_err());
        assert!(check_moments(0.5, 0.0).is_err());
        assert!(check_moments(0.5, 0.25).is_err());
        assert!(check_moments(f64::NAN, 0.25).is_err());
    }
}
