//! Zero-noise extrapolation
//!
//! Fits the `(scale factor, expectation value)` points of a sweep and
//! evaluates the fit at zero noise.
//!
//! Reference: Temme et al., PRL 119, 180509 (2017)

use crate::error::{Result, ZneError};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Extrapolation Methods
// =============================================================================

/// Model fitted to the scaled expectation values
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationType {
    /// Linear fit: E(λ) = a + b·λ → E(0) = a
    #[default]
    Linear,
    /// Polynomial fit of the given degree (Richardson extrapolation)
    Richardson(usize),
    /// Exponential decay: E(λ) = a·exp(b·λ), fitted in log space
    Exponential,
}

impl fmt::Display for ExtrapolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtrapolationType::Linear => write!(f, "linear"),
            ExtrapolationType::Richardson(d) => write!(f, "richardson(d={})", d),
            ExtrapolationType::Exponential => write!(f, "exponential"),
        }
    }
}

/// Result of an extrapolation
#[derive(Debug, Clone, PartialEq)]
pub struct Extrapolation {
    pub method: ExtrapolationType,
    /// Estimated zero-noise expectation value
    pub zero_noise_value: f64,
    /// Points the fit was computed from
    pub points: Vec<(f64, f64)>,
    /// Measured value at scale 1, if present
    pub unmitigated_value: Option<f64>,
}

impl Extrapolation {
    /// Improvement ratio `|unmitigated - ideal| / |mitigated - ideal|`
    pub fn improvement_ratio(&self, ideal: f64) -> Option<f64> {
        let unmitigated = self.unmitigated_value?;
        let mit_error = (self.zero_noise_value - ideal).abs();
        if mit_error > 1e-15 {
            Some((unmitigated - ideal).abs() / mit_error)
        } else {
            None
        }
    }
}

/// Extrapolator for fitting and extrapolating to zero noise
#[derive(Debug, Clone, Copy, Default)]
pub struct Extrapolator {
    method: ExtrapolationType,
}

impl Extrapolator {
    pub fn new(method: ExtrapolationType) -> Self {
        Self { method }
    }

    pub fn method(&self) -> ExtrapolationType {
        self.method
    }

    /// Fit `(scale_factor, expectation)` pairs and evaluate at zero noise
    pub fn fit(&self, points: &[(f64, f64)]) -> Result<Extrapolation> {
        if points.is_empty() {
            return Err(ZneError::InvalidConfig(
                "extrapolation needs at least one data point".into(),
            ));
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(ZneError::InvalidConfig(
                "extrapolation data contains non-finite values".into(),
            ));
        }

        let mut factors: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
        factors.sort_by(f64::total_cmp);
        if factors.windows(2).any(|pair| (pair[1] - pair[0]).abs() < 1e-12) {
            return Err(ZneError::InvalidConfig(
                "extrapolation needs distinct scale factors".into(),
            ));
        }

        let zero_noise_value = self.extrapolate(points);
        if !zero_noise_value.is_finite() {
            return Err(ZneError::InvalidConfig(format!(
                "{} fit produced a non-finite zero-noise value",
                self.method
            )));
        }
        let unmitigated_value = points
            .iter()
            .find(|(x, _)| (x - 1.0).abs() < 1e-10)
            .map(|(_, y)| *y);

        Ok(Extrapolation {
            method: self.method,
            zero_noise_value,
            points: points.to_vec(),
            unmitigated_value,
        })
    }

    /// Extrapolated value at zero noise; `0.0` for empty input
    ///
    /// Unchecked: repeated factors can yield a non-finite value. [`Self::fit`]
    /// rejects those.
    pub fn extrapolate(&self, data: &[(f64, f64)]) -> f64 {
        match self.method {
            ExtrapolationType::Linear => linear_intercept(data),
            ExtrapolationType::Richardson(degree) => richardson_intercept(data, degree),
            ExtrapolationType::Exponential => exponential_intercept(data),
        }
    }
}

/// Least-squares line intercept
fn linear_intercept(data: &[(f64, f64)]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    if data.len() == 1 {
        return data[0].1;
    }

    let n = data.len() as f64;
    let sum_x: f64 = data.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = data.iter().map(|(_, y)| y).sum();
    let sum_xx: f64 = data.iter().map(|(x, _)| x * x).sum();
    let sum_xy: f64 = data.iter().map(|(x, y)| x * y).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < 1e-15 {
        return sum_y / n;
    }

    (sum_y * sum_xx - sum_x * sum_xy) / denom
}

fn richardson_intercept(data: &[(f64, f64)], degree: usize) -> f64 {
    if data.len() <= 1 {
        return linear_intercept(data);
    }

    let d = degree.clamp(1, data.len() - 1);
    if d == 1 {
        return linear_intercept(data);
    }

    // Lagrange interpolation at λ=0 for an exact quadratic through 3 points
    if d == 2 && data.len() == 3 {
        let (x0, y0) = data[0];
        let (x1, y1) = data[1];
        let (x2, y2) = data[2];

        let l0 = x1 * x2 / ((x0 - x1) * (x0 - x2));
        let l1 = x0 * x2 / ((x1 - x0) * (x1 - x2));
        let l2 = x0 * x1 / ((x2 - x0) * (x2 - x1));

        return y0 * l0 + y1 * l1 + y2 * l2;
    }

    polynomial_intercept(data, d)
}

/// Constant term of a least-squares polynomial of degree `degree`
fn polynomial_intercept(data: &[(f64, f64)], degree: usize) -> f64 {
    let d = degree + 1;

    // Normal equations: AᵀA c = Aᵀy
    let mut ata = vec![vec![0.0; d]; d];
    let mut aty = vec![0.0; d];

    for (x, y) in data {
        let mut xi = 1.0;
        for i in 0..d {
            let mut xj = 1.0;
            for j in 0..d {
                ata[i][j] += xi * xj;
                xj *= x;
            }
            aty[i] += xi * y;
            xi *= x;
        }
    }

    solve_linear_system(&mut ata, &mut aty)
        .first()
        .copied()
        .unwrap_or(0.0)
}

/// Gaussian elimination with partial pivoting
fn solve_linear_system(a: &mut [Vec<f64>], b: &mut [f64]) -> Vec<f64> {
    let n = b.len();

    for i in 0..n {
        let max_row = (i..n)
            .max_by(|&p, &q| a[p][i].abs().total_cmp(&a[q][i].abs()))
            .unwrap_or(i);
        a.swap(i, max_row);
        b.swap(i, max_row);

        if a[i][i].abs() < 1e-15 {
            continue;
        }

        for k in (i + 1)..n {
            let factor = a[k][i] / a[i][i];
            for j in i..n {
                a[k][j] -= factor * a[i][j];
            }
            b[k] -= factor * b[i];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        if a[i][i].abs() < 1e-15 {
            continue;
        }
        x[i] = b[i];
        for j in (i + 1)..n {
            x[i] -= a[i][j] * x[j];
        }
        x[i] /= a[i][i];
    }
    x
}

/// Log-linear fit over the positive values; linear fallback otherwise
fn exponential_intercept(data: &[(f64, f64)]) -> f64 {
    let log_data: Vec<(f64, f64)> = data
        .iter()
        .filter(|(_, y)| *y > 0.0)
        .map(|(x, y)| (*x, y.ln()))
        .collect();

    if log_data.len() < 2 {
        tracing::debug!(
            positive = log_data.len(),
            "too few positive values for an exponential fit, using linear"
        );
        return linear_intercept(data);
    }

    linear_intercept(&log_data).exp()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extrapolator_linear() {
        // E(λ) = 1.0 - 0.1·λ
        let data = vec![(1.0, 0.9), (2.0, 0.8), (3.0, 0.7)];
        let result = Extrapolator::new(ExtrapolationType::Linear).extrapolate(&data);
        assert!((result - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_extrapolator_richardson() {
        // E(λ) = 1.0 - 0.1·λ + 0.01·λ²
        let data: Vec<(f64, f64)> = [1.0, 3.0, 5.0]
            .iter()
            .map(|&x: &f64| (x, 1.0 - 0.1 * x + 0.01 * x * x))
            .collect();
        let result = Extrapolator::new(ExtrapolationType::Richardson(2)).extrapolate(&data);
        assert!((result - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_polynomial_fit() {
        // E(λ) = 0.8 + 0.05·λ - 0.02·λ² + 0.001·λ³ over five odd factors
        let data: Vec<(f64, f64)> = [1.0, 3.0, 5.0, 7.0, 9.0]
            .iter()
            .map(|&x: &f64| (x, 0.8 + 0.05 * x - 0.02 * x * x + 0.001 * x * x * x))
            .collect();
        let result = Extrapolator::new(ExtrapolationType::Richardson(3)).extrapolate(&data);
        assert!((result - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_extrapolator_exponential() {
        // E(λ) = 0.9·exp(-0.2·λ)
        let data: Vec<(f64, f64)> = [1.0, 3.0, 5.0]
            .iter()
            .map(|&x: &f64| (x, 0.9 * (-0.2 * x).exp()))
            .collect();
        let result = Extrapolator::new(ExtrapolationType::Exponential).extrapolate(&data);
        assert!((result - 0.9).abs() < 1e-10);
    }

    #[test]
    fn test_exponential_falls_back_on_negative_values() {
        let data = vec![(1.0, -0.1), (2.0, -0.2), (3.0, -0.3)];
        let exp = Extrapolator::new(ExtrapolationType::Exponential).extrapolate(&data);
        let lin = Extrapolator::new(ExtrapolationType::Linear).extrapolate(&data);
        assert!((exp - lin).abs() < 1e-10);
    }

    #[test]
    fn test_extrapolator_single_point() {
        let data = vec![(1.0, 0.5)];
        for method in [
            ExtrapolationType::Linear,
            ExtrapolationType::Richardson(2),
            ExtrapolationType::Exponential,
        ] {
            assert!((Extrapolator::new(method).extrapolate(&data) - 0.5).abs() < 1e-10);
        }
    }

    #[test]
    fn test_fit_rejects_empty_and_non_finite() {
        let extrapolator = Extrapolator::default();
        assert!(extrapolator.fit(&[]).is_err());
        assert!(extrapolator.fit(&[(1.0, f64::NAN)]).is_err());
    }

    #[test]
    fn test_fit_rejects_repeated_factors() {
        let data = [(1.0, 0.9), (1.0, 0.88), (3.0, 0.7)];
        for method in [
            ExtrapolationType::Linear,
            ExtrapolationType::Richardson(2),
            ExtrapolationType::Exponential,
        ] {
            assert!(matches!(
                Extrapolator::new(method).fit(&data),
                Err(ZneError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_fit_rejects_non_finite_result() {
        // ln-space intercept ≈ 2072, beyond f64 range once exponentiated
        let data = [(1.0, 1e300), (2.0, 1e-300)];
        assert!(Extrapolator::new(ExtrapolationType::Exponential)
            .fit(&data)
            .is_err());
    }

    #[test]
    fn test_fit_reports_unmitigated_value() {
        let fit = Extrapolator::default()
            .fit(&[(1.0, 0.9), (3.0, 0.7), (5.0, 0.5)])
            .unwrap();

        assert_eq!(fit.unmitigated_value, Some(0.9));
        assert!((fit.zero_noise_value - 1.0).abs() < 1e-10);
        let ratio = fit.improvement_ratio(0.98).unwrap();
        assert!((ratio - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_method_serde() {
        let json = serde_json::to_string(&ExtrapolationType::Richardson(2)).unwrap();
        assert_eq!(json, r#"{"richardson":2}"#);
        let parsed: ExtrapolationType = serde_json::from_str(r#""exponential""#).unwrap();
        assert_eq!(parsed, ExtrapolationType::Exponential);
    }
}
