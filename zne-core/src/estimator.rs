//! Expectation value estimation from histograms

use crate::histogram::Histogram;
use serde::{Deserialize, Serialize};

/// Signed expectation value and its standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Estimate {
    pub expectation_value: f64,
    pub std_dev: f64,
}

/// Estimate `⟨Z⟩` restricted to the all-zeros / all-ones outcomes
///
/// Only the bitstrings `"0"*n` and `"1"*n` contribute; every other outcome
/// is ignored. With `p0 = zeros/total` and `p1 = ones/total`:
///
/// ```text
/// E   = p0 - p1
/// Var = p0 + p1 - E²
/// ```
///
/// Returns `(0, 0)` when neither outcome was observed.
pub fn estimate(histogram: &Histogram, n_qubits: usize) -> Estimate {
    let zeros = histogram.count(&"0".repeat(n_qubits));
    let ones = histogram.count(&"1".repeat(n_qubits));
    let total = zeros + ones;

    if total == 0 {
        return Estimate::default();
    }

    let p0 = zeros as f64 / total as f64;
    let p1 = ones as f64 / total as f64;
    let expectation_value = p0 - p1;
    let variance = p0 + p1 - expectation_value * expectation_value;

    Estimate {
        expectation_value,
        std_dev: variance.max(0.0).sqrt(),
    }
}
