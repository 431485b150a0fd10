//! Noise amplification
//!
//! Two strategies raise a circuit's exposure to gate errors by an integer
//! factor:
//!
//! - **Local folding**: every gate `G` is replaced by `G·G†·G` blocks, which
//!   leaves the ideal output unchanged while multiplying the number of noisy
//!   gate applications.
//! - **Global repetition**: the whole circuit (measurements included) is
//!   composed with itself `factor` times. This relies on an accompanying
//!   scaled noise model rather than on ideal-output invariance.

use crate::circuit::{Circuit, Operation};
use crate::error::{Result, ZneError};
use serde::{Deserialize, Serialize};

/// How a local fold expands a single gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldConvention {
    /// `[G, G†, G]` emitted `factor` times (3·factor gates per input gate)
    #[default]
    Triplet,
    /// `G (G† G)^((factor-1)/2)` (factor gates per input gate, odd factors only)
    Unitary,
}

/// Noise amplification strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy", content = "convention")]
pub enum Amplifier {
    /// Gate-level folding
    LocalFolding(FoldConvention),
    /// Whole-circuit repetition
    GlobalRepetition,
}

impl Default for Amplifier {
    fn default() -> Self {
        Amplifier::LocalFolding(FoldConvention::Triplet)
    }
}

impl Amplifier {
    /// Produce the amplified circuit for `factor`
    pub fn amplify(&self, circuit: &Circuit, factor: u32) -> Result<Circuit> {
        match self {
            Amplifier::LocalFolding(convention) => fold_gates(circuit, factor, *convention),
            Amplifier::GlobalRepetition => repeat_circuit(circuit, factor),
        }
    }

    /// Reject a factor this strategy cannot produce
    pub fn check_factor(&self, factor: u32) -> Result<()> {
        if factor == 0 {
            return Err(ZneError::invalid_factor(factor, "amplification factor must be at least 1"));
        }
        if *self == Amplifier::LocalFolding(FoldConvention::Unitary) && factor % 2 == 0 {
            return Err(ZneError::invalid_factor(
                factor,
                "unitary folding requires an odd factor",
            ));
        }
        Ok(())
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Amplifier::LocalFolding(FoldConvention::Triplet) => "local-folding",
            Amplifier::LocalFolding(FoldConvention::Unitary) => "local-folding-unitary",
            Amplifier::GlobalRepetition => "global-repetition",
        }
    }
}

/// Fold every non-measurement gate of `circuit`
///
/// Measurements and barriers are copied once, in place.
pub fn fold_gates(circuit: &Circuit, factor: u32, convention: FoldConvention) -> Result<Circuit> {
    if factor == 0 {
        return Err(ZneError::invalid_factor(factor, "fold factor must be at least 1"));
    }

    match convention {
        FoldConvention::Triplet if factor % 2 == 0 => {
            tracing::debug!(factor, "even fold factor with the triplet convention");
        }
        FoldConvention::Unitary if factor % 2 == 0 => {
            return Err(ZneError::invalid_factor(
                factor,
                "unitary folding requires an odd factor",
            ));
        }
        _ => {}
    }

    let mut folded = circuit.empty_like();

    for op in circuit.operations() {
        let gate = match op {
            Operation::Gate(gate) => gate,
            Operation::Measure { .. } | Operation::Barrier(_) => {
                folded.push(op.clone());
                continue;
            }
        };

        let inverse = gate.inverse();
        match convention {
            FoldConvention::Triplet => {
                for _ in 0..factor {
                    folded.add(gate.clone());
                    folded.add(inverse.clone());
                    folded.add(gate.clone());
                }
            }
            FoldConvention::Unitary => {
                folded.add(gate.clone());
                for _ in 0..(factor - 1) / 2 {
                    folded.add(inverse.clone());
                    folded.add(gate.clone());
                }
            }
        }
    }

    Ok(folded)
}

/// Sequentially compose `circuit` with itself `factor` times
pub fn repeat_circuit(circuit: &Circuit, factor: u32) -> Result<Circuit> {
    if factor == 0 {
        return Err(ZneError::invalid_factor(factor, "repetition factor must be at least 1"));
    }

    let mut repeated = circuit.empty_like();
    for _ in 0..factor {
        repeated.append(circuit)?;
    }
    Ok(repeated)
}
