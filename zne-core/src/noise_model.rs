//! Noise channels and gate-level noise models
//!
//! A [`NoiseModel`] maps `(gate name, qubit or pair)` to a [`QuantumError`],
//! an ordered list of channel applications, and carries a per-qubit
//! [`ReadoutError`]. Models are assembled once (by the noise scaler or by
//! hand) and then only read by executors.

use crate::calibration::QubitPair;
use crate::error::{Result, ZneError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// Noise Channels
// =============================================================================

/// Elementary noise channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseChannel {
    /// `ρ → (1-p)ρ + p·I/2ⁿ` on `num_qubits` qubits
    Depolarizing { probability: f64, num_qubits: usize },

    /// Single-qubit T1/T2 relaxation over a gate of duration `time_us`
    ThermalRelaxation { t1_us: f64, t2_us: f64, time_us: f64 },
}

/// Outcome probabilities of a relaxation channel unravelled into
/// reset-to-|0⟩ and Pauli branches (identity takes the remainder)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxationProbabilities {
    pub reset: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RelaxationProbabilities {
    pub fn identity(&self) -> f64 {
        1.0 - self.reset - self.x - self.y - self.z
    }
}

impl NoiseChannel {
    /// Depolarizing channel with error probability `probability` ∈ [0, 1]
    pub fn depolarizing(probability: f64, num_qubits: usize) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ZneError::InvalidChannel(format!(
                "depolarizing probability must be in [0, 1], got {}",
                probability
            )));
        }
        if !(1..=2).contains(&num_qubits) {
            return Err(ZneError::InvalidChannel(format!(
                "depolarizing channel on {} qubits is not supported",
                num_qubits
            )));
        }
        Ok(NoiseChannel::Depolarizing {
            probability,
            num_qubits,
        })
    }

    /// Thermal relaxation channel
    ///
    /// Requires `T1 > 0`, `0 < T2 ≤ 2·T1` and a non-negative duration.
    pub fn thermal_relaxation(t1_us: f64, t2_us: f64, time_us: f64) -> Result<Self> {
        if !(t1_us > 0.0 && t2_us > 0.0) {
            return Err(ZneError::InvalidChannel(format!(
                "T1 and T2 must be positive (T1={}, T2={})",
                t1_us, t2_us
            )));
        }
        if t2_us > 2.0 * t1_us {
            return Err(ZneError::InvalidChannel(format!(
                "T2 ({}) must not exceed 2*T1 ({})",
                t2_us,
                2.0 * t1_us
            )));
        }
        if !(time_us >= 0.0 && time_us.is_finite()) {
            return Err(ZneError::InvalidChannel(format!(
                "gate time must be non-negative, got {}",
                time_us
            )));
        }
        Ok(NoiseChannel::ThermalRelaxation {
            t1_us,
            t2_us,
            time_us,
        })
    }

    pub fn num_qubits(&self) -> usize {
        match self {
            NoiseChannel::Depolarizing { num_qubits, .. } => *num_qubits,
            NoiseChannel::ThermalRelaxation { .. } => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NoiseChannel::Depolarizing { .. } => "depolarizing",
            NoiseChannel::ThermalRelaxation { .. } => "thermal_relaxation",
        }
    }

    /// Branch probabilities of a relaxation channel, `None` for other channels
    ///
    /// For `T2 ≤ T1` the channel is exactly a mixture of reset and phase
    /// flip. For `T1 < T2 ≤ 2·T1` the Pauli-twirled approximation is used.
    pub fn relaxation_probabilities(&self) -> Option<RelaxationProbabilities> {
        let (t1, t2, t) = match *self {
            NoiseChannel::ThermalRelaxation {
                t1_us,
                t2_us,
                time_us,
            } => (t1_us, t2_us, time_us),
            _ => return None,
        };

        let exp_t1 = (-t / t1).exp();
        let exp_t2 = (-t / t2).exp();

        if t2 <= t1 {
            let reset = 1.0 - exp_t1;
            // (1 - p_reset)(1 - e^{-t/T2}/e^{-t/T1}) / 2
            let z = ((exp_t1 - exp_t2) / 2.0).max(0.0);
            Some(RelaxationProbabilities {
                reset,
                x: 0.0,
                y: 0.0,
                z,
            })
        } else {
            let xy = (1.0 - exp_t1) / 4.0;
            let z = ((1.0 - exp_t2) / 2.0 - xy).max(0.0);
            Some(RelaxationProbabilities {
                reset: 0.0,
                x: xy,
                y: xy,
                z,
            })
        }
    }
}

// =============================================================================
// Quantum Error
// =============================================================================

/// One channel application on local qubit indices of a [`QuantumError`]
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorTerm {
    pub channel: NoiseChannel,
    pub qubits: Vec<usize>,
}

/// Ordered sequence of channels acting on `num_qubits` local qubits
#[derive(Debug, Clone, PartialEq)]
pub struct QuantumError {
    num_qubits: usize,
    terms: Vec<ErrorTerm>,
}

impl QuantumError {
    /// Error consisting of a single channel on local qubits `0..n`
    pub fn from_channel(channel: NoiseChannel) -> Self {
        let n = channel.num_qubits();
        Self {
            num_qubits: n,
            terms: vec![ErrorTerm {
                channel,
                qubits: (0..n).collect(),
            }],
        }
    }

    pub fn depolarizing(probability: f64, num_qubits: usize) -> Result<Self> {
        Ok(Self::from_channel(NoiseChannel::depolarizing(
            probability,
            num_qubits,
        )?))
    }

    pub fn thermal_relaxation(t1_us: f64, t2_us: f64, time_us: f64) -> Result<Self> {
        Ok(Self::from_channel(NoiseChannel::thermal_relaxation(
            t1_us, t2_us, time_us,
        )?))
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn terms(&self) -> &[ErrorTerm] {
        &self.terms
    }

    /// Apply `self` then `other` on the same qubits
    pub fn compose(&self, other: &QuantumError) -> Result<Self> {
        if self.num_qubits != other.num_qubits {
            return Err(ZneError::InvalidChannel(format!(
                "cannot compose a {}-qubit error with a {}-qubit error",
                self.num_qubits, other.num_qubits
            )));
        }
        let mut terms = self.terms.clone();
        terms.extend(other.terms.iter().cloned());
        Ok(Self {
            num_qubits: self.num_qubits,
            terms,
        })
    }

    /// Tensor product: `self` on the low local qubits, `other` above them
    pub fn expand(&self, other: &QuantumError) -> Self {
        let offset = self.num_qubits;
        let mut terms = self.terms.clone();
        terms.extend(other.terms.iter().map(|term| ErrorTerm {
            channel: term.channel,
            qubits: term.qubits.iter().map(|q| q + offset).collect(),
        }));
        Self {
            num_qubits: self.num_qubits + other.num_qubits,
            terms,
        }
    }
}

impl fmt::Display for QuantumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|term| match term.channel {
                NoiseChannel::Depolarizing { probability, .. } => {
                    format!("depolarizing(p={:.3e}){:?}", probability, term.qubits)
                }
                NoiseChannel::ThermalRelaxation {
                    t1_us,
                    t2_us,
                    time_us,
                } => format!(
                    "thermal(T1={:.2}us, T2={:.2}us, t={:.4}us){:?}",
                    t1_us, t2_us, time_us, term.qubits
                ),
            })
            .collect();
        write!(f, "{}", parts.join(" -> "))
    }
}

// =============================================================================
// Readout Error
// =============================================================================

/// Single-qubit readout confusion matrix
///
/// Row `i` is the outcome distribution for prepared state `|i⟩`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadoutError {
    probabilities: [[f64; 2]; 2],
}

impl ReadoutError {
    pub fn new(probabilities: [[f64; 2]; 2]) -> Result<Self> {
        for row in &probabilities {
            if row.iter().any(|p| !(0.0..=1.0).contains(p)) || (row[0] + row[1] - 1.0).abs() > 1e-9
            {
                return Err(ZneError::InvalidChannel(format!(
                    "readout row {:?} is not a probability distribution",
                    row
                )));
            }
        }
        Ok(Self { probabilities })
    }

    /// Build from `P(1|0)` and `P(0|1)`
    pub fn from_confusion(prob_meas1_prep0: f64, prob_meas0_prep1: f64) -> Result<Self> {
        Self::new([
            [1.0 - prob_meas1_prep0, prob_meas1_prep0],
            [prob_meas0_prep1, 1.0 - prob_meas0_prep1],
        ])
    }

    pub fn probabilities(&self) -> &[[f64; 2]; 2] {
        &self.probabilities
    }

    /// Probability that prepared bit `bit` is reported flipped
    pub fn flip_probability(&self, bit: u8) -> f64 {
        if bit == 0 {
            self.probabilities[0][1]
        } else {
            self.probabilities[1][0]
        }
    }
}

// =============================================================================
// Noise Model
// =============================================================================

/// Physical location a gate error is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoiseTarget {
    Qubit(usize),
    /// Local qubit 0 of the error maps to `pair.low()`, local 1 to `pair.high()`
    Pair(QubitPair),
}

impl NoiseTarget {
    pub fn num_qubits(&self) -> usize {
        match self {
            NoiseTarget::Qubit(_) => 1,
            NoiseTarget::Pair(_) => 2,
        }
    }

    /// Physical qubits, indexed by the error's local qubit index
    pub fn physical_qubits(&self) -> Vec<usize> {
        match self {
            NoiseTarget::Qubit(q) => vec![*q],
            NoiseTarget::Pair(pair) => vec![pair.low(), pair.high()],
        }
    }

    fn from_qubits(qubits: &[usize]) -> Option<Self> {
        match qubits {
            [q] => Some(NoiseTarget::Qubit(*q)),
            [a, b] => Some(NoiseTarget::Pair(QubitPair::new(*a, *b))),
            _ => None,
        }
    }
}

impl fmt::Display for NoiseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseTarget::Qubit(q) => write!(f, "[{}]", q),
            NoiseTarget::Pair(pair) => write!(f, "[{}, {}]", pair.low(), pair.high()),
        }
    }
}

/// Gate and readout noise for a device at a given scale factor
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseModel {
    scale_factor: f64,
    gate_errors: BTreeMap<(String, NoiseTarget), QuantumError>,
    readout_errors: BTreeMap<usize, ReadoutError>,
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl NoiseModel {
    /// Empty model tagged with the scale factor it represents
    pub fn new(scale_factor: f64) -> Self {
        Self {
            scale_factor,
            gate_errors: BTreeMap::new(),
            readout_errors: BTreeMap::new(),
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn is_ideal(&self) -> bool {
        self.gate_errors.is_empty() && self.readout_errors.is_empty()
    }

    /// Attach `error` to `gate` on `target`
    ///
    /// An error already present for the same key is composed with the new one.
    pub fn add_quantum_error(
        &mut self,
        error: QuantumError,
        gate: &str,
        target: NoiseTarget,
    ) -> Result<()> {
        if error.num_qubits() != target.num_qubits() {
            return Err(ZneError::InvalidChannel(format!(
                "{}-qubit error cannot be attached to '{}' on {}",
                error.num_qubits(),
                gate,
                target
            )));
        }

        let key = (gate.to_string(), target);
        let combined = match self.gate_errors.get(&key) {
            Some(existing) => existing.compose(&error)?,
            None => error,
        };
        self.gate_errors.insert(key, combined);
        Ok(())
    }

    pub fn add_readout_error(&mut self, error: ReadoutError, qubit: usize) {
        self.readout_errors.insert(qubit, error);
    }

    /// Error attached to `gate` applied on `qubits`, if any
    pub fn gate_error(&self, gate: &str, qubits: &[usize]) -> Option<(&QuantumError, NoiseTarget)> {
        let target = NoiseTarget::from_qubits(qubits)?;
        self.gate_errors
            .get(&(gate.to_string(), target))
            .map(|error| (error, target))
    }

    pub fn readout_error(&self, qubit: usize) -> Option<&ReadoutError> {
        self.readout_errors.get(&qubit)
    }

    /// Instruction names carrying at least one error
    pub fn noisy_gates(&self) -> BTreeSet<&str> {
        self.gate_errors.keys().map(|(gate, _)| gate.as_str()).collect()
    }

    /// Qubits with gate or readout noise
    pub fn noisy_qubits(&self) -> BTreeSet<usize> {
        self.gate_errors
            .keys()
            .flat_map(|(_, target)| target.physical_qubits())
            .chain(self.readout_errors.keys().copied())
            .collect()
    }

    /// Iterate over every `(gate, target, error)` entry
    pub fn gate_errors(&self) -> impl Iterator<Item = (&str, NoiseTarget, &QuantumError)> {
        self.gate_errors
            .iter()
            .map(|((gate, target), error)| (gate.as_str(), *target, error))
    }

    /// Short description
    pub fn summary(&self) -> String {
        let gates: Vec<&str> = self.noisy_gates().into_iter().collect();
        let qubits: Vec<String> = self.noisy_qubits().iter().map(|q| q.to_string()).collect();
        format!(
            "NoiseModel(scale={}): noisy gates [{}], noisy qubits [{}], {} gate errors, {} readout errors",
            self.scale_factor,
            gates.join(", "),
            qubits.join(", "),
            self.gate_errors.len(),
            self.readout_errors.len()
        )
    }
}

impl fmt::Display for NoiseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for ((gate, target), error) in &self.gate_errors {
            writeln!(f, "  {} {}: {}", gate, target, error)?;
        }
        for (qubit, readout) in &self.readout_errors {
            writeln!(f, "  readout [{}]: {:?}", qubit, readout.probabilities())?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
