//! Device calibration data
//!
//! Per-qubit coherence times, gate error rates and durations, readout
//! confusion probabilities, and per-edge two-qubit gate data. Calibrations
//! are read-only inputs to the noise scaler.

use crate::error::{Result, ZneError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// =============================================================================
// Qubit Calibration
// =============================================================================

/// Readout confusion probabilities of a single qubit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadoutCalibration {
    /// P(measure 1 | prepared 0)
    pub prob_meas1_prep0: f64,
    /// P(measure 0 | prepared 1)
    pub prob_meas0_prep1: f64,
}

/// Calibration record of one physical qubit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QubitCalibration {
    /// Physical qubit index
    pub index: usize,
    /// Energy relaxation time in µs
    pub t1_us: f64,
    /// Dephasing time in µs
    pub t2_us: f64,
    /// Gate name -> error rate
    #[serde(default)]
    pub gate_errors: BTreeMap<String, f64>,
    /// Gate name -> duration in ns
    #[serde(default)]
    pub gate_times_ns: BTreeMap<String, f64>,
    #[serde(default)]
    pub readout: ReadoutCalibration,
    /// Qubit frequency in GHz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_ghz: Option<f64>,
    /// Anharmonicity in GHz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anharmonicity_ghz: Option<f64>,
    /// Readout pulse length in ns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readout_length_ns: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readout_assignment_error: Option<f64>,
}

impl QubitCalibration {
    /// Create a record with coherence times only
    pub fn new(index: usize, t1_us: f64, t2_us: f64) -> Self {
        Self {
            index,
            t1_us,
            t2_us,
            gate_errors: BTreeMap::new(),
            gate_times_ns: BTreeMap::new(),
            readout: ReadoutCalibration::default(),
            frequency_ghz: None,
            anharmonicity_ghz: None,
            readout_length_ns: None,
            readout_assignment_error: None,
        }
    }

    pub fn with_gate_error(mut self, gate: &str, error: f64) -> Self {
        self.gate_errors.insert(gate.to_string(), error);
        self
    }

    pub fn with_gate_time(mut self, gate: &str, time_ns: f64) -> Self {
        self.gate_times_ns.insert(gate.to_string(), time_ns);
        self
    }

    pub fn with_readout(mut self, prob_meas1_prep0: f64, prob_meas0_prep1: f64) -> Self {
        self.readout = ReadoutCalibration {
            prob_meas1_prep0,
            prob_meas0_prep1,
        };
        self
    }

    pub fn gate_error(&self, gate: &str) -> Option<f64> {
        self.gate_errors.get(gate).copied()
    }

    pub fn gate_time_ns(&self, gate: &str) -> Option<f64> {
        self.gate_times_ns.get(gate).copied()
    }
}

// =============================================================================
// Edge Calibration
// =============================================================================

/// Unordered pair of physical qubits, stored as `(min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct QubitPair(usize, usize);

impl QubitPair {
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    /// Lower qubit index
    pub fn low(&self) -> usize {
        self.0
    }

    /// Higher qubit index
    pub fn high(&self) -> usize {
        self.1
    }

    pub fn contains(&self, qubit: usize) -> bool {
        self.0 == qubit || self.1 == qubit
    }
}

impl From<[usize; 2]> for QubitPair {
    fn from(pair: [usize; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<QubitPair> for [usize; 2] {
    fn from(pair: QubitPair) -> Self {
        [pair.0, pair.1]
    }
}

impl fmt::Display for QubitPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.0, self.1)
    }
}

/// Two-qubit gate calibration on one coupler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCalibration {
    pub qubits: QubitPair,
    /// Native two-qubit gate name (e.g. `ecr`)
    pub gate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_time_ns: Option<f64>,
}

impl EdgeCalibration {
    pub fn new(a: usize, b: usize, gate: &str) -> Self {
        Self {
            qubits: QubitPair::new(a, b),
            gate: gate.to_string(),
            error: None,
            gate_time_ns: None,
        }
    }

    pub fn with_error(mut self, error: f64) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_gate_time(mut self, time_ns: f64) -> Self {
        self.gate_time_ns = Some(time_ns);
        self
    }
}

// =============================================================================
// Device Calibration
// =============================================================================

/// Calibration snapshot of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCalibration {
    pub backend: String,
    pub qubits: Vec<QubitCalibration>,
    #[serde(default)]
    pub edges: Vec<EdgeCalibration>,
}

impl DeviceCalibration {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            qubits: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_qubit(mut self, qubit: QubitCalibration) -> Self {
        self.qubits.push(qubit);
        self
    }

    pub fn with_edge(mut self, edge: EdgeCalibration) -> Self {
        self.edges.push(edge);
        self
    }

    /// Look up a qubit record by physical index
    pub fn qubit(&self, index: usize) -> Option<&QubitCalibration> {
        self.qubits.iter().find(|q| q.index == index)
    }

    /// Look up the calibration of `gate` on the unordered pair `(a, b)`
    pub fn edge(&self, a: usize, b: usize, gate: &str) -> Option<&EdgeCalibration> {
        let pair = QubitPair::new(a, b);
        self.edges.iter().find(|e| e.qubits == pair && e.gate == gate)
    }

    /// Check that values are physical and indices unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for q in &self.qubits {
            if !seen.insert(q.index) {
                return Err(ZneError::Calibration(format!(
                    "duplicate record for qubit {}",
                    q.index
                )));
            }
            if !(q.t1_us > 0.0 && q.t2_us > 0.0) {
                return Err(ZneError::Calibration(format!(
                    "qubit {}: T1 and T2 must be positive (T1={}, T2={})",
                    q.index, q.t1_us, q.t2_us
                )));
            }
            let probs = [q.readout.prob_meas1_prep0, q.readout.prob_meas0_prep1];
            if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
                return Err(ZneError::Calibration(format!(
                    "qubit {}: readout probabilities must lie in [0, 1]",
                    q.index
                )));
            }
            if let Some((gate, _)) = q.gate_errors.iter().find(|(_, e)| **e < 0.0) {
                return Err(ZneError::Calibration(format!(
                    "qubit {}: negative error rate for '{}'",
                    q.index, gate
                )));
            }
        }

        for edge in &self.edges {
            if edge.qubits.low() == edge.qubits.high() {
                return Err(ZneError::Calibration(format!(
                    "edge {} connects a qubit to itself",
                    edge.qubits
                )));
            }
            if matches!(edge.error, Some(e) if e < 0.0) {
                return Err(ZneError::Calibration(format!(
                    "edge {}: negative error rate",
                    edge.qubits
                )));
            }
        }
        Ok(())
    }

    /// Load a calibration snapshot from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let calibration: Self = serde_json::from_str(&content)?;
        calibration.validate()?;
        Ok(calibration)
    }

    /// Write the snapshot as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Three-qubit `ibm_kyiv` calibration sample
    pub fn ibm_kyiv_sample() -> Self {
        const ECR_TIME_NS: f64 = 561.777_777_777_777_7;

        let qubit = |index, t1, t2, gate_error, p10, p01, freq, anharm, assign| {
            let mut q = QubitCalibration::new(index, t1, t2)
                .with_gate_error("id", gate_error)
                .with_gate_error("rz", 0.0)
                .with_gate_error("sx", gate_error)
                .with_gate_error("x", gate_error)
                .with_readout(p10, p01);
            q.frequency_ghz = Some(freq);
            q.anharmonicity_ghz = Some(anharm);
            q.readout_length_ns = Some(1244.444444);
            q.readout_assignment_error = Some(assign);
            q
        };

        Self::new("ibm_kyiv")
            .with_qubit(qubit(
                0, 462.022673, 414.4535878, 0.000170616, 0.0004, 0.0014, 4.655644224, -0.311063246,
                0.0009,
            ))
            .with_qubit(qubit(
                1, 459.8797394, 209.7394157, 0.0000947129, 0.0024, 0.0044, 4.53496149,
                -0.313029805, 0.0034,
            ))
            .with_qubit(qubit(
                2, 272.6852473, 126.5190162, 0.000122171, 0.0022, 0.0036, 4.680129099,
                -0.309256368, 0.0029,
            ))
            .with_edge(
                EdgeCalibration::new(0, 1, "ecr")
                    .with_error(0.003566334005562166)
                    .with_gate_time(ECR_TIME_NS),
            )
            .with_edge(
                EdgeCalibration::new(0, 14, "ecr")
                    .with_error(0.0072247272320688505)
                    .with_gate_time(ECR_TIME_NS),
            )
            .with_edge(
                EdgeCalibration::new(1, 2, "ecr")
                    .with_error(0.007504817775057709)
                    .with_gate_time(ECR_TIME_NS),
            )
            .with_edge(
                EdgeCalibration::new(2, 3, "ecr")
                    .with_error(0.004220124039163747)
                    .with_gate_time(ECR_TIME_NS),
            )
    }
}
