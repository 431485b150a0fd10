//! Calibration-driven noise model scaling
//!
//! Builds a [`NoiseModel`] whose gate errors are amplified by a scale
//! factor `s`: coherence times are divided by `s`, depolarizing rates are
//! multiplied by `s`. Readout errors are not scaled.

use crate::calibration::{DeviceCalibration, EdgeCalibration, QubitCalibration};
use crate::error::{Result, ZneError};
use crate::noise_model::{NoiseModel, NoiseTarget, QuantumError, ReadoutError};
use serde::{Deserialize, Serialize};

/// Noise scaler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseScaler {
    /// Single-qubit gates that receive thermal and depolarizing errors
    pub single_qubit_gates: Vec<String>,
    /// Two-qubit gates whose edge calibrations produce pair errors
    pub two_qubit_gates: Vec<String>,
}

impl Default for NoiseScaler {
    fn default() -> Self {
        Self {
            single_qubit_gates: ["id", "sx", "x", "rz"].iter().map(|g| g.to_string()).collect(),
            two_qubit_gates: ["ecr", "cx"].iter().map(|g| g.to_string()).collect(),
        }
    }
}

impl NoiseScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_single_qubit_gates(mut self, gates: &[&str]) -> Self {
        self.single_qubit_gates = gates.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn with_two_qubit_gates(mut self, gates: &[&str]) -> Self {
        self.two_qubit_gates = gates.iter().map(|g| g.to_string()).collect();
        self
    }

    /// Build the noise model for `calibration` at scale factor `s ≥ 1`
    pub fn scale(&self, calibration: &DeviceCalibration, s: f64) -> Result<NoiseModel> {
        if !s.is_finite() || s < 1.0 {
            return Err(ZneError::invalid_factor(
                s,
                "noise scale factor must be finite and at least 1",
            ));
        }

        let mut model = NoiseModel::new(s);

        for qubit in &calibration.qubits {
            let readout = ReadoutError::from_confusion(
                qubit.readout.prob_meas1_prep0,
                qubit.readout.prob_meas0_prep1,
            )
            .map_err(|e| ZneError::Calibration(format!("qubit {}: {}", qubit.index, e)))?;
            model.add_readout_error(readout, qubit.index);

            for gate in &self.single_qubit_gates {
                if let Some(error) = self.single_qubit_error(qubit, gate, s)? {
                    model.add_quantum_error(error, gate, NoiseTarget::Qubit(qubit.index))?;
                }
            }
        }

        for edge in &calibration.edges {
            if !self.two_qubit_gates.contains(&edge.gate) {
                continue;
            }
            if let Some(error) = self.edge_error(calibration, edge, s)? {
                model.add_quantum_error(error, &edge.gate, NoiseTarget::Pair(edge.qubits))?;
            }
        }

        tracing::debug!(scale = s, "{}", model.summary());
        Ok(model)
    }

    fn single_qubit_error(
        &self,
        qubit: &QubitCalibration,
        gate: &str,
        s: f64,
    ) -> Result<Option<QuantumError>> {
        let thermal = match qubit.gate_time_ns(gate) {
            Some(time_ns) => Some(scaled_thermal(qubit, time_ns, s)?),
            None => {
                tracing::debug!(qubit = qubit.index, gate, "no gate time, skipping thermal error");
                None
            }
        };

        let depolarizing = match qubit.gate_error(gate) {
            Some(rate) => Some(QuantumError::depolarizing(
                scaled_probability(rate, s, gate),
                1,
            )?),
            None => {
                tracing::debug!(qubit = qubit.index, gate, "no gate error rate, skipping depolarizing error");
                None
            }
        };

        match (thermal, depolarizing) {
            (Some(t), Some(d)) => Ok(Some(t.compose(&d)?)),
            (t, d) => Ok(t.or(d)),
        }
    }

    fn edge_error(
        &self,
        calibration: &DeviceCalibration,
        edge: &EdgeCalibration,
        s: f64,
    ) -> Result<Option<QuantumError>> {
        let (error, time_ns) = match (edge.error, edge.gate_time_ns) {
            (Some(error), Some(time_ns)) => (error, time_ns),
            _ => {
                tracing::debug!(edge = %edge.qubits, gate = %edge.gate, "incomplete edge calibration, skipping");
                return Ok(None);
            }
        };

        let (low, high) = match (
            calibration.qubit(edge.qubits.low()),
            calibration.qubit(edge.qubits.high()),
        ) {
            (Some(low), Some(high)) => (low, high),
            _ => {
                tracing::warn!(edge = %edge.qubits, gate = %edge.gate, "edge endpoint has no qubit calibration, skipping");
                return Ok(None);
            }
        };

        let thermal = scaled_thermal(low, time_ns, s)?.expand(&scaled_thermal(high, time_ns, s)?);
        let depolarizing = QuantumError::depolarizing(scaled_probability(error, s, &edge.gate), 2)?;
        Ok(Some(thermal.compose(&depolarizing)?))
    }
}

fn scaled_thermal(qubit: &QubitCalibration, time_ns: f64, s: f64) -> Result<QuantumError> {
    QuantumError::thermal_relaxation(qubit.t1_us / s, qubit.t2_us / s, time_ns / 1000.0)
        .map_err(|e| ZneError::Calibration(format!("qubit {}: {}", qubit.index, e)))
}

fn scaled_probability(rate: f64, s: f64, gate: &str) -> f64 {
    let scaled = rate * s;
    if scaled > 1.0 {
        tracing::warn!(gate, rate, scale = s, "scaled error probability exceeds 1, clamping");
        1.0
    } else {
        scaled
    }
}
