//! Circuit representation
//!
//! A circuit is an ordered list of [`Operation`]s over `n_qubits` qubits and
//! `n_clbits` classical bits. Gates carry their rotation angle inside
//! [`GateType`], measurements are a distinct operation so that noise
//! amplification can leave them untouched.

use crate::error::{Result, ZneError};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

/// Gate types understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateType {
    // Identity
    I,

    // Single-qubit Pauli gates
    X,
    Y,
    Z,

    // Hadamard
    H,

    // Phase gates
    S,
    Sdg,
    T,
    Tdg,

    // IBM native sqrt(X) and its adjoint
    SX,
    SXdg,

    // Rotation gates (angle in radians)
    Rx(f64),
    Ry(f64),
    Rz(f64),

    // Two-qubit gates
    CNOT,
    CZ,
    ECR,
    SWAP,
}

impl GateType {
    /// Instruction name, as used by noise models and OpenQASM
    pub fn name(&self) -> &'static str {
        match self {
            GateType::I => "id",
            GateType::X => "x",
            GateType::Y => "y",
            GateType::Z => "z",
            GateType::H => "h",
            GateType::S => "s",
            GateType::Sdg => "sdg",
            GateType::T => "t",
            GateType::Tdg => "tdg",
            GateType::SX => "sx",
            GateType::SXdg => "sxdg",
            GateType::Rx(_) => "rx",
            GateType::Ry(_) => "ry",
            GateType::Rz(_) => "rz",
            GateType::CNOT => "cx",
            GateType::CZ => "cz",
            GateType::ECR => "ecr",
            GateType::SWAP => "swap",
        }
    }

    /// Number of qubits the gate acts on
    pub fn num_qubits(&self) -> usize {
        match self {
            GateType::CNOT | GateType::CZ | GateType::ECR | GateType::SWAP => 2,
            _ => 1,
        }
    }

    /// Rotation angle, if the gate is parameterized
    pub fn angle(&self) -> Option<f64> {
        match self {
            GateType::Rx(a) | GateType::Ry(a) | GateType::Rz(a) => Some(*a),
            _ => None,
        }
    }

    /// Adjoint of the gate's unitary
    ///
    /// Every gate in the set has its adjoint in the set, so folding never
    /// needs a matrix-level inverse.
    pub fn adjoint(&self) -> GateType {
        match *self {
            GateType::S => GateType::Sdg,
            GateType::Sdg => GateType::S,
            GateType::T => GateType::Tdg,
            GateType::Tdg => GateType::T,
            GateType::SX => GateType::SXdg,
            GateType::SXdg => GateType::SX,
            GateType::Rx(angle) => GateType::Rx(-angle),
            GateType::Ry(angle) => GateType::Ry(-angle),
            GateType::Rz(angle) => GateType::Rz(-angle),
            // I, X, Y, Z, H, CNOT, CZ, ECR and SWAP are Hermitian
            other => other,
        }
    }
}

/// A gate applied to an ordered tuple of qubits
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    /// Gate type
    pub gate_type: GateType,

    /// Target qubit(s); for controlled gates the control comes first
    pub qubits: Vec<usize>,
}

impl Gate {
    /// Create a single-qubit gate
    pub fn single(gate_type: GateType, qubit: usize) -> Self {
        Self {
            gate_type,
            qubits: vec![qubit],
        }
    }

    /// Create a two-qubit gate
    pub fn two(gate_type: GateType, first: usize, second: usize) -> Self {
        Self {
            gate_type,
            qubits: vec![first, second],
        }
    }

    /// Gate applying the adjoint unitary on the same qubits
    pub fn inverse(&self) -> Self {
        Self {
            gate_type: self.gate_type.adjoint(),
            qubits: self.qubits.clone(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.gate_type.name()
    }
}

/// A single circuit instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Unitary gate
    Gate(Gate),

    /// Projective Z measurement of `qubit` into classical bit `clbit`
    Measure { qubit: usize, clbit: usize },

    /// Scheduling barrier (no effect on the state)
    Barrier(Vec<usize>),
}

impl Operation {
    pub fn is_measurement(&self) -> bool {
        matches!(self, Operation::Measure { .. })
    }

    /// Instruction name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Gate(gate) => gate.name(),
            Operation::Measure { .. } => "measure",
            Operation::Barrier(_) => "barrier",
        }
    }

    /// Qubits touched by the operation
    pub fn qubits(&self) -> Vec<usize> {
        match self {
            Operation::Gate(gate) => gate.qubits.clone(),
            Operation::Measure { qubit, .. } => vec![*qubit],
            Operation::Barrier(qubits) => qubits.clone(),
        }
    }
}

impl From<Gate> for Operation {
    fn from(gate: Gate) -> Self {
        Operation::Gate(gate)
    }
}

/// Quantum circuit over indexed qubits and classical bits
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    n_qubits: usize,
    n_clbits: usize,
    operations: Vec<Operation>,
}

impl Circuit {
    /// Create an empty circuit with `n_qubits` qubits and `n_clbits` classical bits
    pub fn new(n_qubits: usize, n_clbits: usize) -> Self {
        Self {
            n_qubits,
            n_clbits,
            operations: Vec::new(),
        }
    }

    /// Create an empty circuit with one classical bit per qubit
    pub fn with_qubits(n_qubits: usize) -> Self {
        Self::new(n_qubits, n_qubits)
    }

    /// Empty circuit with the same register sizes as `self`
    pub fn empty_like(&self) -> Self {
        Self::new(self.n_qubits, self.n_clbits)
    }

    pub fn num_qubits(&self) -> usize {
        self.n_qubits
    }

    pub fn num_clbits(&self) -> usize {
        self.n_clbits
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Total number of operations, measurements included
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of unitary gates
    pub fn gate_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Gate(_)))
            .count()
    }

    /// Number of measurement operations
    pub fn measurement_count(&self) -> usize {
        self.operations.iter().filter(|op| op.is_measurement()).count()
    }

    /// Number of operations per instruction name
    pub fn count_ops(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for op in &self.operations {
            *counts.entry(op.name()).or_insert(0) += 1;
        }
        counts
    }

    /// Append an operation
    pub fn push(&mut self, op: impl Into<Operation>) {
        self.operations.push(op.into());
    }

    /// Append a gate
    pub fn add(&mut self, gate: Gate) -> &mut Self {
        self.operations.push(Operation::Gate(gate));
        self
    }

    pub fn h(&mut self, qubit: usize) -> &mut Self {
        self.add(Gate::single(GateType::H, qubit))
    }

    pub fn x(&mut self, qubit: usize) -> &mut Self {
        self.add(Gate::single(GateType::X, qubit))
    }

    pub fn sx(&mut self, qubit: usize) -> &mut Self {
        self.add(Gate::single(GateType::SX, qubit))
    }

    pub fn rx(&mut self, angle: f64, qubit: usize) -> &mut Self {
        self.add(Gate::single(GateType::Rx(angle), qubit))
    }

    pub fn ry(&mut self, angle: f64, qubit: usize) -> &mut Self {
        self.add(Gate::single(GateType::Ry(angle), qubit))
    }

    pub fn rz(&mut self, angle: f64, qubit: usize) -> &mut Self {
        self.add(Gate::single(GateType::Rz(angle), qubit))
    }

    pub fn cx(&mut self, control: usize, target: usize) -> &mut Self {
        self.add(Gate::two(GateType::CNOT, control, target))
    }

    pub fn ecr(&mut self, first: usize, second: usize) -> &mut Self {
        self.add(Gate::two(GateType::ECR, first, second))
    }

    /// Measure `qubit` into `clbit`
    pub fn measure(&mut self, qubit: usize, clbit: usize) -> &mut Self {
        self.operations.push(Operation::Measure { qubit, clbit });
        self
    }

    /// Measure every qubit into its same-indexed classical bit
    pub fn measure_all(&mut self) -> &mut Self {
        for q in 0..self.n_qubits.min(self.n_clbits) {
            self.measure(q, q);
        }
        self
    }

    pub fn barrier(&mut self, qubits: Vec<usize>) -> &mut Self {
        self.operations.push(Operation::Barrier(qubits));
        self
    }

    /// Sequentially compose `other` after `self`
    pub fn append(&mut self, other: &Circuit) -> Result<()> {
        if other.n_qubits != self.n_qubits || other.n_clbits != self.n_clbits {
            return Err(ZneError::InvalidCircuit(format!(
                "Cannot compose a {}q/{}c circuit onto a {}q/{}c circuit",
                other.n_qubits, other.n_clbits, self.n_qubits, self.n_clbits
            )));
        }
        self.operations.extend(other.operations.iter().cloned());
        Ok(())
    }

    /// Get circuit depth (number of layers)
    pub fn depth(&self) -> usize {
        if self.operations.is_empty() || self.n_qubits == 0 {
            return 0;
        }

        // Track when each qubit is next available
        let mut qubit_depth = vec![0usize; self.n_qubits];

        for op in &self.operations {
            if matches!(op, Operation::Barrier(_)) {
                continue;
            }

            let qubits = op.qubits();
            let max_depth = qubits
                .iter()
                .filter_map(|&q| qubit_depth.get(q).copied())
                .max()
                .unwrap_or(0);
            let new_depth = max_depth + 1;

            for q in qubits {
                if let Some(d) = qubit_depth.get_mut(q) {
                    *d = new_depth;
                }
            }
        }

        qubit_depth.into_iter().max().unwrap_or(0)
    }

    /// Validate register indices, gate arity and angles
    pub fn validate(&self) -> Result<()> {
        if self.n_qubits == 0 {
            return Err(ZneError::InvalidCircuit("Circuit has no qubits".into()));
        }

        for (pos, op) in self.operations.iter().enumerate() {
            for qubit in op.qubits() {
                if qubit >= self.n_qubits {
                    return Err(ZneError::InvalidCircuit(format!(
                        "Operation {} ({}): qubit index {} out of range (circuit has {} qubits)",
                        pos,
                        op.name(),
                        qubit,
                        self.n_qubits
                    )));
                }
            }

            match op {
                Operation::Gate(gate) => {
                    if gate.qubits.len() != gate.gate_type.num_qubits() {
                        return Err(ZneError::InvalidCircuit(format!(
                            "Operation {} ({}): expected {} qubit(s), got {}",
                            pos,
                            gate.name(),
                            gate.gate_type.num_qubits(),
                            gate.qubits.len()
                        )));
                    }
                    if gate.qubits.len() == 2 && gate.qubits[0] == gate.qubits[1] {
                        return Err(ZneError::InvalidCircuit(format!(
                            "Operation {} ({}): repeated qubit {}",
                            pos,
                            gate.name(),
                            gate.qubits[0]
                        )));
                    }
                    if let Some(angle) = gate.gate_type.angle() {
                        if !angle.is_finite() {
                            return Err(ZneError::InvalidCircuit(format!(
                                "Operation {} ({}): angle is not finite: {}",
                                pos,
                                gate.name(),
                                angle
                            )));
                        }
                    }
                }
                Operation::Measure { clbit, .. } => {
                    if *clbit >= self.n_clbits {
                        return Err(ZneError::InvalidCircuit(format!(
                            "Operation {} (measure): classical bit {} out of range (circuit has {} bits)",
                            pos, clbit, self.n_clbits
                        )));
                    }
                }
                Operation::Barrier(_) => {}
            }
        }

        Ok(())
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Circuit: {} qubits, {} clbits, {} operations, depth {}",
            self.n_qubits,
            self.n_clbits,
            self.operations.len(),
            self.depth()
        )?;
        for op in &self.operations {
            match op {
                Operation::Gate(gate) => match gate.gate_type.angle() {
                    Some(angle) => writeln!(f, "  {}({:.4}) {:?}", gate.name(), angle, gate.qubits)?,
                    None => writeln!(f, "  {} {:?}", gate.name(), gate.qubits)?,
                },
                Operation::Measure { qubit, clbit } => writeln!(f, "  measure q[{}] -> c[{}]", qubit, clbit)?,
                Operation::Barrier(qubits) => writeln!(f, "  barrier {:?}", qubits)?,
            }
        }
        Ok(())
    }
}

/// Normalise an angle into (-π, π]
pub(crate) fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_depth() {
        let mut circuit = Circuit::with_qubits(3);
        circuit.h(0).h(1).h(2);
        circuit.cx(0, 1).cx(1, 2);

        assert_eq!(circuit.depth(), 3);
    }

    #[test]
    fn test_adjoint_pairs() {
        assert_eq!(GateType::S.adjoint(), GateType::Sdg);
        assert_eq!(GateType::SX.adjoint(), GateType::SXdg);
        assert_eq!(GateType::Rz(0.5).adjoint(), GateType::Rz(-0.5));
        assert_eq!(GateType::CNOT.adjoint(), GateType::CNOT);
        assert_eq!(GateType::ECR.adjoint(), GateType::ECR);
        assert_eq!(GateType::H.adjoint(), GateType::H);
    }

    #[test]
    fn test_gate_inverse_keeps_targets() {
        let gate = Gate::two(GateType::CNOT, 2, 0);
        let inv = gate.inverse();
        assert_eq!(inv.qubits, vec![2, 0]);
        assert_eq!(inv.gate_type, GateType::CNOT);
    }

    #[test]
    fn test_counts() {
        let mut circuit = Circuit::with_qubits(2);
        circuit.h(0).cx(0, 1).measure_all();

        assert_eq!(circuit.len(), 4);
        assert_eq!(circuit.gate_count(), 2);
        assert_eq!(circuit.measurement_count(), 2);
        assert_eq!(circuit.count_ops().get("measure"), Some(&2));
    }

    #[test]
    fn test_append() {
        let mut a = Circuit::with_qubits(2);
        a.h(0).measure_all();
        let b = a.clone();
        a.append(&b).unwrap();
        assert_eq!(a.len(), 6);

        let c = Circuit::with_qubits(3);
        assert!(a.append(&c).is_err());
    }

    #[test]
    fn test_invalid_qubit_index() {
        let mut circuit = Circuit::with_qubits(2);
        circuit.h(5);
        assert!(circuit.validate().is_err());
    }

    #[test]
    fn test_invalid_clbit_index() {
        let mut circuit = Circuit::new(2, 1);
        circuit.measure(1, 1);
        assert!(circuit.validate().is_err());
    }

    #[test]
    fn test_repeated_qubit_rejected() {
        let mut circuit = Circuit::with_qubits(2);
        circuit.cx(1, 1);
        assert!(circuit.validate().is_err());
    }

    #[test]
    fn test_non_finite_angle_rejected() {
        let mut circuit = Circuit::with_qubits(1);
        circuit.rz(f64::NAN, 0);
        assert!(circuit.validate().is_err());
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(2.5 * PI) - PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(2.0 * PI)).abs() < 1e-12);
    }
}
