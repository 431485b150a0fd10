//! Circuit templates used by the ZNE experiments

use crate::circuit::Circuit;
use crate::error::{Result, ZneError};

/// Angle step of the per-qubit Rz layer: qubit `i` gets `(i + 1) * RZ_STEP`
pub const RZ_STEP: f64 = 0.5;

/// Angle step of the final Rx layer: qubit `i` gets `i * RX_STEP`
pub const RX_STEP: f64 = 0.3;

/// Helper to build the experiment circuits
pub struct CircuitBuilder;

impl CircuitBuilder {
    /// Build the entangling benchmark circuit for `n_qubits` qubits
    ///
    /// Layout:
    /// 1. `h` on qubit 0
    /// 2. for each `i` in `1..n`: `cx(0, i)` then `rz((i+1)·0.5)` on `i`
    /// 3. linear `cx(i, i+1)` chain
    /// 4. `rx(i·0.3)` on every qubit
    /// 5. `measure(i -> i)` on every qubit
    pub fn zne_benchmark(n_qubits: usize) -> Result<Circuit> {
        if n_qubits < 2 {
            return Err(ZneError::InvalidQubitCount(n_qubits));
        }

        let mut circuit = Circuit::with_qubits(n_qubits);
        circuit.h(0);

        for i in 1..n_qubits {
            circuit.cx(0, i);
            circuit.rz((i + 1) as f64 * RZ_STEP, i);
        }

        for i in 0..n_qubits - 1 {
            circuit.cx(i, i + 1);
        }

        for i in 0..n_qubits {
            circuit.rx(i as f64 * RX_STEP, i);
        }

        circuit.measure_all();
        Ok(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{GateType, Operation};

    #[test]
    fn test_rejects_small_registers() {
        assert!(matches!(
            CircuitBuilder::zne_benchmark(1),
            Err(ZneError::InvalidQubitCount(1))
        ));
        assert!(CircuitBuilder::zne_benchmark(0).is_err());
    }

    #[test]
    fn test_one_measurement_per_qubit() {
        for n in 2..8 {
            let circuit = CircuitBuilder::zne_benchmark(n).unwrap();
            let measured: Vec<(usize, usize)> = circuit
                .operations()
                .iter()
                .filter_map(|op| match op {
                    Operation::Measure { qubit, clbit } => Some((*qubit, *clbit)),
                    _ => None,
                })
                .collect();

            assert_eq!(measured.len(), n);
            for (i, (qubit, clbit)) in measured.iter().enumerate() {
                assert_eq!(*qubit, i);
                assert_eq!(*clbit, i);
            }
        }
    }

    #[test]
    fn test_three_qubit_layout() {
        let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
        let ops = circuit.operations();

        // h + 2*(cx, rz) + 2 cx + 3 rx + 3 measure
        assert_eq!(ops.len(), 1 + 4 + 2 + 3 + 3);
        assert_eq!(circuit.num_qubits(), 3);
        assert_eq!(circuit.num_clbits(), 3);

        match &ops[0] {
            Operation::Gate(g) => {
                assert_eq!(g.gate_type, GateType::H);
                assert_eq!(g.qubits, vec![0]);
            }
            other => panic!("unexpected first op {:?}", other),
        }

        match &ops[4] {
            Operation::Gate(g) => {
                assert_eq!(g.gate_type, GateType::Rz(1.5));
                assert_eq!(g.qubits, vec![2]);
            }
            other => panic!("unexpected op {:?}", other),
        }

        match &ops[6] {
            Operation::Gate(g) => {
                assert_eq!(g.gate_type, GateType::CNOT);
                assert_eq!(g.qubits, vec![1, 2]);
            }
            other => panic!("unexpected op {:?}", other),
        }

        match &ops[9] {
            Operation::Gate(g) => {
                assert!((g.gate_type.angle().unwrap() - 0.6).abs() < 1e-12);
                assert_eq!(g.qubits, vec![2]);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_deterministic() {
        let a = CircuitBuilder::zne_benchmark(4).unwrap();
        let b = CircuitBuilder::zne_benchmark(4).unwrap();
        assert_eq!(a, b);
        assert!(a.validate().is_ok());
    }
}
