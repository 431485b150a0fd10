//! OpenQASM 3.0 emission for zne-core circuits
//!
//! Measurements are written explicitly (`c[i] = measure q[j];`) so folded
//! and repeated circuits keep their qubit-to-bit mapping. A circuit with no
//! measurements gets a final `c = measure q;`.

use crate::error::{IBMError, Result};
use zne_core::{Circuit, Gate, GateType, Operation};

/// `sxdg` is not part of `stdgates.inc`
const SXDG_DEFINITION: &str = "gate sxdg a { s a; h a; s a; }";

/// Gate mapper for QASM output
pub struct GateMapper;

impl GateMapper {
    /// QASM statement for a gate
    pub fn to_qasm(gate: &Gate) -> Result<String> {
        let arity = gate.gate_type.num_qubits();
        if gate.qubits.len() != arity {
            return Err(IBMError::InvalidCircuit(format!(
                "{} expects {} qubit(s), got {}",
                gate.name(),
                arity,
                gate.qubits.len()
            )));
        }

        let operands = gate
            .qubits
            .iter()
            .map(|q| format!("q[{}]", q))
            .collect::<Vec<_>>()
            .join(", ");

        match gate.gate_type.angle() {
            Some(angle) if !angle.is_finite() => Err(IBMError::InvalidCircuit(format!(
                "{} angle is not finite: {}",
                gate.name(),
                angle
            ))),
            Some(angle) => Ok(format!("{}({}) {};", gate.name(), angle, operands)),
            None => Ok(format!("{} {};", gate.name(), operands)),
        }
    }
}

/// Incremental QASM program text
pub struct QASMBuilder {
    n_qubits: usize,
    n_clbits: usize,
    definitions: Vec<String>,
    instructions: Vec<String>,
    measured: bool,
}

impl QASMBuilder {
    pub fn new(n_qubits: usize, n_clbits: usize) -> Self {
        Self {
            n_qubits,
            n_clbits,
            definitions: Vec::new(),
            instructions: Vec::new(),
            measured: false,
        }
    }

    /// Add a custom gate definition once
    pub fn define(&mut self, definition: &str) {
        if !self.definitions.iter().any(|d| d == definition) {
            self.definitions.push(definition.to_string());
        }
    }

    pub fn add_instruction(&mut self, instruction: String) {
        self.instructions.push(instruction);
    }

    pub fn add_measurement(&mut self, qubit: usize, clbit: usize) {
        self.measured = true;
        self.instructions
            .push(format!("c[{}] = measure q[{}];", clbit, qubit));
    }

    pub fn build(self) -> String {
        let mut lines = vec![
            "OPENQASM 3.0;".to_string(),
            "include \"stdgates.inc\";".to_string(),
            String::new(),
        ];

        if !self.definitions.is_empty() {
            lines.extend(self.definitions);
            lines.push(String::new());
        }

        lines.push(format!("qubit[{}] q;", self.n_qubits));
        lines.push(format!("bit[{}] c;", self.n_clbits));
        lines.push(String::new());

        lines.extend(self.instructions);

        if !self.measured {
            lines.push("c = measure q;".to_string());
        }

        let mut program = lines.join("\n");
        program.push('\n');
        program
    }
}

/// Circuit → OpenQASM 3.0
pub struct QASMTranspiler;

impl QASMTranspiler {
    pub fn transpile(circuit: &Circuit) -> Result<String> {
        circuit.validate()?;

        // An unmeasured circuit is read out into a register as wide as the qubits
        let n_clbits = if circuit.measurement_count() == 0 {
            circuit.num_qubits()
        } else {
            circuit.num_clbits()
        };
        let mut builder = QASMBuilder::new(circuit.num_qubits(), n_clbits);

        for op in circuit.operations() {
            match op {
                Operation::Gate(gate) => {
                    if gate.gate_type == GateType::SXdg {
                        builder.define(SXDG_DEFINITION);
                    }
                    builder.add_instruction(GateMapper::to_qasm(gate)?);
                }
                Operation::Measure { qubit, clbit } => builder.add_measurement(*qubit, *clbit),
                Operation::Barrier(qubits) if qubits.is_empty() => {
                    builder.add_instruction("barrier q;".to_string())
                }
                Operation::Barrier(qubits) => {
                    let operands: Vec<String> = qubits.iter().map(|q| format!("q[{}]", q)).collect();
                    builder.add_instruction(format!("barrier {};", operands.join(", ")));
                }
            }
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zne_core::{lower_to_native, CircuitBuilder};

    #[test]
    fn test_simple_circuit() {
        let mut circuit = Circuit::with_qubits(2);
        circuit.h(0).cx(0, 1).measure_all();

        let qasm = QASMTranspiler::transpile(&circuit).unwrap();

        assert!(qasm.starts_with("OPENQASM 3.0;"));
        assert!(qasm.contains("qubit[2] q;"));
        assert!(qasm.contains("bit[2] c;"));
        assert!(qasm.contains("h q[0];"));
        assert!(qasm.contains("cx q[0], q[1];"));
        assert!(qasm.contains("c[0] = measure q[0];"));
        assert!(qasm.contains("c[1] = measure q[1];"));
        assert!(!qasm.contains("c = measure q;"));
    }

    #[test]
    fn test_unmeasured_circuit_measures_all() {
        let mut circuit = Circuit::with_qubits(2);
        circuit.x(1);

        let qasm = QASMTranspiler::transpile(&circuit).unwrap();
        assert!(qasm.contains("bit[2] c;"));
        assert!(qasm.trim_end().ends_with("c = measure q;"));
    }

    #[test]
    fn test_rotation_angles() {
        let mut circuit = Circuit::with_qubits(1);
        circuit.rz(0.5, 0).rx(-1.25, 0);

        let qasm = QASMTranspiler::transpile(&circuit).unwrap();
        assert!(qasm.contains("rz(0.5) q[0];"));
        assert!(qasm.contains("rx(-1.25) q[0];"));
    }

    #[test]
    fn test_sxdg_definition() {
        let mut circuit = Circuit::with_qubits(1);
        circuit.sx(0);
        circuit.add(Gate::single(GateType::SXdg, 0));
        circuit.add(Gate::single(GateType::SXdg, 0));

        let qasm = QASMTranspiler::transpile(&circuit).unwrap();
        assert_eq!(qasm.matches(SXDG_DEFINITION).count(), 1);
        assert_eq!(qasm.matches("sxdg q[0];").count(), 2);
    }

    #[test]
    fn test_barrier() {
        let mut circuit = Circuit::with_qubits(3);
        circuit.barrier(vec![0, 2]).barrier(vec![]);

        let qasm = QASMTranspiler::transpile(&circuit).unwrap();
        assert!(qasm.contains("barrier q[0], q[2];"));
        assert!(qasm.contains("barrier q;"));
    }

    #[test]
    fn test_invalid_qubit_index() {
        let mut circuit = Circuit::with_qubits(2);
        circuit.add(Gate::single(GateType::X, 5));
        assert!(QASMTranspiler::transpile(&circuit).is_err());
    }

    #[test]
    fn test_non_finite_angle() {
        let gate = Gate::single(GateType::Rz(f64::NAN), 0);
        assert!(matches!(
            GateMapper::to_qasm(&gate),
            Err(IBMError::InvalidCircuit(_))
        ));
    }

    #[test]
    fn test_lowered_benchmark_uses_native_names() {
        let circuit = lower_to_native(&CircuitBuilder::zne_benchmark(3).unwrap()).unwrap();
        let qasm = QASMTranspiler::transpile(&circuit).unwrap();

        for line in qasm.lines().skip_while(|l| !l.starts_with("bit[")).skip(1) {
            if line.is_empty() || line.contains("measure") {
                continue;
            }
            let name = line.split(|c| c == ' ' || c == '(').next().unwrap();
            assert!(zne_core::NATIVE_GATES.contains(&name), "{}", line);
        }
        assert_eq!(qasm.matches("measure").count(), 3);
    }
}
