//! Native-basis lowering
//!
//! Rewrites circuits into the IBM Eagle basis `{id, rz, sx, x, ecr}` so that
//! calibrated noise channels (keyed by native gate names) attach to every
//! executed gate. Decompositions are exact up to a global phase.
//!
//! | gate      | lowering                                   |
//! |-----------|--------------------------------------------|
//! | `h`       | `rz(π/2) sx rz(π/2)`                       |
//! | `rx(θ)`   | `rz(π/2) sx rz(θ+π) sx rz(π/2)`            |
//! | `ry(θ)`   | `rz(-π/2) · rx(θ) · rz(π/2)`               |
//! | `sxdg`    | `rz(π) sx rz(π)`                           |
//! | `cx(c,t)` | `x(c) sx(t) ecr(c,t) rz(π/2)(c)`           |
//! | `cz(a,b)` | `h(b) cx(a,b) h(b)`                        |
//! | `swap`    | three `cx`                                 |

use crate::circuit::{wrap_angle, Circuit, Gate, GateType, Operation};
use crate::error::Result;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Instruction names of the native basis
pub const NATIVE_GATES: [&str; 5] = ["id", "rz", "sx", "x", "ecr"];

/// Check whether a gate is already native
pub fn is_native(gate_type: &GateType) -> bool {
    matches!(
        gate_type,
        GateType::I | GateType::Rz(_) | GateType::SX | GateType::X | GateType::ECR
    )
}

/// Lower every gate of `circuit` into the native basis
///
/// Measurements and barriers pass through unchanged. Lowering an already
/// native circuit returns an identical circuit.
pub fn lower_to_native(circuit: &Circuit) -> Result<Circuit> {
    circuit.validate()?;

    let mut lowered = circuit.empty_like();
    for op in circuit.operations() {
        match op {
            Operation::Gate(gate) => {
                for native in lower_gate(gate) {
                    lowered.add(native);
                }
            }
            other => lowered.push(other.clone()),
        }
    }
    Ok(lowered)
}

/// Native gate sequence (in application order) for a single gate
pub fn lower_gate(gate: &Gate) -> Vec<Gate> {
    let q = gate.qubits[0];
    let rz = |angle: f64, qubit: usize| Gate::single(GateType::Rz(wrap_angle(angle)), qubit);

    match gate.gate_type {
        GateType::I | GateType::X | GateType::SX | GateType::ECR => vec![gate.clone()],
        GateType::Rz(angle) => vec![rz(angle, q)],

        GateType::Y => vec![rz(PI, q), Gate::single(GateType::X, q)],
        GateType::Z => vec![rz(PI, q)],
        GateType::S => vec![rz(FRAC_PI_2, q)],
        GateType::Sdg => vec![rz(-FRAC_PI_2, q)],
        GateType::T => vec![rz(FRAC_PI_4, q)],
        GateType::Tdg => vec![rz(-FRAC_PI_4, q)],
        GateType::SXdg => vec![rz(PI, q), Gate::single(GateType::SX, q), rz(PI, q)],
        GateType::H => hadamard(q),
        GateType::Rx(theta) => rx(theta, q),
        GateType::Ry(theta) => {
            let mut seq = vec![rz(-FRAC_PI_2, q)];
            seq.extend(rx(theta, q));
            seq.push(rz(FRAC_PI_2, q));
            seq
        }

        GateType::CNOT => cnot(gate.qubits[0], gate.qubits[1]),
        GateType::CZ => {
            let (a, b) = (gate.qubits[0], gate.qubits[1]);
            let mut seq = hadamard(b);
            seq.extend(cnot(a, b));
            seq.extend(hadamard(b));
            seq
        }
        GateType::SWAP => {
            let (a, b) = (gate.qubits[0], gate.qubits[1]);
            let mut seq = cnot(a, b);
            seq.extend(cnot(b, a));
            seq.extend(cnot(a, b));
            seq
        }
    }
}

fn hadamard(q: usize) -> Vec<Gate> {
    vec![
        Gate::single(GateType::Rz(FRAC_PI_2), q),
        Gate::single(GateType::SX, q),
        Gate::single(GateType::Rz(FRAC_PI_2), q),
    ]
}

fn rx(theta: f64, q: usize) -> Vec<Gate> {
    vec![
        Gate::single(GateType::Rz(FRAC_PI_2), q),
        Gate::single(GateType::SX, q),
        Gate::single(GateType::Rz(wrap_angle(theta + PI)), q),
        Gate::single(GateType::SX, q),
        Gate::single(GateType::Rz(FRAC_PI_2), q),
    ]
}

fn cnot(control: usize, target: usize) -> Vec<Gate> {
    vec![
        Gate::single(GateType::X, control),
        Gate::single(GateType::SX, target),
        Gate::two(GateType::ECR, control, target),
        Gate::single(GateType::Rz(FRAC_PI_2), control),
    ]
}
