//! Local state-vector simulator
//!
//! Executes native-basis circuits one Monte-Carlo trajectory per shot:
//! each gate is applied as a unitary, then the noise model's channels for
//! that `(gate, qubits)` are sampled. Measurements collapse the state and
//! reported bits are flipped according to the qubit's readout error.
//!
//! Circuits without gate noise whose measurements are all terminal take a
//! faster path: the final distribution is computed once and sampled per shot.

use crate::circuit::{Circuit, GateType, Operation};
use crate::error::{Result, ZneError};
use crate::executor::Executor;
use crate::histogram::Histogram;
use crate::noise_model::{NoiseChannel, NoiseModel, NoiseTarget, QuantumError};
use crate::transpiler::lower_to_native;
use async_trait::async_trait;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::FRAC_1_SQRT_2;
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest register the simulator accepts
pub const MAX_QUBITS: usize = 20;

type Matrix2 = [[Complex64; 2]; 2];
type Matrix4 = [[Complex64; 4]; 4];

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

// =============================================================================
// Simulator
// =============================================================================

/// Noisy state-vector simulator implementing [`Executor`]
#[derive(Debug, Default)]
pub struct StatevectorSimulator {
    seed: Option<u64>,
    calls: AtomicU64,
}

impl StatevectorSimulator {
    /// Simulator seeded from OS entropy
    pub fn new() -> Self {
        Self::default()
    }

    /// Reproducible simulator
    ///
    /// Execution `k` (counting from 0) uses seed `seed + k`, so repeated
    /// runs of the same circuit are independent but the whole sweep is
    /// reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            calls: AtomicU64::new(0),
        }
    }

    /// Exact outcome distribution of the circuit's unitary part
    ///
    /// Indexed by computational basis state with qubit `i` as bit `i`.
    /// Measurements and barriers are ignored.
    pub fn ideal_probabilities(&self, circuit: &Circuit) -> Result<Vec<f64>> {
        check_size(self.name(), circuit)?;
        let native = lower_to_native(circuit)?;

        let mut state = StateVector::zero(native.num_qubits());
        for op in native.operations() {
            if let Operation::Gate(gate) = op {
                state.apply_gate(gate.gate_type, &gate.qubits);
            }
        }
        Ok(state.probabilities())
    }

    fn next_rng(&self) -> StdRng {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(call)),
            None => StdRng::from_entropy(),
        }
    }

    fn run(&self, circuit: &Circuit, shots: u32, noise: Option<&NoiseModel>) -> Result<Histogram> {
        check_size(self.name(), circuit)?;
        let native = lower_to_native(circuit)?;
        let mut rng = self.next_rng();

        let gate_noise = noise.filter(|model| model.gate_errors().next().is_some());
        let mut histogram = Histogram::new();

        match (gate_noise, terminal_measurements(&native)) {
            (None, Some(measured)) => {
                let mut state = StateVector::zero(native.num_qubits());
                for op in native.operations() {
                    if let Operation::Gate(gate) = op {
                        state.apply_gate(gate.gate_type, &gate.qubits);
                    }
                }
                let cumulative = cumulative(&state.probabilities());

                for _ in 0..shots {
                    let basis = sample_index(&cumulative, &mut rng);
                    let mut clbits = vec![0u8; native.num_clbits()];
                    for &(qubit, clbit) in &measured {
                        let bit = ((basis >> qubit) & 1) as u8;
                        clbits[clbit] = read_out(bit, qubit, noise, &mut rng);
                    }
                    histogram.record(bitstring(&clbits), 1);
                }
            }
            _ => {
                for _ in 0..shots {
                    let clbits = run_trajectory(&native, noise, &mut rng);
                    histogram.record(bitstring(&clbits), 1);
                }
            }
        }

        Ok(histogram)
    }
}

#[async_trait]
impl Executor for StatevectorSimulator {
    fn name(&self) -> &str {
        "statevector_simulator"
    }

    fn transpile(&self, circuit: &Circuit) -> Result<Circuit> {
        lower_to_native(circuit)
    }

    fn max_qubits(&self) -> Option<usize> {
        Some(MAX_QUBITS)
    }

    async fn execute(
        &self,
        circuit: &Circuit,
        shots: u32,
        noise: Option<&NoiseModel>,
    ) -> Result<Histogram> {
        self.run(circuit, shots, noise)
    }
}

fn check_size(backend: &str, circuit: &Circuit) -> Result<()> {
    if circuit.num_qubits() > MAX_QUBITS {
        return Err(ZneError::execution(
            backend,
            format!(
                "{} qubits exceed the simulator limit of {}",
                circuit.num_qubits(),
                MAX_QUBITS
            ),
        ));
    }
    Ok(())
}

/// `(qubit, clbit)` pairs when every measurement comes after the last gate
/// and no qubit is measured twice
fn terminal_measurements(circuit: &Circuit) -> Option<Vec<(usize, usize)>> {
    let mut measured = Vec::new();
    for op in circuit.operations() {
        match op {
            Operation::Measure { qubit, clbit } => {
                if measured.iter().any(|(q, _)| q == qubit) {
                    return None;
                }
                measured.push((*qubit, *clbit));
            }
            Operation::Gate(_) if !measured.is_empty() => return None,
            _ => {}
        }
    }
    Some(measured)
}

fn run_trajectory(circuit: &Circuit, noise: Option<&NoiseModel>, rng: &mut StdRng) -> Vec<u8> {
    let mut state = StateVector::zero(circuit.num_qubits());
    let mut clbits = vec![0u8; circuit.num_clbits()];

    for op in circuit.operations() {
        match op {
            Operation::Gate(gate) => {
                state.apply_gate(gate.gate_type, &gate.qubits);
                if let Some((error, target)) =
                    noise.and_then(|model| model.gate_error(gate.name(), &gate.qubits))
                {
                    apply_error(&mut state, error, target, rng);
                }
            }
            Operation::Measure { qubit, clbit } => {
                let bit = state.measure(*qubit, rng);
                clbits[*clbit] = read_out(bit, *qubit, noise, rng);
            }
            Operation::Barrier(_) => {}
        }
    }
    clbits
}

fn apply_error(state: &mut StateVector, error: &QuantumError, target: NoiseTarget, rng: &mut StdRng) {
    let physical = target.physical_qubits();

    for term in error.terms() {
        let qubits: Vec<usize> = term.qubits.iter().map(|&local| physical[local]).collect();

        match term.channel {
            NoiseChannel::Depolarizing { probability, .. } => {
                if rng.gen::<f64>() < probability {
                    for &q in &qubits {
                        state.apply_pauli(rng.gen_range(0..4), q);
                    }
                }
            }
            channel @ NoiseChannel::ThermalRelaxation { .. } => {
                let Some(p) = channel.relaxation_probabilities() else {
                    continue;
                };
                let q = qubits[0];
                let r: f64 = rng.gen();
                if r < p.reset {
                    if state.measure(q, rng) == 1 {
                        state.apply_pauli(1, q);
                    }
                } else if r < p.reset + p.x {
                    state.apply_pauli(1, q);
                } else if r < p.reset + p.x + p.y {
                    state.apply_pauli(2, q);
                } else if r < p.reset + p.x + p.y + p.z {
                    state.apply_pauli(3, q);
                }
            }
        }
    }
}

fn read_out(bit: u8, qubit: usize, noise: Option<&NoiseModel>, rng: &mut StdRng) -> u8 {
    match noise.and_then(|model| model.readout_error(qubit)) {
        Some(readout) if rng.gen::<f64>() < readout.flip_probability(bit) => bit ^ 1,
        _ => bit,
    }
}

/// Classical bits as a bitstring with bit 0 rightmost
fn bitstring(clbits: &[u8]) -> String {
    clbits
        .iter()
        .rev()
        .map(|&b| if b == 1 { '1' } else { '0' })
        .collect()
}

fn cumulative(probs: &[f64]) -> Vec<f64> {
    probs
        .iter()
        .scan(0.0, |acc, p| {
            *acc += p;
            Some(*acc)
        })
        .collect()
}

fn sample_index(cumulative: &[f64], rng: &mut StdRng) -> usize {
    let total = cumulative.last().copied().unwrap_or(1.0);
    let r = rng.gen::<f64>() * total;
    cumulative
        .iter()
        .position(|&c| r < c)
        .unwrap_or(cumulative.len().saturating_sub(1))
}

// =============================================================================
// State Vector
// =============================================================================

/// Pure state over `n` qubits, qubit `i` is bit `i` of the basis index
#[derive(Debug, Clone)]
struct StateVector {
    amplitudes: Vec<Complex64>,
}

impl StateVector {
    fn zero(n_qubits: usize) -> Self {
        let mut amplitudes = vec![ZERO; 1 << n_qubits];
        amplitudes[0] = ONE;
        Self { amplitudes }
    }

    fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|a| a.norm_sqr()).collect()
    }

    fn apply_gate(&mut self, gate_type: GateType, qubits: &[usize]) {
        match gate_type {
            GateType::I => {}
            GateType::ECR => self.apply_two(&ecr_matrix(), qubits[0], qubits[1]),
            other => {
                if let Some(m) = single_qubit_matrix(other) {
                    self.apply_single(&m, qubits[0]);
                }
            }
        }
    }

    /// 0 = I, 1 = X, 2 = Y, 3 = Z
    fn apply_pauli(&mut self, pauli: u8, qubit: usize) {
        let gate = match pauli {
            1 => GateType::X,
            2 => GateType::Y,
            3 => GateType::Z,
            _ => return,
        };
        self.apply_gate(gate, &[qubit]);
    }

    fn apply_single(&mut self, m: &Matrix2, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..self.amplitudes.len() {
            if i & mask != 0 {
                continue;
            }
            let j = i | mask;
            let (a0, a1) = (self.amplitudes[i], self.amplitudes[j]);
            self.amplitudes[i] = m[0][0] * a0 + m[0][1] * a1;
            self.amplitudes[j] = m[1][0] * a0 + m[1][1] * a1;
        }
    }

    /// Local basis index is `bit(first) + 2·bit(second)`
    fn apply_two(&mut self, m: &Matrix4, first: usize, second: usize) {
        let (mask_a, mask_b) = (1 << first, 1 << second);
        for i in 0..self.amplitudes.len() {
            if i & (mask_a | mask_b) != 0 {
                continue;
            }
            let idx = [i, i | mask_a, i | mask_b, i | mask_a | mask_b];
            let old = idx.map(|k| self.amplitudes[k]);
            for (row, &k) in idx.iter().enumerate() {
                self.amplitudes[k] = (0..4).map(|col| m[row][col] * old[col]).sum();
            }
        }
    }

    /// Projective Z measurement; collapses and renormalises the state
    fn measure(&mut self, qubit: usize, rng: &mut StdRng) -> u8 {
        let mask = 1 << qubit;
        let p1: f64 = self
            .amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum();

        let outcome = u8::from(rng.gen::<f64>() < p1);
        let kept = if outcome == 1 { p1 } else { 1.0 - p1 };
        let norm = kept.max(f64::MIN_POSITIVE).sqrt();

        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if ((i & mask != 0) as u8) == outcome {
                *amp /= norm;
            } else {
                *amp = ZERO;
            }
        }
        outcome
    }
}

fn single_qubit_matrix(gate_type: GateType) -> Option<Matrix2> {
    let c = Complex64::new;
    let m = match gate_type {
        GateType::X => [[ZERO, ONE], [ONE, ZERO]],
        GateType::Y => [[ZERO, -I], [I, ZERO]],
        GateType::Z => [[ONE, ZERO], [ZERO, -ONE]],
        GateType::SX => [[c(0.5, 0.5), c(0.5, -0.5)], [c(0.5, -0.5), c(0.5, 0.5)]],
        GateType::Rz(theta) => [
            [Complex64::from_polar(1.0, -theta / 2.0), ZERO],
            [ZERO, Complex64::from_polar(1.0, theta / 2.0)],
        ],
        _ => return None,
    };
    Some(m)
}

fn ecr_matrix() -> Matrix4 {
    let r = Complex64::new(FRAC_1_SQRT_2, 0.0);
    let ri = Complex64::new(0.0, FRAC_1_SQRT_2);
    [
        [ZERO, r, ZERO, ri],
        [r, ZERO, -ri, ZERO],
        [ZERO, ri, ZERO, r],
        [-ri, ZERO, r, ZERO],
    ]
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CircuitBuilder;
    use crate::calibration::QubitPair;
    use crate::noise_model::ReadoutError;
    use std::f64::consts::PI;

    fn assert_distributions_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() < 1e-9, "index {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_bell_state_probabilities() {
        let mut circuit = Circuit::with_qubits(2);
        circuit.h(0).cx(0, 1);

        let probs = StatevectorSimulator::new().ideal_probabilities(&circuit).unwrap();
        assert_distributions_close(&probs, &[0.5, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_cnot_truth_table() {
        for (input, expected) in [(0b00usize, 0b00usize), (0b01, 0b11), (0b10, 0b10), (0b11, 0b01)] {
            let mut circuit = Circuit::with_qubits(2);
            for q in 0..2 {
                if (input >> q) & 1 == 1 {
                    circuit.x(q);
                }
            }
            circuit.cx(0, 1);

            let probs = StatevectorSimulator::new().ideal_probabilities(&circuit).unwrap();
            assert!((probs[expected] - 1.0).abs() < 1e-9, "input {:02b}", input);
        }
    }

    #[test]
    fn test_rotation_lowering() {
        let theta = 0.7;
        let mut circuit = Circuit::with_qubits(1);
        circuit.rx(theta, 0);
        let probs = StatevectorSimulator::new().ideal_probabilities(&circuit).unwrap();
        assert!((probs[1] - (theta / 2.0).sin().powi(2)).abs() < 1e-9);

        let mut circuit = Circuit::with_qubits(1);
        circuit.ry(PI / 3.0, 0);
        let probs = StatevectorSimulator::new().ideal_probabilities(&circuit).unwrap();
        assert!((probs[1] - (PI / 6.0).sin().powi(2)).abs() < 1e-9);
    }

    #[test]
    fn test_folding_preserves_ideal_distribution() {
        let sim = StatevectorSimulator::new();
        let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
        let base = sim.ideal_probabilities(&circuit).unwrap();

        for factor in [1, 3] {
            let folded = crate::amplify::fold_gates(&circuit, factor, Default::default()).unwrap();
            let probs = sim.ideal_probabilities(&folded).unwrap();
            assert_distributions_close(&probs, &base);
        }
    }

    #[tokio::test]
    async fn test_noiseless_sampling() {
        let sim = StatevectorSimulator::with_seed(7);
        let mut circuit = Circuit::with_qubits(2);
        circuit.x(1).measure_all();

        let hist = sim.execute(&circuit, 200, None).await.unwrap();
        assert_eq!(hist.count("10"), 200);
        assert_eq!(hist.shots(), 200);
    }

    #[tokio::test]
    async fn test_seeded_runs_are_reproducible() {
        let circuit = CircuitBuilder::zne_benchmark(3).unwrap();

        let a = StatevectorSimulator::with_seed(42);
        let b = StatevectorSimulator::with_seed(42);
        let ha = a.execute(&circuit, 500, None).await.unwrap();
        let hb = b.execute(&circuit, 500, None).await.unwrap();
        assert_eq!(ha, hb);
    }

    #[tokio::test]
    async fn test_full_readout_flip() {
        let sim = StatevectorSimulator::with_seed(1);
        let mut circuit = Circuit::with_qubits(1);
        circuit.measure(0, 0);

        let mut model = NoiseModel::default();
        model.add_readout_error(ReadoutError::from_confusion(1.0, 0.0).unwrap(), 0);

        let hist = sim.execute(&circuit, 50, Some(&model)).await.unwrap();
        assert_eq!(hist.count("1"), 50);
    }

    #[tokio::test]
    async fn test_full_depolarizing_randomizes() {
        let sim = StatevectorSimulator::with_seed(3);
        let mut circuit = Circuit::with_qubits(1);
        circuit.x(0).measure(0, 0);

        let mut model = NoiseModel::default();
        model
            .add_quantum_error(QuantumError::depolarizing(1.0, 1).unwrap(), "x", NoiseTarget::Qubit(0))
            .unwrap();

        let hist = sim.execute(&circuit, 4000, Some(&model)).await.unwrap();
        // X or Y flips the bit back with probability 1/2
        let p0 = hist.probability("0");
        assert!((p0 - 0.5).abs() < 0.05, "p0 = {}", p0);
    }

    #[tokio::test]
    async fn test_strong_relaxation_resets() {
        let sim = StatevectorSimulator::with_seed(11);
        let mut circuit = Circuit::with_qubits(1);
        circuit.x(0).measure(0, 0);

        let mut model = NoiseModel::default();
        model
            .add_quantum_error(
                QuantumError::thermal_relaxation(0.001, 0.001, 10.0).unwrap(),
                "x",
                NoiseTarget::Qubit(0),
            )
            .unwrap();

        let hist = sim.execute(&circuit, 100, Some(&model)).await.unwrap();
        assert_eq!(hist.count("0"), 100);
    }

    #[tokio::test]
    async fn test_two_qubit_noise_applies_to_pair() {
        let sim = StatevectorSimulator::with_seed(5);
        let mut circuit = Circuit::with_qubits(3);
        circuit.ecr(1, 2).measure_all();

        let mut model = NoiseModel::default();
        model
            .add_quantum_error(
                QuantumError::depolarizing(1.0, 2).unwrap(),
                "ecr",
                NoiseTarget::Pair(QubitPair::new(1, 2)),
            )
            .unwrap();

        let hist = sim.execute(&circuit, 500, Some(&model)).await.unwrap();
        // qubit 0 is untouched
        for (bits, _) in hist.iter() {
            assert!(bits.ends_with('0'));
        }
    }

    #[tokio::test]
    async fn test_mid_circuit_measurement() {
        let sim = StatevectorSimulator::with_seed(9);
        let mut circuit = Circuit::new(1, 2);
        circuit.x(0).measure(0, 0).x(0).measure(0, 1);

        let hist = sim.execute(&circuit, 20, None).await.unwrap();
        assert_eq!(hist.count("01"), 20);
    }

    #[tokio::test]
    async fn test_rejects_large_registers() {
        let sim = StatevectorSimulator::new();
        let circuit = Circuit::with_qubits(MAX_QUBITS + 1);
        assert!(sim.execute(&circuit, 1, None).await.is_err());
    }
}
