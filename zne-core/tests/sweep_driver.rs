//! End-to-end sweep tests against the simulator and scripted executors

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use zne_core::{
    Amplifier, Circuit, CircuitBuilder, CsvReport, DeviceCalibration, Executor, FactorOutcome,
    FoldConvention, Histogram, NoiseModel, NoiseScaler, NoiseSource, Result, RetryPolicy,
    StatevectorSimulator, SweepConfig, SweepDriver, ZneError,
};

/// Returns a fixed histogram and records the size of every executed circuit
struct Scripted {
    counts: Vec<(&'static str, u64)>,
    executed: Mutex<Vec<usize>>,
    noise_scales: Mutex<Vec<Option<f64>>>,
}

impl Scripted {
    fn new(counts: Vec<(&'static str, u64)>) -> Self {
        Self {
            counts,
            executed: Mutex::new(Vec::new()),
            noise_scales: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Executor for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        circuit: &Circuit,
        _shots: u32,
        noise: Option<&NoiseModel>,
    ) -> Result<Histogram> {
        self.executed.lock().unwrap().push(circuit.gate_count());
        self.noise_scales
            .lock()
            .unwrap()
            .push(noise.map(|n| n.scale_factor()));
        Ok(Histogram::from_counts(self.counts.clone()))
    }
}

/// Fails with a transient error on the listed call numbers (0-based)
struct Flaky {
    fail_on: Vec<u32>,
    calls: AtomicU32,
}

#[async_trait]
impl Executor for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn execute(
        &self,
        _circuit: &Circuit,
        shots: u32,
        _noise: Option<&NoiseModel>,
    ) -> Result<Histogram> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&call) {
            Err(ZneError::transient("flaky", format!("call {} rejected", call)))
        } else {
            Ok(Histogram::from_counts([("000", u64::from(shots))]))
        }
    }
}

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(attempts)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(2))
}

#[tokio::test]
async fn test_three_factors_in_input_order() {
    let executor = Scripted::new(vec![("000", 3000), ("111", 1000), ("010", 0)]);
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
    let config = SweepConfig::new()
        .with_noise_factors(vec![1, 3, 5])
        .with_retry(RetryPolicy::none());

    let report = SweepDriver::new(&executor, config).run(&circuit).await.unwrap();

    let factors: Vec<u32> = report.completed().map(|r| r.scale_factor).collect();
    assert_eq!(factors, vec![1, 3, 5]);
    for record in report.completed() {
        assert!((record.expectation_value - 0.5).abs() < 1e-10);
        assert!((record.std_dev - 0.75f64.sqrt()).abs() < 1e-10);
    }

    // default transpile is the identity, so folded gate counts are 3·factor·base
    let base = circuit.gate_count();
    assert_eq!(
        *executor.executed.lock().unwrap(),
        vec![3 * base, 9 * base, 15 * base]
    );
}

#[tokio::test]
async fn test_global_repetition_with_calibrated_noise() {
    let executor = Scripted::new(vec![("000", 10)]);
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
    let config = SweepConfig::new()
        .with_noise_factors(vec![1, 2, 3])
        .with_amplifier(Amplifier::GlobalRepetition);

    let report = SweepDriver::new(&executor, config)
        .with_noise(NoiseSource::Calibrated {
            calibration: DeviceCalibration::ibm_kyiv_sample(),
            scaler: NoiseScaler::default(),
            scale_with_factor: true,
        })
        .run(&circuit)
        .await
        .unwrap();

    assert_eq!(report.len(), 3);
    let base = circuit.gate_count();
    assert_eq!(*executor.executed.lock().unwrap(), vec![base, 2 * base, 3 * base]);
    assert_eq!(
        *executor.noise_scales.lock().unwrap(),
        vec![Some(1.0), Some(2.0), Some(3.0)]
    );
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let executor = Flaky {
        fail_on: vec![1],
        calls: AtomicU32::new(0),
    };
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
    let config = SweepConfig::new()
        .with_noise_factors(vec![1, 3])
        .with_retry(fast_retry(3));

    let report = SweepDriver::new(&executor, config).run(&circuit).await.unwrap();

    assert_eq!(report.failed_count(), 0);
    assert_eq!(report.completed().count(), 2);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exhausted_retries_record_sentinel() {
    let executor = Flaky {
        fail_on: vec![1, 2],
        calls: AtomicU32::new(0),
    };
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
    let config = SweepConfig::new()
        .with_noise_factors(vec![1, 3, 5])
        .with_retry(fast_retry(2));

    let report = SweepDriver::new(&executor, config).run(&circuit).await.unwrap();

    assert_eq!(report.len(), 3);
    match &report.outcomes[1] {
        FactorOutcome::Failed {
            scale_factor,
            attempts,
            error,
        } => {
            assert_eq!(*scale_factor, 3);
            assert_eq!(*attempts, 2);
            assert!(error.contains("rejected"));
        }
        other => panic!("expected a failed outcome, got {:?}", other),
    }
    assert!(report.outcomes[2].completed().is_some());

    let csv = report.to_csv().unwrap();
    assert!(csv.lines().any(|line| line == "3,,"));
}

#[tokio::test]
async fn test_fail_fast_propagates() {
    let executor = Flaky {
        fail_on: vec![0],
        calls: AtomicU32::new(0),
    };
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
    let config = SweepConfig::new()
        .with_retry(RetryPolicy::none())
        .with_fail_fast(true);

    let result = SweepDriver::new(&executor, config).run(&circuit).await;
    assert!(matches!(result, Err(ZneError::Execution { .. })));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_config_rejected_before_execution() {
    let executor = Scripted::new(vec![("000", 1)]);
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();

    let empty = SweepConfig::new().with_noise_factors(vec![]);
    let result = SweepDriver::new(&executor, empty).run(&circuit).await;
    assert!(matches!(result, Err(ZneError::InvalidConfig(_))));

    let no_shots = SweepConfig::new().with_shots(0);
    let result = SweepDriver::new(&executor, no_shots).run(&circuit).await;
    assert!(matches!(result, Err(ZneError::InvalidConfig(_))));

    let no_runs = SweepConfig::new().with_num_runs(0);
    let result = SweepDriver::new(&executor, no_runs).run_all_values(&circuit).await;
    assert!(matches!(result, Err(ZneError::InvalidConfig(_))));

    assert!(executor.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_even_factor_with_unitary_folding_rejected_before_execution() {
    let executor = Scripted::new(vec![("000", 1)]);
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
    let config = SweepConfig::new()
        .with_noise_factors(vec![1, 2, 3])
        .with_amplifier(Amplifier::LocalFolding(FoldConvention::Unitary));

    let driver = SweepDriver::new(&executor, config);
    let result = driver.run(&circuit).await;
    assert!(matches!(result, Err(ZneError::InvalidScaleFactor { .. })));

    let result = driver.run_all_values(&circuit).await;
    assert!(matches!(result, Err(ZneError::InvalidScaleFactor { .. })));

    assert!(executor.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_circuit_wider_than_executor_rejected() {
    let simulator = StatevectorSimulator::with_seed(1);
    let circuit = CircuitBuilder::zne_benchmark(zne_core::simulator::MAX_QUBITS + 1).unwrap();
    let driver = SweepDriver::new(&simulator, SweepConfig::new().with_noise_factors(vec![1, 3]));

    assert!(matches!(
        driver.run(&circuit).await,
        Err(ZneError::InvalidConfig(_))
    ));
    assert!(matches!(
        driver.run_all_values(&circuit).await,
        Err(ZneError::InvalidConfig(_))
    ));
    assert!(matches!(
        driver.baseline(&circuit).await,
        Err(ZneError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_all_values_mode() {
    let executor = Scripted::new(vec![("000", 3), ("111", 1)]);
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
    let config = SweepConfig::new()
        .with_noise_factors(vec![1, 3])
        .with_num_runs(4);

    let report = SweepDriver::new(&executor, config)
        .run_all_values(&circuit)
        .await
        .unwrap();

    assert_eq!(report.len(), 2);
    for series in report.completed() {
        assert_eq!(series.values.len(), 4);
        assert!((series.mean().unwrap() - 0.5).abs() < 1e-10);
    }
    assert_eq!(executor.executed.lock().unwrap().len(), 8);

    let csv = report.to_csv().unwrap();
    let header = csv.lines().next().unwrap();
    assert_eq!(
        header,
        "Noise Factor,Measurement 1,Measurement 2,Measurement 3,Measurement 4"
    );
}

#[tokio::test]
async fn test_simulator_sweep_without_noise() {
    let simulator = StatevectorSimulator::with_seed(2024);
    let circuit = CircuitBuilder::zne_benchmark(3).unwrap();
    let config = SweepConfig::new()
        .with_noise_factors(vec![1, 3])
        .with_shots(2000);

    let driver = SweepDriver::new(&simulator, config);
    let report = driver.run(&circuit).await.unwrap();
    let baseline = driver.baseline(&circuit).await.unwrap();

    // without noise, folding leaves the outcome distribution unchanged
    let values: Vec<f64> = report.completed().map(|r| r.expectation_value).collect();
    assert_eq!(values.len(), 2);
    assert!((values[0] - values[1]).abs() < 0.15);
    assert!((values[0] - baseline.expectation_value).abs() < 0.15);
    assert_eq!(baseline.scale_factor, 1);
}

#[tokio::test]
async fn test_simulator_noise_reduces_signal() {
    let simulator = StatevectorSimulator::with_seed(99);
    let mut circuit = Circuit::with_qubits(2);
    circuit.x(0).x(1).measure_all();

    let config = SweepConfig::new()
        .with_noise_factors(vec![1, 9])
        .with_shots(2000);
    let report = SweepDriver::new(&simulator, config)
        .with_noise(NoiseSource::Calibrated {
            calibration: DeviceCalibration::new("toy")
                .with_qubit(zne_core::QubitCalibration::new(0, 100.0, 80.0).with_gate_error("x", 0.02))
                .with_qubit(zne_core::QubitCalibration::new(1, 100.0, 80.0).with_gate_error("x", 0.02)),
            scaler: NoiseScaler::default(),
            scale_with_factor: true,
        })
        .run(&circuit)
        .await
        .unwrap();

    let values: Vec<f64> = report.completed().map(|r| r.expectation_value).collect();
    // |11⟩ gives -1 ideally; depolarizing pulls it toward 0
    assert!(values[0] < -0.8);
    assert!(values[1] > values[0]);
}
