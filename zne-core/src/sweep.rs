//! Noise-factor sweep driver
//!
//! Every noise factor is first prepared: the transpiled base circuit is
//! amplified, re-transpiled and paired with its noise model. Then, in input
//! order, each factor executes through the retry policy and its histogram is
//! reduced to an [`Estimate`]. Factors run one after another.

use crate::amplify::Amplifier;
use crate::calibration::DeviceCalibration;
use crate::circuit::Circuit;
use crate::error::{Result, ZneError};
use crate::estimator::{estimate, Estimate};
use crate::executor::Executor;
use crate::extrapolate::{Extrapolation, ExtrapolationType, Extrapolator};
use crate::histogram::Histogram;
use crate::noise_model::NoiseModel;
use crate::retry::RetryPolicy;
use crate::scaler::NoiseScaler;
use crate::{DEFAULT_NOISE_FACTORS, DEFAULT_NUM_RUNS, DEFAULT_SHOTS};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

// =============================================================================
// Configuration
// =============================================================================

/// Sweep configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Integer noise amplification factors, executed in this order
    pub noise_factors: Vec<u32>,
    /// Shots per execution
    pub shots: u32,
    /// Independent executions per factor in all-values mode
    pub num_runs: usize,
    pub amplifier: Amplifier,
    pub retry: RetryPolicy,
    /// Propagate the first failed factor instead of recording it
    pub fail_fast: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            noise_factors: DEFAULT_NOISE_FACTORS.to_vec(),
            shots: DEFAULT_SHOTS,
            num_runs: DEFAULT_NUM_RUNS,
            amplifier: Amplifier::default(),
            retry: RetryPolicy::default(),
            fail_fast: false,
        }
    }
}

impl SweepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_noise_factors(mut self, factors: Vec<u32>) -> Self {
        self.noise_factors = factors;
        self
    }

    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = shots;
        self
    }

    pub fn with_num_runs(mut self, runs: usize) -> Self {
        self.num_runs = runs;
        self
    }

    pub fn with_amplifier(mut self, amplifier: Amplifier) -> Self {
        self.amplifier = amplifier;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Reject configurations that cannot produce any result
    pub fn validate(&self) -> Result<()> {
        if self.noise_factors.is_empty() {
            return Err(ZneError::InvalidConfig("noise factor list is empty".into()));
        }
        if self.noise_factors.contains(&0) {
            return Err(ZneError::InvalidConfig(
                "noise factors must be at least 1".into(),
            ));
        }
        if self.shots == 0 {
            return Err(ZneError::InvalidConfig("shot count must be positive".into()));
        }
        for &factor in &self.noise_factors {
            self.amplifier.check_factor(factor)?;
        }
        Ok(())
    }
}

/// Where the per-factor noise model comes from
#[derive(Debug, Clone, Default)]
pub enum NoiseSource {
    /// No software noise model
    #[default]
    None,
    /// Same model for every factor
    Fixed(NoiseModel),
    /// Scaled from calibration data
    Calibrated {
        calibration: DeviceCalibration,
        scaler: NoiseScaler,
        /// Scale by the noise factor; otherwise build the unscaled model
        scale_with_factor: bool,
    },
}

impl NoiseSource {
    /// Noise model to execute factor `factor` under
    pub fn model_for(&self, factor: u32) -> Result<Option<Cow<'_, NoiseModel>>> {
        match self {
            NoiseSource::None => Ok(None),
            NoiseSource::Fixed(model) => Ok(Some(Cow::Borrowed(model))),
            NoiseSource::Calibrated {
                calibration,
                scaler,
                scale_with_factor,
            } => {
                let s = if *scale_with_factor { f64::from(factor) } else { 1.0 };
                Ok(Some(Cow::Owned(scaler.scale(calibration, s)?)))
            }
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// Aggregate measurement at one noise factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub scale_factor: u32,
    pub expectation_value: f64,
    pub std_dev: f64,
}

impl ExperimentResult {
    pub fn new(scale_factor: u32, estimate: Estimate) -> Self {
        Self {
            scale_factor,
            expectation_value: estimate.expectation_value,
            std_dev: estimate.std_dev,
        }
    }
}

/// Expectation values of repeated independent runs at one noise factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSeries {
    pub scale_factor: u32,
    pub values: Vec<f64>,
}

impl RunSeries {
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
        }
    }
}

/// Record type stored in a [`SweepReport`]
pub trait FactorRecord {
    fn scale_factor(&self) -> u32;
}

impl FactorRecord for ExperimentResult {
    fn scale_factor(&self) -> u32 {
        self.scale_factor
    }
}

impl FactorRecord for RunSeries {
    fn scale_factor(&self) -> u32 {
        self.scale_factor
    }
}

/// Outcome of one noise factor
#[derive(Debug, Clone, PartialEq)]
pub enum FactorOutcome<T> {
    Completed(T),
    /// Execution failed after the retry policy gave up
    ///
    /// Only execution errors become sentinels; configuration and
    /// amplification errors are returned before the sweep starts.
    Failed {
        scale_factor: u32,
        error: String,
        attempts: u32,
    },
}

impl<T: FactorRecord> FactorOutcome<T> {
    pub fn scale_factor(&self) -> u32 {
        match self {
            FactorOutcome::Completed(record) => record.scale_factor(),
            FactorOutcome::Failed { scale_factor, .. } => *scale_factor,
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            FactorOutcome::Completed(record) => Some(record),
            FactorOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FactorOutcome::Failed { .. })
    }
}

/// Ordered outcomes of a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport<T> {
    pub backend: String,
    pub amplifier: Amplifier,
    pub shots: u32,
    pub outcomes: Vec<FactorOutcome<T>>,
}

impl<T: FactorRecord> SweepReport<T> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Completed records, in factor order
    pub fn completed(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(FactorOutcome::completed)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

impl SweepReport<ExperimentResult> {
    /// `(factor, expectation)` pairs of completed factors
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.completed()
            .map(|r| (f64::from(r.scale_factor), r.expectation_value))
            .collect()
    }

    /// Extrapolate the completed factors to zero noise
    pub fn extrapolate(&self, method: ExtrapolationType) -> Result<Extrapolation> {
        Extrapolator::new(method).fit(&self.points())
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Runs a circuit over the configured noise factors on one executor
pub struct SweepDriver<'a, E: Executor + ?Sized> {
    executor: &'a E,
    config: SweepConfig,
    noise: NoiseSource,
}

impl<'a, E: Executor + ?Sized> SweepDriver<'a, E> {
    pub fn new(executor: &'a E, config: SweepConfig) -> Self {
        Self {
            executor,
            config,
            noise: NoiseSource::None,
        }
    }

    pub fn with_noise(mut self, noise: NoiseSource) -> Self {
        self.noise = noise;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// One aggregate execution of `shots` per factor
    ///
    /// Every factor is amplified and given its noise model before the first
    /// execution, so configuration errors surface without running anything.
    pub async fn run(&self, circuit: &Circuit) -> Result<SweepReport<ExperimentResult>> {
        self.config.validate()?;
        let prepared = self.prepare_all(circuit)?;
        let n_qubits = circuit.num_qubits();
        let mut outcomes = Vec::with_capacity(prepared.len());

        for factor in &prepared {
            tracing::info!(
                factor = factor.factor,
                shots = self.config.shots,
                amplifier = self.config.amplifier.label(),
                backend = self.executor.name(),
                "running noise factor"
            );

            let (result, attempts) = self.execute_prepared(factor).await;
            let outcome = match result {
                Ok(histogram) => {
                    let record =
                        ExperimentResult::new(factor.factor, estimate(&histogram, n_qubits));
                    tracing::info!(
                        factor = factor.factor,
                        expectation = record.expectation_value,
                        std_dev = record.std_dev,
                        "noise factor complete"
                    );
                    FactorOutcome::Completed(record)
                }
                Err(e) => self.failed(factor.factor, e, attempts)?,
            };
            outcomes.push(outcome);
        }

        Ok(self.report(outcomes))
    }

    /// `num_runs` independent executions of `shots` per factor
    ///
    /// The amplified circuit and noise model are built once per factor. A
    /// factor with any failed run is recorded as failed.
    pub async fn run_all_values(&self, circuit: &Circuit) -> Result<SweepReport<RunSeries>> {
        self.config.validate()?;
        if self.config.num_runs == 0 {
            return Err(ZneError::InvalidConfig("run count must be positive".into()));
        }

        let prepared = self.prepare_all(circuit)?;
        let n_qubits = circuit.num_qubits();
        let mut outcomes = Vec::with_capacity(prepared.len());

        for factor in &prepared {
            tracing::info!(
                factor = factor.factor,
                runs = self.config.num_runs,
                shots = self.config.shots,
                "running noise factor"
            );

            let mut values = Vec::with_capacity(self.config.num_runs);
            let mut failure = None;
            for run in 0..self.config.num_runs {
                let (result, attempts) = self.execute_prepared(factor).await;
                match result {
                    Ok(histogram) => {
                        let value = estimate(&histogram, n_qubits).expectation_value;
                        tracing::debug!(factor = factor.factor, run, value, "run complete");
                        values.push(value);
                    }
                    Err(e) => {
                        failure = Some((e, attempts));
                        break;
                    }
                }
            }

            let outcome = match failure {
                None => {
                    tracing::info!(
                        factor = factor.factor,
                        runs = values.len(),
                        "noise factor complete"
                    );
                    FactorOutcome::Completed(RunSeries {
                        scale_factor: factor.factor,
                        values,
                    })
                }
                Some((e, attempts)) => self.failed(factor.factor, e, attempts)?,
            };
            outcomes.push(outcome);
        }

        Ok(self.report(outcomes))
    }

    /// Execute the un-amplified circuit once without any noise model
    pub async fn baseline(&self, circuit: &Circuit) -> Result<ExperimentResult> {
        if self.config.shots == 0 {
            return Err(ZneError::InvalidConfig("shot count must be positive".into()));
        }
        self.check_width(circuit)?;

        let compiled = self.executor.transpile(circuit)?;
        let (result, _) = self
            .config
            .retry
            .run(self.executor.name(), || {
                self.executor.execute(&compiled, self.config.shots, None)
            })
            .await;

        let record = ExperimentResult::new(1, estimate(&result?, circuit.num_qubits()));
        tracing::info!(
            expectation = record.expectation_value,
            std_dev = record.std_dev,
            "noise-free baseline"
        );
        Ok(record)
    }

    fn check_width(&self, circuit: &Circuit) -> Result<()> {
        match self.executor.max_qubits() {
            Some(limit) if circuit.num_qubits() > limit => Err(ZneError::InvalidConfig(format!(
                "{} qubits exceed the {} limit of {}",
                circuit.num_qubits(),
                self.executor.name(),
                limit
            ))),
            _ => Ok(()),
        }
    }

    fn prepare_all(&self, circuit: &Circuit) -> Result<Vec<PreparedFactor<'_>>> {
        self.check_width(circuit)?;
        let base = self.executor.transpile(circuit)?;
        self.config
            .noise_factors
            .iter()
            .map(|&factor| self.prepare_factor(&base, factor))
            .collect()
    }

    fn prepare_factor(&self, base: &Circuit, factor: u32) -> Result<PreparedFactor<'_>> {
        let amplified = self.config.amplifier.amplify(base, factor)?;
        let circuit = self.executor.transpile(&amplified)?;
        let noise = self.noise.model_for(factor)?;

        tracing::debug!(
            factor,
            operations = circuit.len(),
            depth = circuit.depth(),
            noisy = noise.is_some(),
            "amplified circuit ready"
        );
        Ok(PreparedFactor {
            factor,
            circuit,
            noise,
        })
    }

    async fn execute_prepared(&self, prepared: &PreparedFactor<'_>) -> (Result<Histogram>, u32) {
        let noise = prepared.noise.as_deref();
        self.config
            .retry
            .run(self.executor.name(), || {
                self.executor
                    .execute(&prepared.circuit, self.config.shots, noise)
            })
            .await
    }

    fn failed<T>(&self, factor: u32, error: ZneError, attempts: u32) -> Result<FactorOutcome<T>> {
        if self.config.fail_fast {
            return Err(error);
        }
        tracing::warn!(factor, attempts, error = %error, "noise factor failed, recording sentinel");
        Ok(FactorOutcome::Failed {
            scale_factor: factor,
            error: error.to_string(),
            attempts,
        })
    }

    fn report<T>(&self, outcomes: Vec<FactorOutcome<T>>) -> SweepReport<T> {
        SweepReport {
            backend: self.executor.name().to_string(),
            amplifier: self.config.amplifier,
            shots: self.config.shots,
            outcomes,
        }
    }
}

struct PreparedFactor<'n> {
    factor: u32,
    circuit: Circuit,
    noise: Option<Cow<'n, NoiseModel>>,
}
