//! Command-line front end of the `zne-sweep` binary
//!
//! Flags override the values of the optional JSON configuration file.

use crate::error::Result;
use crate::executor::IbmExecutor;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zne_core::{
    Amplifier, BackendChoice, Circuit, CircuitBuilder, CsvReport, ExperimentConfig,
    ExperimentResult, Executor, ExtrapolationType, FactorOutcome, FoldConvention, NoiseConfig,
    StatevectorSimulator, SweepDriver, SweepMode, SweepReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// One execution per factor
    Aggregate,
    /// `--num-runs` executions per factor
    AllValues,
    /// Single noise-free execution
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AmplifierArg {
    /// Gate folding, `[G, G†, G]` per fold
    Local,
    /// Gate folding, `G (G†G)^((k-1)/2)` (odd factors only)
    LocalUnitary,
    /// Whole-circuit repetition
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NoiseArg {
    None,
    Calibrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtrapolationArg {
    Linear,
    /// Second-order polynomial
    Richardson,
    Exponential,
}

#[derive(Debug, Parser)]
#[command(name = "zne-sweep")]
#[command(version)]
#[command(about = "Zero-noise extrapolation sweeps on a simulator or IBM Quantum hardware")]
pub struct Args {
    /// Experiment configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// `simulator`, `ibm` (least busy device) or an IBM device name
    #[arg(short, long)]
    pub backend: Option<String>,

    /// CSV output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Benchmark circuit width
    #[arg(short = 'n', long)]
    pub qubits: Option<usize>,

    /// Shots per execution
    #[arg(short, long)]
    pub shots: Option<u32>,

    /// Shots for the noise-free baseline
    #[arg(long)]
    pub baseline_shots: Option<u32>,

    /// Comma-separated noise factors, e.g. `1,3,5,7,9`
    #[arg(short, long, value_delimiter = ',')]
    pub factors: Vec<u32>,

    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Executions per factor in all-values mode
    #[arg(long)]
    pub num_runs: Option<usize>,

    #[arg(short, long, value_enum)]
    pub amplifier: Option<AmplifierArg>,

    #[arg(long, value_enum)]
    pub noise: Option<NoiseArg>,

    /// Device calibration file (JSON); implies `--noise calibrated`
    #[arg(long)]
    pub calibration: Option<PathBuf>,

    /// Keep the calibrated noise model at scale 1 for every factor
    #[arg(long)]
    pub no_noise_scaling: bool,

    #[arg(short, long, value_enum)]
    pub extrapolation: Option<ExtrapolationArg>,

    /// Attempts per execution, including the first
    #[arg(long)]
    pub retries: Option<u32>,

    /// Abort the sweep on the first failed factor
    #[arg(long)]
    pub fail_fast: bool,

    /// Simulator seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Shorthand for `--mode baseline`
    #[arg(long)]
    pub baseline: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Configuration file (or defaults) with flag overrides applied
    pub fn load_config(&self) -> Result<ExperimentConfig> {
        let base = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)?,
            None => ExperimentConfig::default(),
        };
        let config = self.apply(base);
        config.validate()?;
        Ok(config)
    }

    /// Override `config` with the flags that were given
    pub fn apply(&self, mut config: ExperimentConfig) -> ExperimentConfig {
        if let Some(backend) = &self.backend {
            config.backend = match backend.as_str() {
                "simulator" | "sim" => BackendChoice::Simulator,
                "ibm" => BackendChoice::Ibm { name: None },
                name => BackendChoice::Ibm {
                    name: Some(name.to_string()),
                },
            };
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(qubits) = self.qubits {
            config.num_qubits = qubits;
        }
        if let Some(shots) = self.shots {
            config.shots = shots;
        }
        if let Some(shots) = self.baseline_shots {
            config.baseline_shots = shots;
        }
        if !self.factors.is_empty() {
            config.noise_factors = self.factors.clone();
        }
        if let Some(runs) = self.num_runs {
            config.num_runs = runs;
        }

        if self.baseline {
            config.mode = SweepMode::Baseline;
        } else if let Some(mode) = self.mode {
            config.mode = match mode {
                ModeArg::Aggregate => SweepMode::Aggregate,
                ModeArg::AllValues => SweepMode::AllValues,
                ModeArg::Baseline => SweepMode::Baseline,
            };
        }

        if let Some(amplifier) = self.amplifier {
            config.amplifier = match amplifier {
                AmplifierArg::Local => Amplifier::LocalFolding(FoldConvention::Triplet),
                AmplifierArg::LocalUnitary => Amplifier::LocalFolding(FoldConvention::Unitary),
                AmplifierArg::Global => Amplifier::GlobalRepetition,
            };
        }

        self.apply_noise(&mut config);

        if let Some(method) = self.extrapolation {
            config.extrapolation = match method {
                ExtrapolationArg::Linear => ExtrapolationType::Linear,
                ExtrapolationArg::Richardson => ExtrapolationType::Richardson(2),
                ExtrapolationArg::Exponential => ExtrapolationType::Exponential,
            };
        }
        if let Some(attempts) = self.retries {
            config.retry = config.retry.with_max_attempts(attempts);
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }

    fn apply_noise(&self, config: &mut ExperimentConfig) {
        if self.noise == Some(NoiseArg::None) {
            config.noise = NoiseConfig::None;
            return;
        }

        let wants_calibrated = self.noise == Some(NoiseArg::Calibrated)
            || self.calibration.is_some()
            || self.no_noise_scaling;
        if !wants_calibrated {
            return;
        }

        let (mut calibration, mut scale_with_factor, scaler) = match &config.noise {
            NoiseConfig::Calibrated {
                calibration,
                scale_with_factor,
                scaler,
            } => (calibration.clone(), *scale_with_factor, scaler.clone()),
            NoiseConfig::None => (None, true, Default::default()),
        };
        if self.calibration.is_some() {
            calibration = self.calibration.clone();
        }
        if self.no_noise_scaling {
            scale_with_factor = false;
        }

        config.noise = NoiseConfig::Calibrated {
            calibration,
            scale_with_factor,
            scaler,
        };
    }
}

/// Log filter: `RUST_LOG` (default `info`), raised by `-v`
pub fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// What a finished experiment produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub backend: String,
    pub output: PathBuf,
    pub completed: usize,
    pub failed: usize,
    /// Zero-noise estimate of an aggregate sweep
    pub zero_noise_value: Option<f64>,
}

/// Build the benchmark circuit, connect the configured backend and run
pub async fn run_experiment(config: &ExperimentConfig) -> Result<RunSummary> {
    let circuit = CircuitBuilder::zne_benchmark(config.num_qubits)?;

    match &config.backend {
        BackendChoice::Simulator => {
            let simulator = match config.seed {
                Some(seed) => StatevectorSimulator::with_seed(seed),
                None => StatevectorSimulator::new(),
            };
            run_on(&simulator, &circuit, config).await
        }
        BackendChoice::Ibm { name } => {
            if config.noise != NoiseConfig::None {
                warn!("calibrated noise is only applied by the simulator");
            }
            let executor = IbmExecutor::connect(name.as_deref(), config.num_qubits).await?;
            run_on(&executor, &circuit, config).await
        }
    }
}

/// Run the configured sweep on `executor` and write the CSV
pub async fn run_on<E: Executor + ?Sized>(
    executor: &E,
    circuit: &Circuit,
    config: &ExperimentConfig,
) -> Result<RunSummary> {
    let driver = SweepDriver::new(executor, config.sweep_config()).with_noise(config.noise_source()?);
    let mut summary = RunSummary {
        backend: executor.name().to_string(),
        output: config.output.clone(),
        completed: 0,
        failed: 0,
        zero_noise_value: None,
    };

    info!(
        backend = %summary.backend,
        qubits = circuit.num_qubits(),
        mode = ?config.mode,
        factors = ?config.noise_factors,
        shots = config.shots,
        "starting experiment"
    );

    match config.mode {
        SweepMode::Baseline => {
            let record = SweepDriver::new(executor, config.baseline_config())
                .baseline(circuit)
                .await?;
            let report: SweepReport<ExperimentResult> = SweepReport {
                backend: summary.backend.clone(),
                amplifier: config.amplifier,
                shots: config.baseline_shots,
                outcomes: vec![FactorOutcome::Completed(record)],
            };
            report.write_csv(&config.output)?;
            summary.completed = 1;
        }
        SweepMode::Aggregate => {
            let report = driver.run(circuit).await?;
            report.write_csv(&config.output)?;
            summary.completed = report.completed().count();
            summary.failed = report.failed_count();

            match report.extrapolate(config.extrapolation) {
                Ok(fit) => {
                    info!(
                        method = %fit.method,
                        zero_noise = fit.zero_noise_value,
                        unmitigated = ?fit.unmitigated_value,
                        "zero-noise extrapolation"
                    );
                    summary.zero_noise_value = Some(fit.zero_noise_value);
                }
                Err(err) => warn!(error = %err, "extrapolation skipped"),
            }
        }
        SweepMode::AllValues => {
            let report = driver.run_all_values(circuit).await?;
            report.write_csv(&config.output)?;
            summary.completed = report.completed().count();
            summary.failed = report.failed_count();

            for series in report.completed() {
                info!(
                    factor = series.scale_factor,
                    runs = series.values.len(),
                    mean = ?series.mean(),
                    "factor summary"
                );
            }
        }
    }

    if summary.failed > 0 {
        warn!(failed = summary.failed, "some factors failed; their CSV rows are empty");
    }
    Ok(summary)
}
