//! # ZNE-Core: Zero-Noise Extrapolation Pipeline
//!
//! Runs a fixed benchmark circuit at several amplified noise levels and
//! reduces each execution to a signed expectation value.
//!
//! ## Features
//!
//! - **Circuit Builder**: the entangling benchmark circuit
//! - **Noise Amplification**: local gate folding or global repetition
//! - **Noise Scaling**: calibration-driven noise models scaled per factor
//! - **Execution**: async [`Executor`] trait and a local state-vector simulator
//! - **Sweep Driver**: per-factor execution with retries and failure sentinels
//! - **Reports**: CSV export and zero-noise extrapolation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use zne_core::{CircuitBuilder, CsvReport, StatevectorSimulator, SweepConfig, SweepDriver};
//!
//! let circuit = CircuitBuilder::zne_benchmark(3)?;
//! let simulator = StatevectorSimulator::with_seed(42);
//!
//! let report = SweepDriver::new(&simulator, SweepConfig::default())
//!     .run(&circuit)
//!     .await?;
//! report.write_csv("zne_results.csv")?;
//! ```

pub mod amplify;
pub mod builder;
pub mod calibration;
pub mod circuit;
pub mod config;
pub mod error;
pub mod estimator;
pub mod executor;
pub mod extrapolate;
pub mod histogram;
pub mod noise_model;
pub mod report;
pub mod retry;
pub mod scaler;
pub mod simulator;
pub mod sweep;
pub mod transpiler;

// Re-exports
pub use amplify::{fold_gates, repeat_circuit, Amplifier, FoldConvention};
pub use builder::CircuitBuilder;
pub use calibration::{
    DeviceCalibration, EdgeCalibration, QubitCalibration, QubitPair, ReadoutCalibration,
};
pub use circuit::{Circuit, Gate, GateType, Operation};
pub use config::{BackendChoice, ExperimentConfig, NoiseConfig, SweepMode, DEFAULT_OUTPUT};
pub use error::{Result, ZneError};
pub use estimator::{estimate, Estimate};
pub use executor::Executor;
pub use extrapolate::{Extrapolation, ExtrapolationType, Extrapolator};
pub use histogram::Histogram;
pub use noise_model::{
    ErrorTerm, NoiseChannel, NoiseModel, NoiseTarget, QuantumError, ReadoutError,
    RelaxationProbabilities,
};
pub use report::{CsvReport, AGGREGATE_HEADER};
pub use retry::RetryPolicy;
pub use scaler::NoiseScaler;
pub use simulator::StatevectorSimulator;
pub use sweep::{
    ExperimentResult, FactorOutcome, FactorRecord, NoiseSource, RunSeries, SweepConfig,
    SweepDriver, SweepReport,
};
pub use transpiler::{lower_to_native, NATIVE_GATES};

/// Default number of shots per execution
pub const DEFAULT_SHOTS: u32 = 4000;

/// Default number of shots for the noise-free baseline
pub const DEFAULT_BASELINE_SHOTS: u32 = 9000;

/// Default noise amplification factors
pub const DEFAULT_NOISE_FACTORS: [u32; 5] = [1, 3, 5, 7, 9];

/// Default number of independent runs per factor in all-values mode
pub const DEFAULT_NUM_RUNS: usize = 100;
