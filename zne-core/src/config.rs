//! Experiment configuration files
//!
//! Every field has a default, so `{}` is a valid configuration:
//!
//! ```json
//! {
//!   "backend": "simulator",
//!   "num_qubits": 3,
//!   "noise_factors": [1, 3, 5, 7, 9],
//!   "shots": 4000,
//!   "baseline_shots": 9000,
//!   "mode": "aggregate",
//!   "amplifier": { "strategy": "local_folding", "convention": "triplet" },
//!   "noise": { "source": "calibrated", "scale_with_factor": true },
//!   "output": "zne_results.csv"
//! }
//! ```

use crate::amplify::Amplifier;
use crate::calibration::DeviceCalibration;
use crate::error::{Result, ZneError};
use crate::extrapolate::ExtrapolationType;
use crate::retry::RetryPolicy;
use crate::scaler::NoiseScaler;
use crate::sweep::{NoiseSource, SweepConfig};
use crate::{DEFAULT_BASELINE_SHOTS, DEFAULT_NOISE_FACTORS, DEFAULT_NUM_RUNS, DEFAULT_SHOTS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default CSV output path
pub const DEFAULT_OUTPUT: &str = "zne_results.csv";

/// Execution backend selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BackendChoice {
    /// Local state-vector simulator
    #[default]
    Simulator,
    /// IBM Quantum device; `None` selects the least busy operational device
    Ibm { name: Option<String> },
}

/// Which sweep to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// One aggregate execution per factor
    #[default]
    Aggregate,
    /// `num_runs` executions per factor
    AllValues,
    /// Single noise-free execution of the base circuit
    Baseline,
}

/// Noise model selection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum NoiseConfig {
    #[default]
    None,
    /// Calibration-driven model; the built-in sample when `calibration` is unset
    Calibrated {
        #[serde(default)]
        calibration: Option<PathBuf>,
        #[serde(default = "default_true")]
        scale_with_factor: bool,
        #[serde(default)]
        scaler: NoiseScaler,
    },
}

fn default_true() -> bool {
    true
}

/// Top-level experiment description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub backend: BackendChoice,
    pub num_qubits: usize,
    pub noise_factors: Vec<u32>,
    pub shots: u32,
    /// Shots for the single baseline execution
    pub baseline_shots: u32,
    pub num_runs: usize,
    pub mode: SweepMode,
    pub amplifier: Amplifier,
    pub noise: NoiseConfig,
    pub retry: RetryPolicy,
    pub fail_fast: bool,
    pub extrapolation: ExtrapolationType,
    pub output: PathBuf,
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::default(),
            num_qubits: 3,
            noise_factors: DEFAULT_NOISE_FACTORS.to_vec(),
            shots: DEFAULT_SHOTS,
            baseline_shots: DEFAULT_BASELINE_SHOTS,
            num_runs: DEFAULT_NUM_RUNS,
            mode: SweepMode::default(),
            amplifier: Amplifier::default(),
            noise: NoiseConfig::default(),
            retry: RetryPolicy::default(),
            fail_fast: false,
            extrapolation: ExtrapolationType::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            seed: None,
        }
    }
}

impl ExperimentConfig {
    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_qubits < 2 {
            return Err(ZneError::InvalidQubitCount(self.num_qubits));
        }
        if self.mode == SweepMode::AllValues && self.num_runs == 0 {
            return Err(ZneError::InvalidConfig("run count must be positive".into()));
        }
        if self.mode == SweepMode::Baseline && self.baseline_shots == 0 {
            return Err(ZneError::InvalidConfig(
                "baseline shot count must be positive".into(),
            ));
        }
        self.sweep_config().validate()
    }

    /// Sweep parameters of this experiment
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig::new()
            .with_noise_factors(self.noise_factors.clone())
            .with_shots(self.shots)
            .with_num_runs(self.num_runs)
            .with_amplifier(self.amplifier)
            .with_retry(self.retry.clone())
            .with_fail_fast(self.fail_fast)
    }

    /// Parameters of the noise-free baseline run
    pub fn baseline_config(&self) -> SweepConfig {
        self.sweep_config().with_shots(self.baseline_shots)
    }

    /// Resolve the noise configuration, loading calibration files as needed
    pub fn noise_source(&self) -> Result<NoiseSource> {
        match &self.noise {
            NoiseConfig::None => Ok(NoiseSource::None),
            NoiseConfig::Calibrated {
                calibration,
                scale_with_factor,
                scaler,
            } => {
                let calibration = match calibration {
                    Some(path) => DeviceCalibration::from_json_file(path)?,
                    None => DeviceCalibration::ibm_kyiv_sample(),
                };
                Ok(NoiseSource::Calibrated {
                    calibration,
                    scaler: scaler.clone(),
                    scale_with_factor: *scale_with_factor,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amplify::FoldConvention;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: ExperimentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ExperimentConfig::default());
        assert_eq!(config.noise_factors, vec![1, 3, 5, 7, 9]);
        assert_eq!(config.shots, 4000);
        assert_eq!(config.baseline_shots, 9000);
        assert_eq!(config.baseline_config().shots, 9000);
        assert_eq!(config.num_runs, 100);
        assert_eq!(config.output, PathBuf::from("zne_results.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "backend": {"kind": "ibm", "name": "ibm_kyiv"},
            "num_qubits": 4,
            "noise_factors": [1, 3, 5, 7, 9, 11, 13, 15, 17],
            "mode": "all_values",
            "num_runs": 20,
            "amplifier": {"strategy": "global_repetition"},
            "noise": {"source": "calibrated", "scale_with_factor": false},
            "retry": {"max_attempts": 5},
            "extrapolation": {"richardson": 2},
            "seed": 7
        }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.backend,
            BackendChoice::Ibm {
                name: Some("ibm_kyiv".into())
            }
        );
        assert_eq!(config.mode, SweepMode::AllValues);
        assert_eq!(config.amplifier, Amplifier::GlobalRepetition);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert_eq!(config.extrapolation, ExtrapolationType::Richardson(2));
        assert_eq!(config.seed, Some(7));

        let sweep = config.sweep_config();
        assert_eq!(sweep.noise_factors.len(), 9);
        assert_eq!(sweep.num_runs, 20);

        match config.noise_source().unwrap() {
            NoiseSource::Calibrated {
                calibration,
                scale_with_factor,
                ..
            } => {
                assert_eq!(calibration.backend, "ibm_kyiv");
                assert!(!scale_with_factor);
            }
            other => panic!("unexpected noise source {:?}", other),
        }
    }

    #[test]
    fn test_calibrated_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{"noise": {"source": "calibrated"}}"#).unwrap();
        match config.noise {
            NoiseConfig::Calibrated {
                calibration,
                scale_with_factor,
                scaler,
            } => {
                assert!(calibration.is_none());
                assert!(scale_with_factor);
                assert_eq!(scaler, NoiseScaler::default());
            }
            other => panic!("unexpected noise config {:?}", other),
        }
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = ExperimentConfig::default();
        config.num_qubits = 1;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::default();
        config.noise_factors.clear();
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::default();
        config.mode = SweepMode::AllValues;
        config.num_runs = 0;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::default();
        config.mode = SweepMode::Baseline;
        config.baseline_shots = 0;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::default();
        config.amplifier = Amplifier::LocalFolding(FoldConvention::Unitary);
        config.noise_factors = vec![1, 2, 3];
        assert!(matches!(
            config.validate(),
            Err(ZneError::InvalidScaleFactor { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.json");
        std::fs::write(
            &path,
            r#"{"amplifier": {"strategy": "local_folding", "convention": "unitary"}, "shots": 100}"#,
        )
        .unwrap();

        let config = ExperimentConfig::from_json_file(&path).unwrap();
        assert_eq!(config.shots, 100);
        assert_eq!(config.amplifier, Amplifier::LocalFolding(FoldConvention::Unitary));

        assert!(ExperimentConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
