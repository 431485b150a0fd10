//! Error types for the ZNE pipeline
//!
//! Covers:
//! - Circuit construction and validation
//! - Noise amplification and noise-model scaling
//! - Backend execution (retryable or not)
//! - Report output and configuration loading

use std::time::Duration;
use thiserror::Error;

/// Result type alias for zne-core operations
pub type Result<T> = std::result::Result<T, ZneError>;

/// Error type shared by every stage of the ZNE pipeline
#[derive(Error, Debug)]
pub enum ZneError {
    // ==========================================================================
    // Circuit Errors
    // ==========================================================================
    /// Qubit count outside the supported range
    #[error("Invalid qubit count {0}: at least 2 qubits are required")]
    InvalidQubitCount(usize),

    /// Circuit failed validation
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(String),

    /// Gate not supported by the target
    #[error("Unsupported gate: {0}")]
    UnsupportedGate(String),

    // ==========================================================================
    // Amplification / Noise Errors
    // ==========================================================================
    /// Scale factor rejected by an amplifier or the noise scaler
    #[error("Invalid scale factor {factor}: {reason}")]
    InvalidScaleFactor { factor: f64, reason: String },

    /// Calibration data is inconsistent
    #[error("Calibration error: {0}")]
    Calibration(String),

    /// Noise channel parameters are not physical
    #[error("Invalid noise channel: {0}")]
    InvalidChannel(String),

    // ==========================================================================
    // Execution Errors
    // ==========================================================================
    /// Backend execution failed
    #[error("Execution on '{backend}' failed: {message}")]
    Execution {
        backend: String,
        message: String,
        retryable: bool,
        retry_after: Option<Duration>,
    },

    // ==========================================================================
    // Configuration / Output Errors
    // ==========================================================================
    /// Sweep or experiment configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZneError {
    /// Build a non-retryable execution error
    pub fn execution(backend: impl Into<String>, message: impl Into<String>) -> Self {
        ZneError::Execution {
            backend: backend.into(),
            message: message.into(),
            retryable: false,
            retry_after: None,
        }
    }

    /// Build a transient execution error that the retry policy may repeat
    pub fn transient(backend: impl Into<String>, message: impl Into<String>) -> Self {
        ZneError::Execution {
            backend: backend.into(),
            message: message.into(),
            retryable: true,
            retry_after: None,
        }
    }

    pub(crate) fn invalid_factor(factor: impl Into<f64>, reason: impl Into<String>) -> Self {
        ZneError::InvalidScaleFactor {
            factor: factor.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ZneError::Execution { retryable, .. } => *retryable,
            ZneError::Io(_) => true,
            _ => false,
        }
    }

    /// Get the delay suggested by the backend before retrying
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            ZneError::Execution {
                retryable: true,
                retry_after,
                ..
            } => *retry_after,
            _ => None,
        }
    }
}
