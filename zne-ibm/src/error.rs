//! Error types for the IBM Quantum executor
//!
//! Covers:
//! - Credential loading
//! - HTTP and API failures (some retryable)
//! - Job lifecycle failures
//! - OpenQASM emission

use std::time::Duration;
use thiserror::Error;
use zne_core::ZneError;

/// Result type alias for zne-ibm operations
pub type Result<T> = std::result::Result<T, IBMError>;

/// Error type for IBM Quantum operations
#[derive(Error, Debug)]
pub enum IBMError {
    // ==========================================================================
    // Credential Errors
    // ==========================================================================
    /// API token not found
    #[error("API token not found. Set IBM_QUANTUM_TOKEN environment variable.")]
    TokenNotFound,

    /// Invalid API token
    #[error("Invalid API token: {0}")]
    InvalidToken(String),

    // ==========================================================================
    // Network / API Errors
    // ==========================================================================
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Retry after {0} seconds.")]
    RateLimitExceeded(u64),

    /// API returned an error status
    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Backend not found
    #[error("Backend '{0}' not found")]
    BackendNotFound(String),

    /// Backend not accepting jobs
    #[error("Backend '{0}' is currently unavailable: {1}")]
    BackendUnavailable(String, String),

    /// No backend has been selected yet
    #[error("No backend selected")]
    NoBackendSelected,

    // ==========================================================================
    // Job Errors
    // ==========================================================================
    /// Job submission rejected
    #[error("Job submission failed: {0}")]
    JobSubmissionFailed(String),

    /// Job not found
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    /// Job ended in the failed state
    #[error("Job '{0}' failed: {1}")]
    JobFailed(String, String),

    /// Job was cancelled
    #[error("Job '{0}' was cancelled")]
    JobCancelled(String),

    /// Job did not finish in time
    #[error("Job '{0}' timed out after {1} seconds")]
    JobTimeout(String, u64),

    /// Results requested before the job completed
    #[error("Job '{0}' is not completed")]
    JobNotCompleted(String),

    // ==========================================================================
    // Circuit Errors
    // ==========================================================================
    /// Gate without an OpenQASM mapping on the target
    #[error("Unsupported gate: {0}")]
    UnsupportedGate(String),

    /// Circuit rejected before submission
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(String),

    /// Circuit wider than the selected device
    #[error("Qubit count mismatch: circuit has {circuit} qubits, backend supports {backend}")]
    QubitCountMismatch { circuit: usize, backend: usize },

    // ==========================================================================
    // Other Errors
    // ==========================================================================
    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error raised by the pipeline itself
    #[error(transparent)]
    Core(#[from] ZneError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl IBMError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            IBMError::HttpError(_)
            | IBMError::RateLimitExceeded(_)
            | IBMError::BackendUnavailable(_, _)
            | IBMError::JobTimeout(_, _) => true,
            IBMError::ApiError { code, .. } => *code >= 500,
            IBMError::Core(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Get suggested retry delay in seconds
    pub fn retry_delay(&self) -> Option<u64> {
        match self {
            IBMError::RateLimitExceeded(delay) => Some(*delay),
            IBMError::HttpError(_) => Some(10),
            IBMError::BackendUnavailable(_, _) => Some(60),
            IBMError::Core(inner) => inner.retry_delay().map(|d| d.as_secs()),
            _ => None,
        }
    }

    /// Convert into a pipeline error attributed to `backend`
    pub fn into_zne(self, backend: &str) -> ZneError {
        match self {
            IBMError::Core(inner) => inner,
            IBMError::UnsupportedGate(gate) => ZneError::UnsupportedGate(gate),
            IBMError::InvalidCircuit(message) => ZneError::InvalidCircuit(message),
            other => ZneError::Execution {
                backend: backend.to_string(),
                message: other.to_string(),
                retryable: other.is_retryable(),
                retry_after: other.retry_delay().map(Duration::from_secs),
            },
        }
    }
}

impl From<IBMError> for ZneError {
    fn from(err: IBMError) -> Self {
        err.into_zne("ibm_quantum")
    }
}
