//! # ZNE-IBM: IBM Quantum Backend for the ZNE Pipeline
//!
//! Runs zne-core sweeps on IBM Quantum hardware through the REST API.
//!
//! ## Features
//!
//! - **Credentials**: environment, `.env` or Qiskit config file
//! - **Backend Selection**: named device or least busy operational device
//! - **OpenQASM 3.0**: emission with explicit measurements
//! - **Job Management**: submit, poll, fetch counts, cancel
//! - **Executor**: [`IbmExecutor`] plugs into [`zne_core::SweepDriver`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use zne_core::{CircuitBuilder, CsvReport, SweepConfig, SweepDriver};
//! use zne_ibm::IbmExecutor;
//!
//! let executor = IbmExecutor::connect(Some("ibm_kyiv"), 3).await?;
//! let circuit = CircuitBuilder::zne_benchmark(3)?;
//! let report = SweepDriver::new(&executor, SweepConfig::default())
//!     .run(&circuit)
//!     .await?;
//! report.write_csv("zne_results.csv")?;
//! ```

pub mod backend;
pub mod cli;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod qasm;

// Re-exports
pub use backend::{BackendInfo, BackendStatus, IBMBackend, DEFAULT_DEVICE};
pub use credentials::{Credentials, CredentialsManager};
pub use error::{IBMError, Result};
pub use executor::IbmExecutor;
pub use jobs::{Job, JobManager, JobResult, JobStatus};
pub use qasm::{GateMapper, QASMBuilder, QASMTranspiler};

/// IBM Quantum API base URL
pub const IBM_QUANTUM_API_URL: &str = "https://api.quantum.ibm.com/runtime";

/// HTTP request timeout (seconds)
pub const REQUEST_TIMEOUT: u64 = 30;

/// Maximum wait time for job completion (seconds)
pub const MAX_WAIT_TIME: u64 = 3600;

/// Poll interval for job status (seconds)
pub const POLL_INTERVAL: u64 = 5;
