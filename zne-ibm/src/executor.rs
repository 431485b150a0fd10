//! Hardware [`Executor`] backed by IBM Quantum

use crate::backend::{IBMBackend, DEFAULT_DEVICE};
use crate::credentials::CredentialsManager;
use crate::error::{IBMError, Result};
use crate::jobs::JobManager;
use crate::qasm::QASMTranspiler;
use crate::MAX_WAIT_TIME;
use async_trait::async_trait;
use zne_core::{lower_to_native, Circuit, Executor, Histogram, NoiseModel};

/// Runs circuits on the selected IBM Quantum device
pub struct IbmExecutor {
    backend: IBMBackend,
    name: String,
    timeout_secs: u64,
}

impl IbmExecutor {
    /// Wrap a backend that already has a device selected
    pub fn new(backend: IBMBackend) -> Result<Self> {
        let name = backend
            .selected_backend()
            .ok_or(IBMError::NoBackendSelected)?
            .to_string();

        if let Some(info) = backend.backend_info() {
            let missing = info.missing_native_gates();
            if !missing.is_empty() {
                tracing::warn!(backend = %name, ?missing, "device does not list every native gate");
            }
        }

        Ok(Self {
            backend,
            name,
            timeout_secs: MAX_WAIT_TIME,
        })
    }

    /// Load credentials and select `device`, or the least busy device that
    /// fits `n_qubits` when `device` is `None`
    pub async fn connect(device: Option<&str>, n_qubits: usize) -> Result<Self> {
        let credentials = CredentialsManager::load()?;
        let mut backend = IBMBackend::new(credentials)?;

        match device {
            Some(name) => {
                backend.select(name).await?;
            }
            None => {
                let selected = backend.select_optimal(n_qubits).await.map(|_| ());
                if let Err(err) = selected {
                    tracing::warn!(error = %err, fallback = DEFAULT_DEVICE, "least busy selection failed");
                    backend.select(DEFAULT_DEVICE).await?;
                }
            }
        }

        Self::new(backend)
    }

    /// Per-job completion timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    async fn run(&self, circuit: &Circuit, shots: u32) -> Result<Histogram> {
        if let Some(info) = self.backend.backend_info() {
            if circuit.num_qubits() > info.n_qubits {
                return Err(IBMError::QubitCountMismatch {
                    circuit: circuit.num_qubits(),
                    backend: info.n_qubits,
                });
            }
            if info.max_shots > 0 && shots > info.max_shots {
                return Err(IBMError::JobSubmissionFailed(format!(
                    "{} shots exceeds the device limit of {}",
                    shots, info.max_shots
                )));
            }
        }

        let native = lower_to_native(circuit)?;
        let qasm = QASMTranspiler::transpile(&native)?;
        tracing::debug!(backend = %self.name, gates = native.gate_count(), depth = native.depth(), "submitting circuit");

        let result = JobManager::run(&self.backend, &qasm, shots, Some(self.timeout_secs)).await?;

        let width = if native.measurement_count() == 0 {
            native.num_qubits()
        } else {
            native.num_clbits()
        };
        result.to_histogram(width)
    }
}

#[async_trait]
impl Executor for IbmExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn transpile(&self, circuit: &Circuit) -> zne_core::Result<Circuit> {
        lower_to_native(circuit)
    }

    fn max_qubits(&self) -> Option<usize> {
        self.backend.backend_info().map(|info| info.n_qubits)
    }

    async fn execute(
        &self,
        circuit: &Circuit,
        shots: u32,
        noise: Option<&NoiseModel>,
    ) -> zne_core::Result<Histogram> {
        if let Some(model) = noise {
            tracing::warn!(
                backend = %self.name,
                scale = model.scale_factor(),
                "noise model ignored on hardware"
            );
        }

        self.run(circuit, shots)
            .await
            .map_err(|err| err.into_zne(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendInfo, BackendStatus};
    use crate::credentials::Credentials;

    fn offline_backend(n_qubits: usize) -> IBMBackend {
        let mut backend = IBMBackend::new(Credentials::new("a".repeat(64)))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        backend.set_backend(BackendInfo {
            name: "ibm_kyiv".into(),
            n_qubits,
            status: BackendStatus::Online,
            max_shots: 10_000,
            ..BackendInfo::default()
        });
        backend
    }

    #[test]
    fn test_requires_selected_backend() {
        let backend = IBMBackend::new(Credentials::new("a".repeat(64))).unwrap();
        assert!(matches!(
            IbmExecutor::new(backend),
            Err(IBMError::NoBackendSelected)
        ));
    }

    #[test]
    fn test_name_and_transpile() {
        let executor = IbmExecutor::new(offline_backend(127)).unwrap();
        assert_eq!(executor.name(), "ibm_kyiv");
        assert_eq!(executor.max_qubits(), Some(127));

        let circuit = zne_core::CircuitBuilder::zne_benchmark(3).unwrap();
        let lowered = executor.transpile(&circuit).unwrap();
        assert!(lowered
            .operations()
            .iter()
            .all(|op| op.is_measurement() || zne_core::NATIVE_GATES.contains(&op.name())));
    }

    #[tokio::test]
    async fn test_rejects_wide_circuit_before_submission() {
        let executor = IbmExecutor::new(offline_backend(2)).unwrap();
        let circuit = zne_core::CircuitBuilder::zne_benchmark(3).unwrap();

        let err = executor.execute(&circuit, 100, None).await.unwrap_err();
        match err {
            zne_core::ZneError::Execution {
                backend, retryable, ..
            } => {
                assert_eq!(backend, "ibm_kyiv");
                assert!(!retryable);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_too_many_shots() {
        let executor = IbmExecutor::new(offline_backend(127)).unwrap();
        let circuit = zne_core::CircuitBuilder::zne_benchmark(3).unwrap();

        let err = executor.execute(&circuit, 20_000, None).await.unwrap_err();
        assert!(err.to_string().contains("device limit"));
    }
}
