//! IBM Quantum device selection
//!
//! Lists the devices visible to the account and picks either a named
//! device or the least busy operational one that fits the circuit.

use crate::credentials::Credentials;
use crate::error::{IBMError, Result};
use crate::{IBM_QUANTUM_API_URL, REQUEST_TIMEOUT};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Device used by the hardware runs when no name is given
pub const DEFAULT_DEVICE: &str = "ibm_kyiv";

/// Backend status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Online,
    Offline,
    Paused,
    #[default]
    Unknown,
}

impl BackendStatus {
    fn parse(status: Option<&str>) -> Self {
        match status.map(str::to_ascii_lowercase).as_deref() {
            Some("online") | Some("active") => BackendStatus::Online,
            Some("offline") => BackendStatus::Offline,
            Some("paused") => BackendStatus::Paused,
            _ => BackendStatus::Unknown,
        }
    }
}

/// Device information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,

    pub n_qubits: usize,

    #[serde(default)]
    pub status: BackendStatus,

    /// Jobs waiting in the device queue
    #[serde(default)]
    pub pending_jobs: usize,

    #[serde(default)]
    pub basis_gates: Vec<String>,

    #[serde(default)]
    pub simulator: bool,

    #[serde(default)]
    pub max_shots: u32,
}

impl Default for BackendInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            n_qubits: 0,
            status: BackendStatus::Unknown,
            pending_jobs: 0,
            basis_gates: zne_core::NATIVE_GATES.iter().map(|g| g.to_string()).collect(),
            simulator: false,
            max_shots: 100_000,
        }
    }
}

impl BackendInfo {
    /// Check if the device is online and wide enough
    pub fn can_run(&self, n_qubits: usize) -> bool {
        self.status == BackendStatus::Online && n_qubits <= self.n_qubits
    }

    pub fn supports_gate(&self, gate: &str) -> bool {
        self.basis_gates.iter().any(|g| g == gate)
    }

    /// Basis gates of the lowered circuits this device lacks
    pub fn missing_native_gates(&self) -> Vec<&'static str> {
        zne_core::NATIVE_GATES
            .iter()
            .copied()
            .filter(|g| !self.supports_gate(g))
            .collect()
    }
}

/// Least busy device able to run `n_qubits`, hardware preferred
pub fn least_busy(backends: &[BackendInfo], n_qubits: usize) -> Option<&BackendInfo> {
    let hardware = backends
        .iter()
        .filter(|b| b.can_run(n_qubits) && !b.simulator)
        .min_by_key(|b| b.pending_jobs);

    hardware.or_else(|| {
        backends
            .iter()
            .filter(|b| b.can_run(n_qubits))
            .min_by_key(|b| b.pending_jobs)
    })
}

#[derive(Debug, Deserialize)]
struct BackendResponse {
    #[serde(default)]
    devices: Vec<BackendData>,
    #[serde(default)]
    backends: Vec<BackendData>,
}

#[derive(Debug, Deserialize)]
struct BackendData {
    name: String,
    #[serde(default, alias = "num_qubits")]
    n_qubits: Option<usize>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "queue_length")]
    pending_jobs: Option<usize>,
    #[serde(default)]
    basis_gates: Option<Vec<String>>,
    #[serde(default)]
    simulator: Option<bool>,
    #[serde(default)]
    max_shots: Option<u32>,
}

impl From<BackendData> for BackendInfo {
    fn from(data: BackendData) -> Self {
        let defaults = BackendInfo::default();
        Self {
            name: data.name,
            n_qubits: data.n_qubits.unwrap_or(0),
            status: BackendStatus::parse(data.status.as_deref()),
            pending_jobs: data.pending_jobs.unwrap_or(0),
            basis_gates: data.basis_gates.unwrap_or(defaults.basis_gates),
            simulator: data.simulator.unwrap_or(false),
            max_shots: data.max_shots.unwrap_or(defaults.max_shots),
        }
    }
}

/// Authenticated connection to IBM Quantum with an optional selected device
pub struct IBMBackend {
    client: Client,
    credentials: Credentials,
    base_url: String,
    backend_info: Option<BackendInfo>,
}

impl IBMBackend {
    pub fn new(credentials: Credentials) -> Result<Self> {
        credentials.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT))
            .build()?;

        Ok(Self {
            client,
            credentials,
            base_url: IBM_QUANTUM_API_URL.to_string(),
            backend_info: None,
        })
    }

    /// Point the client at another API endpoint
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Full URL of an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Attach authorization headers to a request
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Authorization", self.credentials.auth_header());
        match self.credentials.instance() {
            Some(instance) => request.header("Service-CRN", instance),
            None => request,
        }
    }

    /// List available devices
    pub async fn list_backends(&self) -> Result<Vec<BackendInfo>> {
        let response = self
            .authorize(self.client.get(self.url("backends")))
            .send()
            .await?;
        let response = check_status(response).await?;

        let data: BackendResponse = response.json().await?;
        let devices = if data.devices.is_empty() {
            data.backends
        } else {
            data.devices
        };
        Ok(devices.into_iter().map(BackendInfo::from).collect())
    }

    /// Information about a specific device
    pub async fn get_backend(&self, name: &str) -> Result<BackendInfo> {
        self.list_backends()
            .await?
            .into_iter()
            .find(|b| b.name == name)
            .ok_or_else(|| IBMError::BackendNotFound(name.to_string()))
    }

    /// Select a device by name
    pub async fn select(&mut self, name: &str) -> Result<&BackendInfo> {
        let info = self.get_backend(name).await?;

        if info.status != BackendStatus::Online {
            return Err(IBMError::BackendUnavailable(
                name.to_string(),
                format!("status {:?}", info.status),
            ));
        }

        tracing::info!(backend = %info.name, pending_jobs = info.pending_jobs, "backend selected");
        Ok(&*self.backend_info.insert(info))
    }

    /// Select the least busy operational device that fits `n_qubits`
    pub async fn select_optimal(&mut self, n_qubits: usize) -> Result<&BackendInfo> {
        let backends = self.list_backends().await?;

        let best = least_busy(&backends, n_qubits).cloned().ok_or_else(|| {
            IBMError::BackendNotFound(format!("no operational backend for {} qubits", n_qubits))
        })?;

        tracing::info!(backend = %best.name, pending_jobs = best.pending_jobs, "least busy backend selected");
        Ok(&*self.backend_info.insert(best))
    }

    /// Use `info` as the selected device without querying the API
    pub fn set_backend(&mut self, info: BackendInfo) {
        self.backend_info = Some(info);
    }

    pub fn selected_backend(&self) -> Option<&str> {
        self.backend_info.as_ref().map(|b| b.name.as_str())
    }

    pub fn backend_info(&self) -> Option<&BackendInfo> {
        self.backend_info.as_ref()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Map non-success responses to errors
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        return Err(IBMError::RateLimitExceeded(retry_after));
    }

    let text = response.text().await.unwrap_or_default();
    Err(IBMError::ApiError {
        code: status.as_u16(),
        message: text,
    })
}
