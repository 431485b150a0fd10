//! IBM Quantum job management
//!
//! Submit an OpenQASM program, poll until the job reaches a terminal state,
//! then fetch the counts as a [`Histogram`].

use crate::backend::{check_status, IBMBackend};
use crate::error::{IBMError, Result};
use crate::{MAX_WAIT_TIME, POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use zne_core::Histogram;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl JobStatus {
    /// Parse the API's status string, ignoring case
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "QUEUED" | "INITIALIZING" | "VALIDATING" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "COMPLETED" | "DONE" => JobStatus::Completed,
            "FAILED" | "ERROR" => JobStatus::Failed,
            "CANCELLED" | "CANCELED" => JobStatus::Cancelled,
            _ => JobStatus::Unknown,
        }
    }

    /// Check if job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}

/// Counts returned by a finished job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    /// Outcome → count; keys are bitstrings or hex (`0x5`) memory slots
    pub counts: BTreeMap<String, u64>,

    pub shots: u64,

    #[serde(default)]
    pub backend: String,

    #[serde(default)]
    pub job_id: String,
}

impl JobResult {
    /// Convert counts to a histogram of `width`-bit strings (bit 0 rightmost)
    ///
    /// Hex keys are expanded and bitstrings have register separators
    /// removed, so both result formats land on the same keys.
    pub fn to_histogram(&self, width: usize) -> Result<Histogram> {
        let mut histogram = Histogram::new();
        for (key, &count) in &self.counts {
            histogram.record(normalize_outcome(key, width)?, count);
        }
        Ok(histogram)
    }
}

fn normalize_outcome(key: &str, width: usize) -> Result<String> {
    if let Some(hex) = key.strip_prefix("0x") {
        let value = u128::from_str_radix(hex, 16)
            .map_err(|_| IBMError::InvalidResponse(format!("bad outcome key '{}'", key)))?;
        if width < 128 && value >> width != 0 {
            return Err(IBMError::InvalidResponse(format!(
                "outcome '{}' does not fit in {} bits",
                key, width
            )));
        }
        return Ok(format!("{:0width$b}", value, width = width));
    }

    let bits: String = key.chars().filter(|c| !c.is_whitespace()).collect();
    if bits.is_empty() || !bits.chars().all(|c| c == '0' || c == '1') {
        return Err(IBMError::InvalidResponse(format!("bad outcome key '{}'", key)));
    }
    Ok(bits)
}

/// Handle of a submitted job
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub backend: String,
    pub status: JobStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub shots: u32,
}

impl Job {
    pub fn new(id: String, backend: String, shots: u32) -> Self {
        Self {
            id,
            backend,
            status: JobStatus::Queued,
            created_at: chrono::Utc::now(),
            shots,
        }
    }

    /// Seconds since submission
    pub fn elapsed_secs(&self) -> i64 {
        (chrono::Utc::now() - self.created_at).num_seconds()
    }
}

#[derive(Debug, Serialize)]
struct JobSubmitRequest<'a> {
    program_id: &'a str,
    backend: &'a str,
    params: JobParams<'a>,
}

#[derive(Debug, Serialize)]
struct JobParams<'a> {
    circuits: [&'a str; 1],
    shots: u32,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    state: Option<JobState>,
}

#[derive(Debug, Deserialize)]
struct JobState {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

impl JobStatusResponse {
    fn status(&self) -> JobStatus {
        self.state
            .as_ref()
            .map(|s| s.status.as_str())
            .or(self.status.as_deref())
            .map(JobStatus::parse)
            .unwrap_or(JobStatus::Unknown)
    }

    fn reason(&self) -> Option<&str> {
        self.state.as_ref().and_then(|s| s.reason.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct JobResultResponse {
    #[serde(default)]
    results: Vec<CircuitResult>,
}

#[derive(Debug, Deserialize)]
struct CircuitResult {
    #[serde(default)]
    data: ResultData,
    #[serde(default)]
    shots: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ResultData {
    #[serde(default)]
    counts: BTreeMap<String, u64>,
}

/// Job manager for submitting and monitoring jobs
pub struct JobManager;

impl JobManager {
    /// Submit a program to the selected device
    pub async fn submit(backend: &IBMBackend, qasm: &str, shots: u32) -> Result<Job> {
        let backend_name = backend
            .selected_backend()
            .ok_or(IBMError::NoBackendSelected)?;

        let request = JobSubmitRequest {
            program_id: "sampler",
            backend: backend_name,
            params: JobParams {
                circuits: [qasm],
                shots,
            },
        };

        let response = backend
            .authorize(backend.client().post(backend.url("jobs")))
            .json(&request)
            .send()
            .await?;

        let response = match check_status(response).await {
            Ok(response) => response,
            Err(IBMError::ApiError { code, message }) if code < 500 => {
                return Err(IBMError::JobSubmissionFailed(format!("HTTP {}: {}", code, message)))
            }
            Err(other) => return Err(other),
        };

        let status: JobStatusResponse = response.json().await?;
        tracing::info!(job_id = %status.id, backend = backend_name, shots, "job submitted");

        Ok(Job::new(status.id, backend_name.to_string(), shots))
    }

    /// Current status of a job
    pub async fn get_status(backend: &IBMBackend, job_id: &str) -> Result<JobStatus> {
        Ok(Self::fetch_status(backend, job_id).await?.status())
    }

    async fn fetch_status(backend: &IBMBackend, job_id: &str) -> Result<JobStatusResponse> {
        let response = backend
            .authorize(backend.client().get(backend.url(&format!("jobs/{}", job_id))))
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Err(IBMError::JobNotFound(job_id.to_string()));
        }

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Poll until the job completes, fails, is cancelled or times out
    pub async fn wait_for_completion(
        backend: &IBMBackend,
        job: &mut Job,
        timeout_secs: Option<u64>,
    ) -> Result<()> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(MAX_WAIT_TIME));
        let start = Instant::now();

        loop {
            if start.elapsed() > timeout {
                return Err(IBMError::JobTimeout(job.id.clone(), timeout.as_secs()));
            }

            let response = Self::fetch_status(backend, &job.id).await?;
            let status = response.status();
            if status != job.status {
                tracing::debug!(job_id = %job.id, ?status, elapsed = job.elapsed_secs(), "job status changed");
            }
            job.status = status;

            match status {
                JobStatus::Completed => return Ok(()),
                JobStatus::Failed => {
                    return Err(IBMError::JobFailed(
                        job.id.clone(),
                        response.reason().unwrap_or("job execution failed").to_string(),
                    ))
                }
                JobStatus::Cancelled => return Err(IBMError::JobCancelled(job.id.clone())),
                _ => sleep(Duration::from_secs(POLL_INTERVAL)).await,
            }
        }
    }

    /// Fetch the counts of a completed job
    pub async fn get_result(backend: &IBMBackend, job: &Job) -> Result<JobResult> {
        if job.status != JobStatus::Completed {
            return Err(IBMError::JobNotCompleted(job.id.clone()));
        }

        let url = backend.url(&format!("jobs/{}/results", job.id));
        let response = backend.authorize(backend.client().get(url)).send().await?;
        let response = check_status(response).await?;

        let body: JobResultResponse = response.json().await?;
        let circuit_result = body
            .results
            .into_iter()
            .next()
            .ok_or_else(|| IBMError::InvalidResponse("No results in response".into()))?;

        Ok(JobResult {
            shots: circuit_result
                .shots
                .unwrap_or_else(|| circuit_result.data.counts.values().sum()),
            counts: circuit_result.data.counts,
            backend: job.backend.clone(),
            job_id: job.id.clone(),
        })
    }

    /// Submit, wait, and fetch the result
    pub async fn run(
        backend: &IBMBackend,
        qasm: &str,
        shots: u32,
        timeout_secs: Option<u64>,
    ) -> Result<JobResult> {
        let mut job = Self::submit(backend, qasm, shots).await?;

        if let Err(err) = Self::wait_for_completion(backend, &mut job, timeout_secs).await {
            if matches!(err, IBMError::JobTimeout(..)) {
                // Free the queue slot before the caller retries
                if let Err(cancel_err) = Self::cancel(backend, &job.id).await {
                    tracing::warn!(job_id = %job.id, error = %cancel_err, "failed to cancel timed out job");
                }
            }
            return Err(err);
        }

        Self::get_result(backend, &job).await
    }

    /// Cancel a job
    pub async fn cancel(backend: &IBMBackend, job_id: &str) -> Result<()> {
        let url = backend.url(&format!("jobs/{}/cancel", job_id));
        let response = backend.authorize(backend.client().post(url)).send().await?;
        check_status(response).await?;
        tracing::info!(job_id, "job cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_job_status_parse() {
        assert_eq!(JobStatus::parse("Completed"), JobStatus::Completed);
        assert_eq!(JobStatus::parse("DONE"), JobStatus::Completed);
        assert_eq!(JobStatus::parse("queued"), JobStatus::Queued);
        assert_eq!(JobStatus::parse("Cancelled - Ran too long"), JobStatus::Unknown);
        assert_eq!(JobStatus::parse("Canceled"), JobStatus::Cancelled);
    }

    #[test]
    fn test_status_response_prefers_state() {
        let json = r#"{"id": "abc", "status": "Queued", "state": {"status": "Failed", "reason": "calibration"}}"#;
        let response: JobStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status(), JobStatus::Failed);
        assert_eq!(response.reason(), Some("calibration"));

        let response: JobStatusResponse = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(response.status(), JobStatus::Unknown);
    }

    #[test]
    fn test_to_histogram_bitstrings() {
        let mut result = JobResult::default();
        result.counts.insert("000".into(), 3000);
        result.counts.insert("111".into(), 1000);
        result.shots = 4000;

        let histogram = result.to_histogram(3).unwrap();
        assert_eq!(histogram.count("000"), 3000);
        assert_eq!(histogram.count("111"), 1000);
        assert_eq!(histogram.shots(), 4000);
    }

    #[test]
    fn test_to_histogram_hex_keys() {
        let mut result = JobResult::default();
        result.counts.insert("0x0".into(), 10);
        result.counts.insert("0x5".into(), 4);
        result.counts.insert("0x7".into(), 6);

        let histogram = result.to_histogram(3).unwrap();
        assert_eq!(histogram.count("000"), 10);
        assert_eq!(histogram.count("101"), 4);
        assert_eq!(histogram.count("111"), 6);
    }

    #[test]
    fn test_to_histogram_rejects_bad_keys() {
        let mut result = JobResult::default();
        result.counts.insert("0x8".into(), 1);
        assert!(result.to_histogram(3).is_err());

        let mut result = JobResult::default();
        result.counts.insert("01x".into(), 1);
        assert!(result.to_histogram(3).is_err());
    }

    #[test]
    fn test_register_separators_removed() {
        let mut result = JobResult::default();
        result.counts.insert("01 1".into(), 2);
        assert_eq!(result.to_histogram(3).unwrap().count("011"), 2);
    }

    #[test]
    fn test_job_new() {
        let job = Job::new("test_id".to_string(), "ibm_kyiv".to_string(), 4000);
        assert_eq!(job.id, "test_id");
        assert_eq!(job.backend, "ibm_kyiv");
        assert_eq!(job.shots, 4000);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.elapsed_secs() >= 0);
    }

    #[test]
    fn test_submit_request_shape() {
        let request = JobSubmitRequest {
            program_id: "sampler",
            backend: "ibm_kyiv",
            params: JobParams {
                circuits: ["OPENQASM 3.0;"],
                shots: 4000,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["backend"], "ibm_kyiv");
        assert_eq!(value["params"]["shots"], 4000);
        assert_eq!(value["params"]["circuits"][0], "OPENQASM 3.0;");
    }
}
