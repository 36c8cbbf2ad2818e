//! Job lifecycle.
//!
//! ```text
//!   Initializing ──submit()──→ Queued ──→ Running ──→ Done
//!        │                       │           │
//!        └──→ Validating ────────┘           ├──→ Error
//!                                            └──→ Cancelled
//! ```
//!
//! **Invariants:**
//! - `submit()` is accepted once, from `Initializing` only.
//! - Transitions are monotonic. A remote status ranked below the current one
//!   is ignored.
//! - Terminal states (`Done`, `Error`, `Cancelled`) are permanent and served
//!   from the local cache without further requests.
//! - `result()`, `download_url()` and `logfile()` resolve once, after a
//!   terminal state, and are cached.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tergite_compile::PulseQobj;
use tergite_compile::qobj::ExperimentHeader;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, CreatedJobResponse, JobFile, RemoteJob};
use crate::error::{HalError, HalResult};
use crate::logfile::RecoveredJob;
use crate::result::{ExperimentResult, JobResult};

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Created locally, not submitted yet.
    Initializing,
    /// Checked by the service before queuing.
    Validating,
    /// Waiting for execution.
    Queued,
    /// Executing.
    Running,
    /// Finished with results.
    Done,
    /// Cancelled.
    Cancelled,
    /// Failed.
    Error,
}

impl JobStatus {
    /// Position in the lifecycle. Terminal states share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Initializing => 0,
            JobStatus::Validating => 1,
            JobStatus::Queued => 2,
            JobStatus::Running => 3,
            JobStatus::Done | JobStatus::Cancelled | JobStatus::Error => 4,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Cancelled | JobStatus::Error
        )
    }

    /// Check if the job is still waiting or running.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            JobStatus::Validating | JobStatus::Queued | JobStatus::Running
        )
    }

    /// Check if the job completed successfully.
    pub fn is_success(self) -> bool {
        self == JobStatus::Done
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Initializing => "INITIALIZING",
            JobStatus::Validating => "VALIDATING",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Service status vocabulary mapped onto [`JobStatus`].
pub const STATUS_MAP: &[(&str, JobStatus)] = &[
    ("initializing", JobStatus::Initializing),
    ("registering", JobStatus::Queued),
    ("pending", JobStatus::Queued),
    ("validating", JobStatus::Validating),
    ("executing", JobStatus::Running),
    ("running", JobStatus::Running),
    ("successful", JobStatus::Done),
    ("done", JobStatus::Done),
    ("cancelled", JobStatus::Cancelled),
    ("failed", JobStatus::Error),
    ("error", JobStatus::Error),
];

/// Map a service status, case-insensitively.
pub fn map_remote_status(status: &str) -> Option<JobStatus> {
    STATUS_MAP
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(status))
        .map(|&(_, status)| status)
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    remote: Option<RemoteJob>,
    download_url: Option<String>,
    logfile: Option<PathBuf>,
    result: Option<JobResult>,
    submitted_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    fn new(status: JobStatus) -> Self {
        Self {
            status,
            remote: None,
            download_url: None,
            logfile: None,
            result: None,
            submitted_at: None,
            finished_at: None,
        }
    }

    fn apply_remote(&mut self, job_id: &str, remote: RemoteJob) {
        if self.status.is_terminal() {
            debug!(job_id, status = %self.status, "terminal, keeping status");
            self.remote = Some(remote);
            return;
        }
        match remote.status.as_deref() {
            None => {}
            Some(reported) => match map_remote_status(reported) {
                None => warn!(job_id, status = reported, "unknown remote status, keeping {}", self.status),
                Some(next) if next.rank() < self.status.rank() => {
                    debug!(job_id, current = %self.status, reported = %next, "ignoring regressed status");
                }
                Some(next) => {
                    if next != self.status {
                        debug!(job_id, from = %self.status, to = %next, "status changed");
                    }
                    self.status = next;
                    if next.is_terminal() && self.finished_at.is_none() {
                        self.finished_at = Some(Utc::now());
                    }
                }
            },
        }
        self.remote = Some(remote);
    }
}

/// A job on a Tergite backend.
#[derive(Debug)]
pub struct Job {
    job_id: String,
    backend_name: String,
    backend_version: String,
    api: ApiClient,
    upload_url: Option<String>,
    payload: Option<PulseQobj>,
    metadata: Map<String, Value>,
    calibration_date: Option<String>,
    logfile_dir: PathBuf,
    state: Mutex<JobState>,
}

impl Job {
    /// A freshly registered job carrying the payload it will upload.
    pub fn new(
        created: CreatedJobResponse,
        backend_name: impl Into<String>,
        backend_version: impl Into<String>,
        api: ApiClient,
        payload: PulseQobj,
        calibration_date: Option<String>,
    ) -> Self {
        Self {
            job_id: created.job_id,
            backend_name: backend_name.into(),
            backend_version: backend_version.into(),
            api,
            upload_url: Some(created.upload_url),
            payload: Some(payload),
            metadata: Map::new(),
            calibration_date,
            logfile_dir: std::env::temp_dir(),
            state: Mutex::new(JobState::new(JobStatus::Initializing)),
        }
    }

    /// A handle to an existing job, rebuilt from its remote record.
    ///
    /// The handle has no upload URL, so it can be neither submitted nor
    /// cancelled. It has no payload either until one is recovered with
    /// [`with_recovered`](Self::with_recovered).
    pub fn from_remote(
        remote: RemoteJob,
        backend_name: impl Into<String>,
        backend_version: impl Into<String>,
        api: ApiClient,
    ) -> Self {
        let job_id = remote.job_id.clone();
        let calibration_date = remote.calibration_date.clone();
        let mut state = JobState::new(JobStatus::Queued);
        state.apply_remote(&job_id, remote);
        Self {
            job_id,
            backend_name: backend_name.into(),
            backend_version: backend_version.into(),
            api,
            upload_url: None,
            payload: None,
            metadata: Map::new(),
            calibration_date,
            logfile_dir: std::env::temp_dir(),
            state: Mutex::new(state),
        }
    }

    /// Directory logfiles are downloaded to. Defaults to the system temp dir.
    pub fn with_logfile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logfile_dir = dir.into();
        self
    }

    /// Attach the payload and metadata read back from the job's logfile.
    pub fn with_recovered(mut self, recovered: RecoveredJob) -> Self {
        self.payload = Some(recovered.payload);
        self.metadata = recovered.metadata;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url.as_deref()
    }

    /// Calibration snapshot the payload was compiled against.
    pub fn calibration_date(&self) -> Option<&str> {
        self.calibration_date.as_deref()
    }

    /// The payload, for jobs created by this process.
    pub fn payload(&self) -> Option<&PulseQobj> {
        self.payload.as_ref()
    }

    /// Run metadata recovered from the logfile. Empty for jobs created by
    /// this process.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub async fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.submitted_at
    }

    pub async fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.finished_at
    }

    async fn refresh(&self, state: &mut JobState) -> HalResult<()> {
        let remote = self.api.get_remote_job(&self.job_id).await?;
        state.apply_remote(&self.job_id, remote);
        Ok(())
    }

    async fn ensure_status(&self, state: &mut JobState) -> HalResult<JobStatus> {
        if state.status.is_terminal() {
            debug!(job_id = %self.job_id, status = %state.status, "status from cache");
        } else if state.status != JobStatus::Initializing {
            self.refresh(state).await?;
        }
        Ok(state.status)
    }

    /// Current status. Queries the service until a terminal state is seen.
    pub async fn status(&self) -> HalResult<JobStatus> {
        let mut state = self.state.lock().await;
        self.ensure_status(&mut state).await
    }

    /// The remote job record, refreshed unless the job is terminal.
    pub async fn remote_data(&self) -> HalResult<RemoteJob> {
        let mut state = self.state.lock().await;
        if !state.status.is_terminal() || state.remote.is_none() {
            self.refresh(&mut state).await?;
        }
        state
            .remote
            .clone()
            .ok_or_else(|| HalError::InvalidState(format!("no record for job '{}'", self.job_id)))
    }

    /// Upload the payload to the job's upload URL.
    ///
    /// Allowed once, while the job is still initializing. Misuse is rejected
    /// before any request is made.
    pub async fn submit(&self) -> HalResult<()> {
        let mut state = self.state.lock().await;
        if state.status != JobStatus::Initializing {
            return Err(HalError::InvalidState(
                "This job was already submitted".into(),
            ));
        }
        let Some(upload_url) = self.upload_url.as_deref() else {
            return Err(HalError::InvalidState(
                "This job is not submittable. It lacks an upload_url".into(),
            ));
        };
        let Some(payload) = self.payload.as_ref() else {
            return Err(HalError::InvalidState(
                "This job is not submittable. It has no payload".into(),
            ));
        };

        let job_file = JobFile::new(&self.job_id, payload)?;
        self.api.send_job_file(upload_url, &job_file).await?;

        state.status = JobStatus::Queued;
        state.submitted_at = Some(Utc::now());
        info!(job_id = %self.job_id, backend = %self.backend_name, "job submitted");
        Ok(())
    }

    /// Ask the service to cancel the job. Not retried.
    pub async fn cancel(&self) -> HalResult<()> {
        let Some(upload_url) = self.upload_url.as_deref() else {
            return Err(HalError::InvalidState(
                "This job is not cancellable. It lacks an upload_url".into(),
            ));
        };
        self.api.cancel_job(upload_url, &self.job_id).await
    }

    /// Where the job's logfile can be fetched, once the job is terminal.
    pub async fn download_url(&self) -> HalResult<Option<String>> {
        let mut state = self.state.lock().await;
        self.resolve_download_url(&mut state).await
    }

    async fn resolve_download_url(&self, state: &mut JobState) -> HalResult<Option<String>> {
        if state.download_url.is_some() {
            return Ok(state.download_url.clone());
        }
        if !self.ensure_status(state).await?.is_terminal() {
            return Ok(None);
        }
        state.download_url = state
            .remote
            .as_ref()
            .and_then(|r| r.download_url.clone());
        Ok(state.download_url.clone())
    }

    /// Download the logfile to `{logfile_dir}/{job_id}.hdf5`, once the job
    /// is terminal and the service has published it.
    pub async fn logfile(&self) -> HalResult<Option<PathBuf>> {
        let mut state = self.state.lock().await;
        if state.logfile.is_some() {
            return Ok(state.logfile.clone());
        }
        let Some(url) = self.resolve_download_url(&mut state).await? else {
            return Ok(None);
        };
        let path = self
            .api
            .download_job_logfile(&self.job_id, &url, &self.logfile_dir)
            .await?;
        state.logfile = Some(path);
        Ok(state.logfile.clone())
    }

    /// The job's result, or `None` while the job is still running.
    pub async fn result(&self) -> HalResult<Option<JobResult>> {
        let mut state = self.state.lock().await;
        if let Some(result) = &state.result {
            return Ok(Some(result.clone()));
        }
        let status = self.ensure_status(&mut state).await?;
        if !status.is_terminal() {
            info!(job_id = %self.job_id, %status, "job has not finished, no result yet");
            return Ok(None);
        }
        if state.remote.is_none() {
            self.refresh(&mut state).await?;
        }

        let remote = state.remote.as_ref();
        let memory = remote.map(RemoteJob::memory).unwrap_or_default();
        if memory.is_empty() {
            let reason = |r: Option<&String>| {
                r.cloned()
                    .unwrap_or_else(|| format!("job '{}'", self.job_id))
            };
            match status {
                JobStatus::Error => {
                    return Err(HalError::JobFailed(reason(
                        remote.and_then(|r| r.failure_reason.as_ref()),
                    )));
                }
                JobStatus::Cancelled => {
                    return Err(HalError::JobCancelled(reason(
                        remote.and_then(|r| r.cancellation_reason.as_ref()),
                    )));
                }
                _ => {}
            }
        }

        let result = self.build_result(status, memory);
        state.result = Some(result.clone());
        Ok(Some(result))
    }

    fn build_result(&self, status: JobStatus, memory: &[Vec<String>]) -> JobResult {
        if let Some(payload) = &self.payload {
            if payload.num_experiments() != memory.len() {
                warn!(
                    job_id = %self.job_id,
                    submitted = payload.num_experiments(),
                    returned = memory.len(),
                    "experiment count mismatch, building result from returned memory"
                );
            }
        }

        let success = status.is_success();
        let results = memory
            .iter()
            .enumerate()
            .map(|(idx, shots)| {
                let header = self
                    .payload
                    .as_ref()
                    .and_then(|p| p.experiments.get(idx))
                    .map_or_else(
                        || ExperimentHeader {
                            name: format!("experiment_{idx}"),
                            memory_slots: 0,
                        },
                        |e| e.header.clone(),
                    );
                let requested = self.payload.as_ref().map_or_else(
                    || u32::try_from(shots.len()).unwrap_or(u32::MAX),
                    |p| p.config.shots,
                );
                ExperimentResult::from_memory(header, requested, success, shots.clone())
            })
            .collect();

        JobResult {
            backend_name: self.backend_name.clone(),
            backend_version: self.backend_version.clone(),
            qobj_id: self.payload.as_ref().map(|p| p.qobj_id.clone()),
            job_id: self.job_id.clone(),
            success,
            results,
        }
    }

    /// Poll until the job is terminal.
    ///
    /// Returns [`HalError::Timeout`] once `timeout` has elapsed.
    pub async fn wait_for_final_state(
        &self,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> HalResult<JobStatus> {
        let start = tokio::time::Instant::now();
        loop {
            let status = self.status().await?;
            if status.is_terminal() {
                return Ok(status);
            }
            if status == JobStatus::Initializing {
                return Err(HalError::InvalidState(
                    "This job has not been submitted".into(),
                ));
            }
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                return Err(HalError::Timeout(self.job_id.clone()));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_map_case_insensitive() {
        assert_eq!(map_remote_status("successful"), Some(JobStatus::Done));
        assert_eq!(map_remote_status("SUCCESSFUL"), Some(JobStatus::Done));
        assert_eq!(map_remote_status("pending"), Some(JobStatus::Queued));
        assert_eq!(map_remote_status("executing"), Some(JobStatus::Running));
        assert_eq!(map_remote_status("failed"), Some(JobStatus::Error));
        assert_eq!(map_remote_status("teleported"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(JobStatus::Running.is_pending());
        assert!(!JobStatus::Initializing.is_pending());
        assert!(JobStatus::Done.is_success());
        assert!(!JobStatus::Cancelled.is_success());
    }

    fn remote(status: &str) -> RemoteJob {
        serde_json::from_value(serde_json::json!({"job_id": "j1", "status": status})).unwrap()
    }

    #[test]
    fn test_apply_remote_is_monotonic() {
        let mut state = JobState::new(JobStatus::Queued);
        state.apply_remote("j1", remote("executing"));
        assert_eq!(state.status, JobStatus::Running);

        state.apply_remote("j1", remote("pending"));
        assert_eq!(state.status, JobStatus::Running);

        state.apply_remote("j1", remote("warming-up"));
        assert_eq!(state.status, JobStatus::Running);

        state.apply_remote("j1", remote("successful"));
        assert_eq!(state.status, JobStatus::Done);
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut state = JobState::new(JobStatus::Queued);
        state.apply_remote("j1", remote("successful"));
        let finished = state.finished_at;

        // Same rank as Done, still rejected.
        state.apply_remote("j1", remote("failed"));
        assert_eq!(state.status, JobStatus::Done);
        state.apply_remote("j1", remote("cancelled"));
        assert_eq!(state.status, JobStatus::Done);
        assert_eq!(state.finished_at, finished);
        assert_eq!(state.remote.as_ref().unwrap().status.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_display() {
        assert_eq!(JobStatus::Done.to_string(), "DONE");
        assert_eq!(JobStatus::Initializing.to_string(), "INITIALIZING");
    }
}
