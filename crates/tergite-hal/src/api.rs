//! Client for the Tergite REST API.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tergite_compile::{DeviceCalibration, PulseQobj, compress_qobj, decompress_qobj};
use tracing::{debug, info};

use crate::error::{HalError, HalResult};
use crate::transport::Transport;

/// Multipart form field carrying the job file.
pub const UPLOAD_FIELD: &str = "upload_file";

/// Paths of the collections the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoutes {
    /// Backend configuration records.
    pub devices: String,
    /// Calibration snapshots, one per device name.
    pub calibrations: String,
    /// Job registration and lookup.
    pub jobs: String,
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self {
            devices: "/devices/".into(),
            calibrations: "/calibrations/".into(),
            jobs: "/jobs/".into(),
        }
    }
}

impl ApiRoutes {
    /// Routes of the v2 generation of the service.
    pub fn v2() -> Self {
        Self {
            devices: "/v2/devices/".into(),
            calibrations: "/v2/calibrations/".into(),
            jobs: "/v2/jobs/".into(),
        }
    }
}

/// Response of job registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedJobResponse {
    /// Id assigned by the service.
    pub job_id: String,
    /// Where the job file must be uploaded.
    pub upload_url: String,
}

/// Shot memory of a finished job, one list of hex strings per experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJobResult {
    #[serde(default)]
    pub memory: Vec<Vec<String>>,
}

/// A job record as stored by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJob {
    pub job_id: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub calibration_date: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Status in the service's vocabulary, e.g. `"successful"`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub result: Option<RemoteJobResult>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RemoteJob {
    /// Shot memory, empty until the job has produced results.
    pub fn memory(&self) -> &[Vec<String>] {
        self.result.as_ref().map_or(&[], |r| r.memory.as_slice())
    }
}

/// Payload wrapper inside a [`JobFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFileParams {
    /// The compressed payload, JSON-encoded as a string.
    pub qobj: String,
}

/// The document uploaded for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    pub job_id: String,
    pub params: JobFileParams,
}

impl JobFile {
    /// Wrap `payload` for upload, compressing its waveforms.
    pub fn new(job_id: impl Into<String>, payload: &PulseQobj) -> HalResult<Self> {
        let mut value = payload.to_value()?;
        compress_qobj(&mut value)?;
        Ok(Self {
            job_id: job_id.into(),
            params: JobFileParams {
                qobj: value.to_string(),
            },
        })
    }

    /// Decode the embedded payload.
    pub fn payload(&self) -> HalResult<PulseQobj> {
        let mut value: Value = serde_json::from_str(&self.params.qobj)?;
        decompress_qobj(&mut value)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// REST client for one service URL.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    routes: ApiRoutes,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("routes", &self.routes)
            .field("transport", &self.transport)
            .finish()
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

impl ApiClient {
    /// Create a client for `base_url`.
    pub fn new(base_url: impl Into<String>, routes: ApiRoutes, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into(),
            routes,
            transport,
        }
    }

    /// Service URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Route table in use.
    pub fn routes(&self) -> &ApiRoutes {
        &self.routes
    }

    /// The underlying transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    fn url(&self, collection: &str, item: &str) -> String {
        join(&join(&self.base_url, collection), item)
    }

    /// All backend configuration records, unparsed.
    ///
    /// Accepts both a bare list and a `{data, skip, limit}` envelope.
    pub async fn get_backend_configs(&self) -> HalResult<Vec<Value>> {
        let url = self.url(&self.routes.devices, "");
        let response = self
            .transport
            .get(&url)
            .await?
            .error_for_status("Error retrieving backends")?;

        match response.json::<Value>()? {
            Value::Array(records) => Ok(records),
            Value::Object(mut envelope) => match envelope.remove("data") {
                Some(Value::Array(records)) => Ok(records),
                _ => Err(HalError::Configuration(
                    "devices response has no 'data' list".into(),
                )),
            },
            other => Err(HalError::Configuration(format!(
                "unexpected devices response: {other}"
            ))),
        }
    }

    /// The latest calibration snapshot of `backend_name`.
    pub async fn get_latest_calibration(&self, backend_name: &str) -> HalResult<DeviceCalibration> {
        let url = self.url(&self.routes.calibrations, backend_name);
        let response = self.transport.get(&url).await?.error_for_status(format!(
            "failed to get device calibrations for '{backend_name}'"
        ))?;
        let calibration: DeviceCalibration = response.json()?;
        debug!(
            backend = backend_name,
            last_calibrated = %calibration.last_calibrated,
            "fetched calibration"
        );
        Ok(calibration)
    }

    /// Register a new job, obtaining its id and upload URL.
    pub async fn register_job(
        &self,
        backend_name: &str,
        calibration_date: Option<&str>,
    ) -> HalResult<CreatedJobResponse> {
        let url = self.url(&self.routes.jobs, "");
        let body = json!({
            "device": backend_name,
            "calibration_date": calibration_date,
        });
        let response = self
            .transport
            .post_json(&url, &body)
            .await?
            .error_for_status("unable to register job at the remote API")?;
        let created: CreatedJobResponse = response.json()?;
        info!(job_id = %created.job_id, backend = backend_name, "registered job");
        Ok(created)
    }

    /// Upload a job file to `upload_url`.
    ///
    /// The file is staged in a temporary file that is removed on every path.
    pub async fn send_job_file(&self, upload_url: &str, job_file: &JobFile) -> HalResult<()> {
        let mut staged = tempfile::Builder::new()
            .prefix(&format!("{}-", job_file.job_id))
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer(staged.as_file_mut(), job_file)?;
        staged.as_file_mut().flush()?;

        let response = self
            .transport
            .post_file(upload_url, UPLOAD_FIELD, staged.path())
            .await?;
        drop(staged);

        response.error_for_status(format!("Failed to POST job '{}'", job_file.job_id))?;
        info!(job_id = %job_file.job_id, "uploaded job file");
        Ok(())
    }

    /// Ask the service to cancel `job_id`.
    pub async fn cancel_job(&self, upload_url: &str, job_id: &str) -> HalResult<()> {
        let url = join(upload_url, &format!("{job_id}/cancel"));
        self.transport
            .post_json(&url, &json!({}))
            .await?
            .error_for_status(format!("Failed to cancel job '{job_id}'"))?;
        info!(job_id, "cancellation requested");
        Ok(())
    }

    /// Job record of `job_id`.
    pub async fn get_remote_job(&self, job_id: &str) -> HalResult<RemoteJob> {
        let url = self.url(&self.routes.jobs, job_id);
        let response = self
            .transport
            .get(&url)
            .await?
            .error_for_status("error retrieving job data")?;
        response.json()
    }

    /// Download the logfile of `job_id` to `dir/{job_id}.hdf5`.
    pub async fn download_job_logfile(
        &self,
        job_id: &str,
        download_url: &str,
        dir: &Path,
    ) -> HalResult<PathBuf> {
        let dest = dir.join(format!("{job_id}.hdf5"));
        self.transport
            .download_to(download_url, &dest)
            .await?
            .error_for_status(format!("Failed to GET logfile of job '{job_id}'"))?;
        debug!(job_id, path = %dest.display(), "logfile saved");
        Ok(dest)
    }
}
