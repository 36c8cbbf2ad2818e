//! In-memory Tergite service for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tergite_compile::PulseQobj;
use tergite_hal::{
    AccountInfo, HalResult, LogfileAttributes, LogfileReader, Provider, Transport,
    TransportResponse,
};

pub const BASE: &str = "http://tergite.test";
pub const UPLOAD_URL: &str = "http://tergite.test/upload";

/// One request seen by the mock.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
    /// Multipart field name and file contents of an upload.
    pub upload: Option<(String, String)>,
    /// Local path of an upload or download.
    pub path: Option<PathBuf>,
}

/// A scripted response and how long the service takes to send it.
type Scripted = (TransportResponse, Duration);

/// Scripted responses per `(method, url)`. The last scripted response of a
/// route repeats.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(&'static str, String), VecDeque<Scripted>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a JSON response.
    pub fn on(&self, method: &'static str, url: &str, status: u16, body: Value) {
        self.on_bytes(method, url, status, body.to_string().into_bytes());
    }

    /// Queue a raw response.
    pub fn on_bytes(&self, method: &'static str, url: &str, status: u16, body: Vec<u8>) {
        self.push(method, url, TransportResponse { status, body }, Duration::ZERO);
    }

    /// Queue a JSON response that arrives after `delay`.
    pub fn on_delayed(
        &self,
        method: &'static str,
        url: &str,
        status: u16,
        body: Value,
        delay: Duration,
    ) {
        let response = TransportResponse::json_body(status, &body);
        self.push(method, url, response, delay);
    }

    fn push(&self, method: &'static str, url: &str, response: TransportResponse, delay: Duration) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, url.to_string()))
            .or_default()
            .push_back((response, delay));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests to `(method, url)`.
    pub fn count(&self, method: &str, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.url == url)
            .count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Requests to `(method, url)`, in order.
    pub fn calls_to(&self, method: &str, url: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.url == url)
            .collect()
    }

    async fn respond(&self, call: Call) -> TransportResponse {
        let key = (call.method, call.url.clone());
        self.calls.lock().unwrap().push(call);

        let (response, delay) = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap(),
                None => (
                    TransportResponse::json_body(404, &json!({"detail": "Not Found"})),
                    Duration::ZERO,
                ),
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> HalResult<TransportResponse> {
        Ok(self
            .respond(Call {
                method: "GET",
                url: url.to_string(),
                body: None,
                upload: None,
                path: None,
            })
            .await)
    }

    async fn post_json(&self, url: &str, body: &Value) -> HalResult<TransportResponse> {
        Ok(self
            .respond(Call {
                method: "POST",
                url: url.to_string(),
                body: Some(body.clone()),
                upload: None,
                path: None,
            })
            .await)
    }

    async fn post_file(&self, url: &str, field: &str, path: &Path) -> HalResult<TransportResponse> {
        let contents = std::fs::read_to_string(path)?;
        Ok(self
            .respond(Call {
                method: "POST",
                url: url.to_string(),
                body: None,
                upload: Some((field.to_string(), contents)),
                path: Some(path.to_path_buf()),
            })
            .await)
    }

    async fn download_to(&self, url: &str, dest: &Path) -> HalResult<TransportResponse> {
        let response = self
            .respond(Call {
                method: "GET",
                url: url.to_string(),
                body: None,
                upload: None,
                path: Some(dest.to_path_buf()),
            })
            .await;
        if response.is_success() {
            std::fs::write(dest, &response.body)?;
            return Ok(TransportResponse {
                status: response.status,
                body: Vec::new(),
            });
        }
        Ok(response)
    }
}

pub fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

pub fn provider(transport: &Arc<MockTransport>) -> Provider {
    let transport: Arc<dyn Transport> = transport.clone();
    Provider::with_transport(AccountInfo::new("test", BASE), transport)
}

/// A two-qubit pulse backend record.
pub fn backend_record(name: &str) -> Value {
    json!({
        "name": name,
        "version": "2024.04.0",
        "number_of_qubits": 2,
        "is_online": true,
        "basis_gates": ["rx", "rz", "cz"],
        "coupling_map": [[0, 0], [0, 1], [1, 0]],
        "coordinates": [[0, 0], [1, 0]],
        "is_simulator": false,
        "characterized": true,
        "open_pulse": true,
        "meas_map": [[0, 1]],
        "number_of_couplers": 1,
        "number_of_resonators": 2,
        "dt": 1e-9,
        "dtm": 1e-9,
        "qubit_ids": ["q0", "q1"],
        "qubit_ids_coupler_map": [[[0, 1], 0], [[1, 0], 0]]
    })
}

fn value(v: f64, unit: &str) -> Value {
    json!({"value": v, "unit": unit})
}

fn qubit(frequency: f64, pi_amp: f64) -> Value {
    json!({
        "frequency": value(frequency, "Hz"),
        "pi_pulse_amplitude": value(pi_amp, ""),
        "pi_pulse_duration": value(56e-9, "s"),
        "pulse_sigma": value(7e-9, "s"),
        "readout_assignment_error": value(0.02, "")
    })
}

fn resonator(frequency: f64) -> Value {
    json!({
        "frequency": value(frequency, "Hz"),
        "pulse_amplitude": value(0.05, ""),
        "pulse_duration": value(3e-6, "s"),
        "acq_integration_time": value(2.5e-6, "s")
    })
}

/// Calibration snapshot `last_calibrated` of the backend `loke`.
pub fn calibration(last_calibrated: &str, pi_amp: f64) -> Value {
    json!({
        "name": "loke",
        "version": "2024.04.0",
        "qubits": [qubit(4.8e9, pi_amp), qubit(5.1e9, pi_amp)],
        "resonators": [resonator(6.9e9), resonator(7.0e9)],
        "couplers": [{
            "anharmonicity": value(-200e6, "Hz"),
            "cz_pulse_amplitude": value(0.08, ""),
            "cz_pulse_dc_bias": value(0.3, ""),
            "cz_pulse_phase_offset": value(0.0, "rad"),
            "cz_pulse_duration_before": value(8e-9, "s"),
            "cz_pulse_duration_rise": value(24e-9, "s"),
            "cz_pulse_duration_constant": value(200e-9, "s")
        }],
        "last_calibrated": last_calibrated
    })
}

/// A mock service with backend `loke`, one calibration snapshot and job
/// registration answering with `job_id`.
pub fn service(job_id: &str) -> Arc<MockTransport> {
    let transport = MockTransport::new();
    transport.on("GET", &url("/devices/"), 200, json!([backend_record("loke")]));
    transport.on(
        "GET",
        &url("/calibrations/loke"),
        200,
        calibration("2024-04-01T10:00:00Z", 0.25),
    );
    transport.on(
        "POST",
        &url("/jobs/"),
        200,
        json!({"job_id": job_id, "upload_url": UPLOAD_URL}),
    );
    transport.on("POST", UPLOAD_URL, 200, json!({}));
    transport
}

/// A remote job record.
pub fn remote_job(job_id: &str, status: &str) -> Value {
    json!({
        "job_id": job_id,
        "device": "loke",
        "calibration_date": "2024-04-01T10:00:00Z",
        "status": status
    })
}

/// Reads logfiles stored as JSON with the same layout as the service's HDF5
/// files: `{"header": {"qobj_metadata": {..}, "qobj_data": {"experiment_data": ".."}}}`.
#[derive(Debug)]
pub struct JsonLogfile;

impl LogfileReader for JsonLogfile {
    fn read(&self, path: &Path) -> HalResult<LogfileAttributes> {
        let doc: Value = serde_json::from_slice(&std::fs::read(path)?)?;
        let header = &doc["header"];
        Ok(LogfileAttributes {
            metadata: header["qobj_metadata"].as_object().cloned().unwrap_or_default(),
            experiment_data: header["qobj_data"]["experiment_data"]
                .as_str()
                .map(str::to_string),
        })
    }
}

/// A logfile carrying `payload` and run `metadata`.
pub fn logfile(metadata: Value, payload: &PulseQobj) -> Vec<u8> {
    json!({
        "header": {
            "qobj_metadata": metadata,
            "qobj_data": {"experiment_data": serde_json::to_string(payload).unwrap()}
        }
    })
    .to_string()
    .into_bytes()
}
