//! Backends.
//!
//! A Tergite device is either an OpenPulse backend, which compiles
//! experiments against live calibration data, or an OpenQASM backend, which
//! only declares its gate set. [`Backend`] is the closed sum over both.
//!
//! ```text
//!   run() ──→ make_qobj() ──→ register_job() ──→ Job::submit()
//!                 │
//!          refresh_target()   (calibration fetch, rebuild on new snapshot)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tergite_compile::{
    AssembleContext, DEFAULT_SHOTS, DeviceCalibration, Experiment, PARAMETRIC_SHAPES, PulseQobj,
    RunOptions, Target, assemble, build_target, declare_gates,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::config::BackendConfig;
use crate::error::{HalError, HalResult};
use crate::job::Job;

/// Introspection shared by every backend kind.
pub trait BackendCapabilities {
    /// The configuration record the backend was built from.
    fn config(&self) -> &BackendConfig;

    fn name(&self) -> &str {
        self.config().name()
    }

    fn version(&self) -> &str {
        self.config().version()
    }

    fn num_qubits(&self) -> u32 {
        self.config().num_qubits()
    }

    fn open_pulse(&self) -> bool {
        self.config().open_pulse()
    }

    /// Shots used when a run does not ask for a number.
    fn default_shots(&self) -> u32 {
        DEFAULT_SHOTS
    }
}

/// A backend of either kind.
#[derive(Debug)]
pub enum Backend {
    OpenPulse(OpenPulseBackend),
    OpenQasm(OpenQasmBackend),
}

impl Backend {
    /// Pick the backend kind from the record's `open_pulse` flag.
    pub fn from_config(config: BackendConfig, api: ApiClient) -> Self {
        if config.open_pulse() {
            Backend::OpenPulse(OpenPulseBackend::new(config, api))
        } else {
            Backend::OpenQasm(OpenQasmBackend::new(config))
        }
    }

    /// The OpenPulse backend, if this is one.
    pub fn as_open_pulse(&self) -> Option<&OpenPulseBackend> {
        match self {
            Backend::OpenPulse(b) => Some(b),
            Backend::OpenQasm(_) => None,
        }
    }

    /// The instruction-set target of the backend.
    pub async fn target(&self) -> HalResult<Arc<Target>> {
        match self {
            Backend::OpenPulse(b) => b.target().await,
            Backend::OpenQasm(b) => Ok(b.target()),
        }
    }

    /// Compile, register and submit `experiments`.
    pub async fn run(&self, experiments: &[Experiment], options: &RunOptions) -> HalResult<Job> {
        match self {
            Backend::OpenPulse(b) => b.run(experiments, options).await,
            Backend::OpenQasm(b) => b.run(experiments, options),
        }
    }
}

impl BackendCapabilities for Backend {
    fn config(&self) -> &BackendConfig {
        match self {
            Backend::OpenPulse(b) => b.config(),
            Backend::OpenQasm(b) => b.config(),
        }
    }
}

#[derive(Debug, Clone)]
struct Compiled {
    calibration: Option<Arc<DeviceCalibration>>,
    target: Arc<Target>,
}

/// A pulse-level backend compiled from the device's calibration data.
#[derive(Debug)]
pub struct OpenPulseBackend {
    config: BackendConfig,
    api: ApiClient,
    logfile_dir: Option<PathBuf>,
    compiled: RwLock<Option<Compiled>>,
    /// Held from calibration fetch to cache write, so refreshes land in
    /// fetch order.
    refreshing: Mutex<()>,
}

impl OpenPulseBackend {
    pub fn new(config: BackendConfig, api: ApiClient) -> Self {
        Self {
            config,
            api,
            logfile_dir: None,
            compiled: RwLock::new(None),
            refreshing: Mutex::new(()),
        }
    }

    /// Directory that logfiles of this backend's jobs are downloaded to.
    pub fn with_logfile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logfile_dir = Some(dir.into());
        self
    }

    /// The current target, building it on first use.
    pub async fn target(&self) -> HalResult<Arc<Target>> {
        {
            let cached = self.compiled.read().await;
            if let Some(compiled) = cached.as_ref() {
                debug!(backend = self.name(), "target from cache");
                return Ok(Arc::clone(&compiled.target));
            }
        }
        self.refresh_target().await
    }

    /// Fetch the latest calibration and rebuild the target if the snapshot
    /// changed since the last build.
    ///
    /// Uncharacterized devices have no calibration and get an empty target.
    pub async fn refresh_target(&self) -> HalResult<Arc<Target>> {
        if !self.config.characterized() {
            let mut cached = self.compiled.write().await;
            let compiled = cached.get_or_insert_with(|| Compiled {
                calibration: None,
                target: Arc::new(Target::new(
                    self.config.name(),
                    self.config.num_qubits(),
                    self.config.dt(),
                )),
            });
            return Ok(Arc::clone(&compiled.target));
        }

        let _refreshing = self.refreshing.lock().await;
        let calibration = self.api.get_latest_calibration(self.name()).await?;

        {
            let cached = self.compiled.read().await;
            if let Some(compiled) = cached.as_ref() {
                let current = compiled.calibration.as_ref().map(|c| c.last_calibrated.as_str());
                if current == Some(calibration.last_calibrated.as_str()) {
                    debug!(
                        backend = self.name(),
                        last_calibrated = %calibration.last_calibrated,
                        "calibration unchanged, keeping target"
                    );
                    return Ok(Arc::clone(&compiled.target));
                }
            }
        }

        let target = Arc::new(build_target(&self.config.device_spec(), &calibration)?);
        info!(
            backend = self.name(),
            last_calibrated = %calibration.last_calibrated,
            "target rebuilt"
        );

        let mut cached = self.compiled.write().await;
        *cached = Some(Compiled {
            calibration: Some(Arc::new(calibration)),
            target: Arc::clone(&target),
        });
        Ok(target)
    }

    /// Calibration snapshot behind the current target.
    pub async fn device_calibration(&self) -> HalResult<Option<Arc<DeviceCalibration>>> {
        self.target().await?;
        Ok(self
            .compiled
            .read()
            .await
            .as_ref()
            .and_then(|c| c.calibration.clone()))
    }

    /// Token of the snapshot behind the current target, if one was built.
    pub async fn last_calibrated(&self) -> Option<String> {
        self.compiled
            .read()
            .await
            .as_ref()
            .and_then(|c| c.target.calibration_date().map(str::to_string))
    }

    fn assemble_context(&self) -> AssembleContext {
        AssembleContext {
            backend_name: self.config.name().to_string(),
            backend_version: self.config.version().to_string(),
            qubit_lo_freq: self.config.qubit_lo_freq(),
            meas_lo_freq: self.config.meas_lo_freq(),
            parametric_pulses: PARAMETRIC_SHAPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    async fn compile(
        &self,
        experiments: &[Experiment],
        options: &RunOptions,
    ) -> HalResult<(PulseQobj, Option<String>)> {
        let target = self.refresh_target().await?;
        let schedules = experiments
            .iter()
            .map(|e| e.to_schedule(&target))
            .collect::<Result<Vec<_>, _>>()?;
        let qobj = assemble(&schedules, options, &self.assemble_context())?;
        Ok((qobj, target.calibration_date().map(str::to_string)))
    }

    /// Compile `experiments` into a payload against freshly fetched
    /// calibration data.
    pub async fn make_qobj(
        &self,
        experiments: &[Experiment],
        options: &RunOptions,
    ) -> HalResult<PulseQobj> {
        Ok(self.compile(experiments, options).await?.0)
    }

    /// Register a job for `payload` with the service.
    pub async fn register_job(
        &self,
        payload: PulseQobj,
        calibration_date: Option<String>,
    ) -> HalResult<Job> {
        let created = self
            .api
            .register_job(self.name(), calibration_date.as_deref())
            .await?;
        let job = Job::new(
            created,
            self.name(),
            self.version(),
            self.api.clone(),
            payload,
            calibration_date,
        );
        Ok(match &self.logfile_dir {
            Some(dir) => job.with_logfile_dir(dir),
            None => job,
        })
    }

    /// Compile, register and submit `experiments`.
    ///
    /// The job's calibration date is the snapshot the payload was compiled
    /// against.
    pub async fn run(&self, experiments: &[Experiment], options: &RunOptions) -> HalResult<Job> {
        let (payload, calibration_date) = self.compile(experiments, options).await?;
        let job = self.register_job(payload, calibration_date).await?;
        job.submit().await?;
        Ok(job)
    }
}

impl BackendCapabilities for OpenPulseBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }
}

/// A gate-level backend. Its target declares gates without schedules.
#[derive(Debug)]
pub struct OpenQasmBackend {
    config: BackendConfig,
    target: Arc<Target>,
}

impl OpenQasmBackend {
    pub fn new(config: BackendConfig) -> Self {
        let target = Arc::new(declare_gates(&config.device_spec()));
        Self { config, target }
    }

    pub fn target(&self) -> Arc<Target> {
        Arc::clone(&self.target)
    }

    /// Always rejected: gate-level submission is not supported.
    pub fn run(&self, _experiments: &[Experiment], _options: &RunOptions) -> HalResult<Job> {
        Err(HalError::Unsupported(format!(
            "backend '{}' is not an OpenPulse backend; running OpenQASM jobs is not supported",
            self.name()
        )))
    }
}

impl BackendCapabilities for OpenQasmBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }
}
