//! Provider: the backends available to one account.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::account::AccountInfo;
use crate::api::{ApiClient, ApiRoutes};
use crate::backend::{Backend, BackendCapabilities};
use crate::config::BackendConfig;
use crate::error::{HalError, HalResult};
use crate::job::{Job, JobStatus, map_remote_status};
use crate::logfile::{self, LogfileReader};
use crate::transport::{HttpTransport, Transport};

/// Criteria for selecting backends. Unset criteria match everything.
#[derive(Clone, Default)]
pub struct BackendFilter {
    pub name: Option<String>,
    pub open_pulse: Option<bool>,
    pub online: Option<bool>,
    pub characterized: Option<bool>,
    pub simulator: Option<bool>,
    predicate: Option<Arc<dyn Fn(&BackendConfig) -> bool + Send + Sync>>,
}

impl fmt::Debug for BackendFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendFilter")
            .field("name", &self.name)
            .field("open_pulse", &self.open_pulse)
            .field("online", &self.online)
            .field("characterized", &self.characterized)
            .field("simulator", &self.simulator)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl BackendFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match on backend name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn open_pulse(mut self, open_pulse: bool) -> Self {
        self.open_pulse = Some(open_pulse);
        self
    }

    pub fn online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    pub fn characterized(mut self, characterized: bool) -> Self {
        self.characterized = Some(characterized);
        self
    }

    pub fn simulator(mut self, simulator: bool) -> Self {
        self.simulator = Some(simulator);
        self
    }

    /// Add a custom predicate over the configuration record.
    pub fn predicate(
        mut self,
        predicate: impl Fn(&BackendConfig) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Whether `config` satisfies every set criterion.
    pub fn matches(&self, config: &BackendConfig) -> bool {
        self.name.as_deref().is_none_or(|n| n == config.name())
            && self.open_pulse.is_none_or(|v| v == config.open_pulse())
            && self.online.is_none_or(|v| v == config.is_online())
            && self.characterized.is_none_or(|v| v == config.characterized())
            && self.simulator.is_none_or(|v| v == config.is_simulator())
            && self.predicate.as_ref().is_none_or(|p| p(config))
    }
}

#[derive(Debug, Default)]
struct Catalog {
    backends: Vec<Arc<Backend>>,
    malformed: FxHashMap<String, String>,
}

/// Backends and jobs of one service account.
pub struct Provider {
    account: AccountInfo,
    api: ApiClient,
    logfile_dir: Option<PathBuf>,
    logfile_reader: Option<Arc<dyn LogfileReader>>,
    catalog: RwLock<Option<Arc<Catalog>>>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("account", &self.account)
            .field("api", &self.api)
            .field("logfile_reader", &self.logfile_reader)
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Provider talking HTTP to the account's service.
    pub fn new(account: AccountInfo) -> HalResult<Self> {
        let transport = HttpTransport::new(account.token.as_deref())?;
        Ok(Self::with_transport(account, Arc::new(transport)))
    }

    /// Provider over a given transport.
    pub fn with_transport(account: AccountInfo, transport: Arc<dyn Transport>) -> Self {
        let api = ApiClient::new(account.url.clone(), ApiRoutes::default(), transport);
        Self {
            account,
            api,
            logfile_dir: None,
            logfile_reader: logfile::default_reader(),
            catalog: RwLock::new(None),
        }
    }

    /// Use another route generation.
    pub fn with_routes(mut self, routes: ApiRoutes) -> Self {
        self.api = ApiClient::new(self.account.url.clone(), routes, self.api_transport());
        self
    }

    /// Directory that job logfiles are downloaded to.
    pub fn with_logfile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logfile_dir = Some(dir.into());
        self
    }

    /// Reader used to recover the payload of jobs looked up by id.
    pub fn with_logfile_reader(mut self, reader: Arc<dyn LogfileReader>) -> Self {
        self.logfile_reader = Some(reader);
        self
    }

    fn api_transport(&self) -> Arc<dyn Transport> {
        self.api.transport()
    }

    pub fn account(&self) -> &AccountInfo {
        &self.account
    }

    pub fn service_name(&self) -> &str {
        &self.account.service_name
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    async fn catalog(&self) -> HalResult<Arc<Catalog>> {
        {
            let cached = self.catalog.read().await;
            if let Some(catalog) = cached.as_ref() {
                debug!(service = self.service_name(), "backends from cache");
                return Ok(Arc::clone(catalog));
            }
        }

        let records = self.api.get_backend_configs().await?;
        let mut catalog = Catalog::default();
        for (index, record) in records.into_iter().enumerate() {
            let label = record
                .get("name")
                .and_then(Value::as_str)
                .map_or_else(|| format!("<record {index}>"), str::to_string);
            match BackendConfig::from_value(record) {
                Ok(config) => {
                    let backend = match (
                        Backend::from_config(config, self.api.clone()),
                        &self.logfile_dir,
                    ) {
                        (Backend::OpenPulse(b), Some(dir)) => {
                            Backend::OpenPulse(b.with_logfile_dir(dir))
                        }
                        (backend, _) => backend,
                    };
                    catalog.backends.push(Arc::new(backend));
                }
                Err(e) => {
                    warn!(backend = %label, error = %e, "skipping malformed backend record");
                    catalog.malformed.insert(label, e.to_string());
                }
            }
        }
        debug!(
            service = self.service_name(),
            backends = catalog.backends.len(),
            malformed = catalog.malformed.len(),
            "fetched backends"
        );

        let catalog = Arc::new(catalog);
        *self.catalog.write().await = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    /// Backends matching `filter`.
    pub async fn backends(&self, filter: &BackendFilter) -> HalResult<Vec<Arc<Backend>>> {
        let catalog = self.catalog().await?;
        Ok(catalog
            .backends
            .iter()
            .filter(|b| filter.matches(b.config()))
            .cloned()
            .collect())
    }

    /// The one backend named `name`.
    pub async fn get_backend(&self, name: &str) -> HalResult<Arc<Backend>> {
        self.get_backend_matching(&BackendFilter::new().name(name)).await
    }

    /// The one backend matching `filter`. Zero or several matches are errors.
    pub async fn get_backend_matching(&self, filter: &BackendFilter) -> HalResult<Arc<Backend>> {
        let mut matches = self.backends(filter).await?;
        let criteria = format!("{filter:?}");
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => {
                let hint = match &filter.name {
                    Some(name) => match self.malformed_backends().await?.get(name) {
                        Some(reason) => format!("'{name}' is malformed: {reason}"),
                        None => format!("name '{name}'"),
                    },
                    None => criteria,
                };
                Err(HalError::BackendNotFound(hint))
            }
            n => Err(HalError::MultipleBackends(format!(
                "{n} backends match {}",
                filter.name.as_deref().map_or(criteria, |n| format!("name '{n}'"))
            ))),
        }
    }

    /// Records that failed validation, by name, with the reason.
    pub async fn malformed_backends(&self) -> HalResult<FxHashMap<String, String>> {
        Ok(self.catalog().await?.malformed.clone())
    }

    /// Drop the cached backend list.
    pub async fn refresh(&self) {
        *self.catalog.write().await = None;
    }

    /// A handle to an existing job, rebuilt from its remote record.
    ///
    /// When the job is terminal and has published its logfile, the logfile
    /// is downloaded and the submitted payload read back from it, so results
    /// carry the original experiment headers. A logfile without job data
    /// leaves the handle without payload.
    pub async fn job(&self, job_id: &str) -> HalResult<Job> {
        let remote = self.api.get_remote_job(job_id).await?;
        let device = remote.device.clone().ok_or_else(|| {
            HalError::Configuration(format!("job '{job_id}' has no device"))
        })?;
        let has_logfile = remote.download_url.is_some()
            && remote
                .status
                .as_deref()
                .and_then(map_remote_status)
                .is_some_and(JobStatus::is_terminal);

        let backend = self.get_backend(&device).await?;
        let mut job = Job::from_remote(remote, backend.name(), backend.version(), self.api.clone());
        if let Some(dir) = &self.logfile_dir {
            job = job.with_logfile_dir(dir);
        }
        if !has_logfile {
            return Ok(job);
        }
        self.recover_payload(job).await
    }

    async fn recover_payload(&self, job: Job) -> HalResult<Job> {
        let Some(reader) = self.logfile_reader.clone() else {
            debug!(job_id = %job.job_id(), "no logfile reader, payload not recovered");
            return Ok(job);
        };
        let Some(path) = job.logfile().await? else {
            return Ok(job);
        };

        let read = tokio::task::spawn_blocking(move || logfile::read_job(reader.as_ref(), &path))
            .await
            .map_err(|e| HalError::Io(std::io::Error::other(e)))?;
        match read {
            Ok(recovered) => {
                debug!(
                    job_id = %job.job_id(),
                    qobj_id = %recovered.payload.qobj_id,
                    "recovered payload from logfile"
                );
                Ok(job.with_recovered(recovered))
            }
            Err(e) => {
                warn!(job_id = %job.job_id(), error = %e, "payload not recovered");
                Ok(job)
            }
        }
    }
}
