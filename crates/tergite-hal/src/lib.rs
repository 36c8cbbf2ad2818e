//! Tergite Hardware Abstraction Layer
//!
//! Connects compiled experiments to a Tergite control service: account
//! handling, backend discovery, job registration, upload, polling and result
//! retrieval.
//!
//! # Overview
//!
//! - [`ProviderFactory`] holds one [`Provider`] per saved account
//! - a [`Provider`] lists the [`Backend`]s of its service
//! - an OpenPulse [`Backend`] compiles experiments against the device's
//!   latest calibration and submits them as a [`Job`]
//! - a [`Job`] tracks the remote job to a terminal [`JobStatus`] and yields
//!   a [`JobResult`]
//!
//! All network traffic goes through a [`Transport`], so every layer can run
//! against an in-memory service.
//!
//! # Example: Running a Circuit
//!
//! ```ignore
//! use std::time::Duration;
//! use tergite_compile::{Circuit, RunOptions};
//! use tergite_hal::{AccountInfo, AccountStore, ProviderFactory};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut factory = ProviderFactory::new(AccountStore::default_location()?);
//!     let provider = factory.use_provider_account(
//!         AccountInfo::new("local", "http://localhost:8002"),
//!         false,
//!     )?;
//!     let backend = provider.get_backend("loke").await?;
//!
//!     let mut circuit = Circuit::new("bell", 2, 2);
//!     circuit.rx(0, std::f64::consts::FRAC_PI_2).cz(0, 1).measure_all();
//!
//!     let job = backend.run(&[circuit.into()], &RunOptions::with_shots(1024)).await?;
//!     job.wait_for_final_state(Duration::from_secs(2), None).await?;
//!     if let Some(result) = job.result().await? {
//!         println!("{:?}", result.counts(0));
//!     }
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod factory;
pub mod job;
pub mod logfile;
pub mod provider;
pub mod result;
pub mod transport;

pub use account::{AccountInfo, AccountStore, default_rc_path};
pub use api::{ApiClient, ApiRoutes, CreatedJobResponse, JobFile, RemoteJob};
pub use backend::{Backend, BackendCapabilities, OpenPulseBackend, OpenQasmBackend};
pub use config::{BackendConfig, BackendRecord};
pub use error::{ErrorKind, HalError, HalResult};
pub use factory::ProviderFactory;
pub use job::{Job, JobStatus, STATUS_MAP, map_remote_status};
pub use logfile::{LogfileAttributes, LogfileReader, RecoveredJob};
#[cfg(feature = "hdf5")]
pub use logfile::Hdf5Reader;
pub use provider::{BackendFilter, Provider};
pub use result::{Counts, ExperimentResult, JobResult};
pub use transport::{HttpTransport, Transport, TransportResponse};
