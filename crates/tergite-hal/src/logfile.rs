//! Payload and metadata stored in a finished job's logfile.
//!
//! The service keeps the submitted payload in the HDF5 logfile of every
//! job: the attributes of `header/qobj_metadata` describe the run and the
//! `experiment_data` attribute of `header/qobj_data` holds the payload JSON.
//! Reading that back lets a job handle rebuilt from a job id report the
//! experiment headers and payload id of the original submission.
//!
//! The HDF5 reader needs the system HDF5 library and is behind the `hdf5`
//! feature. Other formats plug in through [`LogfileReader`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tergite_compile::{PulseQobj, decompress_qobj};

use crate::error::{HalError, HalResult};

/// Group whose attributes hold the run metadata.
pub const METADATA_GROUP: &str = "header/qobj_metadata";
/// Group carrying the payload attribute.
pub const QOBJ_GROUP: &str = "header/qobj_data";
/// Attribute of [`QOBJ_GROUP`] with the payload JSON.
pub const EXPERIMENT_DATA: &str = "experiment_data";

/// Raw attributes read from a logfile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogfileAttributes {
    /// Scalar attributes of [`METADATA_GROUP`].
    pub metadata: Map<String, Value>,
    /// The [`EXPERIMENT_DATA`] attribute, if present.
    pub experiment_data: Option<String>,
}

/// What a logfile tells about the job that wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredJob {
    /// Run metadata such as `shots` or `qobj_id`.
    pub metadata: Map<String, Value>,
    /// The payload as submitted.
    pub payload: PulseQobj,
}

impl RecoveredJob {
    /// Decode the payload carried by `attributes`.
    ///
    /// The payload may be stored plain or with run-length encoded samples.
    pub fn from_attributes(path: &Path, attributes: LogfileAttributes) -> HalResult<Self> {
        let data = attributes
            .experiment_data
            .ok_or_else(|| malformed(path, format!("'{QOBJ_GROUP}/{EXPERIMENT_DATA}' not found")))?;
        let mut value: Value = serde_json::from_str(&data)
            .map_err(|e| malformed(path, format!("{EXPERIMENT_DATA} is not JSON: {e}")))?;

        let payload = match serde_json::from_value::<PulseQobj>(value.clone()) {
            Ok(payload) => payload,
            Err(_) => {
                decompress_qobj(&mut value)
                    .map_err(|e| malformed(path, format!("{EXPERIMENT_DATA}: {e}")))?;
                serde_json::from_value(value)
                    .map_err(|e| malformed(path, format!("{EXPERIMENT_DATA}: {e}")))?
            }
        };

        Ok(Self {
            metadata: attributes.metadata,
            payload,
        })
    }
}

fn malformed(path: &Path, reason: String) -> HalError {
    HalError::Logfile {
        path: path.to_path_buf(),
        reason,
    }
}

/// Reads the job attributes of a downloaded logfile.
///
/// Implementations block; callers run them off the async executor.
pub trait LogfileReader: Send + Sync + fmt::Debug {
    fn read(&self, path: &Path) -> HalResult<LogfileAttributes>;
}

/// Read and decode the job stored in the logfile at `path`.
pub fn read_job(reader: &dyn LogfileReader, path: &Path) -> HalResult<RecoveredJob> {
    let attributes = reader.read(path)?;
    RecoveredJob::from_attributes(path, attributes)
}

/// The reader used when none is configured: HDF5 when the `hdf5` feature
/// is enabled, otherwise none.
pub fn default_reader() -> Option<Arc<dyn LogfileReader>> {
    #[cfg(feature = "hdf5")]
    {
        Some(Arc::new(Hdf5Reader))
    }
    #[cfg(not(feature = "hdf5"))]
    {
        None
    }
}

#[cfg(feature = "hdf5")]
pub use self::hdf5_reader::Hdf5Reader;

#[cfg(feature = "hdf5")]
mod hdf5_reader {
    use std::path::Path;

    use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
    use serde_json::{Map, Value};
    use tracing::debug;

    use super::{EXPERIMENT_DATA, LogfileAttributes, LogfileReader, METADATA_GROUP, QOBJ_GROUP, malformed};
    use crate::error::HalResult;

    /// Reads logfiles written by the Tergite service.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Hdf5Reader;

    fn scalar(attr: &hdf5::Attribute) -> hdf5::Result<Option<Value>> {
        if !attr.is_scalar() {
            return Ok(None);
        }
        let value = match attr.dtype()?.to_descriptor()? {
            TypeDescriptor::Integer(_) => Value::from(attr.read_scalar::<i64>()?),
            TypeDescriptor::Unsigned(_) => Value::from(attr.read_scalar::<u64>()?),
            TypeDescriptor::Float(_) => Value::from(attr.read_scalar::<f64>()?),
            TypeDescriptor::Boolean => Value::from(attr.read_scalar::<bool>()?),
            TypeDescriptor::VarLenUnicode => {
                Value::from(attr.read_scalar::<VarLenUnicode>()?.as_str())
            }
            TypeDescriptor::VarLenAscii => {
                Value::from(attr.read_scalar::<VarLenAscii>()?.as_str())
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    impl LogfileReader for Hdf5Reader {
        fn read(&self, path: &Path) -> HalResult<LogfileAttributes> {
            let hdf5_err = |e: hdf5::Error| malformed(path, e.to_string());
            let file = hdf5::File::open(path).map_err(hdf5_err)?;

            let group = file
                .group(METADATA_GROUP)
                .map_err(|_| malformed(path, format!("'{METADATA_GROUP}' not found")))?;
            let mut metadata = Map::new();
            for name in group.attr_names().map_err(hdf5_err)? {
                let attr = group.attr(&name).map_err(hdf5_err)?;
                match scalar(&attr).map_err(hdf5_err)? {
                    Some(value) => {
                        metadata.insert(name, value);
                    }
                    None => debug!(attribute = %name, "skipping non-scalar metadata attribute"),
                }
            }

            let payload = file
                .group(QOBJ_GROUP)
                .map_err(|_| malformed(path, format!("'{QOBJ_GROUP}' not found")))?;
            let experiment_data = match payload.attr(EXPERIMENT_DATA) {
                Ok(attr) => scalar(&attr)
                    .map_err(hdf5_err)?
                    .and_then(|v| v.as_str().map(str::to_string)),
                Err(_) => None,
            };

            Ok(LogfileAttributes {
                metadata,
                experiment_data,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tergite_compile::compress_qobj;

    fn payload_json() -> Value {
        json!({
            "qobj_id": "q-1",
            "type": "PULSE",
            "schema_version": "1.3.0",
            "header": {"backend_name": "loke", "backend_version": "2024.04.0"},
            "config": {
                "shots": 100,
                "meas_level": 2,
                "meas_return": "single",
                "memory_slots": 2,
                "memory_slot_size": 100,
                "qubit_lo_freq": [4.8, 5.1],
                "meas_lo_freq": [6.9, 7.0],
                "pulse_library": [{"name": "flat", "samples": [[0.1, 0.0], [0.1, 0.0], [0.1, 0.0]]}],
                "parametric_pulses": ["gaussian"],
                "init_qubits": true
            },
            "experiments": [{"header": {"name": "bell", "memory_slots": 2}, "instructions": []}]
        })
    }

    fn attributes(data: &Value) -> LogfileAttributes {
        let mut metadata = Map::new();
        metadata.insert("shots".into(), json!(100));
        LogfileAttributes {
            metadata,
            experiment_data: Some(data.to_string()),
        }
    }

    #[test]
    fn test_plain_payload() {
        let job = RecoveredJob::from_attributes(Path::new("j1.hdf5"), attributes(&payload_json()))
            .unwrap();
        assert_eq!(job.payload.qobj_id, "q-1");
        assert_eq!(job.payload.experiments[0].header.name, "bell");
        assert_eq!(job.metadata["shots"], json!(100));
    }

    #[test]
    fn test_compressed_payload() {
        let mut data = payload_json();
        compress_qobj(&mut data).unwrap();
        let job = RecoveredJob::from_attributes(Path::new("j1.hdf5"), attributes(&data)).unwrap();
        assert_eq!(job.payload.config.pulse_library[0].samples.len(), 3);
    }

    #[test]
    fn test_missing_experiment_data() {
        let err = RecoveredJob::from_attributes(Path::new("j1.hdf5"), LogfileAttributes::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed logfile j1.hdf5: 'header/qobj_data/experiment_data' not found"
        );
    }

    #[test]
    fn test_payload_not_json() {
        let attributes = LogfileAttributes {
            metadata: Map::new(),
            experiment_data: Some("{not json".into()),
        };
        let err = RecoveredJob::from_attributes(Path::new("j1.hdf5"), attributes).unwrap_err();
        assert!(err.to_string().contains("experiment_data is not JSON"));
    }
}
