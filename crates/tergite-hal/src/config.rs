//! Backend configuration records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tergite_compile::{CouplerTable, CouplingMap, DeviceSpec};

/// A backend configuration record as published by the devices endpoint.
///
/// Unknown fields are kept in `extra` and written back on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRecord {
    pub name: String,
    pub version: String,
    pub number_of_qubits: u32,
    pub is_online: bool,
    pub basis_gates: Vec<String>,
    pub coupling_map: Vec<(u32, u32)>,
    pub coordinates: Vec<(i64, i64)>,
    pub is_simulator: bool,
    pub characterized: bool,
    pub open_pulse: bool,
    pub meas_map: Vec<Vec<u32>>,

    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub last_online: Option<String>,
    #[serde(default)]
    pub online_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub number_of_couplers: u32,
    #[serde(default)]
    pub number_of_resonators: u32,
    /// Sample time in seconds.
    #[serde(default)]
    pub dt: Option<f64>,
    /// Acquisition sample time in seconds.
    #[serde(default)]
    pub dtm: Option<f64>,
    #[serde(default)]
    pub qubit_ids: Vec<String>,
    /// `[[control, target], coupler]` entries.
    #[serde(default)]
    pub qubit_ids_coupler_map: Vec<((u32, u32), u32)>,
    /// Hz.
    #[serde(default)]
    pub qubit_lo_freq: Option<Vec<f64>>,
    /// Hz.
    #[serde(default)]
    pub meas_lo_freq: Option<Vec<f64>>,
    #[serde(default)]
    pub gates: Option<Map<String, Value>>,
    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A validated backend configuration with its derived coupling tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BackendRecord", into = "BackendRecord")]
pub struct BackendConfig {
    record: BackendRecord,
    coupling: CouplingMap,
    couplers: CouplerTable,
}

impl From<BackendRecord> for BackendConfig {
    fn from(record: BackendRecord) -> Self {
        let coupling = CouplingMap::from_pairs(&record.coupling_map);
        let couplers = CouplerTable::from_entries(&record.qubit_ids_coupler_map);
        Self {
            record,
            coupling,
            couplers,
        }
    }
}

impl From<BackendConfig> for BackendRecord {
    fn from(config: BackendConfig) -> Self {
        config.record
    }
}

impl BackendConfig {
    /// Parse a record from the devices endpoint.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn version(&self) -> &str {
        &self.record.version
    }

    pub fn num_qubits(&self) -> u32 {
        self.record.number_of_qubits
    }

    pub fn num_resonators(&self) -> u32 {
        self.record.number_of_resonators
    }

    pub fn open_pulse(&self) -> bool {
        self.record.open_pulse
    }

    pub fn is_online(&self) -> bool {
        self.record.is_online
    }

    pub fn characterized(&self) -> bool {
        self.record.characterized
    }

    pub fn is_simulator(&self) -> bool {
        self.record.is_simulator
    }

    pub fn dt(&self) -> Option<f64> {
        self.record.dt
    }

    pub fn basis_gates(&self) -> &[String] {
        &self.record.basis_gates
    }

    /// Coupled pairs with self-loops removed.
    pub fn coupling(&self) -> &CouplingMap {
        &self.coupling
    }

    /// Coupler serving each coupled pair.
    pub fn couplers(&self) -> &CouplerTable {
        &self.couplers
    }

    /// The raw record.
    pub fn record(&self) -> &BackendRecord {
        &self.record
    }

    /// Qubit LO frequencies, zeros when the record has none.
    pub fn qubit_lo_freq(&self) -> Vec<f64> {
        self.record
            .qubit_lo_freq
            .clone()
            .unwrap_or_else(|| vec![0.0; self.record.number_of_qubits as usize])
    }

    /// Readout LO frequencies, zeros when the record has none.
    pub fn meas_lo_freq(&self) -> Vec<f64> {
        self.record
            .meas_lo_freq
            .clone()
            .unwrap_or_else(|| vec![0.0; self.record.number_of_resonators as usize])
    }

    /// Device facts for target construction.
    pub fn device_spec(&self) -> DeviceSpec<'_> {
        DeviceSpec {
            name: &self.record.name,
            num_qubits: self.record.number_of_qubits,
            dt: self.record.dt,
            characterized: self.record.characterized,
            coupling: &self.coupling,
            couplers: &self.couplers,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    /// A two-qubit pulse backend record.
    pub fn record(name: &str) -> Value {
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
            "qubit_ids_coupler_map": [[[0, 1], 0], [[1, 0], 0]],
            "fridge": "xld"
        })
    }
}
