//! Device calibration snapshots.
//!
//! The control service publishes one [`DeviceCalibration`] document per
//! device. Its `last_calibrated` timestamp identifies the snapshot: jobs are
//! registered with the timestamp of the snapshot their payload was compiled
//! against.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// A calibrated scalar as published by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalibrationScalar {
    /// Numeric value.
    Number(f64),
    /// Text value, e.g. a pulse type.
    Text(String),
}

/// A calibrated quantity with its measurement date and unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationValue {
    /// The value.
    pub value: CalibrationScalar,
    /// When the value was measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Unit, e.g. `Hz` or `s`.
    #[serde(default)]
    pub unit: String,
}

impl CalibrationValue {
    /// A numeric value without date.
    pub fn number(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value: CalibrationScalar::Number(value),
            date: None,
            unit: unit.into(),
        }
    }

    /// The value as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            CalibrationScalar::Number(v) => Some(*v),
            CalibrationScalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Read a required numeric field of a component.
pub fn require(
    value: Option<&CalibrationValue>,
    component: &'static str,
    index: u32,
    field: &'static str,
) -> CompileResult<f64> {
    let value = value.ok_or(CompileError::MissingCalibration {
        component,
        index,
        field,
    })?;
    value.as_f64().ok_or(CompileError::NonNumericCalibration {
        component,
        index,
        field,
    })
}

/// Calibration of one qubit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QubitCalibration {
    /// Energy relaxation time T1, in s.
    pub t1_decoherence: Option<CalibrationValue>,
    /// Dephasing time T2, in s.
    pub t2_decoherence: Option<CalibrationValue>,
    /// Transition frequency, in Hz.
    pub frequency: Option<CalibrationValue>,
    /// Anharmonicity, in Hz.
    pub anharmonicity: Option<CalibrationValue>,
    /// Readout assignment error probability (unitless).
    pub readout_assignment_error: Option<CalibrationValue>,
    /// Drive amplitude of a pi pulse (unitless, relative to full scale).
    pub pi_pulse_amplitude: Option<CalibrationValue>,
    /// Duration of a pi pulse, in s.
    pub pi_pulse_duration: Option<CalibrationValue>,
    /// Drive pulse shape, e.g. `Gaussian` (text).
    pub pulse_type: Option<CalibrationValue>,
    /// Gaussian width of the drive pulse, in s.
    pub pulse_sigma: Option<CalibrationValue>,
    /// Service-side record id.
    pub id: Option<i64>,
    /// Qubit index on the device.
    pub index: Option<CalibrationValue>,
    /// Column on the chip layout (grid units).
    pub x_position: Option<CalibrationValue>,
    /// Row on the chip layout (grid units).
    pub y_position: Option<CalibrationValue>,
    /// Index of the XY drive line.
    pub xy_drive_line: Option<CalibrationValue>,
    /// Index of the flux (Z) drive line.
    pub z_drive_line: Option<CalibrationValue>,
}

/// Calibration of one readout resonator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonatorCalibration {
    /// Delay from pulse start to acquisition start, in s.
    pub acq_delay: Option<CalibrationValue>,
    /// Acquisition integration time, in s.
    pub acq_integration_time: Option<CalibrationValue>,
    /// Readout frequency, in Hz.
    pub frequency: Option<CalibrationValue>,
    /// Readout pulse amplitude (unitless, relative to full scale).
    pub pulse_amplitude: Option<CalibrationValue>,
    /// Delay before the readout pulse, in s.
    pub pulse_delay: Option<CalibrationValue>,
    /// Readout pulse duration, in s.
    pub pulse_duration: Option<CalibrationValue>,
    /// Readout pulse shape, e.g. `Square` (text).
    pub pulse_type: Option<CalibrationValue>,
    /// Service-side record id.
    pub id: Option<i64>,
    /// Index of the qubit read by this resonator.
    pub index: Option<CalibrationValue>,
    /// Column on the chip layout (grid units).
    pub x_position: Option<CalibrationValue>,
    /// Row on the chip layout (grid units).
    pub y_position: Option<CalibrationValue>,
    /// Index of the readout line.
    pub readout_line: Option<CalibrationValue>,
}

/// Calibration of one tunable coupler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplerCalibration {
    /// Coupler frequency, in Hz.
    pub frequency: Option<CalibrationValue>,
    /// Detuning from the idle frequency, in Hz.
    pub frequency_detuning: Option<CalibrationValue>,
    /// Anharmonicity, in Hz.
    pub anharmonicity: Option<CalibrationValue>,
    /// Coupling strength to the 0-2 transition, in Hz.
    pub coupling_strength_02: Option<CalibrationValue>,
    /// Coupling strength to the 1-2 transition, in Hz.
    pub coupling_strength_12: Option<CalibrationValue>,
    /// CZ flux pulse amplitude (unitless, relative to full scale).
    pub cz_pulse_amplitude: Option<CalibrationValue>,
    /// DC flux bias during the CZ pulse (unitless).
    pub cz_pulse_dc_bias: Option<CalibrationValue>,
    /// Phase offset of the CZ pulse, in rad.
    pub cz_pulse_phase_offset: Option<CalibrationValue>,
    /// Wait before the CZ pulse, in s.
    pub cz_pulse_duration_before: Option<CalibrationValue>,
    /// Rise and fall time of the CZ pulse, in s.
    pub cz_pulse_duration_rise: Option<CalibrationValue>,
    /// Flat-top duration of the CZ pulse, in s.
    pub cz_pulse_duration_constant: Option<CalibrationValue>,
    /// CZ pulse shape (text).
    pub pulse_type: Option<CalibrationValue>,
    /// Service-side record id.
    pub id: Option<i64>,
}

/// A versioned calibration snapshot of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCalibration {
    /// Device name.
    pub name: String,
    /// Device version.
    pub version: String,
    /// Per-qubit calibration, indexed by qubit.
    pub qubits: Vec<QubitCalibration>,
    /// Per-resonator calibration, indexed by qubit.
    #[serde(default)]
    pub resonators: Option<Vec<ResonatorCalibration>>,
    /// Per-coupler calibration, indexed by coupler.
    #[serde(default)]
    pub couplers: Option<Vec<CouplerCalibration>>,
    /// Readout discriminators, passed through untouched.
    #[serde(default)]
    pub discriminators: Option<serde_json::Map<String, serde_json::Value>>,
    /// Snapshot token.
    pub last_calibrated: String,
}

impl DeviceCalibration {
    /// Calibration of qubit `index`.
    pub fn qubit(&self, index: u32) -> CompileResult<&QubitCalibration> {
        self.qubits
            .get(index as usize)
            .ok_or(CompileError::MissingCalibration {
                component: "qubit",
                index,
                field: "qubits",
            })
    }

    /// Calibration of the resonator reading out qubit `index`.
    pub fn resonator(&self, index: u32) -> CompileResult<&ResonatorCalibration> {
        self.resonators
            .as_deref()
            .and_then(|r| r.get(index as usize))
            .ok_or(CompileError::MissingCalibration {
                component: "resonator",
                index,
                field: "resonators",
            })
    }

    /// Calibration of coupler `index`.
    pub fn coupler(&self, index: u32) -> CompileResult<&CouplerCalibration> {
        self.couplers
            .as_deref()
            .and_then(|c| c.get(index as usize))
            .ok_or(CompileError::MissingCalibration {
                component: "coupler",
                index,
                field: "couplers",
            })
    }
}
