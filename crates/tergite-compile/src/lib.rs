//! Tergite instruction compiler
//!
//! Turns a device calibration snapshot into pulse implementations of the
//! native gate set, lowers circuits onto them and assembles the result into
//! the payload format the control service runs.
//!
//! The pipeline, one stage per module:
//!
//! - [`calibration`]: the snapshot documents published per device
//! - [`templates`]: parameterized schedules for `rx`, `rz`, `delay`, `reset`,
//!   `measure` and `cz`
//! - [`target`]: the `(gate, qubits) -> schedule` table of a backend
//! - [`circuit`]: lowering of gate-level circuits
//! - [`qobj`]: payload assembly
//! - [`rle`]: waveform compression applied before upload
//!
//! # Example
//!
//! ```rust,no_run
//! use tergite_compile::{
//!     AssembleContext, Circuit, CouplerTable, CouplingMap, DeviceCalibration, DeviceSpec,
//!     RunOptions, assemble, build_target, lower,
//! };
//!
//! # fn snapshot() -> DeviceCalibration { unimplemented!() }
//! let calibration: DeviceCalibration = snapshot();
//! let coupling = CouplingMap::from_pairs(&[(0, 1), (1, 0)]);
//! let couplers = CouplerTable::from_entries(&[((0, 1), 0), ((1, 0), 0)]);
//! let spec = DeviceSpec {
//!     name: "loke",
//!     num_qubits: 2,
//!     dt: Some(1e-9),
//!     characterized: true,
//!     coupling: &coupling,
//!     couplers: &couplers,
//! };
//! let target = build_target(&spec, &calibration)?;
//!
//! let mut circuit = Circuit::new("bell", 2, 2);
//! circuit.rx(0, std::f64::consts::FRAC_PI_2).cz(0, 1).measure_all();
//! let schedule = lower(&circuit, &target)?;
//!
//! let ctx = AssembleContext::new("loke", "2024.04.0", 2, 2);
//! let qobj = assemble(&[schedule], &RunOptions::default(), &ctx)?;
//! # Ok::<(), tergite_compile::CompileError>(())
//! ```

pub mod calibration;
pub mod circuit;
pub mod coupling;
pub mod error;
pub mod qobj;
pub mod rle;
pub mod target;
pub mod templates;

pub use calibration::{
    CalibrationScalar, CalibrationValue, CouplerCalibration, DeviceCalibration, QubitCalibration,
    ResonatorCalibration,
};
pub use circuit::{Circuit, Experiment, Operation, lower};
pub use coupling::{CouplerTable, CouplingMap};
pub use error::{CompileError, CompileResult};
pub use qobj::{
    AssembleContext, DEFAULT_SHOTS, MeasReturn, PARAMETRIC_SHAPES, PulseQobj, RunOptions, assemble,
};
pub use rle::{RleRun, compress_qobj, decompress_qobj};
pub use target::{DeviceSpec, InstructionEntry, Target, build_target, declare_gates};
