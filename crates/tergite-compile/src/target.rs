//! The instruction-set declaration of a backend.
//!
//! A [`Target`] maps `(gate, qubits)` to the schedule implementing it. It is
//! derived from one calibration snapshot and must be rebuilt when the
//! snapshot changes.

use std::collections::BTreeMap;

use tergite_pulse::ScheduleBlock;
use tracing::debug;

use crate::calibration::DeviceCalibration;
use crate::coupling::{CouplerTable, CouplingMap};
use crate::error::{CompileError, CompileResult};
use crate::templates::{self, DeviceContext, LAMBDA, TAU, THETA};

/// Static device facts needed to build a target.
#[derive(Debug, Clone, Copy)]
pub struct DeviceSpec<'a> {
    /// Backend name.
    pub name: &'a str,
    /// Number of qubits.
    pub num_qubits: u32,
    /// Sample time in seconds.
    pub dt: Option<f64>,
    /// Whether the device has calibration data.
    pub characterized: bool,
    /// Coupled pairs, self-loops removed.
    pub coupling: &'a CouplingMap,
    /// Coupler serving each pair.
    pub couplers: &'a CouplerTable,
}

/// How one gate is implemented on one qubit tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionEntry {
    /// Pulse implementation; `None` for gate-level backends.
    pub schedule: Option<ScheduleBlock>,
    /// Parameter names in the order a circuit operation supplies them.
    pub parameters: Vec<String>,
    /// Error rate, when the calibration reports one.
    pub error: Option<f64>,
}

/// Declared instructions of a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    backend: String,
    num_qubits: u32,
    dt: Option<f64>,
    calibration_date: Option<String>,
    gates: BTreeMap<String, BTreeMap<Vec<u32>, InstructionEntry>>,
}

impl Target {
    /// Create an empty target.
    pub fn new(backend: impl Into<String>, num_qubits: u32, dt: Option<f64>) -> Self {
        Self {
            backend: backend.into(),
            num_qubits,
            dt,
            calibration_date: None,
            gates: BTreeMap::new(),
        }
    }

    /// Backend the target was built for.
    pub fn backend_name(&self) -> &str {
        &self.backend
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Sample time in seconds.
    pub fn dt(&self) -> Option<f64> {
        self.dt
    }

    /// `last_calibrated` of the snapshot the schedules were compiled from.
    pub fn calibration_date(&self) -> Option<&str> {
        self.calibration_date.as_deref()
    }

    /// Register an implementation of `gate` on `qubits`.
    pub fn add_instruction(&mut self, gate: &str, qubits: Vec<u32>, entry: InstructionEntry) {
        self.gates
            .entry(gate.to_string())
            .or_default()
            .insert(qubits, entry);
    }

    /// Implementation of `gate` on `qubits`.
    pub fn get(&self, gate: &str, qubits: &[u32]) -> CompileResult<&InstructionEntry> {
        self.gates
            .get(gate)
            .and_then(|by_qubits| by_qubits.get(qubits))
            .ok_or_else(|| CompileError::NotImplemented {
                gate: gate.to_string(),
                qubits: qubits.to_vec(),
                backend: self.backend.clone(),
            })
    }

    /// Whether `gate` is declared on `qubits`.
    pub fn supports(&self, gate: &str, qubits: &[u32]) -> bool {
        self.get(gate, qubits).is_ok()
    }

    /// Declared gate names, sorted.
    pub fn instruction_names(&self) -> impl Iterator<Item = &str> {
        self.gates.keys().map(String::as_str)
    }

    /// Qubit tuples `gate` is declared on.
    pub fn qargs(&self, gate: &str) -> Vec<&[u32]> {
        self.gates
            .get(gate)
            .map(|by_qubits| by_qubits.keys().map(Vec::as_slice).collect())
            .unwrap_or_default()
    }

    /// Total number of `(gate, qubits)` entries.
    pub fn len(&self) -> usize {
        self.gates.values().map(BTreeMap::len).sum()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

fn entry(schedule: Option<ScheduleBlock>, parameters: &[&str], error: Option<f64>) -> InstructionEntry {
    InstructionEntry {
        schedule,
        parameters: parameters.iter().map(|p| (*p).to_string()).collect(),
        error,
    }
}

/// Compile the pulse-level target of a device from one calibration snapshot.
///
/// An uncharacterized device gets an empty target.
pub fn build_target(spec: &DeviceSpec<'_>, calibration: &DeviceCalibration) -> CompileResult<Target> {
    let mut target = Target::new(spec.name, spec.num_qubits, spec.dt);
    target.calibration_date = Some(calibration.last_calibrated.clone());

    if !spec.characterized {
        debug!(backend = spec.name, "device is not characterized, target left empty");
        return Ok(target);
    }

    let dt = spec
        .dt
        .ok_or_else(|| CompileError::MissingSampleTime(spec.name.to_string()))?;
    let ctx = DeviceContext {
        dt,
        couplers: spec.couplers.clone(),
    };

    for q in 0..spec.num_qubits {
        let readout_error = calibration
            .qubit(q)
            .ok()
            .and_then(|c| c.readout_assignment_error.as_ref())
            .and_then(|v| v.as_f64());

        target.add_instruction("reset", vec![q], entry(Some(templates::reset(q)), &[], None));
        target.add_instruction(
            "rx",
            vec![q],
            entry(Some(templates::rx(&ctx, calibration, q)?), &[THETA], None),
        );
        target.add_instruction("rz", vec![q], entry(Some(templates::rz(q)), &[LAMBDA], None));
        target.add_instruction("delay", vec![q], entry(Some(templates::delay(q)), &[TAU], None));
        target.add_instruction(
            "measure",
            vec![q],
            entry(
                Some(templates::measure(&ctx, calibration, &[q])?),
                &[],
                readout_error,
            ),
        );
    }

    for &(control, tgt) in spec.coupling.coupled_pairs() {
        target.add_instruction(
            "cz",
            vec![control, tgt],
            entry(Some(templates::cz(&ctx, calibration, control, tgt)?), &[], None),
        );
    }

    debug!(
        backend = spec.name,
        instructions = target.len(),
        last_calibrated = %calibration.last_calibrated,
        "built target"
    );
    Ok(target)
}

/// Gate-level declarations without pulse schedules.
pub fn declare_gates(spec: &DeviceSpec<'_>) -> Target {
    let mut target = Target::new(spec.name, spec.num_qubits, spec.dt);
    for q in 0..spec.num_qubits {
        target.add_instruction("reset", vec![q], entry(None, &[], None));
        target.add_instruction("rx", vec![q], entry(None, &[THETA], None));
        target.add_instruction("rz", vec![q], entry(None, &[LAMBDA], None));
        target.add_instruction("delay", vec![q], entry(None, &[TAU], None));
        target.add_instruction("measure", vec![q], entry(None, &[], None));
    }
    for &(control, tgt) in spec.coupling.coupled_pairs() {
        target.add_instruction("cz", vec![control, tgt], entry(None, &[], None));
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::fixtures::{DT, snapshot};

    fn spec<'a>(coupling: &'a CouplingMap, couplers: &'a CouplerTable, characterized: bool) -> DeviceSpec<'a> {
        DeviceSpec {
            name: "loke",
            num_qubits: 2,
            dt: Some(DT),
            characterized,
            coupling,
            couplers,
        }
    }

    fn topology() -> (CouplingMap, CouplerTable) {
        (
            CouplingMap::from_pairs(&[(0, 0), (0, 1), (1, 0)]),
            CouplerTable::from_entries(&[((0, 1), 0), ((1, 0), 0)]),
        )
    }

    #[test]
    fn test_build_full_target() {
        let (coupling, couplers) = topology();
        let target = build_target(&spec(&coupling, &couplers, true), &snapshot("t1", 0.4)).unwrap();

        let names: Vec<&str> = target.instruction_names().collect();
        assert_eq!(names, vec!["cz", "delay", "measure", "reset", "rx", "rz"]);
        assert_eq!(target.qargs("rx").len(), 2);
        assert_eq!(target.qargs("cz"), vec![&[0u32, 1][..], &[1u32, 0][..]]);
        assert!(!target.supports("cz", &[0, 0]));
        assert_eq!(target.calibration_date(), Some("t1"));
        assert_eq!(target.get("rx", &[0]).unwrap().parameters, vec![THETA]);
    }

    #[test]
    fn test_uncharacterized_device_is_empty() {
        let (coupling, couplers) = topology();
        let target = build_target(&spec(&coupling, &couplers, false), &snapshot("t1", 0.4)).unwrap();
        assert!(target.is_empty());
        let err = target.get("rx", &[0]).unwrap_err();
        assert!(matches!(err, CompileError::NotImplemented { .. }));
    }

    #[test]
    fn test_missing_dt() {
        let (coupling, couplers) = topology();
        let mut s = spec(&coupling, &couplers, true);
        s.dt = None;
        let err = build_target(&s, &snapshot("t1", 0.4)).unwrap_err();
        assert!(matches!(err, CompileError::MissingSampleTime(name) if name == "loke"));
    }

    #[test]
    fn test_unknown_gate_names_backend() {
        let (coupling, couplers) = topology();
        let target = build_target(&spec(&coupling, &couplers, true), &snapshot("t1", 0.4)).unwrap();
        let err = target.get("h", &[0]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "not implemented: gate 'h' on qubits [0] for backend 'loke'"
        );
    }

    #[test]
    fn test_gate_declarations_have_no_schedules() {
        let (coupling, couplers) = topology();
        let target = declare_gates(&spec(&coupling, &couplers, true));
        assert_eq!(target.len(), 2 * 5 + 2);
        assert!(target.get("measure", &[1]).unwrap().schedule.is_none());
    }
}
