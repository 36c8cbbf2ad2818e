//! Gate-level circuits and their lowering onto a [`Target`].

use serde::{Deserialize, Serialize};
use tergite_pulse::{Bindings, Channel, Schedule, ScheduleBlock};
use tracing::trace;

use crate::error::{CompileError, CompileResult};
use crate::target::Target;

/// Name of the scheduling barrier pseudo-gate.
pub const BARRIER: &str = "barrier";

/// One gate application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Gate name, e.g. `rx`.
    pub name: String,
    /// Qubits the gate acts on.
    pub qubits: Vec<u32>,
    /// Numeric parameters, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<f64>,
}

/// A gate-level circuit already mapped onto physical qubits.
///
/// Measurements write qubit `q` into memory slot `q`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    /// Circuit name, used as the experiment name.
    pub name: String,
    /// Number of qubits.
    pub num_qubits: u32,
    /// Number of classical bits.
    #[serde(default)]
    pub num_clbits: u32,
    /// Operations in program order.
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_clbits,
            operations: Vec::new(),
        }
    }

    /// Append an arbitrary operation.
    pub fn push(&mut self, name: &str, qubits: &[u32], params: &[f64]) -> &mut Self {
        self.operations.push(Operation {
            name: name.to_string(),
            qubits: qubits.to_vec(),
            params: params.to_vec(),
        });
        self
    }

    /// Rotation about X by `theta`.
    pub fn rx(&mut self, qubit: u32, theta: f64) -> &mut Self {
        self.push("rx", &[qubit], &[theta])
    }

    /// Virtual rotation about Z by `lambda`.
    pub fn rz(&mut self, qubit: u32, lambda: f64) -> &mut Self {
        self.push("rz", &[qubit], &[lambda])
    }

    /// Controlled-Z.
    pub fn cz(&mut self, control: u32, target: u32) -> &mut Self {
        self.push("cz", &[control, target], &[])
    }

    /// Idle for `tau` samples.
    pub fn delay(&mut self, qubit: u32, tau: f64) -> &mut Self {
        self.push("delay", &[qubit], &[tau])
    }

    /// Reset to the ground state.
    pub fn reset(&mut self, qubit: u32) -> &mut Self {
        self.push("reset", &[qubit], &[])
    }

    /// Measure into the qubit's memory slot.
    pub fn measure(&mut self, qubit: u32) -> &mut Self {
        self.push("measure", &[qubit], &[])
    }

    /// Measure every qubit.
    pub fn measure_all(&mut self) -> &mut Self {
        for q in 0..self.num_qubits {
            self.measure(q);
        }
        self
    }

    /// Align the listed qubits.
    pub fn barrier(&mut self, qubits: &[u32]) -> &mut Self {
        self.push(BARRIER, qubits, &[])
    }

    fn validate(&self) -> CompileResult<()> {
        for op in &self.operations {
            if let Some(&q) = op.qubits.iter().find(|&&q| q >= self.num_qubits) {
                return Err(CompileError::InvalidCircuit {
                    name: self.name.clone(),
                    reason: format!(
                        "operation '{}' uses qubit {q} but the circuit has {} qubit(s)",
                        op.name, self.num_qubits
                    ),
                });
            }
        }
        Ok(())
    }
}

/// One experiment submitted to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Experiment {
    /// Gate-level circuit, lowered through the target.
    Circuit(Circuit),
    /// Pulse schedule used as is; it must be fully bound.
    Schedule(ScheduleBlock),
}

impl Experiment {
    /// Experiment name.
    pub fn name(&self) -> &str {
        match self {
            Experiment::Circuit(c) => &c.name,
            Experiment::Schedule(s) => &s.name,
        }
    }

    /// Produce the concrete schedule of the experiment.
    pub fn to_schedule(&self, target: &Target) -> CompileResult<Schedule> {
        match self {
            Experiment::Circuit(circuit) => lower(circuit, target),
            Experiment::Schedule(block) => Ok(block.bind(&Bindings::default())?),
        }
    }
}

impl From<Circuit> for Experiment {
    fn from(circuit: Circuit) -> Self {
        Experiment::Circuit(circuit)
    }
}

impl From<ScheduleBlock> for Experiment {
    fn from(block: ScheduleBlock) -> Self {
        Experiment::Schedule(block)
    }
}

fn qubit_channels(qubits: &[u32]) -> Vec<Channel> {
    qubits
        .iter()
        .flat_map(|&q| [Channel::Drive(q), Channel::Measure(q), Channel::Acquire(q)])
        .collect()
}

/// Lower a circuit to a pulse schedule using the target's implementations.
pub fn lower(circuit: &Circuit, target: &Target) -> CompileResult<Schedule> {
    circuit.validate()?;
    let mut schedule = Schedule::new(circuit.name.clone());

    for op in &circuit.operations {
        if op.name == BARRIER {
            schedule.align(&qubit_channels(&op.qubits));
            continue;
        }

        let entry = target.get(&op.name, &op.qubits)?;
        if entry.parameters.len() != op.params.len() {
            return Err(CompileError::ParameterCount {
                gate: op.name.clone(),
                expected: entry.parameters.len(),
                got: op.params.len(),
            });
        }
        let block = entry
            .schedule
            .as_ref()
            .ok_or_else(|| CompileError::NotImplemented {
                gate: op.name.clone(),
                qubits: op.qubits.clone(),
                backend: target.backend_name().to_string(),
            })?;

        let bindings: Bindings = entry
            .parameters
            .iter()
            .cloned()
            .zip(op.params.iter().copied())
            .collect();
        let bound = block.bind(&bindings)?;
        trace!(gate = %op.name, qubits = ?op.qubits, duration = bound.duration(), "lowered operation");
        schedule.append(&bound);
    }

    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::{CouplerTable, CouplingMap};
    use crate::target::{DeviceSpec, build_target, declare_gates};
    use crate::templates::fixtures::{DT, snapshot};
    use tergite_pulse::{BlockInstruction, Instruction, PulseShape};

    fn target() -> Target {
        let coupling = CouplingMap::from_pairs(&[(0, 1), (1, 0)]);
        let couplers = CouplerTable::from_entries(&[((0, 1), 0), ((1, 0), 0)]);
        let spec = DeviceSpec {
            name: "loke",
            num_qubits: 2,
            dt: Some(DT),
            characterized: true,
            coupling: &coupling,
            couplers: &couplers,
        };
        build_target(&spec, &snapshot("t1", 0.4)).unwrap()
    }

    #[test]
    fn test_lower_rx_then_measure() {
        let mut circuit = Circuit::new("bell", 2, 2);
        circuit.rx(0, std::f64::consts::PI).measure(0);
        let schedule = lower(&circuit, &target()).unwrap();

        assert_eq!(schedule.name, "bell");
        assert_eq!(schedule.max_memory_slot(), Some(0));
        let acquire = schedule
            .instructions()
            .iter()
            .find(|t| matches!(t.instruction, Instruction::Acquire { .. }))
            .unwrap();
        // The readout shares no channel with the drive pulse.
        assert_eq!(acquire.t0, 300);
    }

    #[test]
    fn test_barrier_orders_readout_after_drive() {
        let mut circuit = Circuit::new("ordered", 1, 1);
        circuit.rx(0, 1.0).barrier(&[0]).measure(0);
        let schedule = lower(&circuit, &target()).unwrap();
        let acquire = schedule
            .instructions()
            .iter()
            .find(|t| matches!(t.instruction, Instruction::Acquire { .. }))
            .unwrap();
        assert_eq!(acquire.t0, 56 + 300);
    }

    #[test]
    fn test_cz_blocks_both_drives() {
        let mut circuit = Circuit::new("cz", 2, 0);
        circuit.cz(0, 1).rx(1, 1.0);
        let schedule = lower(&circuit, &target()).unwrap();
        let cz_len = schedule.channel_end(Channel::Control(0));
        let rx = schedule
            .instructions()
            .iter()
            .find(|t| matches!(t.instruction, Instruction::Play { channel: Channel::Drive(1), .. }))
            .unwrap();
        assert_eq!(rx.t0, cz_len);
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let mut circuit = Circuit::new("bad", 1, 0);
        circuit.push("rx", &[0], &[]);
        let err = lower(&circuit, &target()).unwrap_err();
        assert!(matches!(err, CompileError::ParameterCount { expected: 1, got: 0, .. }));
    }

    #[test]
    fn test_unknown_gate_rejected() {
        let mut circuit = Circuit::new("h", 1, 0);
        circuit.push("h", &[0], &[]);
        let err = lower(&circuit, &target()).unwrap_err();
        assert!(matches!(err, CompileError::NotImplemented { .. }));
    }

    #[test]
    fn test_qubit_out_of_range() {
        let mut circuit = Circuit::new("wide", 1, 0);
        circuit.rx(3, 1.0);
        let err = lower(&circuit, &target()).unwrap_err();
        assert!(err.to_string().contains("qubit 3"));
    }

    #[test]
    fn test_gate_declarations_cannot_be_lowered() {
        let coupling = CouplingMap::default();
        let couplers = CouplerTable::default();
        let spec = DeviceSpec {
            name: "qasm",
            num_qubits: 1,
            dt: None,
            characterized: true,
            coupling: &coupling,
            couplers: &couplers,
        };
        let mut circuit = Circuit::new("c", 1, 0);
        circuit.reset(0);
        let err = lower(&circuit, &declare_gates(&spec)).unwrap_err();
        assert!(matches!(err, CompileError::NotImplemented { backend, .. } if backend == "qasm"));
    }

    #[test]
    fn test_schedule_experiment_must_be_bound() {
        let block = ScheduleBlock::new("free").with(BlockInstruction::Play {
            pulse: PulseShape::Constant {
                duration: "tau".into(),
                amp: 0.1.into(),
            },
            channel: Channel::Drive(0),
            label: None,
        });
        let err = Experiment::from(block).to_schedule(&target()).unwrap_err();
        assert!(err.to_string().contains("tau"));
    }

    #[test]
    fn test_circuit_json() {
        let json = r#"{"name": "c", "num_qubits": 1, "operations": [{"name": "rx", "qubits": [0], "params": [1.5]}]}"#;
        let circuit: Circuit = serde_json::from_str(json).unwrap();
        assert_eq!(circuit.num_clbits, 0);
        assert_eq!(circuit.operations[0].params, vec![1.5]);
    }
}
