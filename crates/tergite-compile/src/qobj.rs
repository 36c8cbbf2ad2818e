//! Pulse payload assembly.
//!
//! Converts concrete [`Schedule`]s into the pulse-qobj document the control
//! service executes. Frequencies on the wire are in GHz, complex amplitudes are
//! `[re, im]` pairs, and sampled waveforms live once in the shared
//! `pulse_library`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tergite_pulse::{Channel, Instruction, Pulse, Schedule, Waveform};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CompileError, CompileResult};

/// Shots used when the caller does not set any.
pub const DEFAULT_SHOTS: u32 = 2000;

/// Schema version written into every payload.
pub const QOBJ_SCHEMA_VERSION: &str = "1.2.0";

/// Parametric pulse shapes the control service plays natively.
pub const PARAMETRIC_SHAPES: &[&str] = &[
    "constant",
    "zero",
    "square",
    "sawtooth",
    "triangle",
    "cos",
    "sin",
    "gaussian",
    "gaussian_deriv",
    "sech",
    "sech_deriv",
    "gaussian_square",
    "drag",
    "wacqt_cz_gate_pulse",
];

const GHZ: f64 = 1e9;

/// How acquisitions are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasReturn {
    /// Averaged over shots.
    #[default]
    Avg,
    /// One value per shot.
    Single,
}

/// Per-run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Number of repetitions.
    pub shots: u32,
    /// 0 raw, 1 kerneled, 2 discriminated.
    pub meas_level: u8,
    /// Averaging of returned data.
    pub meas_return: MeasReturn,
    /// Repetition period in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rep_time: Option<f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            shots: DEFAULT_SHOTS,
            meas_level: 2,
            meas_return: MeasReturn::Avg,
            rep_time: None,
        }
    }
}

impl RunOptions {
    /// Options with `shots` repetitions.
    pub fn with_shots(shots: u32) -> Self {
        Self {
            shots,
            ..Self::default()
        }
    }

    /// Reject settings the service cannot run.
    pub fn validate(&self) -> CompileResult<()> {
        if self.shots < 1 {
            return Err(CompileError::InvalidOptions(format!(
                "shots must be at least 1, got {}",
                self.shots
            )));
        }
        if self.meas_level > 2 {
            return Err(CompileError::InvalidOptions(format!(
                "meas_level must be 0, 1 or 2, got {}",
                self.meas_level
            )));
        }
        if let Some(rep_time) = self.rep_time {
            if !rep_time.is_finite() || rep_time <= 0.0 {
                return Err(CompileError::InvalidOptions(format!(
                    "rep_time must be positive, got {rep_time}"
                )));
            }
        }
        Ok(())
    }
}

/// Device facts the payload depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembleContext {
    /// Backend name, copied into the header.
    pub backend_name: String,
    /// Backend version, copied into the header.
    pub backend_version: String,
    /// Qubit LO frequencies in Hz.
    pub qubit_lo_freq: Vec<f64>,
    /// Readout LO frequencies in Hz.
    pub meas_lo_freq: Vec<f64>,
    /// Shapes that may be sent as parametric pulses.
    pub parametric_pulses: Vec<String>,
}

impl AssembleContext {
    /// Context with zeroed LOs and the full parametric shape list.
    pub fn new(
        backend_name: impl Into<String>,
        backend_version: impl Into<String>,
        num_qubits: usize,
        num_resonators: usize,
    ) -> Self {
        Self {
            backend_name: backend_name.into(),
            backend_version: backend_version.into(),
            qubit_lo_freq: vec![0.0; num_qubits],
            meas_lo_freq: vec![0.0; num_resonators],
            parametric_pulses: PARAMETRIC_SHAPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// A sampled waveform in the shared library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseLibraryItem {
    /// Name referenced by play instructions.
    pub name: String,
    /// Samples as `[re, im]`.
    pub samples: Vec<[f64; 2]>,
}

/// One payload instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QobjInstruction {
    /// Instruction name, or the library pulse name for sampled plays.
    pub name: String,
    /// Start time in samples.
    pub t0: u64,
    /// Channel wire name, e.g. `d0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ch: Option<String>,
    /// Frequency in GHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    /// Phase in radians.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<f64>,
    /// Duration in samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Acquired qubits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qubits: Option<Vec<u32>>,
    /// Destination slots, parallel to `qubits`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_slot: Option<Vec<u32>>,
    /// Parametric shape name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_shape: Option<String>,
    /// Parametric shape parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, Value>>,
    /// Free-form label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Header of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentHeader {
    /// Experiment name.
    pub name: String,
    /// Memory slots written.
    pub memory_slots: u32,
}

/// One experiment of a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QobjExperiment {
    /// Header echoed back in results.
    pub header: ExperimentHeader,
    /// Instructions ordered by start time.
    pub instructions: Vec<QobjInstruction>,
}

/// Payload-wide header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QobjHeader {
    /// Backend name.
    pub backend_name: String,
    /// Backend version.
    pub backend_version: String,
}

/// Run configuration of a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QobjConfig {
    pub shots: u32,
    pub meas_level: u8,
    pub meas_return: MeasReturn,
    pub memory_slots: u32,
    pub memory_slot_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rep_time: Option<f64>,
    /// GHz.
    pub qubit_lo_freq: Vec<f64>,
    /// GHz.
    pub meas_lo_freq: Vec<f64>,
    pub pulse_library: Vec<PulseLibraryItem>,
    pub parametric_pulses: Vec<String>,
    pub init_qubits: bool,
}

/// An assembled pulse payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseQobj {
    /// Unique payload id.
    pub qobj_id: String,
    /// Always `PULSE`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload schema version.
    pub schema_version: String,
    /// Backend header.
    pub header: QobjHeader,
    /// Run configuration.
    pub config: QobjConfig,
    /// Experiments in submission order.
    pub experiments: Vec<QobjExperiment>,
}

impl PulseQobj {
    /// Payload as a JSON value.
    pub fn to_value(&self) -> CompileResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Number of experiments.
    pub fn num_experiments(&self) -> usize {
        self.experiments.len()
    }
}

struct Assembler<'a> {
    ctx: &'a AssembleContext,
    library: Vec<PulseLibraryItem>,
}

impl Assembler<'_> {
    fn is_parametric(&self, shape: &str) -> bool {
        self.ctx.parametric_pulses.iter().any(|s| s == shape)
    }

    fn add_waveform(&mut self, waveform: &Waveform) -> CompileResult<()> {
        let samples: Vec<[f64; 2]> = waveform.samples.iter().map(|c| [c.re, c.im]).collect();
        self.add_samples(&waveform.name, samples)
    }

    fn add_samples(&mut self, name: &str, samples: Vec<[f64; 2]>) -> CompileResult<()> {
        match self.library.iter().find(|item| item.name == name) {
            Some(existing) if existing.samples == samples => Ok(()),
            Some(_) => Err(CompileError::MalformedPayload(format!(
                "waveform name '{name}' is used for different samples"
            ))),
            None => {
                self.library.push(PulseLibraryItem {
                    name: name.to_string(),
                    samples,
                });
                Ok(())
            }
        }
    }

    fn play(
        &mut self,
        t0: u64,
        pulse: &Pulse,
        channel: Channel,
        label: &Option<String>,
    ) -> CompileResult<QobjInstruction> {
        let base = QobjInstruction {
            t0,
            ch: Some(channel.to_string()),
            label: label.clone(),
            ..QobjInstruction::default()
        };

        if let Pulse::Waveform(waveform) = pulse {
            self.add_waveform(waveform)?;
            return Ok(QobjInstruction {
                name: waveform.name.clone(),
                ..base
            });
        }

        let shape = pulse.shape_name().unwrap_or_default();
        if self.is_parametric(shape) {
            return Ok(QobjInstruction {
                name: "parametric_pulse".into(),
                pulse_shape: Some(shape.to_string()),
                parameters: Some(parametric_parameters(pulse)),
                ..base
            });
        }

        let (name, samples) = sample(pulse)?;
        self.add_samples(&name, samples)?;
        Ok(QobjInstruction { name, ..base })
    }

    fn experiment(&mut self, schedule: &Schedule) -> CompileResult<QobjExperiment> {
        let mut instructions = Vec::with_capacity(schedule.instructions().len());
        // Acquisitions sharing a start time and window form one instruction.
        let mut acquires: BTreeMap<(u64, u64), (Vec<u32>, Vec<u32>)> = BTreeMap::new();

        for timed in schedule.instructions() {
            let t0 = timed.t0;
            match &timed.instruction {
                Instruction::SetFrequency { frequency, channel } => {
                    instructions.push(QobjInstruction {
                        name: "setf".into(),
                        t0,
                        ch: Some(channel.to_string()),
                        frequency: Some(frequency / GHZ),
                        ..QobjInstruction::default()
                    });
                }
                Instruction::ShiftPhase { phase, channel } => {
                    instructions.push(QobjInstruction {
                        name: "fc".into(),
                        t0,
                        ch: Some(channel.to_string()),
                        phase: Some(*phase),
                        ..QobjInstruction::default()
                    });
                }
                Instruction::Play {
                    pulse,
                    channel,
                    label,
                } => instructions.push(self.play(t0, pulse, *channel, label)?),
                Instruction::Delay {
                    channel: Channel::Acquire(_),
                    ..
                } => {}
                Instruction::Delay {
                    duration,
                    channel,
                    label,
                } => {
                    instructions.push(QobjInstruction {
                        name: "delay".into(),
                        t0,
                        ch: Some(channel.to_string()),
                        duration: Some(*duration),
                        label: label.clone(),
                        ..QobjInstruction::default()
                    });
                }
                Instruction::Acquire {
                    duration,
                    channel,
                    slot,
                    ..
                } => {
                    let entry = acquires.entry((t0, *duration)).or_default();
                    entry.0.push(channel.index());
                    entry.1.push(slot.0);
                }
            }
        }

        for ((t0, duration), (qubits, slots)) in acquires {
            instructions.push(QobjInstruction {
                name: "acquire".into(),
                t0,
                duration: Some(duration),
                qubits: Some(qubits),
                memory_slot: Some(slots),
                ..QobjInstruction::default()
            });
        }
        instructions.sort_by_key(|i| i.t0);

        Ok(QobjExperiment {
            header: ExperimentHeader {
                name: schedule.name.clone(),
                memory_slots: memory_slots(schedule),
            },
            instructions,
        })
    }
}

fn memory_slots(schedule: &Schedule) -> u32 {
    schedule.max_memory_slot().map_or(0, |slot| slot + 1)
}

fn complex(amp: f64) -> Value {
    json!([amp, 0.0])
}

fn parametric_parameters(pulse: &Pulse) -> BTreeMap<String, Value> {
    let mut params = BTreeMap::new();
    match pulse {
        Pulse::Gaussian {
            duration,
            amp,
            sigma,
        } => {
            params.insert("duration".into(), json!(duration));
            params.insert("amp".into(), complex(*amp));
            params.insert("sigma".into(), json!(sigma));
        }
        Pulse::Constant { duration, amp } => {
            params.insert("duration".into(), json!(duration));
            params.insert("amp".into(), complex(*amp));
        }
        Pulse::CzFlatTop {
            wait_before,
            rise,
            flat,
            amp,
            dc_bias,
            phase_offset,
        } => {
            params.insert("duration".into(), json!(pulse.duration()));
            params.insert("wait_before".into(), json!(wait_before));
            params.insert("rise".into(), json!(rise));
            params.insert("flat".into(), json!(flat));
            params.insert("amp".into(), complex(*amp));
            params.insert("dc_bias".into(), json!(dc_bias));
            params.insert("phase_offset".into(), json!(phase_offset));
        }
        Pulse::Waveform(_) => {}
    }
    params
}

/// Sample a parametric pulse the backend does not play natively.
fn sample(pulse: &Pulse) -> CompileResult<(String, Vec<[f64; 2]>)> {
    match pulse {
        Pulse::Gaussian {
            duration,
            amp,
            sigma,
        } => {
            let center = *duration as f64 / 2.0;
            let samples = (0..*duration)
                .map(|t| {
                    let x = t as f64 + 0.5 - center;
                    [amp * (-0.5 * (x / sigma).powi(2)).exp(), 0.0]
                })
                .collect();
            Ok((format!("gaussian_{duration}_{amp}_{sigma}"), samples))
        }
        Pulse::Constant { duration, amp } => Ok((
            format!("constant_{duration}_{amp}"),
            vec![[*amp, 0.0]; *duration as usize],
        )),
        other => Err(CompileError::UnsupportedPulse(
            other.shape_name().unwrap_or("waveform").to_string(),
        )),
    }
}

/// Assemble concrete schedules into a pulse payload.
pub fn assemble(
    schedules: &[Schedule],
    options: &RunOptions,
    ctx: &AssembleContext,
) -> CompileResult<PulseQobj> {
    options.validate()?;
    if schedules.is_empty() {
        return Err(CompileError::MalformedPayload(
            "at least one experiment is required".into(),
        ));
    }

    let mut assembler = Assembler {
        ctx,
        library: Vec::new(),
    };
    let experiments = schedules
        .iter()
        .map(|s| assembler.experiment(s))
        .collect::<CompileResult<Vec<_>>>()?;
    let memory_slots = experiments
        .iter()
        .map(|e| e.header.memory_slots)
        .max()
        .unwrap_or(0);

    let qobj = PulseQobj {
        qobj_id: Uuid::new_v4().to_string(),
        kind: "PULSE".into(),
        schema_version: QOBJ_SCHEMA_VERSION.into(),
        header: QobjHeader {
            backend_name: ctx.backend_name.clone(),
            backend_version: ctx.backend_version.clone(),
        },
        config: QobjConfig {
            shots: options.shots,
            meas_level: options.meas_level,
            meas_return: options.meas_return,
            memory_slots,
            memory_slot_size: 100,
            rep_time: options.rep_time,
            qubit_lo_freq: ctx.qubit_lo_freq.iter().map(|f| f / GHZ).collect(),
            meas_lo_freq: ctx.meas_lo_freq.iter().map(|f| f / GHZ).collect(),
            pulse_library: assembler.library,
            parametric_pulses: ctx.parametric_pulses.clone(),
            init_qubits: true,
        },
        experiments,
    };
    debug!(
        qobj_id = %qobj.qobj_id,
        experiments = qobj.experiments.len(),
        shots = options.shots,
        "assembled payload"
    );
    Ok(qobj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use tergite_pulse::MemorySlot;

    fn ctx() -> AssembleContext {
        AssembleContext::new("loke", "2024.04.0", 2, 2)
    }

    fn readout() -> Schedule {
        let mut s = Schedule::new("readout");
        s.push_asap(Instruction::SetFrequency {
            frequency: 5.1e9,
            channel: Channel::Drive(0),
        });
        s.push_asap(Instruction::Play {
            pulse: Pulse::Gaussian {
                duration: 56,
                amp: 0.4,
                sigma: 7.0,
            },
            channel: Channel::Drive(0),
            label: Some("RX q0".into()),
        });
        s.push_asap(Instruction::Delay {
            duration: 300,
            channel: Channel::Acquire(0),
            label: None,
        });
        s.push_asap(Instruction::Acquire {
            duration: 2500,
            channel: Channel::Acquire(0),
            slot: MemorySlot(0),
            label: None,
        });
        s.insert(
            300,
            Instruction::Acquire {
                duration: 2500,
                channel: Channel::Acquire(1),
                slot: MemorySlot(1),
                label: None,
            },
        );
        s
    }

    #[test]
    fn test_assemble_pulse_qobj() {
        let qobj = assemble(&[readout()], &RunOptions::default(), &ctx()).unwrap();
        let value = qobj.to_value().unwrap();

        assert_eq!(value["type"], "PULSE");
        assert_eq!(value["config"]["shots"], 2000);
        assert_eq!(value["config"]["meas_return"], "avg");
        assert_eq!(value["config"]["memory_slots"], 2);
        assert!(Uuid::parse_str(&qobj.qobj_id).is_ok());

        let instructions = &qobj.experiments[0].instructions;
        assert_eq!(instructions[0].name, "setf");
        assert_eq!(instructions[0].frequency, Some(5.1));
        assert_eq!(instructions[1].name, "parametric_pulse");
        assert_eq!(instructions[1].pulse_shape.as_deref(), Some("gaussian"));
        let params = instructions[1].parameters.as_ref().unwrap();
        assert_eq!(params["amp"], json!([0.4, 0.0]));

        // acquire-channel delays are dropped, parallel acquisitions bundled
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[2].qubits, Some(vec![0, 1]));
        assert_eq!(instructions[2].memory_slot, Some(vec![0, 1]));
        assert_eq!(instructions[2].t0, 300);
    }

    #[test]
    fn test_waveforms_deduplicated_by_name() {
        let wf = Waveform::new("flat", vec![Complex64::new(0.1, 0.0); 4]).unwrap();
        let mut s = Schedule::new("wf");
        for _ in 0..3 {
            s.push_asap(Instruction::Play {
                pulse: Pulse::Waveform(wf.clone()),
                channel: Channel::Drive(0),
                label: None,
            });
        }
        let qobj = assemble(&[s.clone(), s], &RunOptions::default(), &ctx()).unwrap();
        assert_eq!(qobj.config.pulse_library.len(), 1);
        assert_eq!(qobj.config.pulse_library[0].samples, vec![[0.1, 0.0]; 4]);
        assert_eq!(qobj.experiments[1].instructions[2].name, "flat");
        assert_eq!(qobj.experiments[1].instructions[2].t0, 8);
    }

    #[test]
    fn test_conflicting_waveform_names() {
        let a = Waveform::new("w", vec![Complex64::new(0.1, 0.0)]).unwrap();
        let b = Waveform::new("w", vec![Complex64::new(0.2, 0.0)]).unwrap();
        let mut s = Schedule::new("conflict");
        for wf in [a, b] {
            s.push_asap(Instruction::Play {
                pulse: Pulse::Waveform(wf),
                channel: Channel::Drive(0),
                label: None,
            });
        }
        let err = assemble(&[s], &RunOptions::default(), &ctx()).unwrap_err();
        assert!(matches!(err, CompileError::MalformedPayload(_)));
    }

    #[test]
    fn test_unlisted_shape_is_sampled() {
        let mut context = ctx();
        context.parametric_pulses.clear();
        let mut s = Schedule::new("sampled");
        s.push_asap(Instruction::Play {
            pulse: Pulse::Constant {
                duration: 16,
                amp: 0.05,
            },
            channel: Channel::Measure(0),
            label: None,
        });
        let qobj = assemble(&[s], &RunOptions::default(), &context).unwrap();
        let item = &qobj.config.pulse_library[0];
        assert_eq!(item.samples.len(), 16);
        assert_eq!(qobj.experiments[0].instructions[0].name, item.name);
    }

    #[test]
    fn test_unlisted_cz_shape_rejected() {
        let mut context = ctx();
        context.parametric_pulses = vec!["gaussian".into()];
        let mut s = Schedule::new("cz");
        s.push_asap(Instruction::Play {
            pulse: Pulse::CzFlatTop {
                wait_before: 8,
                rise: 24,
                flat: 200,
                amp: 0.08,
                dc_bias: 0.3,
                phase_offset: 0.0,
            },
            channel: Channel::Control(0),
            label: None,
        });
        let err = assemble(&[s], &RunOptions::default(), &context).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedPulse(shape) if shape == "wacqt_cz_gate_pulse"));
    }

    #[test]
    fn test_lo_frequencies_in_ghz() {
        let mut context = ctx();
        context.qubit_lo_freq = vec![4.8e9, 5.1e9];
        let qobj = assemble(&[readout()], &RunOptions::default(), &context).unwrap();
        assert_eq!(qobj.config.qubit_lo_freq, vec![4.8, 5.1]);
        assert_eq!(qobj.config.meas_lo_freq, vec![0.0, 0.0]);
    }

    #[test]
    fn test_zero_shots_rejected() {
        let err = assemble(&[readout()], &RunOptions::with_shots(0), &ctx()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid run options: shots must be at least 1, got 0"
        );
    }

    #[test]
    fn test_no_experiments_rejected() {
        assert!(assemble(&[], &RunOptions::default(), &ctx()).is_err());
    }
}
