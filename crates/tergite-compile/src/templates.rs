//! Gate-to-schedule templates.
//!
//! Each function turns one calibration snapshot into the pulse schedule that
//! implements a gate on specific qubits. Gate angles and delay lengths stay
//! symbolic ([`THETA`], [`LAMBDA`], [`TAU`]) so a template is compiled once
//! per snapshot and bound per circuit operation.
//!
//! Calibrated durations are in seconds and are converted to samples with the
//! backend's `dt`.

use tergite_pulse::{BlockInstruction, Channel, MemorySlot, ParameterExpr, PulseShape, ScheduleBlock};

use crate::calibration::{DeviceCalibration, require};
use crate::coupling::CouplerTable;
use crate::error::CompileResult;

/// Rotation angle of `rx`, in radians.
pub const THETA: &str = "theta";
/// Rotation angle of `rz`, in radians.
pub const LAMBDA: &str = "lambda_param";
/// Length of `delay`, in samples.
pub const TAU: &str = "tau";

/// Acquisition delay between readout start and integration window, in samples.
pub const TIME_OF_FLIGHT: u64 = 300;
/// Idle time used to let a qubit relax to its ground state, in samples.
pub const RESET_DURATION: u64 = 300 * 1000;

/// Backend properties the templates need besides the calibration.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    /// Sample time in seconds.
    pub dt: f64,
    /// Coupler serving each coupled pair.
    pub couplers: CouplerTable,
}

impl DeviceContext {
    /// Seconds to a whole number of samples.
    fn samples(&self, seconds: f64) -> f64 {
        (seconds / self.dt).round()
    }
}

fn constant(value: f64) -> ParameterExpr {
    ParameterExpr::constant(value)
}

/// Idle drive, readout and acquisition channels of `q` long enough to reset it.
pub fn reset(q: u32) -> ScheduleBlock {
    delay_block(q, constant(RESET_DURATION as f64), "Reset")
}

/// Idle drive, readout and acquisition channels of `q` for [`TAU`] samples.
pub fn delay(q: u32) -> ScheduleBlock {
    delay_block(q, ParameterExpr::param(TAU), "Delay")
}

fn delay_block(q: u32, duration: ParameterExpr, kind: &str) -> ScheduleBlock {
    let label = format!("{kind} q{q}");
    let mut block = ScheduleBlock::new(format!("{kind}(q{q})"));
    for channel in [Channel::Drive(q), Channel::Measure(q), Channel::Acquire(q)] {
        block.push(BlockInstruction::Delay {
            duration: duration.clone(),
            channel,
            label: Some(label.clone()),
        });
    }
    block
}

/// Rotation about X by [`THETA`].
///
/// A Gaussian π-pulse scaled linearly in amplitude: `θ = π` plays the
/// calibrated π-pulse, `θ = π/2` half its amplitude.
pub fn rx(ctx: &DeviceContext, cal: &DeviceCalibration, q: u32) -> CompileResult<ScheduleBlock> {
    let qubit = cal.qubit(q)?;
    let frequency = require(qubit.frequency.as_ref(), "qubit", q, "frequency")?;
    let pi_amp = require(qubit.pi_pulse_amplitude.as_ref(), "qubit", q, "pi_pulse_amplitude")?;
    let pi_duration = require(qubit.pi_pulse_duration.as_ref(), "qubit", q, "pi_pulse_duration")?;
    let sigma = require(qubit.pulse_sigma.as_ref(), "qubit", q, "pulse_sigma")?;

    let amp = ParameterExpr::param(THETA) / ParameterExpr::Pi * constant(pi_amp);
    Ok(ScheduleBlock::new(format!("RX(theta, q{q})"))
        .with(BlockInstruction::SetFrequency {
            frequency: constant(frequency),
            channel: Channel::Drive(q),
        })
        .with(BlockInstruction::Play {
            pulse: PulseShape::Gaussian {
                duration: constant(ctx.samples(pi_duration)),
                amp,
                sigma: constant(ctx.samples(sigma)),
            },
            channel: Channel::Drive(q),
            label: Some(format!("RX q{q}")),
        }))
}

/// Rotation about Z by [`LAMBDA`]: a virtual phase shift, no pulse.
pub fn rz(q: u32) -> ScheduleBlock {
    ScheduleBlock::new(format!("RZ(lambda, q{q})")).with(BlockInstruction::ShiftPhase {
        phase: ParameterExpr::param(LAMBDA),
        channel: Channel::Drive(q),
    })
}

/// Readout of every qubit in `qubits`, each into the memory slot of the same index.
pub fn measure(
    ctx: &DeviceContext,
    cal: &DeviceCalibration,
    qubits: &[u32],
) -> CompileResult<ScheduleBlock> {
    let names: Vec<String> = qubits.iter().map(|q| format!("q{q}")).collect();
    let mut block = ScheduleBlock::new(format!("Measure({})", names.join(", ")));

    for &q in qubits {
        let res = cal.resonator(q)?;
        let frequency = require(res.frequency.as_ref(), "resonator", q, "frequency")?;
        let amp = require(res.pulse_amplitude.as_ref(), "resonator", q, "pulse_amplitude")?;
        let duration = require(res.pulse_duration.as_ref(), "resonator", q, "pulse_duration")?;
        let window = require(
            res.acq_integration_time.as_ref(),
            "resonator",
            q,
            "acq_integration_time",
        )?;

        block
            .push(BlockInstruction::SetFrequency {
                frequency: constant(frequency),
                channel: Channel::Measure(q),
            })
            .push(BlockInstruction::Play {
                pulse: PulseShape::Constant {
                    duration: constant(ctx.samples(duration)),
                    amp: constant(amp),
                },
                channel: Channel::Measure(q),
                label: Some(format!("Readout q{q}")),
            })
            .push(BlockInstruction::Delay {
                duration: constant(TIME_OF_FLIGHT as f64),
                channel: Channel::Acquire(q),
                label: Some(format!("Time of flight q{q}")),
            })
            .push(BlockInstruction::Acquire {
                duration: constant(ctx.samples(window)),
                channel: Channel::Acquire(q),
                slot: MemorySlot(q),
                label: Some(format!("Integration window q{q}")),
            });
    }
    Ok(block)
}

/// Controlled-Z between `control` and `target` through their coupler.
///
/// The coupler is modulated at `|f_control - f_target| + anharmonicity +
/// frequency_detuning` with a flat-top envelope; both qubits' drive lines are
/// held idle for the whole gate.
pub fn cz(
    ctx: &DeviceContext,
    cal: &DeviceCalibration,
    control: u32,
    target: u32,
) -> CompileResult<ScheduleBlock> {
    let k = ctx.couplers.coupler(control, target)?;
    let coupler = cal.coupler(k)?;

    let f_control = require(cal.qubit(control)?.frequency.as_ref(), "qubit", control, "frequency")?;
    let f_target = require(cal.qubit(target)?.frequency.as_ref(), "qubit", target, "frequency")?;
    let anharmonicity = require(coupler.anharmonicity.as_ref(), "coupler", k, "anharmonicity")?;
    let detuning = match coupler.frequency_detuning.as_ref() {
        Some(v) => require(Some(v), "coupler", k, "frequency_detuning")?,
        None => 0.0,
    };

    let wait_before = ctx.samples(require(
        coupler.cz_pulse_duration_before.as_ref(),
        "coupler",
        k,
        "cz_pulse_duration_before",
    )?);
    let rise = ctx.samples(require(
        coupler.cz_pulse_duration_rise.as_ref(),
        "coupler",
        k,
        "cz_pulse_duration_rise",
    )?);
    let flat = ctx.samples(require(
        coupler.cz_pulse_duration_constant.as_ref(),
        "coupler",
        k,
        "cz_pulse_duration_constant",
    )?);
    let amp = require(coupler.cz_pulse_amplitude.as_ref(), "coupler", k, "cz_pulse_amplitude")?;
    let dc_bias = require(coupler.cz_pulse_dc_bias.as_ref(), "coupler", k, "cz_pulse_dc_bias")?;
    let phase_offset = require(
        coupler.cz_pulse_phase_offset.as_ref(),
        "coupler",
        k,
        "cz_pulse_phase_offset",
    )?;

    let total = rise + flat + 2.0 * wait_before;
    let modulation = (f_control - f_target).abs() + anharmonicity + detuning;
    let label = format!("CZ q{control}-q{target}");

    let mut block = ScheduleBlock::new(format!("CZ(q{control}, q{target})"));
    block
        .push(BlockInstruction::SetFrequency {
            frequency: constant(modulation),
            channel: Channel::Control(k),
        })
        .push(BlockInstruction::Play {
            pulse: PulseShape::CzFlatTop {
                wait_before: constant(wait_before),
                rise: constant(rise),
                flat: constant(flat),
                amp: constant(amp),
                dc_bias: constant(dc_bias),
                phase_offset: constant(phase_offset),
            },
            channel: Channel::Control(k),
            label: Some(label.clone()),
        });
    for q in [control, target] {
        block.push(BlockInstruction::Delay {
            duration: constant(total),
            channel: Channel::Drive(q),
            label: Some(label.clone()),
        });
    }
    Ok(block)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::calibration::{CalibrationValue, CouplerCalibration, QubitCalibration, ResonatorCalibration};

    pub const DT: f64 = 1e-9;

    pub fn qubit(frequency: f64, pi_amp: f64) -> QubitCalibration {
        QubitCalibration {
            frequency: Some(CalibrationValue::number(frequency, "Hz")),
            pi_pulse_amplitude: Some(CalibrationValue::number(pi_amp, "")),
            pi_pulse_duration: Some(CalibrationValue::number(56e-9, "s")),
            pulse_sigma: Some(CalibrationValue::number(7e-9, "s")),
            ..QubitCalibration::default()
        }
    }

    pub fn resonator(frequency: f64) -> ResonatorCalibration {
        ResonatorCalibration {
            frequency: Some(CalibrationValue::number(frequency, "Hz")),
            pulse_amplitude: Some(CalibrationValue::number(0.05, "")),
            pulse_duration: Some(CalibrationValue::number(3e-6, "s")),
            acq_integration_time: Some(CalibrationValue::number(2.5e-6, "s")),
            ..ResonatorCalibration::default()
        }
    }

    pub fn coupler() -> CouplerCalibration {
        CouplerCalibration {
            anharmonicity: Some(CalibrationValue::number(-200e6, "Hz")),
            cz_pulse_amplitude: Some(CalibrationValue::number(0.08, "")),
            cz_pulse_dc_bias: Some(CalibrationValue::number(0.3, "")),
            cz_pulse_phase_offset: Some(CalibrationValue::number(0.0, "rad")),
            cz_pulse_duration_before: Some(CalibrationValue::number(8e-9, "s")),
            cz_pulse_duration_rise: Some(CalibrationValue::number(24e-9, "s")),
            cz_pulse_duration_constant: Some(CalibrationValue::number(200e-9, "s")),
            ..CouplerCalibration::default()
        }
    }

    pub fn snapshot(last_calibrated: &str, pi_amp: f64) -> DeviceCalibration {
        DeviceCalibration {
            name: "loke".into(),
            version: "2024.04.0".into(),
            qubits: vec![qubit(4.8e9, pi_amp), qubit(5.1e9, pi_amp)],
            resonators: Some(vec![resonator(6.9e9), resonator(7.0e9)]),
            couplers: Some(vec![coupler()]),
            discriminators: None,
            last_calibrated: last_calibrated.into(),
        }
    }

    pub fn context() -> DeviceContext {
        DeviceContext {
            dt: DT,
            couplers: CouplerTable::from_entries(&[((0, 1), 0), ((1, 0), 0)]),
        }
    }
}
