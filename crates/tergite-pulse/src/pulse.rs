//! Pulse envelopes.
//!
//! [`PulseShape`] is what a template declares (values may be symbolic),
//! [`Pulse`] is the concrete envelope left after binding. Parametric shapes
//! travel to the control service by name and parameters; only [`Waveform`]s
//! carry explicit samples.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{PulseError, PulseResult};
use crate::parameter::{Bindings, ParameterExpr};

/// Wire name of the flat-top two-qubit gate envelope.
pub const CZ_PULSE_SHAPE: &str = "wacqt_cz_gate_pulse";

/// A sampled envelope with a library name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// Name under which the samples are stored in the pulse library.
    pub name: String,
    /// One complex sample per `dt`.
    pub samples: Vec<Complex64>,
}

impl Waveform {
    /// Create a waveform, rejecting an empty sample list.
    pub fn new(name: impl Into<String>, samples: Vec<Complex64>) -> PulseResult<Self> {
        let name = name.into();
        if samples.is_empty() {
            return Err(PulseError::EmptyWaveform(name));
        }
        Ok(Self { name, samples })
    }

    /// Duration in samples.
    pub fn duration(&self) -> u64 {
        self.samples.len() as u64
    }
}

/// Envelope declared by a schedule template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PulseShape {
    /// Gaussian envelope.
    Gaussian {
        /// Length in samples.
        duration: ParameterExpr,
        /// Peak amplitude.
        amp: ParameterExpr,
        /// Standard deviation in samples.
        sigma: ParameterExpr,
    },
    /// Flat envelope.
    Constant {
        /// Length in samples.
        duration: ParameterExpr,
        /// Amplitude.
        amp: ParameterExpr,
    },
    /// Flat-top envelope with cosine rise and fall, padded by a wait on each side.
    CzFlatTop {
        /// Idle samples before the rise and after the fall.
        wait_before: ParameterExpr,
        /// Samples of the rising (and falling) edge.
        rise: ParameterExpr,
        /// Samples at full amplitude.
        flat: ParameterExpr,
        /// Modulation amplitude.
        amp: ParameterExpr,
        /// Static flux offset.
        dc_bias: ParameterExpr,
        /// Phase of the modulation.
        phase_offset: ParameterExpr,
    },
    /// Explicit samples.
    Waveform(Waveform),
}

impl PulseShape {
    /// Every expression the envelope depends on.
    pub fn expressions(&self) -> Vec<&ParameterExpr> {
        match self {
            PulseShape::Gaussian {
                duration,
                amp,
                sigma,
            } => vec![duration, amp, sigma],
            PulseShape::Constant { duration, amp } => vec![duration, amp],
            PulseShape::CzFlatTop {
                wait_before,
                rise,
                flat,
                amp,
                dc_bias,
                phase_offset,
            } => vec![wait_before, rise, flat, amp, dc_bias, phase_offset],
            PulseShape::Waveform(_) => Vec::new(),
        }
    }

    /// Resolve every value of the envelope.
    pub fn bind(&self, bindings: &Bindings, context: &str) -> PulseResult<Pulse> {
        Ok(match self {
            PulseShape::Gaussian {
                duration,
                amp,
                sigma,
            } => Pulse::Gaussian {
                duration: duration.evaluate_samples(bindings, context)?,
                amp: amp.evaluate(bindings)?,
                sigma: sigma.evaluate(bindings)?,
            },
            PulseShape::Constant { duration, amp } => Pulse::Constant {
                duration: duration.evaluate_samples(bindings, context)?,
                amp: amp.evaluate(bindings)?,
            },
            PulseShape::CzFlatTop {
                wait_before,
                rise,
                flat,
                amp,
                dc_bias,
                phase_offset,
            } => Pulse::CzFlatTop {
                wait_before: wait_before.evaluate_samples(bindings, context)?,
                rise: rise.evaluate_samples(bindings, context)?,
                flat: flat.evaluate_samples(bindings, context)?,
                amp: amp.evaluate(bindings)?,
                dc_bias: dc_bias.evaluate(bindings)?,
                phase_offset: phase_offset.evaluate(bindings)?,
            },
            PulseShape::Waveform(w) => Pulse::Waveform(w.clone()),
        })
    }
}

/// A fully resolved envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Pulse {
    /// Gaussian envelope.
    Gaussian {
        /// Length in samples.
        duration: u64,
        /// Peak amplitude.
        amp: f64,
        /// Standard deviation in samples.
        sigma: f64,
    },
    /// Flat envelope.
    Constant {
        /// Length in samples.
        duration: u64,
        /// Amplitude.
        amp: f64,
    },
    /// Two-qubit gate envelope.
    CzFlatTop {
        /// Idle samples on each side.
        wait_before: u64,
        /// Edge length in samples.
        rise: u64,
        /// Plateau length in samples.
        flat: u64,
        /// Modulation amplitude.
        amp: f64,
        /// Static flux offset.
        dc_bias: f64,
        /// Phase of the modulation.
        phase_offset: f64,
    },
    /// Explicit samples.
    Waveform(Waveform),
}

impl Pulse {
    /// Duration in samples.
    pub fn duration(&self) -> u64 {
        match self {
            Pulse::Gaussian { duration, .. } | Pulse::Constant { duration, .. } => *duration,
            Pulse::CzFlatTop {
                wait_before,
                rise,
                flat,
                ..
            } => rise + flat + 2 * wait_before,
            Pulse::Waveform(w) => w.duration(),
        }
    }

    /// Parametric shape name understood by the control service, if any.
    pub fn shape_name(&self) -> Option<&'static str> {
        match self {
            Pulse::Gaussian { .. } => Some("gaussian"),
            Pulse::Constant { .. } => Some("constant"),
            Pulse::CzFlatTop { .. } => Some(CZ_PULSE_SHAPE),
            Pulse::Waveform(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_rejects_empty() {
        let err = Waveform::new("empty", Vec::new()).unwrap_err();
        assert!(matches!(err, PulseError::EmptyWaveform(name) if name == "empty"));
    }

    #[test]
    fn test_cz_total_duration() {
        let shape = PulseShape::CzFlatTop {
            wait_before: 8.0.into(),
            rise: 20.0.into(),
            flat: 100.0.into(),
            amp: 0.1.into(),
            dc_bias: 0.0.into(),
            phase_offset: 0.0.into(),
        };
        let pulse = shape.bind(&Bindings::default(), "CZ q0-q1").unwrap();
        assert_eq!(pulse.duration(), 20 + 100 + 2 * 8);
        assert_eq!(pulse.shape_name(), Some(CZ_PULSE_SHAPE));
    }

    #[test]
    fn test_bind_gaussian_with_symbolic_amp() {
        let shape = PulseShape::Gaussian {
            duration: 56.0.into(),
            amp: ParameterExpr::param("theta") * ParameterExpr::constant(0.5),
            sigma: 7.0.into(),
        };
        let mut b = Bindings::default();
        b.insert("theta".into(), 0.2);
        match shape.bind(&b, "RX q0").unwrap() {
            Pulse::Gaussian { duration, amp, .. } => {
                assert_eq!(duration, 56);
                assert!((amp - 0.1).abs() < 1e-12);
            }
            other => panic!("unexpected pulse {other:?}"),
        }
    }

    #[test]
    fn test_fractional_duration_rejected() {
        let shape = PulseShape::Constant {
            duration: 10.5.into(),
            amp: 0.1.into(),
        };
        assert!(shape.bind(&Bindings::default(), "Readout q0").is_err());
    }
}
