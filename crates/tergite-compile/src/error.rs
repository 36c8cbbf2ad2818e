//! Error types for the compile crate.

use tergite_pulse::PulseError;
use thiserror::Error;

/// Errors raised while compiling calibration data into schedules.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// A gate or qubit tuple the target does not declare.
    #[error("not implemented: gate '{gate}' on qubits {qubits:?} for backend '{backend}'")]
    NotImplemented {
        /// Gate name.
        gate: String,
        /// Qubit tuple.
        qubits: Vec<u32>,
        /// Backend the target was built for.
        backend: String,
    },

    /// A calibration value required by a template is absent.
    #[error("missing calibration '{field}' for {component} {index}")]
    MissingCalibration {
        /// Component kind: qubit, resonator or coupler.
        component: &'static str,
        /// Component index.
        index: u32,
        /// Field name.
        field: &'static str,
    },

    /// A calibration value that should be numeric is not.
    #[error("calibration '{field}' for {component} {index} is not numeric")]
    NonNumericCalibration {
        /// Component kind.
        component: &'static str,
        /// Component index.
        index: u32,
        /// Field name.
        field: &'static str,
    },

    /// A qubit pair without a coupler.
    #[error("Coupling ({control}, {target}) not in coupling map.")]
    CouplingNotFound {
        /// Control qubit.
        control: u32,
        /// Target qubit.
        target: u32,
    },

    /// The backend config does not define a sample time.
    #[error("backend '{0}' does not define a sample time (dt)")]
    MissingSampleTime(String),

    /// Wrong number of parameters for an operation.
    #[error("gate '{gate}' expects {expected} parameter(s), got {got}")]
    ParameterCount {
        /// Gate name.
        gate: String,
        /// Parameters declared by the target.
        expected: usize,
        /// Parameters supplied.
        got: usize,
    },

    /// A circuit that cannot be lowered.
    #[error("Invalid circuit '{name}': {reason}")]
    InvalidCircuit {
        /// Circuit name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A pulse the backend can neither play parametrically nor sample.
    #[error("pulse shape '{0}' is not supported by the backend")]
    UnsupportedPulse(String),

    /// Invalid run options.
    #[error("Invalid run options: {0}")]
    InvalidOptions(String),

    /// Malformed payload document.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Error from the pulse layer.
    #[error(transparent)]
    Pulse(#[from] PulseError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_implemented_names_gate_and_backend() {
        let err = CompileError::NotImplemented {
            gate: "h".into(),
            qubits: vec![0],
            backend: "loke".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'h'"));
        assert!(msg.contains("loke"));
    }

    #[test]
    fn test_coupling_not_found_display() {
        let err = CompileError::CouplingNotFound {
            control: 0,
            target: 2,
        };
        assert_eq!(err.to_string(), "Coupling (0, 2) not in coupling map.");
    }

    #[test]
    fn test_missing_calibration_display() {
        let err = CompileError::MissingCalibration {
            component: "coupler",
            index: 3,
            field: "cz_pulse_amplitude",
        };
        assert_eq!(
            err.to_string(),
            "missing calibration 'cz_pulse_amplitude' for coupler 3"
        );
    }

    #[test]
    fn test_pulse_error_is_transparent() {
        let err: CompileError = PulseError::UnboundParameter("tau".into()).into();
        assert_eq!(err.to_string(), "Parameter 'tau' is unbound");
    }
}
