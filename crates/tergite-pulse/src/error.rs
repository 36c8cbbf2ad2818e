//! Error types for the pulse crate.

use thiserror::Error;

/// Errors that can occur while building or binding schedules.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PulseError {
    /// A parameter was left unbound when a concrete value was required.
    #[error("Parameter '{0}' is unbound")]
    UnboundParameter(String),

    /// A duration did not resolve to a whole, non-negative sample count.
    #[error("Invalid duration {value} for {context}: expected a non-negative whole number of samples")]
    InvalidDuration {
        /// The offending value.
        value: f64,
        /// What the duration belongs to.
        context: String,
    },

    /// An expression evaluated to NaN or infinity.
    #[error("Expression '{expression}' evaluated to a non-finite value")]
    NonFinite {
        /// Display form of the expression.
        expression: String,
    },

    /// A sampled waveform without samples.
    #[error("Waveform '{0}' has no samples")]
    EmptyWaveform(String),
}

/// Result type for pulse operations.
pub type PulseResult<T> = Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_display() {
        let err = PulseError::UnboundParameter("theta".into());
        assert_eq!(err.to_string(), "Parameter 'theta' is unbound");
    }

    #[test]
    fn test_invalid_duration_display() {
        let err = PulseError::InvalidDuration {
            value: -4.0,
            context: "Delay q0".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("-4"));
        assert!(msg.contains("Delay q0"));
    }
}
