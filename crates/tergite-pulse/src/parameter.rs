//! Symbolic parameters used by schedule templates.
//!
//! Templates are compiled once per calibration snapshot and bound many times,
//! so amplitudes and durations are kept as small expression trees until a
//! caller supplies concrete values for the free names.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fmt;
use std::ops;

use crate::error::{PulseError, PulseResult};

/// Concrete values for named parameters.
pub type Bindings = FxHashMap<String, f64>;

/// A scalar that may depend on named parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterExpr {
    /// A constant value.
    Constant(f64),
    /// A named parameter, e.g. `theta`.
    Param(String),
    /// The constant π.
    Pi,
    /// Negation.
    Neg(Box<ParameterExpr>),
    /// Sum.
    Add(Box<ParameterExpr>, Box<ParameterExpr>),
    /// Product.
    Mul(Box<ParameterExpr>, Box<ParameterExpr>),
    /// Quotient.
    Div(Box<ParameterExpr>, Box<ParameterExpr>),
}

impl ParameterExpr {
    /// A constant expression.
    pub fn constant(value: f64) -> Self {
        Self::Constant(value)
    }

    /// A named parameter.
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    /// Value of the expression if it has no free parameters.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Constant(v) => Some(*v),
            Self::Pi => Some(PI),
            Self::Param(_) => None,
            Self::Neg(e) => e.as_f64().map(|v| -v),
            Self::Add(a, b) => Some(a.as_f64()? + b.as_f64()?),
            Self::Mul(a, b) => Some(a.as_f64()? * b.as_f64()?),
            Self::Div(a, b) => Some(a.as_f64()? / b.as_f64()?),
        }
    }

    /// Whether any named parameter occurs in the expression.
    pub fn is_parameterized(&self) -> bool {
        match self {
            Self::Param(_) => true,
            Self::Constant(_) | Self::Pi => false,
            Self::Neg(e) => e.is_parameterized(),
            Self::Add(a, b) | Self::Mul(a, b) | Self::Div(a, b) => {
                a.is_parameterized() || b.is_parameterized()
            }
        }
    }

    /// Names of all free parameters.
    pub fn parameters(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_parameters(&mut names);
        names
    }

    pub(crate) fn collect_parameters(&self, names: &mut BTreeSet<String>) {
        match self {
            Self::Param(name) => {
                names.insert(name.clone());
            }
            Self::Constant(_) | Self::Pi => {}
            Self::Neg(e) => e.collect_parameters(names),
            Self::Add(a, b) | Self::Mul(a, b) | Self::Div(a, b) => {
                a.collect_parameters(names);
                b.collect_parameters(names);
            }
        }
    }

    /// Substitute every bound name, leaving unknown names symbolic.
    pub fn bind(&self, bindings: &Bindings) -> Self {
        match self {
            Self::Param(name) => match bindings.get(name) {
                Some(v) => Self::Constant(*v),
                None => self.clone(),
            },
            Self::Constant(_) | Self::Pi => self.clone(),
            Self::Neg(e) => Self::Neg(Box::new(e.bind(bindings))),
            Self::Add(a, b) => Self::Add(Box::new(a.bind(bindings)), Box::new(b.bind(bindings))),
            Self::Mul(a, b) => Self::Mul(Box::new(a.bind(bindings)), Box::new(b.bind(bindings))),
            Self::Div(a, b) => Self::Div(Box::new(a.bind(bindings)), Box::new(b.bind(bindings))),
        }
    }

    /// Evaluate to a finite value, failing on the first unbound name.
    pub fn evaluate(&self, bindings: &Bindings) -> PulseResult<f64> {
        let value = self.eval_inner(bindings)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PulseError::NonFinite {
                expression: self.to_string(),
            })
        }
    }

    fn eval_inner(&self, bindings: &Bindings) -> PulseResult<f64> {
        Ok(match self {
            Self::Constant(v) => *v,
            Self::Pi => PI,
            Self::Param(name) => *bindings
                .get(name)
                .ok_or_else(|| PulseError::UnboundParameter(name.clone()))?,
            Self::Neg(e) => -e.eval_inner(bindings)?,
            Self::Add(a, b) => a.eval_inner(bindings)? + b.eval_inner(bindings)?,
            Self::Mul(a, b) => a.eval_inner(bindings)? * b.eval_inner(bindings)?,
            Self::Div(a, b) => a.eval_inner(bindings)? / b.eval_inner(bindings)?,
        })
    }

    /// Evaluate as a sample count: finite, non-negative and whole.
    pub fn evaluate_samples(&self, bindings: &Bindings, context: &str) -> PulseResult<u64> {
        to_samples(self.evaluate(bindings)?, context)
    }
}

/// Convert a value to a whole number of samples.
pub fn to_samples(value: f64, context: &str) -> PulseResult<u64> {
    let rounded = value.round();
    if !value.is_finite() || rounded < 0.0 || (value - rounded).abs() > 1e-6 {
        return Err(PulseError::InvalidDuration {
            value,
            context: context.to_string(),
        });
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(rounded as u64)
}

impl fmt::Display for ParameterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::Param(name) => write!(f, "{name}"),
            Self::Pi => write!(f, "π"),
            Self::Neg(e) => write!(f, "-({e})"),
            Self::Add(a, b) => write!(f, "({a} + {b})"),
            Self::Mul(a, b) => write!(f, "({a} * {b})"),
            Self::Div(a, b) => write!(f, "({a} / {b})"),
        }
    }
}

impl From<f64> for ParameterExpr {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<&str> for ParameterExpr {
    fn from(name: &str) -> Self {
        Self::Param(name.to_string())
    }
}

impl ops::Neg for ParameterExpr {
    type Output = Self;

    fn neg(self) -> Self {
        Self::Neg(Box::new(self))
    }
}

impl ops::Add for ParameterExpr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::Add(Box::new(self), Box::new(rhs))
    }
}

impl ops::Mul for ParameterExpr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::Mul(Box::new(self), Box::new(rhs))
    }
}

impl ops::Div for ParameterExpr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self::Div(Box::new(self), Box::new(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, f64)]) -> Bindings {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_constant_eval() {
        let e = ParameterExpr::constant(0.25) * ParameterExpr::constant(2.0);
        assert_eq!(e.as_f64(), Some(0.5));
        assert!(!e.is_parameterized());
    }

    #[test]
    fn test_scaled_by_pi() {
        let e = ParameterExpr::param("theta") / ParameterExpr::Pi * ParameterExpr::constant(0.3);
        assert!(e.is_parameterized());
        assert_eq!(e.as_f64(), None);

        let full = e.evaluate(&bindings(&[("theta", PI)])).unwrap();
        assert!((full - 0.3).abs() < 1e-12);
        let half = e.evaluate(&bindings(&[("theta", PI / 2.0)])).unwrap();
        assert!((half - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_unbound_parameter() {
        let e = ParameterExpr::param("tau") + ParameterExpr::constant(1.0);
        let err = e.evaluate(&Bindings::default()).unwrap_err();
        assert!(matches!(err, PulseError::UnboundParameter(name) if name == "tau"));
    }

    #[test]
    fn test_partial_bind() {
        let e = ParameterExpr::param("a") * ParameterExpr::param("b");
        let bound = e.bind(&bindings(&[("a", 3.0)]));
        assert_eq!(bound.parameters().into_iter().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(bound.evaluate(&bindings(&[("b", 2.0)])).unwrap(), 6.0);
    }

    #[test]
    fn test_division_by_zero_is_non_finite() {
        let e = ParameterExpr::constant(1.0) / ParameterExpr::param("x");
        let err = e.evaluate(&bindings(&[("x", 0.0)])).unwrap_err();
        assert!(matches!(err, PulseError::NonFinite { .. }));
    }

    #[test]
    fn test_to_samples() {
        assert_eq!(to_samples(160.0, "rx").unwrap(), 160);
        assert_eq!(to_samples(159.999_999_9, "rx").unwrap(), 160);
        assert!(to_samples(-1.0, "delay").is_err());
        assert!(to_samples(10.5, "delay").is_err());
        assert!(to_samples(f64::NAN, "delay").is_err());
    }

    #[test]
    fn test_display() {
        let e = -(ParameterExpr::param("lambda_param") + ParameterExpr::Pi);
        assert_eq!(e.to_string(), "-((lambda_param + π))");
    }
}
