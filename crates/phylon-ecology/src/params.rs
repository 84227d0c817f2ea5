//! Parameter validation shared by every model configuration.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A tuning parameter failed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterError {
    /// Owning configuration (e.g. `"mortality"`).
    pub component: &'static str,
    /// Field name.
    pub parameter: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.component, self.parameter, self.reason)
    }
}

impl Error for ParameterError {}

/// Validation helper bound to one component name.
pub(crate) struct Check(pub &'static str);

impl Check {
    fn fail(&self, parameter: &'static str, reason: String) -> ParameterError {
        ParameterError {
            component: self.0,
            parameter,
            reason,
        }
    }

    pub fn finite(&self, parameter: &'static str, v: f64) -> Result<(), ParameterError> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(self.fail(parameter, format!("must be finite, got {v}")))
        }
    }

    pub fn non_negative(&self, parameter: &'static str, v: f64) -> Result<(), ParameterError> {
        self.finite(parameter, v)?;
        if v < 0.0 {
            return Err(self.fail(parameter, format!("must be >= 0, got {v}")));
        }
        Ok(())
    }

    pub fn positive(&self, parameter: &'static str, v: f64) -> Result<(), ParameterError> {
        self.finite(parameter, v)?;
        if v <= 0.0 {
            return Err(self.fail(parameter, format!("must be > 0, got {v}")));
        }
        Ok(())
    }

    pub fn unit(&self, parameter: &'static str, v: f64) -> Result<(), ParameterError> {
        self.finite(parameter, v)?;
        if !(0.0..=1.0).contains(&v) {
            return Err(self.fail(parameter, format!("must lie in [0, 1], got {v}")));
        }
        Ok(())
    }

    pub fn ordered(
        &self,
        parameter: &'static str,
        low: f64,
        high: f64,
    ) -> Result<(), ParameterError> {
        self.finite(parameter, low)?;
        self.finite(parameter, high)?;
        if low > high {
            return Err(self.fail(parameter, format!("lower bound {low} exceeds upper {high}")));
        }
        Ok(())
    }

    pub fn table<T: Copy>(
        &self,
        parameter: &'static str,
        table: &StepTable<T>,
    ) -> Result<(), ParameterError> {
        let mut last = f64::NEG_INFINITY;
        for step in &table.steps {
            if !step.below.is_finite() || step.below <= last {
                return Err(self.fail(
                    parameter,
                    "step bounds must be finite and strictly increasing".into(),
                ));
            }
            last = step.below;
        }
        Ok(())
    }
}

// ── StepTable ──────────────────────────────────────────────────────

/// One row of a [`StepTable`]: inputs `< below` map to `value`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step<T> {
    /// Exclusive upper bound of the row.
    pub below: f64,
    /// Output for inputs in the row.
    pub value: T,
}

/// Piecewise-constant lookup over a continuous input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepTable<T> {
    /// Rows in increasing `below` order.
    pub steps: Vec<Step<T>>,
    /// Output for inputs at or above the last bound.
    pub otherwise: T,
}

impl<T: Copy> StepTable<T> {
    /// Build a table from `(below, value)` rows.
    pub fn new(steps: &[(f64, T)], otherwise: T) -> Self {
        Self {
            steps: steps
                .iter()
                .map(|&(below, value)| Step { below, value })
                .collect(),
            otherwise,
        }
    }

    /// Value of the first row whose bound exceeds `x`. NaN maps to
    /// `otherwise`.
    pub fn lookup(&self, x: f64) -> T {
        self.steps
            .iter()
            .find(|s| x < s.below)
            .map_or(self.otherwise, |s| s.value)
    }
}

/// Clamp to `[0, 1]`, sending NaN to 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
