use serde::{Deserialize, Serialize};

use super::value::ControlValue;
use crate::error::InstrumentError;

/// The set of values a control accepts, passed to every validator step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum ValueDomain {
    /// No restriction
    #[default]
    Any,
    /// Inclusive numeric interval
    Range { min: f64, max: f64 },
    /// Inclusive interval restricted to `min + k * step`
    SteppedRange { min: f64, max: f64, step: f64 },
    /// Enumerated members
    Set { values: Vec<ControlValue> },
}

impl ValueDomain {
    pub fn range(min: f64, max: f64) -> Self {
        Self::Range { min, max }
    }

    pub fn stepped(min: f64, max: f64, step: f64) -> Self {
        Self::SteppedRange { min, max, step }
    }

    pub fn set<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ControlValue>,
    {
        Self::Set {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Numeric bounds for range-shaped domains
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Self::Range { min, max } | Self::SteppedRange { min, max, .. } => Some((*min, *max)),
            _ => None,
        }
    }

    pub fn members(&self) -> Option<&[ControlValue]> {
        match self {
            Self::Set { values } => Some(values),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Range { .. } => "range",
            Self::SteppedRange { .. } => "stepped range",
            Self::Set { .. } => "set",
        }
    }

    /// Rejects domains that can never accept a value
    pub fn check(&self) -> Result<(), InstrumentError> {
        match self {
            Self::Any => Ok(()),
            Self::Range { min, max } => check_bounds(*min, *max),
            Self::SteppedRange { min, max, step } => {
                check_bounds(*min, *max)?;
                if !step.is_finite() || *step <= 0.0 {
                    return Err(InstrumentError::Configuration(format!(
                        "Range step must be positive, got {}",
                        step
                    )));
                }
                Ok(())
            }
            Self::Set { values } => {
                if values.is_empty() {
                    return Err(InstrumentError::Configuration(
                        "Discrete set is empty".to_string(),
                    ));
                }
                if values.iter().any(|v| v.as_f64().is_some_and(f64::is_nan)) {
                    return Err(InstrumentError::Configuration(
                        "Discrete set contains NaN".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn check_bounds(min: f64, max: f64) -> Result<(), InstrumentError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(InstrumentError::Configuration(format!(
            "Range bounds must be finite, got [{}, {}]",
            min, max
        )));
    }
    if min > max {
        return Err(InstrumentError::Configuration(format!(
            "Range minimum {} exceeds maximum {}",
            min, max
        )));
    }
    Ok(())
}
