use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::value::ControlValue;
use super::value_domain::ValueDomain;
use crate::error::{InstrumentError, ValidationError};

/// One step of a validator pipeline.
///
/// A step receives the output of the previous step together with the
/// control's declared domain and either returns the (possibly coerced)
/// value or rejects it. Steps must be pure: no I/O, no hidden state.
pub trait Validator: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Called once when a descriptor is declared. A step that cannot work
    /// with `domain` must fail here rather than on every call.
    fn check_domain(&self, domain: &ValueDomain) -> Result<(), InstrumentError> {
        domain.check()
    }

    fn validate(
        &self,
        value: ControlValue,
        domain: &ValueDomain,
    ) -> Result<ControlValue, ValidationError>;
}

/// Built-in validators, also usable as configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ValidatorKind {
    /// Reject values outside the range
    StrictRange,
    /// Clamp values into the range
    TruncatedRange,
    /// Reject values that are not members of the set
    StrictDiscreteSet,
    /// Round up to the next numeric member, or down to the largest one
    TruncatedDiscreteSet,
    /// Reject values off the `min + k * step` grid
    StrictDiscreteRange,
    /// Wrap values into `[min, max)`
    ModularRange,
    /// Upper-case text, ignores the domain
    Uppercase,
    /// Lower-case text, ignores the domain
    Lowercase,
}

impl ValidatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrictRange => "strict_range",
            Self::TruncatedRange => "truncated_range",
            Self::StrictDiscreteSet => "strict_discrete_set",
            Self::TruncatedDiscreteSet => "truncated_discrete_set",
            Self::StrictDiscreteRange => "strict_discrete_range",
            Self::ModularRange => "modular_range",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
        }
    }

    /// Value-only transforms never look at the domain
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Uppercase | Self::Lowercase)
    }
}

impl Validator for ValidatorKind {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn check_domain(&self, domain: &ValueDomain) -> Result<(), InstrumentError> {
        if self.is_transform() {
            return Ok(());
        }
        domain.check()?;

        let fits = match self {
            Self::StrictRange | Self::TruncatedRange => domain.bounds().is_some(),
            Self::ModularRange => domain.bounds().is_some_and(|(min, max)| max > min),
            Self::StrictDiscreteRange => matches!(domain, ValueDomain::SteppedRange { .. }),
            Self::StrictDiscreteSet => domain.members().is_some(),
            Self::TruncatedDiscreteSet => domain
                .members()
                .is_some_and(|m| m.iter().all(|v| v.as_f64().is_some())),
            Self::Uppercase | Self::Lowercase => true,
        };

        if fits {
            Ok(())
        } else {
            Err(InstrumentError::Configuration(format!(
                "Validator {} cannot be used with a {} domain",
                self.as_str(),
                domain.kind()
            )))
        }
    }

    fn validate(
        &self,
        value: ControlValue,
        domain: &ValueDomain,
    ) -> Result<ControlValue, ValidationError> {
        match self {
            Self::StrictRange => strict_range(value, domain),
            Self::TruncatedRange => truncated_range(value, domain),
            Self::StrictDiscreteSet => strict_discrete_set(value, domain),
            Self::TruncatedDiscreteSet => truncated_discrete_set(value, domain),
            Self::StrictDiscreteRange => strict_discrete_range(value, domain),
            Self::ModularRange => modular_range(value, domain),
            Self::Uppercase => Ok(ControlValue::Text(value.expect_text()?.to_uppercase())),
            Self::Lowercase => Ok(ControlValue::Text(value.expect_text()?.to_lowercase())),
        }
    }
}

fn range_of(domain: &ValueDomain) -> Result<(f64, f64), ValidationError> {
    domain.bounds().ok_or_else(|| ValidationError::Type {
        expected: "a range domain",
        found: domain.kind().to_string(),
    })
}

fn members_of(domain: &ValueDomain) -> Result<&[ControlValue], ValidationError> {
    domain.members().ok_or_else(|| ValidationError::Type {
        expected: "a set domain",
        found: domain.kind().to_string(),
    })
}

pub fn strict_range(
    value: ControlValue,
    domain: &ValueDomain,
) -> Result<ControlValue, ValidationError> {
    let (min, max) = range_of(domain)?;
    let n = value.expect_number()?;
    if n < min || n > max {
        return Err(ValidationError::Range { value: n, min, max });
    }
    Ok(value)
}

pub fn truncated_range(
    value: ControlValue,
    domain: &ValueDomain,
) -> Result<ControlValue, ValidationError> {
    let (min, max) = range_of(domain)?;
    let n = value.expect_number()?;
    Ok(ControlValue::Number(n.clamp(min, max)))
}

pub fn strict_discrete_set(
    value: ControlValue,
    domain: &ValueDomain,
) -> Result<ControlValue, ValidationError> {
    let members = members_of(domain)?;
    if members.contains(&value) {
        return Ok(value);
    }
    Err(ValidationError::DiscreteSet {
        value: value.to_string(),
        allowed: members.iter().map(ToString::to_string).collect(),
    })
}

pub fn truncated_discrete_set(
    value: ControlValue,
    domain: &ValueDomain,
) -> Result<ControlValue, ValidationError> {
    let n = value.expect_number()?;
    let mut numbers = members_of(domain)?
        .iter()
        .map(ControlValue::expect_number)
        .collect::<Result<Vec<_>, _>>()?;
    numbers.sort_by(f64::total_cmp);

    let chosen = numbers
        .iter()
        .copied()
        .find(|member| *member >= n)
        .or_else(|| numbers.last().copied())
        .ok_or_else(|| ValidationError::DiscreteSet {
            value: value.to_string(),
            allowed: Vec::new(),
        })?;
    Ok(ControlValue::Number(chosen))
}

pub fn strict_discrete_range(
    value: ControlValue,
    domain: &ValueDomain,
) -> Result<ControlValue, ValidationError> {
    let ValueDomain::SteppedRange { min, max, step } = domain else {
        return Err(ValidationError::Type {
            expected: "a stepped range domain",
            found: domain.kind().to_string(),
        });
    };
    let n = value.expect_number()?;
    let k = ((n - min) / step).round();
    let on_grid = (n - (min + k * step)).abs() <= step * 1e-9;
    if n < *min || n > *max || !on_grid {
        return Err(ValidationError::Range {
            value: n,
            min: *min,
            max: *max,
        });
    }
    Ok(value)
}

pub fn modular_range(
    value: ControlValue,
    domain: &ValueDomain,
) -> Result<ControlValue, ValidationError> {
    let (min, max) = range_of(domain)?;
    let n = value.expect_number()?;
    if !n.is_finite() {
        return Err(ValidationError::Type {
            expected: "a finite number",
            found: n.to_string(),
        });
    }
    Ok(ControlValue::Number((n - min).rem_euclid(max - min) + min))
}

/// Applies its steps left to right, feeding each the previous output.
#[derive(Debug, Clone, Default)]
pub struct JoinedValidator {
    steps: Vec<Arc<dyn Validator>>,
}

impl JoinedValidator {
    pub fn new(steps: Vec<Arc<dyn Validator>>) -> Self {
        Self { steps }
    }

    pub fn from_kinds<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = ValidatorKind>,
    {
        Self {
            steps: kinds
                .into_iter()
                .map(|k| Arc::new(k) as Arc<dyn Validator>)
                .collect(),
        }
    }

    pub fn push(&mut self, step: Arc<dyn Validator>) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Validator for JoinedValidator {
    fn name(&self) -> &str {
        "joined"
    }

    fn check_domain(&self, domain: &ValueDomain) -> Result<(), InstrumentError> {
        domain.check()?;
        self.steps.iter().try_for_each(|s| s.check_domain(domain))
    }

    fn validate(
        &self,
        value: ControlValue,
        domain: &ValueDomain,
    ) -> Result<ControlValue, ValidationError> {
        self.steps
            .iter()
            .try_fold(value, |acc, step| step.validate(acc, domain))
    }
}

/// Compose built-in steps into one pipeline
pub fn joined_validators<I>(kinds: I) -> JoinedValidator
where
    I: IntoIterator<Item = ValidatorKind>,
{
    JoinedValidator::from_kinds(kinds)
}
