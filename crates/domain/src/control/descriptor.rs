use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::reply;
use super::template::CommandTemplate;
use super::validator::{JoinedValidator, Validator, ValidatorKind};
use super::value::{ControlValue, ValueType};
use super::value_domain::ValueDomain;
use crate::error::InstrumentError;

/// Which directions a descriptor supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Access {
    /// Read and write
    #[default]
    Control,
    /// Read only
    Measurement,
    /// Write only
    Setting,
}

impl Access {
    pub fn can_read(&self) -> bool {
        matches!(self, Self::Control | Self::Measurement)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Self::Control | Self::Setting)
    }
}

/// A write that passed validation and is ready for the wire
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedWrite {
    pub candidate: ControlValue,
    pub value: ControlValue,
    pub command: String,
}

impl PreparedWrite {
    /// True when the validator changed the value (e.g. clamping)
    pub fn was_coerced(&self) -> bool {
        self.candidate != self.value
    }
}

/// Declared binding between a named control, its wire templates and its validator.
///
/// Descriptors are immutable once built and shared between every session of
/// an instrument model. All checks that can fail because of a bad declaration
/// happen in [`ControlBuilder::build`].
#[derive(Debug, Clone)]
pub struct ControlDescriptor {
    name: String,
    docs: String,
    access: Access,
    query: Option<CommandTemplate>,
    write: Option<CommandTemplate>,
    validator: JoinedValidator,
    domain: ValueDomain,
    value_type: ValueType,
    check_set_errors: bool,
    check_get_errors: bool,
}

impl ControlDescriptor {
    /// Read/write control
    pub fn control(name: &str, query: &str, write: &str, docs: &str) -> ControlBuilder {
        ControlBuilder::new(name, Access::Control, Some(query), Some(write), docs)
    }

    /// Read-only measurement
    pub fn measurement(name: &str, query: &str, docs: &str) -> ControlBuilder {
        ControlBuilder::new(name, Access::Measurement, Some(query), None, docs)
    }

    /// Write-only setting
    pub fn setting(name: &str, write: &str, docs: &str) -> ControlBuilder {
        ControlBuilder::new(name, Access::Setting, None, Some(write), docs)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn docs(&self) -> &str {
        &self.docs
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn domain(&self) -> &ValueDomain {
        &self.domain
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn check_set_errors(&self) -> bool {
        self.check_set_errors
    }

    pub fn check_get_errors(&self) -> bool {
        self.check_get_errors
    }

    pub fn validator(&self) -> &JoinedValidator {
        &self.validator
    }

    pub fn write_template(&self) -> Option<&CommandTemplate> {
        self.write.as_ref()
    }

    /// The query sent verbatim by `get()`
    pub fn query_command(&self) -> Result<String, InstrumentError> {
        self.query
            .as_ref()
            .map(CommandTemplate::render)
            .ok_or_else(|| InstrumentError::NotReadable(self.name.clone()))
    }

    /// Validate `candidate` and render the write command. Pure: no I/O.
    pub fn prepare_write(&self, candidate: ControlValue) -> Result<PreparedWrite, InstrumentError> {
        let template = self
            .write
            .as_ref()
            .ok_or_else(|| InstrumentError::NotWritable(self.name.clone()))?;
        let value = self.validator.validate(candidate.clone(), &self.domain)?;
        let command = template.format(&value)?;
        Ok(PreparedWrite {
            candidate,
            value,
            command,
        })
    }

    /// Interpret a raw reply to this control's query
    pub fn parse_reply(&self, raw: &str) -> Result<ControlValue, InstrumentError> {
        reply::parse_reply(raw, self.value_type, &self.domain).ok_or_else(|| {
            InstrumentError::Parse {
                command: self.query.as_ref().map(CommandTemplate::render).unwrap_or_default(),
                reply: raw.to_string(),
                expected: self.expected_reply(),
            }
        })
    }

    /// Turn textual user input into a candidate value of the declared type
    pub fn value_from_input(&self, raw: &str) -> ControlValue {
        let trimmed = raw.trim();
        match self.value_type {
            ValueType::Text => ControlValue::Text(trimmed.to_string()),
            ValueType::Float | ValueType::Integer => match trimmed.parse::<f64>() {
                Ok(n) => ControlValue::Number(n),
                Err(_) => ControlValue::Text(trimmed.to_string()),
            },
        }
    }

    fn expected_reply(&self) -> String {
        match (self.value_type, self.domain.members()) {
            (ValueType::Text, Some(members)) => format!(
                "one of [{}]",
                members
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            (value_type, _) => value_type.as_str().to_string(),
        }
    }
}

/// Collects a descriptor declaration and checks it in one place
#[derive(Debug)]
pub struct ControlBuilder {
    name: String,
    docs: String,
    access: Access,
    query: Option<String>,
    write: Option<String>,
    validator: JoinedValidator,
    domain: ValueDomain,
    value_type: ValueType,
    check_set_errors: bool,
    check_get_errors: bool,
}

impl ControlBuilder {
    fn new(
        name: &str,
        access: Access,
        query: Option<&str>,
        write: Option<&str>,
        docs: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            docs: docs.trim().to_string(),
            access,
            query: query.map(str::to_string),
            write: write.map(str::to_string),
            validator: JoinedValidator::default(),
            domain: ValueDomain::Any,
            value_type: ValueType::Float,
            check_set_errors: false,
            check_get_errors: false,
        }
    }

    /// Append a built-in step to the pipeline
    pub fn validator(mut self, kind: ValidatorKind) -> Self {
        self.validator.push(Arc::new(kind));
        self
    }

    /// Append any step, including user-defined ones
    pub fn custom_validator(mut self, step: Arc<dyn Validator>) -> Self {
        self.validator.push(step);
        self
    }

    pub fn validators<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = ValidatorKind>,
    {
        for kind in kinds {
            self.validator.push(Arc::new(kind));
        }
        self
    }

    pub fn values(mut self, domain: ValueDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn check_set_errors(mut self, enabled: bool) -> Self {
        self.check_set_errors = enabled;
        self
    }

    pub fn check_get_errors(mut self, enabled: bool) -> Self {
        self.check_get_errors = enabled;
        self
    }

    pub fn build(self) -> Result<ControlDescriptor, InstrumentError> {
        let configuration = |msg: String| {
            InstrumentError::Configuration(format!("control '{}': {}", self.name, msg))
        };
        let scoped = |e: InstrumentError| match e {
            InstrumentError::Configuration(msg) => configuration(msg),
            other => configuration(other.to_string()),
        };

        if self.name.trim().is_empty() {
            return Err(InstrumentError::Configuration(
                "Control name is empty".to_string(),
            ));
        }

        let query = self
            .query
            .as_deref()
            .map(CommandTemplate::query)
            .transpose()
            .map_err(scoped)?;
        let write = self
            .write
            .as_deref()
            .map(CommandTemplate::write)
            .transpose()
            .map_err(scoped)?;

        self.domain
            .check()
            .map_err(scoped)?;
        self.validator
            .check_domain(&self.domain)
            .map_err(scoped)?;

        if self.value_type == ValueType::Text {
            if let Some(format) = write.as_ref().and_then(CommandTemplate::slot_format) {
                if !format.accepts_text() {
                    return Err(configuration(format!(
                        "text control cannot use numeric template {:?}",
                        self.write.as_deref().unwrap_or_default()
                    )));
                }
            }
        }

        if self.check_get_errors && !self.access.can_read() {
            return Err(configuration(
                "check_get_errors set on a write-only control".to_string(),
            ));
        }

        Ok(ControlDescriptor {
            name: self.name,
            docs: self.docs,
            access: self.access,
            query,
            write,
            validator: self.validator,
            domain: self.domain,
            value_type: self.value_type,
            check_set_errors: self.check_set_errors,
            check_get_errors: self.check_get_errors,
        })
    }
}

/// Serializable form of a descriptor, used by model configuration files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlConfig {
    pub name: String,
    #[serde(default)]
    pub docs: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub write: Option<String>,
    #[serde(default)]
    pub validators: Vec<ValidatorKind>,
    #[serde(default)]
    pub values: ValueDomain,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub check_set_errors: bool,
    #[serde(default)]
    pub check_get_errors: bool,
}

impl ControlConfig {
    pub fn build(&self) -> Result<ControlDescriptor, InstrumentError> {
        let builder = match (self.query.as_deref(), self.write.as_deref()) {
            (Some(q), Some(w)) => ControlDescriptor::control(&self.name, q, w, &self.docs),
            (Some(q), None) => ControlDescriptor::measurement(&self.name, q, &self.docs),
            (None, Some(w)) => ControlDescriptor::setting(&self.name, w, &self.docs),
            (None, None) => {
                return Err(InstrumentError::Configuration(format!(
                    "control '{}' has neither a query nor a write command",
                    self.name
                )));
            }
        };
        builder
            .validators(self.validators.iter().copied())
            .values(self.values.clone())
            .value_type(self.value_type)
            .check_set_errors(self.check_set_errors)
            .check_get_errors(self.check_get_errors)
            .build()
    }
}
