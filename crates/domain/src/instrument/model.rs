use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::{CommandTemplate, ControlConfig, ControlDescriptor};
use crate::error::InstrumentError;

fn default_id_query() -> String {
    "*IDN?".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Class-level description of an instrument: its controls and housekeeping commands.
///
/// A model is built once and shared (`Arc`) by every session talking to that
/// kind of device.
#[derive(Debug, Clone)]
pub struct InstrumentModel {
    name: String,
    id_query: String,
    error_query: Option<String>,
    clear_command: Option<String>,
    default_timeout: Duration,
    controls: BTreeMap<String, Arc<ControlDescriptor>>,
}

impl InstrumentModel {
    pub fn builder(name: &str) -> InstrumentModelBuilder {
        InstrumentModelBuilder {
            name: name.to_string(),
            id_query: default_id_query(),
            error_query: None,
            clear_command: None,
            default_timeout: Duration::from_millis(default_timeout_ms()),
            controls: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_query(&self) -> &str {
        &self.id_query
    }

    pub fn error_query(&self) -> Option<&str> {
        self.error_query.as_deref()
    }

    pub fn clear_command(&self) -> Option<&str> {
        self.clear_command.as_deref()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn control(&self, name: &str) -> Result<Arc<ControlDescriptor>, InstrumentError> {
        self.controls
            .get(name)
            .cloned()
            .ok_or_else(|| InstrumentError::UnknownControl(name.to_string()))
    }

    /// Descriptors in name order
    pub fn controls(&self) -> impl Iterator<Item = &Arc<ControlDescriptor>> {
        self.controls.values()
    }

    pub fn control_names(&self) -> Vec<&str> {
        self.controls.keys().map(String::as_str).collect()
    }
}

#[derive(Debug)]
pub struct InstrumentModelBuilder {
    name: String,
    id_query: String,
    error_query: Option<String>,
    clear_command: Option<String>,
    default_timeout: Duration,
    controls: Vec<ControlDescriptor>,
}

impl InstrumentModelBuilder {
    pub fn id_query(mut self, command: &str) -> Self {
        self.id_query = command.to_string();
        self
    }

    pub fn error_query(mut self, command: &str) -> Self {
        self.error_query = Some(command.to_string());
        self
    }

    pub fn clear_command(mut self, command: &str) -> Self {
        self.clear_command = Some(command.to_string());
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn control(mut self, descriptor: ControlDescriptor) -> Self {
        self.controls.push(descriptor);
        self
    }

    pub fn build(self) -> Result<InstrumentModel, InstrumentError> {
        if self.name.trim().is_empty() {
            return Err(InstrumentError::Configuration(
                "Instrument model name is empty".to_string(),
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(InstrumentError::Configuration(format!(
                "Model '{}' has a zero timeout",
                self.name
            )));
        }
        CommandTemplate::query(&self.id_query)?;
        if let Some(query) = &self.error_query {
            CommandTemplate::query(query)?;
        }

        let mut controls = BTreeMap::new();
        for descriptor in self.controls {
            let name = descriptor.name().to_string();
            if controls.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(InstrumentError::Configuration(format!(
                    "Model '{}' declares control '{}' twice",
                    self.name, name
                )));
            }
        }

        Ok(InstrumentModel {
            name: self.name,
            id_query: self.id_query,
            error_query: self.error_query,
            clear_command: self.clear_command,
            default_timeout: self.default_timeout,
            controls,
        })
    }
}

/// Serializable form of a model, as found in configuration files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default = "default_id_query")]
    pub id_query: String,
    #[serde(default)]
    pub error_query: Option<String>,
    #[serde(default)]
    pub clear_command: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub controls: Vec<ControlConfig>,
}

impl ModelConfig {
    pub fn build(&self) -> Result<InstrumentModel, InstrumentError> {
        let mut builder = InstrumentModel::builder(&self.name)
            .id_query(&self.id_query)
            .default_timeout(Duration::from_millis(self.timeout_ms));
        if let Some(query) = &self.error_query {
            builder = builder.error_query(query);
        }
        if let Some(command) = &self.clear_command {
            builder = builder.clear_command(command);
        }
        for control in &self.controls {
            builder = builder.control(control.build()?);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ValidatorKind, ValueDomain};

    fn voltage() -> ControlDescriptor {
        ControlDescriptor::control("voltage", ":VOLT?", ":VOLT %gV", "")
            .validator(ValidatorKind::TruncatedRange)
            .values(ValueDomain::range(0.0, 80.0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_registers_controls() {
        let model = InstrumentModel::builder("PSU")
            .error_query(":SYST:ERR?")
            .control(voltage())
            .build()
            .unwrap();
        assert_eq!(model.control_names(), vec!["voltage"]);
        assert_eq!(model.id_query(), "*IDN?");
        assert_eq!(model.default_timeout(), Duration::from_secs(10));
        assert!(model.control("voltage").is_ok());
        assert!(matches!(
            model.control("frequency"),
            Err(InstrumentError::UnknownControl(_))
        ));
    }

    #[test]
    fn test_duplicate_control_rejected() {
        let result = InstrumentModel::builder("PSU")
            .control(voltage())
            .control(voltage())
            .build();
        assert!(matches!(result, Err(InstrumentError::Configuration(_))));
    }

    #[test]
    fn test_descriptors_are_shared() {
        let model = InstrumentModel::builder("PSU")
            .control(voltage())
            .build()
            .unwrap();
        let a = model.control("voltage").unwrap();
        let b = model.control("voltage").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_model_config() {
        let config: ModelConfig = serde_json::from_str(
            r#"{
                "name": "Bench PSU",
                "error_query": "SYST:ERR?",
                "controls": [
                    {"name": "voltage", "query": "VOLT?", "write": "VOLT %g",
                     "validators": [{"type": "StrictRange"}],
                     "values": {"type": "Range", "min": 0, "max": 30}}
                ]
            }"#,
        )
        .unwrap();
        let model = config.build().unwrap();
        assert_eq!(model.error_query(), Some("SYST:ERR?"));
        assert_eq!(model.control_names(), vec!["voltage"]);
    }
}
