use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use domain::AdapterKind;
use domain::instrument::ModelConfig;
use serde::{Deserialize, Serialize};

/// Session settings: which model, which transport, how patient.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Key of a built-in instrument model
    #[serde(default = "default_model")]
    pub model: String,
    /// Inline model declaration; takes precedence over `model`
    #[serde(default)]
    pub model_config: Option<ModelConfig>,
    #[serde(default = "default_adapter")]
    pub adapter: AdapterKind,
    #[serde(default)]
    pub adapter_config: serde_json::Value,
    /// Overrides the model's default timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub check_errors_after_set: bool,
}

fn default_name() -> String {
    "psu".to_string()
}
fn default_model() -> String {
    "ea-psb-9080-360-3u".to_string()
}
fn default_adapter() -> AdapterKind {
    AdapterKind::Simulated
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            model: default_model(),
            model_config: None,
            adapter: default_adapter(),
            adapter_config: serde_json::Value::Null,
            timeout_ms: None,
            check_errors_after_set: false,
        }
    }
}

impl SessionConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Local config file, e.g. config/default.toml
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Per run mode overrides, e.g. config/lab.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. PSU__TIMEOUT_MS=15000)
            .add_source(Environment::with_prefix("PSU").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Message(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("psu-config-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = scratch_dir("empty");
        let config = SessionConfig::load(dir.to_str().unwrap()).unwrap();
        assert_eq!(config.model, "ea-psb-9080-360-3u");
        assert_eq!(config.adapter, AdapterKind::Simulated);
        assert!(!config.check_errors_after_set);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_loads_serial_session_from_toml() {
        let dir = scratch_dir("serial");
        std::fs::write(
            dir.join("default.toml"),
            r#"
name = "bench-psu"
adapter = "Serial"
timeout_ms = 12000
check_errors_after_set = true

[adapter_config]
port = "/dev/ttyACM0"
baud_rate = 115200
"#,
        )
        .unwrap();

        let config = SessionConfig::load(dir.to_str().unwrap()).unwrap();
        assert_eq!(config.name, "bench-psu");
        assert_eq!(config.adapter, AdapterKind::Serial);
        assert_eq!(config.adapter_config["port"], "/dev/ttyACM0");
        assert_eq!(config.timeout(), Some(Duration::from_secs(12)));
        assert!(config.check_errors_after_set);
    }

    #[test]
    fn test_inline_model() {
        let dir = scratch_dir("model");
        std::fs::write(
            dir.join("default.toml"),
            r#"
[model_config]
name = "Bench PSU"
error_query = "SYST:ERR?"

[[model_config.controls]]
name = "voltage"
query = "VOLT?"
write = "VOLT %g"
validators = [{ type = "StrictRange" }]
values = { type = "Range", min = 0, max = 30 }
"#,
        )
        .unwrap();

        let config = SessionConfig::load(dir.to_str().unwrap()).unwrap();
        let model = config.model_config.unwrap().build().unwrap();
        assert_eq!(model.control_names(), vec!["voltage"]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = scratch_dir("zero");
        std::fs::write(dir.join("default.toml"), "timeout_ms = 0\n").unwrap();
        assert!(SessionConfig::load(dir.to_str().unwrap()).is_err());
    }
}
