mod line_codec;
mod serial;
mod simulated_psu;
mod tcp;

pub use line_codec::LineCodec;
pub use serial::{SerialAdapter, SerialConfig};
pub use simulated_psu::{SimulatedPsu, SimulatedPsuConfig, SimulatorHandle, TRANSCRIPT_LIMIT};
pub use tcp::{TcpAdapter, TcpConfig};

use domain::InstrumentError;
use domain::adapter::{Adapter, AdapterKind};

/// Factory for creating adapters
pub struct AdapterFactory;

impl AdapterFactory {
    /// Create an adapter from its kind and configuration
    pub fn create_adapter(
        kind: AdapterKind,
        config: serde_json::Value,
    ) -> Result<Box<dyn Adapter>, InstrumentError> {
        match kind {
            AdapterKind::Serial => {
                let serial_config: SerialConfig = serde_json::from_value(config).map_err(|e| {
                    InstrumentError::Configuration(format!("Invalid Serial config: {}", e))
                })?;
                Ok(Box::new(SerialAdapter::new(serial_config)) as Box<dyn Adapter>)
            }
            AdapterKind::Tcp => {
                let tcp_config: TcpConfig = serde_json::from_value(config).map_err(|e| {
                    InstrumentError::Configuration(format!("Invalid TCP config: {}", e))
                })?;
                Ok(Box::new(TcpAdapter::new(tcp_config)) as Box<dyn Adapter>)
            }
            AdapterKind::Simulated => {
                let sim_config = Self::simulated_config(config)?;
                Ok(Box::new(SimulatedPsu::new(sim_config)) as Box<dyn Adapter>)
            }
        }
    }

    /// Simulated adapter plus its inspection handle
    pub fn create_simulated(
        config: serde_json::Value,
    ) -> Result<(Box<dyn Adapter>, SimulatorHandle), InstrumentError> {
        let psu = SimulatedPsu::new(Self::simulated_config(config)?);
        let handle = psu.handle();
        Ok((Box::new(psu), handle))
    }

    fn simulated_config(config: serde_json::Value) -> Result<SimulatedPsuConfig, InstrumentError> {
        if config.is_null() {
            return Ok(SimulatedPsuConfig::default());
        }
        serde_json::from_value(config).map_err(|e| {
            InstrumentError::Configuration(format!("Invalid Simulated config: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_serial_adapter() {
        let config = json!({
            "port": "/dev/ttyACM0",
            "baud_rate": 115200
        });

        let adapter = AdapterFactory::create_adapter(AdapterKind::Serial, config);
        assert!(adapter.is_ok());

        let adapter = adapter.unwrap();
        assert_eq!(adapter.adapter_type(), "Serial");
        assert!(!adapter.is_connected());
    }

    #[test]
    fn test_create_tcp_adapter() {
        let config = json!({"host": "192.168.0.20"});

        let adapter = AdapterFactory::create_adapter(AdapterKind::Tcp, config).unwrap();
        assert_eq!(adapter.adapter_type(), "TCP");
    }

    #[test]
    fn test_create_simulated_with_defaults() {
        let adapter =
            AdapterFactory::create_adapter(AdapterKind::Simulated, serde_json::Value::Null);
        assert!(adapter.is_ok());
        assert_eq!(adapter.unwrap().adapter_type(), "Simulated");
    }

    #[test]
    fn test_create_serial_invalid_config() {
        let config = json!({"invalid_field": "value"});

        let adapter = AdapterFactory::create_adapter(AdapterKind::Serial, config);
        assert!(matches!(adapter, Err(InstrumentError::Configuration(_))));
    }

    #[test]
    fn test_create_simulated_rejects_bad_types() {
        let config = json!({"power_limit": "lots"});
        assert!(AdapterFactory::create_simulated(config).is_err());
    }
}
