use std::sync::Arc;

use async_trait::async_trait;
use domain::InstrumentError;
use domain::adapter::{Adapter, AdapterKind};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use super::line_codec::{LineCodec, termination_byte};

/// Serial adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: String, // "None", "Even", "Odd"
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_write_termination")]
    pub write_termination: String,
    #[serde(default = "default_read_termination")]
    pub read_termination: String,
}

fn default_baud_rate() -> u32 {
    115200
}
fn default_data_bits() -> u8 {
    8
}
fn default_parity() -> String {
    "None".to_string()
}
fn default_stop_bits() -> u8 {
    1
}
fn default_write_termination() -> String {
    "\n".to_string()
}
fn default_read_termination() -> String {
    "\n".to_string()
}

impl SerialConfig {
    pub fn new(port: String) -> Self {
        Self {
            port,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            write_termination: default_write_termination(),
            read_termination: default_read_termination(),
        }
    }

    fn to_parity(&self) -> Result<tokio_serial::Parity, InstrumentError> {
        match self.parity.as_str() {
            "None" => Ok(tokio_serial::Parity::None),
            "Even" => Ok(tokio_serial::Parity::Even),
            "Odd" => Ok(tokio_serial::Parity::Odd),
            _ => Err(InstrumentError::Configuration(format!(
                "Invalid parity: {}",
                self.parity
            ))),
        }
    }

    fn to_stop_bits(&self) -> Result<tokio_serial::StopBits, InstrumentError> {
        match self.stop_bits {
            1 => Ok(tokio_serial::StopBits::One),
            2 => Ok(tokio_serial::StopBits::Two),
            _ => Err(InstrumentError::Configuration(format!(
                "Invalid stop bits: {}",
                self.stop_bits
            ))),
        }
    }

    fn to_data_bits(&self) -> Result<tokio_serial::DataBits, InstrumentError> {
        match self.data_bits {
            5 => Ok(tokio_serial::DataBits::Five),
            6 => Ok(tokio_serial::DataBits::Six),
            7 => Ok(tokio_serial::DataBits::Seven),
            8 => Ok(tokio_serial::DataBits::Eight),
            _ => Err(InstrumentError::Configuration(format!(
                "Invalid data bits: {}",
                self.data_bits
            ))),
        }
    }

    /// Normalize port name for Windows (e.g., COM7 -> \\.\COM7)
    fn port_name(&self) -> String {
        if cfg!(target_os = "windows") && !self.port.to_uppercase().starts_with(r"\\.\") {
            format!(r"\\.\{}", self.port)
        } else {
            self.port.clone()
        }
    }
}

/// Serial (RS-232 / USB-CDC) adapter.
/// The codec sits behind Arc<Mutex<>> so the adapter is Send + Sync as `Adapter` requires.
pub struct SerialAdapter {
    config: SerialConfig,
    codec: Option<Arc<Mutex<LineCodec<SerialStream>>>>,
}

impl SerialAdapter {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            codec: None,
        }
    }

    fn codec(&self) -> Result<Arc<Mutex<LineCodec<SerialStream>>>, InstrumentError> {
        self.codec.clone().ok_or(InstrumentError::NotConnected)
    }
}

#[async_trait]
impl Adapter for SerialAdapter {
    async fn connect(&mut self) -> Result<(), InstrumentError> {
        let port_name = self.config.port_name();
        let read_termination = termination_byte(&self.config.read_termination)?;

        tracing::debug!(
            port = %port_name,
            baud_rate = self.config.baud_rate,
            "Opening serial port"
        );

        let port = tokio_serial::new(&port_name, self.config.baud_rate)
            .data_bits(self.config.to_data_bits()?)
            .parity(self.config.to_parity()?)
            .stop_bits(self.config.to_stop_bits()?)
            .open_native_async()
            .map_err(|e| {
                tracing::warn!(port = %port_name, error = %e, "Failed to open serial port");
                InstrumentError::Transport(format!(
                    "Failed to open serial port {}: {}. Tip: Ensure the port is not used by another application and that you have sufficient permissions.",
                    port_name, e
                ))
            })?;

        self.codec = Some(Arc::new(Mutex::new(LineCodec::new(
            port,
            &self.config.write_termination,
            read_termination,
        ))));

        tracing::debug!(port = %self.config.port, "Serial port opened successfully");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), InstrumentError> {
        if let Some(codec) = self.codec.take() {
            let mut codec = codec.lock().await;
            if let Err(e) = codec.shutdown().await {
                tracing::warn!(error = %e, "Error shutting down serial port");
            }
        }
        tracing::info!(port = %self.config.port, "Serial port closed");
        Ok(())
    }

    async fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        let codec = self.codec()?;
        let mut codec = codec.lock().await;
        codec.write_line(command).await
    }

    async fn read(&mut self) -> Result<String, InstrumentError> {
        let codec = self.codec()?;
        let mut codec = codec.lock().await;
        codec.read_line().await
    }

    async fn clear_input(&mut self) -> Result<(), InstrumentError> {
        let codec = self.codec()?;
        let mut codec = codec.lock().await;
        let discarded = codec.discard_buffered();
        SerialPort::clear(codec.stream_mut(), ClearBuffer::Input).map_err(|e| {
            InstrumentError::Transport(format!("Failed to clear serial input: {}", e))
        })?;
        tracing::debug!(port = %self.config.port, discarded, "Serial input cleared");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.codec.is_some()
    }

    fn adapter_type(&self) -> &'static str {
        AdapterKind::Serial.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("COM1".to_string());
        assert_eq!(config.port, "COM1");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, "None");
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.write_termination, "\n");
    }

    #[test]
    fn test_serial_config_parity_conversion() {
        let config = SerialConfig {
            parity: "Even".to_string(),
            ..SerialConfig::new("COM1".to_string())
        };
        assert!(matches!(
            config.to_parity().unwrap(),
            tokio_serial::Parity::Even
        ));

        let config_bad = SerialConfig {
            parity: "Mark".to_string(),
            ..config.clone()
        };
        assert!(config_bad.to_parity().is_err());
        assert!(
            SerialConfig {
                stop_bits: 3,
                ..config
            }
            .to_stop_bits()
            .is_err()
        );
    }

    #[test]
    fn test_serial_initial_state() {
        let adapter = SerialAdapter::new(SerialConfig::new("COM1".to_string()));
        assert!(!adapter.is_connected());
        assert_eq!(adapter.adapter_type(), "Serial");
    }

    #[tokio::test]
    async fn test_io_without_connection_fails() {
        let mut adapter = SerialAdapter::new(SerialConfig::new("COM1".to_string()));
        assert_eq!(
            adapter.write("*IDN?").await,
            Err(InstrumentError::NotConnected)
        );
        // Should be able to close even if not connected
        assert!(adapter.close().await.is_ok());
    }
}
