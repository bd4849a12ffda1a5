use std::time::Duration;

use async_trait::async_trait;
use domain::InstrumentError;
use domain::adapter::{Adapter, AdapterKind};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use super::line_codec::{LineCodec, termination_byte};

/// Raw socket (SCPI over TCP) adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_termination")]
    pub write_termination: String,
    #[serde(default = "default_termination")]
    pub read_termination: String,
}

fn default_port() -> u16 {
    5025
}
fn default_connect_timeout_ms() -> u64 {
    3000
}
fn default_termination() -> String {
    "\n".to_string()
}

impl TcpConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            connect_timeout_ms: default_connect_timeout_ms(),
            write_termination: default_termination(),
            read_termination: default_termination(),
        }
    }

    /// `host:port`, with IPv6 literals bracketed
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

pub struct TcpAdapter {
    config: TcpConfig,
    codec: Option<LineCodec<TcpStream>>,
}

impl TcpAdapter {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            codec: None,
        }
    }

    fn codec(&mut self) -> Result<&mut LineCodec<TcpStream>, InstrumentError> {
        self.codec.as_mut().ok_or(InstrumentError::NotConnected)
    }
}

#[async_trait]
impl Adapter for TcpAdapter {
    async fn connect(&mut self) -> Result<(), InstrumentError> {
        let address = self.config.address();
        let read_termination = termination_byte(&self.config.read_termination)?;
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);

        tracing::debug!(address = %address, "Opening TCP connection");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!(address = %address, error = %e, "Failed to connect");
                return Err(InstrumentError::Transport(format!(
                    "Failed to connect to {}: {}",
                    address, e
                )));
            }
            Err(_) => {
                return Err(InstrumentError::Transport(format!(
                    "Connecting to {} timed out after {} ms",
                    address, self.config.connect_timeout_ms
                )));
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Could not disable Nagle's algorithm");
        }

        self.codec = Some(LineCodec::new(
            stream,
            &self.config.write_termination,
            read_termination,
        ));
        tracing::debug!(address = %address, "TCP connection established");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), InstrumentError> {
        if let Some(mut codec) = self.codec.take() {
            if let Err(e) = codec.shutdown().await {
                tracing::warn!(error = %e, "Error shutting down TCP connection");
            }
        }
        tracing::info!(address = %self.config.address(), "TCP connection closed");
        Ok(())
    }

    async fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        self.codec()?.write_line(command).await
    }

    async fn read(&mut self) -> Result<String, InstrumentError> {
        self.codec()?.read_line().await
    }

    async fn clear_input(&mut self) -> Result<(), InstrumentError> {
        let discarded = self.codec()?.discard_buffered();
        tracing::debug!(address = %self.config.address(), discarded, "Reconnecting to drop stale replies");
        // Replies still in flight stay on the old socket
        self.close().await?;
        self.connect().await
    }

    fn is_connected(&self) -> bool {
        self.codec.is_some()
    }

    fn adapter_type(&self) -> &'static str {
        AdapterKind::Tcp.as_str()
    }
}
