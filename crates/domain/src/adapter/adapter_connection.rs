use async_trait::async_trait;

use crate::error::InstrumentError;

/// Transport channel that infrastructure implementations must provide.
///
/// Adapters move raw command strings; they know nothing about controls,
/// validation or timeouts. Termination characters are the adapter's concern.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Open the underlying transport
    async fn connect(&mut self) -> Result<(), InstrumentError>;

    /// Release the underlying transport
    async fn close(&mut self) -> Result<(), InstrumentError>;

    /// Send one command
    async fn write(&mut self, command: &str) -> Result<(), InstrumentError>;

    /// Receive one reply, without its terminator
    async fn read(&mut self) -> Result<String, InstrumentError>;

    /// Discard replies that are buffered or still in flight, so the next
    /// read answers the next write
    async fn clear_input(&mut self) -> Result<(), InstrumentError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Get adapter type identifier
    fn adapter_type(&self) -> &'static str;
}
