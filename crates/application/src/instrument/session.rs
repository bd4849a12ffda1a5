use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use domain::adapter::Adapter;
use domain::control::{ControlDescriptor, ControlValue, split_values};
use domain::{DeviceFault, InstrumentError, InstrumentModel, SessionState};

use super::control::Control;

/// Upper bound on error-queue reads per check, in case a device never reports "0"
const MAX_ERROR_QUEUE_READS: usize = 32;

/// Session-level knobs; anything left `None` falls back to the model
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub name: Option<String>,
    pub timeout: Option<Duration>,
    /// Query the error queue after every successful `set()`
    pub check_errors_after_set: bool,
}

/// A device fault together with the time it was read from the queue
#[derive(Debug, Clone, PartialEq)]
pub struct FaultRecord {
    pub fault: DeviceFault,
    pub reported_at: DateTime<Utc>,
}

/// One session with one physical (or simulated) instrument.
///
/// The session exclusively owns its adapter. Every operation runs to
/// completion before the next one starts; nothing is retried. Wrap the
/// session in [`SharedInstrument`] to use it from several tasks.
pub struct Instrument {
    name: String,
    model: Arc<InstrumentModel>,
    adapter: Box<dyn Adapter>,
    timeout: Duration,
    check_errors_after_set: bool,
    state: SessionState,
    faults: Vec<FaultRecord>,
    commanded: HashMap<String, ControlValue>,
    /// A reply timed out and may still arrive; drop it before the next write
    resync: bool,
}

/// A session behind the single lock that serialises access to its transport
pub type SharedInstrument = Arc<Mutex<Instrument>>;

impl Instrument {
    /// Open the adapter and read the error queue once so the session starts
    /// from a known state. Faults found here leave the session `Faulted`;
    /// transport, timeout and parse failures abort the connection.
    pub async fn connect(
        model: Arc<InstrumentModel>,
        mut adapter: Box<dyn Adapter>,
        options: SessionOptions,
    ) -> Result<Self, InstrumentError> {
        let name = options.name.unwrap_or_else(|| model.name().to_string());
        let timeout = options.timeout.unwrap_or_else(|| model.default_timeout());
        if timeout.is_zero() {
            return Err(InstrumentError::Configuration(format!(
                "Session '{}' has a zero timeout",
                name
            )));
        }

        info!(instrument = %name, timeout_ms = timeout.as_millis() as u64, "Connecting to instrument");
        adapter.connect().await?;

        let mut instrument = Self {
            name,
            model,
            adapter,
            timeout,
            check_errors_after_set: options.check_errors_after_set,
            state: SessionState::Disconnected.to_connected(),
            faults: Vec::new(),
            commanded: HashMap::new(),
            resync: false,
        };

        match instrument.check_errors().await {
            Ok(()) => info!(instrument = %instrument.name, "Instrument connected"),
            Err(InstrumentError::Device(faults)) => warn!(
                instrument = %instrument.name,
                faults = faults.len(),
                "Instrument connected with pending device faults"
            ),
            Err(e) => {
                if let Err(close_err) = instrument.adapter.close().await {
                    warn!(instrument = %instrument.name, error = %close_err, "Error closing adapter");
                }
                return Err(e);
            }
        }

        Ok(instrument)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Arc<InstrumentModel> {
        &self.model
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), InstrumentError> {
        if timeout.is_zero() {
            return Err(InstrumentError::Configuration(
                "Timeout must be greater than zero".to_string(),
            ));
        }
        self.timeout = timeout;
        Ok(())
    }

    /// Faults read from the device since the last `clear_errors()`
    pub fn faults(&self) -> &[FaultRecord] {
        &self.faults
    }

    /// Last value successfully written through a control
    pub fn last_commanded(&self, control: &str) -> Option<&ControlValue> {
        self.commanded.get(control)
    }

    pub fn controls(&self) -> Vec<Arc<ControlDescriptor>> {
        self.model.controls().cloned().collect()
    }

    /// Accessor bound to this session for one control
    pub fn control(&mut self, name: &str) -> Result<Control<'_>, InstrumentError> {
        let descriptor = self.model.control(name)?;
        Ok(Control::new(self, descriptor))
    }

    pub fn into_shared(self) -> SharedInstrument {
        Arc::new(Mutex::new(self))
    }

    fn ensure_open(&self) -> Result<(), InstrumentError> {
        if self.state.can_send() {
            Ok(())
        } else {
            Err(InstrumentError::NotConnected)
        }
    }

    pub async fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        self.ensure_open()?;
        if self.resync {
            debug!(instrument = %self.name, "Discarding replies left over from a timed out query");
            self.adapter.clear_input().await?;
            self.resync = false;
        }
        debug!(instrument = %self.name, command, "Sending command");
        self.adapter.write(command).await
    }

    /// Read one reply, bounded by the session timeout
    pub async fn read(&mut self) -> Result<String, InstrumentError> {
        self.ensure_open()?;
        self.read_reply("").await
    }

    /// Write `command`, then wait for exactly one reply
    pub async fn ask(&mut self, command: &str) -> Result<String, InstrumentError> {
        self.write(command).await?;
        self.read_reply(command).await
    }

    /// `ask` and split a comma separated reply
    pub async fn values(&mut self, command: &str) -> Result<Vec<ControlValue>, InstrumentError> {
        let reply = self.ask(command).await?;
        Ok(split_values(&reply))
    }

    /// Identification string (`*IDN?` unless the model says otherwise)
    pub async fn id(&mut self) -> Result<String, InstrumentError> {
        let model = Arc::clone(&self.model);
        Ok(self.ask(model.id_query()).await?.trim().to_string())
    }

    async fn read_reply(&mut self, command: &str) -> Result<String, InstrumentError> {
        match tokio::time::timeout(self.timeout, self.adapter.read()).await {
            Ok(result) => {
                let reply = result?;
                debug!(instrument = %self.name, command, reply = %reply, "Received reply");
                Ok(reply)
            }
            Err(_) => {
                warn!(instrument = %self.name, command, timeout_ms = self.timeout.as_millis() as u64, "No reply before timeout");
                self.resync = true;
                Err(InstrumentError::Timeout {
                    command: command.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Drain the device's error queue. Any reported fault moves the session
    /// to `Faulted` and is returned as `InstrumentError::Device`.
    ///
    /// Entries are gone from the device once read, so faults drained before
    /// a transport, timeout or parse failure are still recorded and the
    /// session still becomes `Faulted`; the I/O error is what gets returned.
    pub async fn check_errors(&mut self) -> Result<(), InstrumentError> {
        let model = Arc::clone(&self.model);
        let Some(query) = model.error_query() else {
            return Ok(());
        };

        let mut found = Vec::new();
        let drained = self.drain_error_queue(query, &mut found).await;
        self.record_faults(&found);
        drained?;

        if found.is_empty() {
            Ok(())
        } else {
            Err(InstrumentError::Device(found))
        }
    }

    async fn drain_error_queue(
        &mut self,
        query: &str,
        found: &mut Vec<DeviceFault>,
    ) -> Result<(), InstrumentError> {
        for _ in 0..MAX_ERROR_QUEUE_READS {
            let reply = self.ask(query).await?;
            match DeviceFault::parse(&reply) {
                Ok(None) => return Ok(()),
                Ok(Some(fault)) => found.push(fault),
                Err(_) => {
                    return Err(InstrumentError::Parse {
                        command: query.to_string(),
                        reply,
                        expected: "an error queue entry (code,\"message\")".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn record_faults(&mut self, found: &[DeviceFault]) {
        if found.is_empty() {
            return;
        }
        let reported_at = Utc::now();
        for fault in found {
            warn!(instrument = %self.name, code = fault.code, message = %fault.message, "Device fault");
            self.faults.push(FaultRecord {
                fault: fault.clone(),
                reported_at,
            });
        }
        if let Ok(next) = self.state.to_faulted() {
            self.state = next;
        }
    }

    /// Send the model's clear command and return to `Connected`
    pub async fn clear_errors(&mut self) -> Result<(), InstrumentError> {
        self.ensure_open()?;
        let model = Arc::clone(&self.model);
        if let Some(command) = model.clear_command() {
            self.write(command).await?;
        }
        self.faults.clear();
        self.state = self.state.to_connected();
        info!(instrument = %self.name, "Device errors cleared");
        Ok(())
    }

    pub async fn get(&mut self, name: &str) -> Result<ControlValue, InstrumentError> {
        let descriptor = self.model.control(name)?;
        self.get_with(&descriptor).await
    }

    pub async fn set(
        &mut self,
        name: &str,
        value: impl Into<ControlValue>,
    ) -> Result<(), InstrumentError> {
        let descriptor = self.model.control(name)?;
        self.set_with(&descriptor, value.into()).await
    }

    pub(crate) async fn get_with(
        &mut self,
        descriptor: &ControlDescriptor,
    ) -> Result<ControlValue, InstrumentError> {
        let query = descriptor.query_command()?;
        let reply = self.ask(&query).await?;
        let value = descriptor.parse_reply(&reply)?;
        debug!(instrument = %self.name, control = descriptor.name(), value = %value, "Read control");

        if descriptor.check_get_errors() {
            self.check_errors().await?;
        }
        Ok(value)
    }

    pub(crate) async fn set_with(
        &mut self,
        descriptor: &ControlDescriptor,
        candidate: ControlValue,
    ) -> Result<(), InstrumentError> {
        // Validation is pure; nothing reaches the adapter when it fails.
        let prepared = descriptor.prepare_write(candidate)?;
        if prepared.was_coerced() {
            match (&prepared.candidate, &prepared.value) {
                (ControlValue::Number(requested), ControlValue::Number(applied)) => warn!(
                    instrument = %self.name,
                    control = descriptor.name(),
                    requested,
                    applied,
                    "Value clamped to the control's range"
                ),
                _ => debug!(
                    instrument = %self.name,
                    control = descriptor.name(),
                    requested = %prepared.candidate,
                    applied = %prepared.value,
                    "Value normalised by validator"
                ),
            }
        }

        self.write(&prepared.command).await?;
        self.commanded
            .insert(descriptor.name().to_string(), prepared.value);

        if descriptor.check_set_errors() || self.check_errors_after_set {
            self.check_errors().await?;
        }
        Ok(())
    }

    /// Release the adapter. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), InstrumentError> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        let result = self.adapter.close().await;
        self.state = self.state.to_disconnected();
        self.commanded.clear();
        self.resync = false;
        info!(instrument = %self.name, "Instrument session closed");
        result
    }
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .field("faults", &self.faults.len())
            .finish()
    }
}
