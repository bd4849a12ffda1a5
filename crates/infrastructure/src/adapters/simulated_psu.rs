use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use domain::adapter::{Adapter, AdapterKind};
use domain::control::parse_number;
use domain::{DeviceFault, InstrumentError};
use serde::Deserialize;
use tokio::sync::Mutex;

/// Commands kept in the simulator's transcript
pub const TRANSCRIPT_LIMIT: usize = 1024;

/// Simulated bench power supply configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SimulatedPsuConfig {
    #[serde(default = "default_idn")]
    pub idn: String,
    #[serde(default = "default_voltage_limit")]
    pub voltage_limit: f64,
    #[serde(default = "default_current_limit")]
    pub current_limit: f64,
    #[serde(default = "default_power_limit")]
    pub power_limit: f64,
    /// Faults already queued when the session opens
    #[serde(default)]
    pub initial_faults: Vec<DeviceFault>,
    /// Append units to numeric replies ("42.50 V") as the real unit does
    #[serde(default = "default_reply_units")]
    pub reply_units: bool,
    /// Never answer queries
    #[serde(default)]
    pub silent: bool,
}

fn default_idn() -> String {
    "EA Elektro-Automatik GmbH & Co. KG,PSB 9080-360 3U,SIM000001,V2.10".to_string()
}
fn default_voltage_limit() -> f64 {
    80.0
}
fn default_current_limit() -> f64 {
    360.0
}
fn default_power_limit() -> f64 {
    15000.0
}
fn default_reply_units() -> bool {
    true
}

impl Default for SimulatedPsuConfig {
    fn default() -> Self {
        Self {
            idn: default_idn(),
            voltage_limit: default_voltage_limit(),
            current_limit: default_current_limit(),
            power_limit: default_power_limit(),
            initial_faults: Vec::new(),
            reply_units: default_reply_units(),
            silent: false,
        }
    }
}

/// Register and queue state of the simulated unit
#[derive(Debug, Default)]
struct PsuState {
    voltage: f64,
    current: f64,
    power: f64,
    output_on: bool,
    remote_locked: bool,
    errors: VecDeque<DeviceFault>,
    pending: VecDeque<String>,
    received: VecDeque<String>,
    connected: bool,
    silent: bool,
}

impl PsuState {
    fn push_error(&mut self, code: i32, message: &str) {
        tracing::debug!(code, message, "Simulated PSU queued error");
        self.errors.push_back(DeviceFault::new(code, message));
    }

    fn reset(&mut self) {
        self.voltage = 0.0;
        self.current = 0.0;
        self.power = 0.0;
        self.output_on = false;
    }
}

/// In-memory stand-in for an EA PSB style supply speaking its SCPI subset.
pub struct SimulatedPsu {
    config: SimulatedPsuConfig,
    state: Arc<Mutex<PsuState>>,
}

/// Inspection handle that stays valid after the adapter moves into a session
#[derive(Clone)]
pub struct SimulatorHandle {
    state: Arc<Mutex<PsuState>>,
}

impl SimulatedPsu {
    pub fn new(config: SimulatedPsuConfig) -> Self {
        let state = PsuState {
            errors: config.initial_faults.iter().cloned().collect(),
            silent: config.silent,
            ..PsuState::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn handle(&self) -> SimulatorHandle {
        SimulatorHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn format_reading(&self, value: f64, unit: &str) -> String {
        if self.config.reply_units {
            format!("{:.2} {}", value, unit)
        } else {
            domain::control::format_number(value)
        }
    }

    fn handle_command(&self, state: &mut PsuState, command: &str) {
        let (header, argument) = match command.trim().split_once(char::is_whitespace) {
            Some((h, a)) => (h, Some(a.trim())),
            None => (command.trim(), None),
        };
        let header = header.trim_start_matches(':').to_uppercase();

        if let Some(query) = header.strip_suffix('?') {
            let reply = match query {
                "*IDN" => Some(self.config.idn.clone()),
                "VOLT" => Some(self.format_reading(state.voltage, "V")),
                "CURR" => Some(self.format_reading(state.current, "A")),
                "POW" => Some(self.format_reading(state.power, "W")),
                "OUTP" => Some(on_off(state.output_on).to_string()),
                "SYST:LOCK" => Some(on_off(state.remote_locked).to_string()),
                "SYST:ERR" => Some(match state.errors.pop_front() {
                    Some(fault) => format!("{},\"{}\"", fault.code, fault.message),
                    None => "0,\"No error\"".to_string(),
                }),
                _ => None,
            };
            match reply {
                Some(reply) if !state.silent => state.pending.push_back(reply),
                Some(_) => {}
                None => state.push_error(-113, "Undefined header"),
            }
            return;
        }

        match (header.as_str(), argument) {
            ("*CLS", _) => state.errors.clear(),
            ("*RST", _) => state.reset(),
            ("VOLT" | "CURR" | "POW" | "OUTP" | "SYST:LOCK", None) => {
                state.push_error(-109, "Missing parameter")
            }
            ("VOLT", Some(arg)) => {
                if let Some(v) = self.numeric_setting(state, arg, self.config.voltage_limit) {
                    state.voltage = v;
                }
            }
            ("CURR", Some(arg)) => {
                if let Some(v) = self.numeric_setting(state, arg, self.config.current_limit) {
                    state.current = v;
                }
            }
            ("POW", Some(arg)) => {
                if let Some(v) = self.numeric_setting(state, arg, self.config.power_limit) {
                    state.power = v;
                }
            }
            ("OUTP", Some(arg)) => match parse_switch(arg) {
                Some(on) => state.output_on = on,
                None => state.push_error(-224, "Illegal parameter value"),
            },
            ("SYST:LOCK", Some(arg)) => match parse_switch(arg) {
                Some(on) => state.remote_locked = on,
                None => state.push_error(-224, "Illegal parameter value"),
            },
            _ => state.push_error(-113, "Undefined header"),
        }

        self.enforce_power_limit(state);
    }

    fn numeric_setting(&self, state: &mut PsuState, arg: &str, limit: f64) -> Option<f64> {
        match parse_number(arg) {
            Some(v) if (0.0..=limit).contains(&v) => Some(v),
            Some(_) => {
                state.push_error(-222, "Data out of range");
                None
            }
            None => {
                state.push_error(-104, "Data type error");
                None
            }
        }
    }

    // The unit trips its output when V x I exceeds the power limit.
    fn enforce_power_limit(&self, state: &mut PsuState) {
        if state.output_on && state.voltage * state.current > self.config.power_limit {
            state.output_on = false;
            state.push_error(-221, "Settings conflict; power limit exceeded, output disabled");
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

fn parse_switch(arg: &str) -> Option<bool> {
    match arg.to_uppercase().as_str() {
        "ON" | "1" => Some(true),
        "OFF" | "0" => Some(false),
        _ => None,
    }
}

#[async_trait]
impl Adapter for SimulatedPsu {
    async fn connect(&mut self) -> Result<(), InstrumentError> {
        self.state.lock().await.connected = true;
        tracing::info!("Simulated PSU connected with config: {:?}", self.config);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), InstrumentError> {
        self.state.lock().await.connected = false;
        tracing::info!("Simulated PSU disconnected");
        Ok(())
    }

    async fn write(&mut self, command: &str) -> Result<(), InstrumentError> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(InstrumentError::NotConnected);
        }
        if state.received.len() == TRANSCRIPT_LIMIT {
            state.received.pop_front();
        }
        state.received.push_back(command.to_string());
        self.handle_command(&mut state, command);
        Ok(())
    }

    async fn read(&mut self) -> Result<String, InstrumentError> {
        let reply = {
            let mut state = self.state.lock().await;
            if !state.connected {
                return Err(InstrumentError::NotConnected);
            }
            state.pending.pop_front()
        };
        match reply {
            Some(reply) => Ok(reply),
            // A real unit with nothing to say stays quiet; the caller's timeout decides.
            None => std::future::pending().await,
        }
    }

    async fn clear_input(&mut self) -> Result<(), InstrumentError> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(InstrumentError::NotConnected);
        }
        state.pending.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state
            .try_lock()
            .map(|state| state.connected)
            .unwrap_or(true)
    }

    fn adapter_type(&self) -> &'static str {
        AdapterKind::Simulated.as_str()
    }
}

impl SimulatorHandle {
    /// Commands received so far, oldest first; only the most recent
    /// `TRANSCRIPT_LIMIT` are kept
    pub async fn received(&self) -> Vec<String> {
        self.state.lock().await.received.iter().cloned().collect()
    }

    pub async fn clear_received(&self) {
        self.state.lock().await.received.clear();
    }

    pub async fn inject_fault(&self, fault: DeviceFault) {
        self.state.lock().await.errors.push_back(fault);
    }

    pub async fn set_silent(&self, silent: bool) {
        self.state.lock().await.silent = silent;
    }

    pub async fn queued_errors(&self) -> usize {
        self.state.lock().await.errors.len()
    }

    pub async fn voltage(&self) -> f64 {
        self.state.lock().await.voltage
    }

    pub async fn current(&self) -> f64 {
        self.state.lock().await.current
    }

    pub async fn output_on(&self) -> bool {
        self.state.lock().await.output_on
    }

    pub async fn remote_locked(&self) -> bool {
        self.state.lock().await.remote_locked
    }
}
