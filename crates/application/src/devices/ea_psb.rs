//! Elektro-Automatik PSB 9080-360 3U bidirectional power supply
//! (0-80 V, 0-360 A, 0-15 kW) over its SCPI command set.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use domain::control::{ControlDescriptor, ControlValue, ValidatorKind, ValueDomain, ValueType};
use domain::{InstrumentError, InstrumentModel, SessionState};

use crate::instrument::{Instrument, SessionOptions};
use domain::adapter::Adapter;

pub const MODEL_KEY: &str = "ea-psb-9080-360-3u";

/// The unit can take up to 8.8 s to settle before it answers.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

static MODEL: LazyLock<Result<Arc<InstrumentModel>, InstrumentError>> =
    LazyLock::new(|| model().map(Arc::new));

/// Build the control table for the PSB 9080-360 3U
pub fn model() -> Result<InstrumentModel, InstrumentError> {
    InstrumentModel::builder("EA PSB 9080-360 3U")
        .error_query(":SYST:ERR?")
        .clear_command("*CLS")
        .default_timeout(DEFAULT_TIMEOUT)
        .control(
            ControlDescriptor::control("voltage", ":VOLT?", ":VOLT %gV", "Output voltage in volts")
                .validator(ValidatorKind::TruncatedRange)
                .values(ValueDomain::range(0.0, 80.0))
                .build()?,
        )
        .control(
            ControlDescriptor::control("current", ":CURR?", ":CURR %gA", "Output current in amperes")
                .validator(ValidatorKind::TruncatedRange)
                .values(ValueDomain::range(0.0, 300.0))
                .build()?,
        )
        .control(
            ControlDescriptor::control("power", ":POW?", ":POW %g", "Output power in watts")
                .validator(ValidatorKind::TruncatedRange)
                .values(ValueDomain::range(0.0, 15000.0))
                .build()?,
        )
        .control(switch("output", ":OUTP?", ":OUTP %s", "DC output state, ON or OFF")?)
        .control(switch(
            "remote",
            ":SYST:LOCK?",
            ":SYST:LOCK %s",
            "Remote control lock, ON or OFF",
        )?)
        .build()
}

fn switch(
    name: &str,
    query: &str,
    write: &str,
    docs: &str,
) -> Result<ControlDescriptor, InstrumentError> {
    ControlDescriptor::control(name, query, write, docs)
        .validator(ValidatorKind::Uppercase)
        .validator(ValidatorKind::StrictDiscreteSet)
        .values(ValueDomain::set(["ON", "OFF"]))
        .value_type(ValueType::Text)
        .build()
}

/// Process-wide model shared by every PSB session
pub fn shared_model() -> Result<Arc<InstrumentModel>, InstrumentError> {
    MODEL.clone()
}

/// Typed front for a PSB session
#[derive(Debug)]
pub struct EaPsb9080 {
    instrument: Instrument,
}

impl EaPsb9080 {
    pub async fn connect(
        adapter: Box<dyn Adapter>,
        options: SessionOptions,
    ) -> Result<Self, InstrumentError> {
        let instrument = Instrument::connect(shared_model()?, adapter, options).await?;
        Ok(Self { instrument })
    }

    /// Wrap a session that was opened with the PSB model
    pub fn from_instrument(instrument: Instrument) -> Self {
        Self { instrument }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut Instrument {
        &mut self.instrument
    }

    pub fn into_instrument(self) -> Instrument {
        self.instrument
    }

    pub fn state(&self) -> SessionState {
        self.instrument.state()
    }

    pub async fn voltage(&mut self) -> Result<f64, InstrumentError> {
        self.number("voltage").await
    }

    pub async fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        self.instrument.set("voltage", volts).await
    }

    pub async fn current(&mut self) -> Result<f64, InstrumentError> {
        self.number("current").await
    }

    pub async fn set_current(&mut self, amperes: f64) -> Result<(), InstrumentError> {
        self.instrument.set("current", amperes).await
    }

    pub async fn power(&mut self) -> Result<f64, InstrumentError> {
        self.number("power").await
    }

    pub async fn set_power(&mut self, watts: f64) -> Result<(), InstrumentError> {
        self.instrument.set("power", watts).await
    }

    /// "ON" or "OFF"
    pub async fn output(&mut self) -> Result<String, InstrumentError> {
        self.text("output").await
    }

    pub async fn set_output(&mut self, state: &str) -> Result<(), InstrumentError> {
        self.instrument.set("output", state).await
    }

    /// "ON" or "OFF"
    pub async fn remote(&mut self) -> Result<String, InstrumentError> {
        self.text("remote").await
    }

    pub async fn set_remote(&mut self, state: &str) -> Result<(), InstrumentError> {
        self.instrument.set("remote", state).await
    }

    pub async fn id(&mut self) -> Result<String, InstrumentError> {
        self.instrument.id().await
    }

    pub async fn close(&mut self) -> Result<(), InstrumentError> {
        self.instrument.close().await
    }

    async fn number(&mut self, control: &str) -> Result<f64, InstrumentError> {
        let value = self.instrument.get(control).await?;
        Ok(value.expect_number()?)
    }

    async fn text(&mut self, control: &str) -> Result<String, InstrumentError> {
        match self.instrument.get(control).await? {
            ControlValue::Text(text) => Ok(text),
            other => Ok(other.to_string()),
        }
    }
}
