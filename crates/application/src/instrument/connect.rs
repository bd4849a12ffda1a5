use std::sync::Arc;

use tracing::info;

use domain::{InstrumentError, InstrumentModel};
use infrastructure::{AdapterFactory, SessionConfig};

use super::session::{Instrument, SessionOptions};
use crate::devices::builtin_model;

/// Resolve the configured model: an inline declaration wins over a built-in key
pub fn resolve_model(config: &SessionConfig) -> Result<Arc<InstrumentModel>, InstrumentError> {
    match &config.model_config {
        Some(inline) => Ok(Arc::new(inline.build()?)),
        None => builtin_model(&config.model),
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            name: Some(config.name.clone()),
            timeout: config.timeout(),
            check_errors_after_set: config.check_errors_after_set,
        }
    }
}

/// Build model and adapter from configuration and open the session
pub async fn connect_session(config: &SessionConfig) -> Result<Instrument, InstrumentError> {
    let model = resolve_model(config)?;
    let adapter = AdapterFactory::create_adapter(config.adapter, config.adapter_config.clone())?;
    info!(
        instrument = %config.name,
        model = model.name(),
        adapter = adapter.adapter_type(),
        "Opening instrument session"
    );
    Instrument::connect(model, adapter, SessionOptions::from(config)).await
}
