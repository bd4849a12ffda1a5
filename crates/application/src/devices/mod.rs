//! Built-in instrument definitions

pub mod ea_psb;

use std::sync::Arc;

use domain::{InstrumentError, InstrumentModel};

pub use ea_psb::EaPsb9080;

/// Keys accepted by [`builtin_model`]
pub fn builtin_keys() -> &'static [&'static str] {
    &[ea_psb::MODEL_KEY]
}

/// Look up a built-in model by key (case-insensitive)
pub fn builtin_model(key: &str) -> Result<Arc<InstrumentModel>, InstrumentError> {
    match key.to_ascii_lowercase().as_str() {
        ea_psb::MODEL_KEY => ea_psb::shared_model(),
        other => Err(InstrumentError::Configuration(format!(
            "Unknown instrument model '{}', expected one of: {}",
            other,
            builtin_keys().join(", ")
        ))),
    }
}
