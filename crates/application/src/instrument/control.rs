use std::sync::Arc;

use domain::control::{ControlDescriptor, ControlValue};
use domain::InstrumentError;

use super::session::Instrument;

/// A control descriptor bound to one session: the get/set pair for a named parameter.
pub struct Control<'a> {
    instrument: &'a mut Instrument,
    descriptor: Arc<ControlDescriptor>,
}

impl<'a> Control<'a> {
    pub(crate) fn new(instrument: &'a mut Instrument, descriptor: Arc<ControlDescriptor>) -> Self {
        Self {
            instrument,
            descriptor,
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &ControlDescriptor {
        &self.descriptor
    }

    pub async fn get(&mut self) -> Result<ControlValue, InstrumentError> {
        let descriptor = Arc::clone(&self.descriptor);
        self.instrument.get_with(&descriptor).await
    }

    pub async fn set(&mut self, value: impl Into<ControlValue>) -> Result<(), InstrumentError> {
        let descriptor = Arc::clone(&self.descriptor);
        self.instrument.set_with(&descriptor, value.into()).await
    }

    /// Set from textual input, interpreted according to the control's value type
    pub async fn set_from_input(&mut self, raw: &str) -> Result<(), InstrumentError> {
        let value = self.descriptor.value_from_input(raw);
        self.set(value).await
    }
}
