mod fault;
mod model;
mod state;

pub use fault::DeviceFault;
pub use model::{InstrumentModel, InstrumentModelBuilder, ModelConfig};
pub use state::SessionState;
