mod connect;
mod control;
mod session;

pub use connect::{connect_session, resolve_model};
pub use control::Control;
pub use session::{FaultRecord, Instrument, SessionOptions, SharedInstrument};
