//! Application layer - Instrument sessions and device definitions

pub mod devices;
pub mod instrument;

pub use devices::{EaPsb9080, builtin_model};
pub use instrument::{
    Control, FaultRecord, Instrument, SessionOptions, SharedInstrument, connect_session,
};
