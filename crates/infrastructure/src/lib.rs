//! Infrastructure layer - Transports and configuration

pub mod adapters;
pub mod config;

pub use adapters::{AdapterFactory, SimulatedPsu, SimulatorHandle};
pub use config::SessionConfig;
