//! Domain layer - Pure instrument-control model with no I/O
//!
//! This crate contains:
//! - Control values, value domains and the validator pipeline
//! - Command templates and reply parsing
//! - Control descriptors and instrument models (class-level declarations)
//! - The session state machine and device fault entries
//! - The `Adapter` transport interface (implemented by infrastructure)
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Declaration mistakes fail when a descriptor is built, not when it is used
//! - Validation is pure and testable without a transport

pub mod adapter;
pub mod control;
pub mod error;
pub mod instrument;

// Re-export commonly used types
pub use adapter::{Adapter, AdapterKind};
pub use control::{ControlDescriptor, ControlValue, ValidatorKind, ValueDomain, ValueType};
pub use error::{InstrumentError, ValidationError};
pub use instrument::{DeviceFault, InstrumentModel, SessionState};
