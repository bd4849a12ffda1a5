use thiserror::Error;

use crate::instrument::DeviceFault;

/// Rejections raised by the validator pipeline before anything reaches the wire.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Value {value} is outside the range [{min}, {max}]")]
    Range { value: f64, min: f64, max: f64 },

    #[error("Value {value} is not in the allowed set [{}]", .allowed.join(", "))]
    DiscreteSet { value: String, allowed: Vec<String> },

    #[error("Expected {expected}, got {found}")]
    Type {
        expected: &'static str,
        found: String,
    },
}

/// Errors surfaced by descriptors, sessions and adapters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstrumentError {
    #[error("Invalid instrument configuration: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cannot parse reply {reply:?} to {command:?} as {expected}")]
    Parse {
        command: String,
        reply: String,
        expected: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No reply to {command:?} within {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Device reported {}", describe_faults(.0))]
    Device(Vec<DeviceFault>),

    #[error("Instrument is not connected")]
    NotConnected,

    #[error("Unknown control: {0}")]
    UnknownControl(String),

    #[error("Control '{0}' cannot be read")]
    NotReadable(String),

    #[error("Control '{0}' cannot be written")]
    NotWritable(String),
}

impl InstrumentError {
    /// True for rejections that happened before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Delivery status of the command is unknown after these
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }
}

fn describe_faults(faults: &[DeviceFault]) -> String {
    match faults {
        [] => "no faults".to_string(),
        [single] => single.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

pub type Result<T> = std::result::Result<T, InstrumentError>;
