use serde::{Deserialize, Serialize};

/// Lifecycle of an instrument session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionState {
    /// No adapter session, nothing can be sent
    #[default]
    Disconnected,
    /// Adapter open and the error queue was clean at the last check
    Connected,
    /// The device reported a fault; commands are still sent
    Faulted,
}

impl SessionState {
    /// Faulted does not block traffic, only Disconnected does
    pub fn can_send(&self) -> bool {
        matches!(self, Self::Connected | Self::Faulted)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted)
    }

    /// Transition to connected state (session opened, or faults cleared)
    pub fn to_connected(&self) -> Self {
        Self::Connected
    }

    /// Transition to faulted state
    pub fn to_faulted(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connected | Self::Faulted => Ok(Self::Faulted),
            Self::Disconnected => Err("Cannot fault a disconnected session"),
        }
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::Faulted => "Faulted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_disconnected() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Disconnected);
        assert!(!state.can_send());
    }

    #[test]
    fn test_connect_then_fault_then_clear() {
        let state = SessionState::Disconnected.to_connected();
        assert!(state.can_send());

        let faulted = state.to_faulted().unwrap();
        assert!(faulted.is_faulted());
        assert!(faulted.can_send());

        let cleared = faulted.to_connected();
        assert_eq!(cleared, SessionState::Connected);
    }

    #[test]
    fn test_cannot_fault_when_disconnected() {
        assert!(SessionState::Disconnected.to_faulted().is_err());
    }

    #[test]
    fn test_to_disconnected_from_any_state() {
        assert_eq!(
            SessionState::Connected.to_disconnected(),
            SessionState::Disconnected
        );
        assert_eq!(
            SessionState::Faulted.to_disconnected(),
            SessionState::Disconnected
        );
    }
}
