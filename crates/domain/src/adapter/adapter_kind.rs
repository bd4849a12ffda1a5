use serde::{Deserialize, Serialize};

/// Transport used to reach an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterKind {
    Serial,
    Tcp,
    Simulated,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "Serial",
            Self::Tcp => "TCP",
            Self::Simulated => "Simulated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_kind_as_str() {
        assert_eq!(AdapterKind::Serial.as_str(), "Serial");
        assert_eq!(AdapterKind::Tcp.as_str(), "TCP");
        assert_eq!(AdapterKind::Simulated.as_str(), "Simulated");
    }

    #[test]
    fn test_adapter_kind_deserializes() {
        let kind: AdapterKind = serde_json::from_str("\"Tcp\"").unwrap();
        assert_eq!(kind, AdapterKind::Tcp);
    }
}
