use std::fmt;

use serde::{Deserialize, Serialize};

/// One entry of a device's SCPI error queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFault {
    pub code: i32,
    pub message: String,
}

impl DeviceFault {
    pub fn new(code: i32, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    /// Parse a `code,"message"` reply. `Ok(None)` is the empty-queue entry (code 0).
    pub fn parse(reply: &str) -> Result<Option<Self>, String> {
        let reply = reply.trim();
        let (code, message) = match reply.split_once(',') {
            Some((code, message)) => (code, message),
            None => (reply, ""),
        };
        let code: i32 = code
            .trim()
            .parse()
            .map_err(|_| format!("error queue entry without a numeric code: {:?}", reply))?;
        if code == 0 {
            return Ok(None);
        }
        let message = message.trim().trim_matches('"').trim();
        Ok(Some(Self::new(code, message)))
    }
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "error {}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_error() {
        assert_eq!(DeviceFault::parse("0,\"No error\"\n"), Ok(None));
        assert_eq!(DeviceFault::parse("+0, \"No error\""), Ok(None));
        assert_eq!(DeviceFault::parse("0"), Ok(None));
    }

    #[test]
    fn test_fault_entry() {
        assert_eq!(
            DeviceFault::parse("-222,\"Data out of range\""),
            Ok(Some(DeviceFault::new(-222, "Data out of range")))
        );
        assert_eq!(
            DeviceFault::parse("-113"),
            Ok(Some(DeviceFault::new(-113, "")))
        );
    }

    #[test]
    fn test_message_may_contain_commas() {
        let fault = DeviceFault::parse("201,\"Overpower, output disabled\"")
            .unwrap()
            .unwrap();
        assert_eq!(fault.message, "Overpower, output disabled");
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(DeviceFault::parse("OK").is_err());
        assert!(DeviceFault::parse("").is_err());
    }
}
