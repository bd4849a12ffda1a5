use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A value travelling between the caller and a control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Number(f64),
    Text(String),
}

impl ControlValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    /// Numeric payload, or a type error naming what was found instead
    pub fn expect_number(&self) -> Result<f64, ValidationError> {
        match self {
            Self::Number(n) if n.is_nan() => Err(ValidationError::Type {
                expected: "a number",
                found: "NaN".to_string(),
            }),
            Self::Number(n) => Ok(*n),
            Self::Text(s) => Err(ValidationError::Type {
                expected: "a number",
                found: format!("text {:?}", s),
            }),
        }
    }

    pub fn expect_text(&self) -> Result<&str, ValidationError> {
        match self {
            Self::Text(s) => Ok(s),
            Self::Number(n) => Err(ValidationError::Type {
                expected: "text",
                found: format!("number {}", format_number(*n)),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }
}

/// Shortest form that parses back to the same `f64`, no padding.
///
/// Decimal exponents below -4 or from 16 up switch to exponent notation
/// (`1e-9`, `1.5e300`), like `%g`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // -0.0 would otherwise render as "-0"
        return "0".to_string();
    }
    let scientific = format!("{:e}", value);
    let exponent = scientific
        .rsplit_once('e')
        .and_then(|(_, e)| e.parse::<i32>().ok())
        .unwrap_or(0);
    if (-4..16).contains(&exponent) {
        format!("{}", value)
    } else {
        scientific
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ControlValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for ControlValue {
    fn from(value: f32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i32> for ControlValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for ControlValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for ControlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ControlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Declared type of a control's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ValueType {
    #[default]
    Float,
    Integer,
    Text,
}

impl ValueType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Float | Self::Integer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
            Self::Text => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_is_shortest_round_trip() {
        assert_eq!(format_number(42.5), "42.5");
        assert_eq!(format_number(300.0), "300");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(12.345678901234), "12.345678901234");
        assert_eq!(format_number(0.0001), "0.0001");
    }

    #[test]
    fn test_format_number_uses_exponent_for_extreme_magnitudes() {
        assert_eq!(format_number(1e300), "1e300");
        assert_eq!(format_number(-2.5e-9), "-2.5e-9");
        assert_eq!(format_number(1e16), "1e16");
        assert_eq!(format_number(1234567890123456.0), "1234567890123456");
        assert_eq!(format_number(1e-9).parse::<f64>().unwrap(), 1e-9);
    }

    #[test]
    fn test_expect_number_rejects_text_and_nan() {
        assert_eq!(ControlValue::from(3).expect_number(), Ok(3.0));
        assert!(matches!(
            ControlValue::from("3").expect_number(),
            Err(ValidationError::Type { .. })
        ));
        assert!(ControlValue::Number(f64::NAN).expect_number().is_err());
    }

    #[test]
    fn test_untagged_serialization() {
        let values: Vec<ControlValue> = serde_json::from_str(r#"[1.5, "ON"]"#).unwrap();
        assert_eq!(
            values,
            vec![ControlValue::Number(1.5), ControlValue::Text("ON".into())]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ControlValue::from(80.0).to_string(), "80");
        assert_eq!(ControlValue::from("OFF").to_string(), "OFF");
    }
}
