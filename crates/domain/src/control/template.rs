use std::fmt;

use super::value::{ControlValue, format_number};
use crate::error::{InstrumentError, ValidationError};

// `%d` renders through i64: [-2^63, 2^63)
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// Conversion used by a template's substitution slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFormat {
    /// `%g`: shortest round-trip form
    General,
    /// `%G`: as `%g` with an upper-case exponent marker
    GeneralUpper,
    /// `%d`: integer, truncated toward zero
    Integer,
    /// `%s`: text verbatim, numbers as `%g`
    Str,
}

impl SlotFormat {
    fn from_conversion(c: char) -> Option<Self> {
        match c {
            'g' => Some(Self::General),
            'G' => Some(Self::GeneralUpper),
            'd' | 'i' => Some(Self::Integer),
            's' => Some(Self::Str),
            _ => None,
        }
    }

    pub fn accepts_text(&self) -> bool {
        matches!(self, Self::Str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Slot(SlotFormat),
}

/// A printf-style command template such as `:VOLT %gV`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    pieces: Vec<Piece>,
}

impl CommandTemplate {
    pub fn parse(source: &str) -> Result<Self, InstrumentError> {
        if source.trim().is_empty() {
            return Err(InstrumentError::Configuration(
                "Command template is empty".to_string(),
            ));
        }

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => literal.push('%'),
                Some(conv) => {
                    let format = SlotFormat::from_conversion(conv).ok_or_else(|| {
                        InstrumentError::Configuration(format!(
                            "Unsupported conversion '%{}' in template {:?}",
                            conv, source
                        ))
                    })?;
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Slot(format));
                }
                None => {
                    return Err(InstrumentError::Configuration(format!(
                        "Dangling '%' at end of template {:?}",
                        source
                    )));
                }
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            pieces,
        })
    }

    /// Template for a query: must not contain a substitution slot
    pub fn query(source: &str) -> Result<Self, InstrumentError> {
        let template = Self::parse(source)?;
        if template.slot_count() != 0 {
            return Err(InstrumentError::Configuration(format!(
                "Query template {:?} must not contain a substitution slot",
                source
            )));
        }
        Ok(template)
    }

    /// Template for a write: exactly one substitution slot
    pub fn write(source: &str) -> Result<Self, InstrumentError> {
        let template = Self::parse(source)?;
        if template.slot_count() != 1 {
            return Err(InstrumentError::Configuration(format!(
                "Write template {:?} must contain exactly one substitution slot, found {}",
                source,
                template.slot_count()
            )));
        }
        Ok(template)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn slot_count(&self) -> usize {
        self.pieces
            .iter()
            .filter(|p| matches!(p, Piece::Slot(_)))
            .count()
    }

    pub fn slot_format(&self) -> Option<SlotFormat> {
        self.pieces.iter().find_map(|p| match p {
            Piece::Slot(f) => Some(*f),
            Piece::Literal(_) => None,
        })
    }

    /// Render the template without substitution (`%%` collapsed)
    pub fn render(&self) -> String {
        self.pieces
            .iter()
            .map(|p| match p {
                Piece::Literal(s) => s.as_str(),
                Piece::Slot(_) => "",
            })
            .collect()
    }

    /// Substitute `value` into every slot
    pub fn format(&self, value: &ControlValue) -> Result<String, ValidationError> {
        let mut out = String::with_capacity(self.source.len() + 8);
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Slot(SlotFormat::General) => {
                    out.push_str(&format_number(value.expect_number()?))
                }
                Piece::Slot(SlotFormat::GeneralUpper) => {
                    out.push_str(&format_number(value.expect_number()?).replace('e', "E"))
                }
                Piece::Slot(SlotFormat::Integer) => {
                    let n = value.expect_number()?;
                    let truncated = n.trunc();
                    if !(I64_LOWER..I64_UPPER).contains(&truncated) {
                        return Err(ValidationError::Type {
                            expected: "a number within the 64-bit integer range",
                            found: format_number(n),
                        });
                    }
                    out.push_str(&format!("{}", truncated as i64));
                }
                Piece::Slot(SlotFormat::Str) => out.push_str(&value.to_string()),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_format() {
        let t = CommandTemplate::write(":VOLT %gV").unwrap();
        assert_eq!(t.format(&ControlValue::from(42.5)).unwrap(), ":VOLT 42.5V");
        assert_eq!(t.format(&ControlValue::from(300.0)).unwrap(), ":VOLT 300V");
        assert_eq!(t.slot_format(), Some(SlotFormat::General));
    }

    #[test]
    fn test_string_format() {
        let t = CommandTemplate::write(":OUTP %s").unwrap();
        assert_eq!(t.format(&ControlValue::from("ON")).unwrap(), ":OUTP ON");
        assert_eq!(t.format(&ControlValue::from(1.5)).unwrap(), ":OUTP 1.5");
    }

    #[test]
    fn test_integer_truncates() {
        let t = CommandTemplate::write("CH%d").unwrap();
        assert_eq!(t.format(&ControlValue::from(2.7)).unwrap(), "CH2");
        assert_eq!(t.format(&ControlValue::from(-2.7)).unwrap(), "CH-2");
    }

    #[test]
    fn test_integer_outside_i64_is_type_error() {
        let t = CommandTemplate::write("COUNT %d").unwrap();
        assert!(matches!(
            t.format(&ControlValue::from(1e19)),
            Err(ValidationError::Type { .. })
        ));
        assert!(t.format(&ControlValue::from(-1e19)).is_err());
        assert!(t.format(&ControlValue::from(f64::INFINITY)).is_err());
        assert_eq!(
            t.format(&ControlValue::from(9.2e18)).unwrap(),
            "COUNT 9200000000000000000"
        );
    }

    #[test]
    fn test_upper_general_format() {
        let t = CommandTemplate::write("CAP %G").unwrap();
        assert_eq!(t.slot_format(), Some(SlotFormat::GeneralUpper));
        assert_eq!(t.format(&ControlValue::from(2.2e-9)).unwrap(), "CAP 2.2E-9");
        assert_eq!(t.format(&ControlValue::from(47.0)).unwrap(), "CAP 47");
        let lower = CommandTemplate::write("CAP %g").unwrap();
        assert_eq!(lower.format(&ControlValue::from(2.2e-9)).unwrap(), "CAP 2.2e-9");
    }

    #[test]
    fn test_text_into_numeric_slot_is_type_error() {
        let t = CommandTemplate::write(":POW %g").unwrap();
        assert!(matches!(
            t.format(&ControlValue::from("high")),
            Err(ValidationError::Type { .. })
        ));
    }

    #[test]
    fn test_slot_counts_enforced() {
        assert!(CommandTemplate::query(":VOLT?").is_ok());
        assert!(CommandTemplate::query(":VOLT? %g").is_err());
        assert!(CommandTemplate::write(":VOLT").is_err());
        assert!(CommandTemplate::write(":VOLT %g %g").is_err());
        assert!(CommandTemplate::write(":VOLT %q").is_err());
        assert!(CommandTemplate::write(":VOLT %").is_err());
        assert!(CommandTemplate::write("").is_err());
    }

    #[test]
    fn test_percent_escape() {
        let t = CommandTemplate::write("RAMP %g%%").unwrap();
        assert_eq!(t.format(&ControlValue::from(5.0)).unwrap(), "RAMP 5%");
        let q = CommandTemplate::query("LOAD 100%%?").unwrap();
        assert_eq!(q.render(), "LOAD 100%?");
    }
}
