use std::sync::LazyLock;

use regex::Regex;

use super::value::{ControlValue, ValueType};
use super::value_domain::ValueDomain;

// Leading numeric token; trailing units such as "V" or " kW" are ignored.
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?)\s*[A-Za-z%]*\s*$")
        .expect("numeric reply pattern is valid")
});

/// Interpret a raw reply as `value_type`. `None` means the reply has the wrong shape.
pub fn parse_reply(raw: &str, value_type: ValueType, domain: &ValueDomain) -> Option<ControlValue> {
    match value_type {
        ValueType::Float => parse_number(raw).map(ControlValue::Number),
        ValueType::Integer => parse_number(raw)
            .filter(|n| n.fract() == 0.0)
            .map(ControlValue::Number),
        ValueType::Text => parse_text(raw, domain),
    }
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let captures = NUMBER.captures(raw)?;
    captures.get(1)?.as_str().parse().ok()
}

fn parse_text(raw: &str, domain: &ValueDomain) -> Option<ControlValue> {
    let text = unquote(raw.trim());
    match domain.members() {
        Some(members) => members
            .iter()
            .find(|m| m.as_text().is_some_and(|s| s.eq_ignore_ascii_case(text)))
            .cloned(),
        None => Some(ControlValue::Text(text.to_string())),
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

/// Split a comma separated reply, keeping numbers as numbers
pub fn split_values(raw: &str) -> Vec<ControlValue> {
    raw.trim()
        .split(',')
        .map(|field| match parse_number(field) {
            Some(n) => ControlValue::Number(n),
            None => ControlValue::Text(unquote(field.trim()).to_string()),
        })
        .collect()
}
