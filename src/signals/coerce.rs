//! Lenient value coercion shared by the store and the normalizer.
//!
//! Producers send prices as numbers or strings, sometimes with units attached.
//! Floats follow `parseFloat` rules: leading whitespace is skipped and the
//! longest numeric prefix wins. Anything that does not yield a finite number is 0.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// Falsy values are skipped when picking among field aliases: null, false, 0, "".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First truthy value among `keys`, in order
pub fn first_truthy<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| raw.get(*k)).find(|v| is_truthy(v))
}

/// Parse a JSON value as a float, 0 when absent, unparsable or non-finite
pub fn parse_float(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

/// Longest numeric prefix of `input`, after leading whitespace
pub fn parse_float_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < len && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if end < len && bytes[end] == b'.' {
        let mut j = end + 1;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let frac_digits = j - (end + 1);
        if mantissa_digits + frac_digits > 0 {
            mantissa_digits += frac_digits;
            end = if frac_digits > 0 { j } else { end };
        }
    }

    if mantissa_digits == 0 {
        return None;
    }

    if end < len && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut j = end + 1;
        if j < len && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Render a scalar as text; strings are taken verbatim
pub fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Current UTC time in the ISO-8601 form producers use (millisecond precision, `Z`)
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
