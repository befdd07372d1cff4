//! Numeric coercion of extracted JSON values.
//!
//! Precedence is fixed:
//! 1. a number, or a string that parses as a decimal float
//! 2. a boolean, or a string that is a boolean literal (true = 1, false = 0)
//! 3. JSON null, or no value at all: NaN
//! 4. anything else is a `CoercionError`

use serde_json::Value;

use crate::error::CoercionError;

/// Coerce an (optional) JSON value into a sample value.
pub fn coerce(raw: Option<&Value>) -> Result<f64, CoercionError> {
    let v = match raw {
        None | Some(Value::Null) => return Ok(f64::NAN),
        Some(v) => v,
    };

    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| reject(v)),
        Value::Bool(b) => Ok(bool_to_f64(*b)),
        Value::String(s) => coerce_str(s).ok_or_else(|| reject(v)),
        _ => Err(reject(v)),
    }
}

/// Coerce a string the same way a JSON string value is coerced.
pub fn coerce_str(s: &str) -> Option<f64> {
    if let Ok(f) = s.parse::<f64>() {
        return Some(f);
    }
    parse_bool(s).map(bool_to_f64)
}

/// Boolean literals accepted in string form.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn reject(v: &Value) -> CoercionError {
    CoercionError { raw: v.to_string() }
}
