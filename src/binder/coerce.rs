//! Scalar casts shared by the setter kinds.

use crate::core::types::Value;

/// Stringify any value. Lists join with `,`.
pub fn cast_string(value: &Value) -> String {
    value.to_string()
}

pub fn cast_int64(value: &Value) -> Result<i64, String> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid integer value '{}'", s)),
        other => Err(format!("cannot cast {} to int64", other.kind())),
    }
}

pub fn cast_float64(value: &Value) -> Result<f64, String> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid float value '{}'", s)),
        other => Err(format!("cannot cast {} to float64", other.kind())),
    }
}

pub fn cast_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Str(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Ok(true),
            "false" | "f" | "0" | "no" => Ok(false),
            _ => Err(format!("invalid boolean value '{}'", s)),
        },
        Value::Int(1) => Ok(true),
        Value::Int(0) => Ok(false),
        other => Err(format!("cannot cast {} to bool", other.kind())),
    }
}

/// A single string becomes a one-element list.
pub fn cast_string_slice(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::Str(s) => Ok(vec![s.clone()]),
        Value::List(items) => Ok(items.clone()),
        other => Err(format!("cannot cast {} to string list", other.kind())),
    }
}
