//! Field-level coercion and validation.
//!
//! This is the per-field rule a model applies to every input value while a
//! record is constructed. Coercion is lenient: a value is accepted when it
//! converts unambiguously to the declared type (numeric text for numbers,
//! integral floats for integers, and so on). Partial references are handled
//! in [`crate::partial`] and reuse [`validate_field`] on the target model's
//! primary key field.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{FieldValidationError, ValidationError};
use crate::field::{FieldDef, FieldType};
use crate::value::Value;

/// Thread-safe regex cache for compiled patterns.
///
/// Patterns are compiled lazily on first use and cached for the lifetime
/// of the program.
struct RegexCache {
    cache: std::sync::RwLock<std::collections::HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        // Fast path: check if already cached
        // Use unwrap_or_else to recover from poisoned lock (another thread panicked)
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

/// Global regex cache singleton.
fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// Returns `false` if the pattern is invalid (logs a warning).
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}

/// Check a regex pattern when a model is defined.
///
/// Returns an error message if the pattern is invalid, None if valid.
pub fn validate_pattern(pattern: &str) -> Option<String> {
    match Regex::new(pattern) {
        Ok(_) => None,
        Err(e) => Some(format!("invalid regex pattern: {e}")),
    }
}

/// Coerce `value` into `field_type`.
///
/// Returns the coerced value, or `None` when no lossless conversion exists.
/// NULL is never accepted here; nullability is the caller's decision.
/// Partial references are not coerced here.
pub fn coerce(field_type: &FieldType, value: Value) -> Option<Value> {
    match (field_type, value) {
        (_, Value::Null) | (FieldType::Partial(_), _) => None,
        (FieldType::Any, v) => Some(v),

        (FieldType::Bool, Value::Bool(b)) => Some(Value::Bool(b)),
        (FieldType::Bool, v @ (Value::Int(_) | Value::BigInt(_))) => match v.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        (FieldType::Bool, Value::Text(s)) => parse_bool(&s).map(Value::Bool),

        (FieldType::Int, v @ (Value::Int(_) | Value::BigInt(_) | Value::Bool(_))) => {
            v.as_i64().map(Value::integer)
        }
        (FieldType::Int, Value::Double(f)) => integral(f).map(Value::integer),
        (FieldType::Int, Value::Text(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .map(Value::integer)
        }

        (FieldType::Float, Value::Double(f)) => Some(Value::Double(f)),
        (FieldType::Float, v @ (Value::Int(_) | Value::BigInt(_))) => v.as_f64().map(Value::Double),
        (FieldType::Float, Value::Bool(b)) => Some(Value::Double(if b { 1.0 } else { 0.0 })),
        (FieldType::Float, Value::Text(s)) => s.trim().parse::<f64>().ok().map(Value::Double),

        (FieldType::Text, Value::Text(s)) => Some(Value::Text(s)),
        (FieldType::Text, v @ (Value::Int(_) | Value::BigInt(_) | Value::Double(_))) => {
            Some(Value::Text(v.to_string()))
        }
        (FieldType::Text, Value::Bytes(b)) => String::from_utf8(b).ok().map(Value::Text),

        (FieldType::Bytes, Value::Bytes(b)) => Some(Value::Bytes(b)),
        (FieldType::Bytes, Value::Text(s)) => Some(Value::Bytes(s.into_bytes())),

        (FieldType::Json, Value::Json(j)) => Some(Value::Json(j)),
        (FieldType::Json, Value::Text(s)) => serde_json::from_str(&s).ok().map(Value::Json),
        (FieldType::Json, v) => Some(Value::Json(v.to_json())),

        _ => None,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

// 2^63 as f64; i64::MAX does not round-trip through f64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

#[allow(clippy::cast_possible_truncation)]
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// Run a field's coercion and constraint rules against one value.
///
/// NULL is accepted only for nullable fields. On failure the first error
/// for this field is returned.
pub fn validate_field(field: &FieldDef, value: Value) -> Result<Value, FieldValidationError> {
    if value.is_null() {
        if field.nullable {
            return Ok(Value::Null);
        }
        return Err(FieldValidationError::required(&field.name));
    }

    let actual = value.type_name();
    let Some(coerced) = coerce(&field.field_type, value) else {
        return Err(FieldValidationError::type_mismatch(
            &field.name,
            field.field_type.describe(),
            actual,
        ));
    };

    let mut errors = ValidationError::new();
    check_constraints(field, &coerced, &mut errors);
    match errors.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(coerced),
    }
}

fn check_constraints(field: &FieldDef, value: &Value, errors: &mut ValidationError) {
    if field.field_type.is_numeric() {
        if let Some(n) = value.as_f64() {
            if let Some(min) = field.min {
                if n < min {
                    errors.add_min(&field.name, min, n);
                }
            }
            if let Some(max) = field.max {
                if n > max {
                    errors.add_max(&field.name, max, n);
                }
            }
        }
    }

    let len = match value {
        Value::Text(s) => Some(s.chars().count()),
        Value::Bytes(b) => Some(b.len()),
        _ => None,
    };
    if let Some(len) = len {
        if let Some(min) = field.min_length {
            if len < min {
                errors.add_min_length(&field.name, min, len);
            }
        }
        if let Some(max) = field.max_length {
            if len > max {
                errors.add_max_length(&field.name, max, len);
            }
        }
    }

    if let (Some(pattern), Value::Text(s)) = (&field.pattern, value) {
        if !matches_pattern(s, pattern) {
            errors.add_pattern(&field.name, pattern);
        }
    }
}
