//! Argument validation and loose coercion against a function's parameter schema.
//!
//! Accepted coercions:
//! - numeric and boolean strings into numbers/booleans (`"42"` → `42`, `"true"` → `true`)
//! - scalars into strings (`7` → `"7"`)
//!
//! Structural mismatches (scalar vs array/object) are never repaired.

use crate::types::{ParameterKind, ParameterSchema};
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::fmt;

/// Validation error with location information.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentError {
    pub message: String,
    /// Argument path (e.g. `location`, `options.unit`, `tags[2]`)
    pub path: String,
    /// The offending value, when there was one
    pub value: Option<Value>,
}

impl ArgumentError {
    fn new(message: impl Into<String>, path: &str, value: Option<&Value>) -> Self {
        Self {
            message: message.into(),
            path: path.to_string(),
            value: value.cloned(),
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for ArgumentError {}

/// Validator for call arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentValidator {
    /// Reject arguments the schema does not declare.
    strict: bool,
}

impl ArgumentValidator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn strict() -> Self {
        Self::new(true)
    }

    pub fn lenient() -> Self {
        Self::new(false)
    }

    /// Validate `args` against the root object schema and return the coerced arguments.
    pub fn validate(
        &self,
        schema: &ParameterSchema,
        args: &Map<String, Value>,
    ) -> Result<Map<String, Value>, Vec<ArgumentError>> {
        let mut errors = Vec::new();
        let out = self.validate_object(args, schema, "", &mut errors);
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }

    fn validate_value(
        &self,
        data: &Value,
        schema: &ParameterSchema,
        path: &str,
        errors: &mut Vec<ArgumentError>,
    ) -> Value {
        let coerced = match coerce(data, schema.kind) {
            Ok(v) => v,
            Err(actual) => {
                errors.push(ArgumentError::new(
                    format!("Expected type '{}', got '{}'", schema.kind, actual),
                    path,
                    Some(data),
                ));
                return data.clone();
            }
        };

        let coerced = match (schema.kind, coerced) {
            (ParameterKind::Array, Value::Array(items)) => {
                self.validate_array(&items, schema, path, errors)
            }
            (ParameterKind::Object, Value::Object(obj)) => {
                Value::Object(self.validate_object(&obj, schema, path, errors))
            }
            (_, other) => other,
        };

        match schema.kind {
            ParameterKind::String => self.check_string(&coerced, schema, path, errors),
            ParameterKind::Integer | ParameterKind::Number => {
                self.check_number(&coerced, schema, path, errors)
            }
            _ => {}
        }

        if let Some(allowed) = &schema.allowed_values {
            if !allowed.contains(&coerced) {
                let listed: Vec<String> = allowed
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => format!("\"{}\"", s),
                        _ => v.to_string(),
                    })
                    .collect();
                errors.push(ArgumentError::new(
                    format!("Value not in allowed enum values: {}", listed.join(", ")),
                    path,
                    Some(&coerced),
                ));
            }
        }

        coerced
    }

    fn validate_array(
        &self,
        items: &[Value],
        schema: &ParameterSchema,
        path: &str,
        errors: &mut Vec<ArgumentError>,
    ) -> Value {
        if let Some(min) = schema.extra.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                errors.push(ArgumentError::new(
                    format!("Array too short (minimum {} items)", min),
                    path,
                    None,
                ));
            }
        }
        if let Some(max) = schema.extra.get("maxItems").and_then(Value::as_u64) {
            if (items.len() as u64) > max {
                errors.push(ArgumentError::new(
                    format!("Array too long (maximum {} items)", max),
                    path,
                    None,
                ));
            }
        }
        let Some(item_schema) = schema.items.as_deref() else {
            return Value::Array(items.to_vec());
        };
        Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.validate_value(item, item_schema, &format!("{}[{}]", path, i), errors)
                })
                .collect(),
        )
    }

    fn validate_object(
        &self,
        obj: &Map<String, Value>,
        schema: &ParameterSchema,
        path: &str,
        errors: &mut Vec<ArgumentError>,
    ) -> Map<String, Value> {
        let join = |key: &str| {
            if path.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", path, key)
            }
        };

        for required in schema.required_names() {
            // null counts as missing
            if obj.get(required).map_or(true, Value::is_null) {
                errors.push(ArgumentError::new(
                    "Missing required argument",
                    &join(required),
                    None,
                ));
            }
        }

        let mut out = Map::new();
        for (key, value) in obj {
            let prop_path = join(key);
            match schema.property(key) {
                Some(_) if value.is_null() => {
                    out.insert(key.clone(), Value::Null);
                }
                Some(prop_schema) => {
                    let v = self.validate_value(value, prop_schema, &prop_path, errors);
                    out.insert(key.clone(), v);
                }
                None if self.strict => {
                    errors.push(ArgumentError::new(
                        "Unknown argument not allowed",
                        &prop_path,
                        Some(value),
                    ));
                }
                None => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        out
    }

    fn check_string(
        &self,
        data: &Value,
        schema: &ParameterSchema,
        path: &str,
        errors: &mut Vec<ArgumentError>,
    ) {
        let Some(s) = data.as_str() else { return };
        let len = s.chars().count() as u64;

        if let Some(min) = schema.extra.get("minLength").and_then(Value::as_u64) {
            if len < min {
                errors.push(ArgumentError::new(
                    format!("String too short (minimum {} characters)", min),
                    path,
                    Some(data),
                ));
            }
        }
        if let Some(max) = schema.extra.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                errors.push(ArgumentError::new(
                    format!("String too long (maximum {} characters)", max),
                    path,
                    Some(data),
                ));
            }
        }
        if let Some(pattern) = schema.extra.get("pattern").and_then(Value::as_str) {
            // An unusable pattern is skipped.
            if let Ok(re) = Regex::new(pattern) {
                if !re.is_match(s) {
                    errors.push(ArgumentError::new(
                        "String does not match required pattern",
                        path,
                        Some(data),
                    ));
                }
            }
        }
    }

    fn check_number(
        &self,
        data: &Value,
        schema: &ParameterSchema,
        path: &str,
        errors: &mut Vec<ArgumentError>,
    ) {
        let Some(n) = data.as_f64() else { return };
        if let Some(min) = schema.extra.get("minimum").and_then(Value::as_f64) {
            if n < min {
                errors.push(ArgumentError::new(
                    format!("Value below minimum ({})", min),
                    path,
                    Some(data),
                ));
            }
        }
        if let Some(max) = schema.extra.get("maximum").and_then(Value::as_f64) {
            if n > max {
                errors.push(ArgumentError::new(
                    format!("Value above maximum ({})", max),
                    path,
                    Some(data),
                ));
            }
        }
    }
}

fn type_name(data: &Value) -> &'static str {
    match data {
        Value::String(_) => "string",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "null",
    }
}

/// Coerce `data` to `kind`, or return the actual type name.
fn coerce(data: &Value, kind: ParameterKind) -> Result<Value, &'static str> {
    let actual = type_name(data);
    match (kind, data) {
        (ParameterKind::String, Value::String(_)) => Ok(data.clone()),
        (ParameterKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ParameterKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (ParameterKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
            Ok(data.clone())
        }
        (ParameterKind::Integer, Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(Value::Number((f as i64).into()))
            }
            _ => Err(actual),
        },
        (ParameterKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|i| Value::Number(i.into()))
            .map_err(|_| actual),

        (ParameterKind::Number, Value::Number(_)) => Ok(data.clone()),
        (ParameterKind::Number, Value::String(s)) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::Number(i.into()));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or(actual)
        }

        (ParameterKind::Boolean, Value::Bool(_)) => Ok(data.clone()),
        (ParameterKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(actual),
        },

        (ParameterKind::Array, Value::Array(_)) => Ok(data.clone()),
        (ParameterKind::Object, Value::Object(_)) => Ok(data.clone()),
        _ => Err(actual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ParameterSchema {
        ParameterSchema::object()
            .with_property("location", ParameterSchema::string(), true)
            .with_property(
                "unit",
                ParameterSchema::string()
                    .with_allowed_values(vec![json!("celsius"), json!("fahrenheit")]),
                false,
            )
            .with_property(
                "days",
                ParameterSchema::integer()
                    .with_extra("minimum", json!(1))
                    .with_extra("maximum", json!(14)),
                false,
            )
            .with_property("detailed", ParameterSchema::boolean(), false)
            .with_property("tags", ParameterSchema::array(ParameterSchema::string()), false)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_loose_coercion() {
        let out = ArgumentValidator::lenient()
            .validate(
                &schema(),
                &args(json!({"location": 75001, "days": "3", "detailed": "TRUE", "tags": [1, "b"]})),
            )
            .unwrap();
        assert_eq!(out["location"], json!("75001"));
        assert_eq!(out["days"], json!(3));
        assert_eq!(out["detailed"], json!(true));
        assert_eq!(out["tags"], json!(["1", "b"]));
    }

    #[test]
    fn test_null_required_is_missing() {
        let errs = ArgumentValidator::lenient()
            .validate(&schema(), &args(json!({"location": null})))
            .unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path, "location");
        assert!(errs[0].message.contains("Missing required"));
    }

    #[test]
    fn test_structural_mismatch_rejected() {
        let errs = ArgumentValidator::lenient()
            .validate(&schema(), &args(json!({"location": ["Paris"], "tags": "a,b"})))
            .unwrap_err();
        let paths: Vec<&str> = errs.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["location", "tags"]);
        assert_eq!(errs[0].to_string(), "location: Expected type 'string', got 'array'");
    }

    #[test]
    fn test_enum_and_range() {
        let errs = ArgumentValidator::lenient()
            .validate(
                &schema(),
                &args(json!({"location": "Paris", "unit": "kelvin", "days": 30})),
            )
            .unwrap_err();
        assert_eq!(errs.len(), 2);
        assert!(errs[0].message.contains("not in allowed enum"));
        assert!(errs[1].message.contains("above maximum"));
    }

    #[test]
    fn test_strict_rejects_unknown() {
        let input = args(json!({"location": "Paris", "extra": 1}));
        assert!(ArgumentValidator::lenient().validate(&schema(), &input).is_ok());
        let errs = ArgumentValidator::strict().validate(&schema(), &input).unwrap_err();
        assert_eq!(errs[0].path, "extra");
    }

    #[test]
    fn test_nested_object_paths() {
        let nested = ParameterSchema::object().with_property(
            "options",
            ParameterSchema::object().with_property("unit", ParameterSchema::string(), true),
            true,
        );
        let errs = ArgumentValidator::lenient()
            .validate(&nested, &args(json!({"options": {"other": 1}})))
            .unwrap_err();
        assert_eq!(errs[0].path, "options.unit");
    }

    #[test]
    fn test_unparseable_numeric_string() {
        let errs = ArgumentValidator::lenient()
            .validate(&schema(), &args(json!({"location": "x", "days": "three"})))
            .unwrap_err();
        assert_eq!(errs[0].path, "days");
        assert_eq!(errs[0].value, Some(json!("three")));
    }
}
