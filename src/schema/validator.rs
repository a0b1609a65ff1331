//! Schema validator with canonicalisation.
//!
//! Validates JSON values against an [`ObjectSchema`], supporting:
//! - Type validation (string, number, integer, boolean, array, object)
//! - Field constraints (minLength, maxLength, minimum, maximum)
//! - Array constraints (minItems, maxItems, element schema)
//! - Nested validation (recursive object and array validation)
//! - Excess-field control (strict or permissive)
//!
//! All violations are collected, not just the first one. On success the
//! value is returned in canonical shape: declared-coercible numeric strings
//! become numbers and, in permissive mode, undeclared fields are dropped.

use serde_json::{Map, Number, Value};

use crate::schema::error::ValidationError;
use crate::schema::field::{FieldType, ObjectSchema};

/// What to do with object fields the schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExcessFields {
    /// Reject undeclared fields. Default for caller input.
    #[default]
    Strict,
    /// Ignore undeclared fields and drop them from the canonical value.
    /// Default for model output.
    Permissive,
}

/// Validate `value` against `schema` and return its canonical form.
pub fn validate(
    value: &Value,
    schema: &ObjectSchema,
    excess: ExcessFields,
) -> Result<Value, Vec<ValidationError>> {
    SchemaValidator::new(excess).validate(value, schema)
}

/// Validator for a given excess-field policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator {
    excess: ExcessFields,
}

impl SchemaValidator {
    pub fn new(excess: ExcessFields) -> Self {
        Self { excess }
    }

    pub fn strict() -> Self {
        Self::new(ExcessFields::Strict)
    }

    pub fn permissive() -> Self {
        Self::new(ExcessFields::Permissive)
    }

    pub fn validate(
        &self,
        value: &Value,
        schema: &ObjectSchema,
    ) -> Result<Value, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let canonical = self.check_object(value, schema, "", &mut errors);
        match canonical {
            Some(v) if errors.is_empty() => Ok(v),
            _ => Err(errors),
        }
    }

    /// Check one value; returns the canonical value when this subtree is valid.
    fn check(
        &self,
        value: &Value,
        ty: &FieldType,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<Value> {
        match ty {
            FieldType::String {
                min_length,
                max_length,
            } => {
                let s = self.expect_type(value, value.as_str(), ty, path, errors)?;
                self.check_string(s, *min_length, *max_length, path, errors)
                    .then(|| value.clone())
            }
            FieldType::Media { .. } => self
                .expect_type(value, value.as_str(), ty, path, errors)
                .map(|_| value.clone()),
            FieldType::Boolean => self
                .expect_type(value, value.as_bool(), ty, path, errors)
                .map(|_| value.clone()),
            FieldType::Number {
                minimum,
                maximum,
                integer,
                coercible,
            } => {
                let number = self.number_value(value, *integer, *coercible, ty, path, errors)?;
                let n = number.as_f64().unwrap_or(f64::NAN);
                self.check_range(n, *minimum, *maximum, path, errors)
                    .then(|| Value::Number(number))
            }
            FieldType::Array {
                items,
                min_items,
                max_items,
            } => {
                let arr = self.expect_type(value, value.as_array(), ty, path, errors)?;
                self.check_array(arr, items, *min_items, *max_items, path, errors)
            }
            FieldType::Object(schema) => self.check_object(value, schema, path, errors),
        }
    }

    fn expect_type<T>(
        &self,
        value: &Value,
        extracted: Option<T>,
        ty: &FieldType,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<T> {
        if extracted.is_none() {
            errors.push(
                ValidationError::new(
                    path,
                    format!(
                        "Expected type '{}', got '{}'",
                        ty.type_name(),
                        json_type_name(value)
                    ),
                )
                .with_value(value.clone()),
            );
        }
        extracted
    }

    fn check_string(
        &self,
        s: &str,
        min_length: Option<usize>,
        max_length: Option<usize>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> bool {
        let len = s.chars().count();
        let mut ok = true;

        // minLength
        if let Some(min) = min_length {
            if len < min {
                errors.push(ValidationError::new(
                    path,
                    format!("String too short (minimum {} characters)", min),
                ));
                ok = false;
            }
        }

        // maxLength
        if let Some(max) = max_length {
            if len > max {
                errors.push(ValidationError::new(
                    path,
                    format!("String too long (maximum {} characters)", max),
                ));
                ok = false;
            }
        }
        ok
    }

    fn number_value(
        &self,
        value: &Value,
        integer: bool,
        coercible: bool,
        ty: &FieldType,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<Number> {
        let number = match value {
            Value::Number(n) => Some(n.clone()),
            Value::String(s) if coercible => parse_number(s.trim()),
            _ => None,
        };
        let number = self.expect_type(value, number, ty, path, errors)?;

        if !integer || number.is_i64() || number.is_u64() {
            return Some(number);
        }
        match number.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some(Number::from(f as i64))
            }
            _ => {
                errors.push(
                    ValidationError::new(path, "Expected an integer")
                        .with_value(value.clone()),
                );
                None
            }
        }
    }

    fn check_range(
        &self,
        n: f64,
        minimum: Option<f64>,
        maximum: Option<f64>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> bool {
        let mut ok = true;

        // minimum
        if let Some(min) = minimum {
            if n < min {
                errors.push(ValidationError::new(
                    path,
                    format!("Value below minimum ({})", min),
                ));
                ok = false;
            }
        }

        // maximum
        if let Some(max) = maximum {
            if n > max {
                errors.push(ValidationError::new(
                    path,
                    format!("Value above maximum ({})", max),
                ));
                ok = false;
            }
        }
        ok
    }

    fn check_array(
        &self,
        arr: &[Value],
        items: &FieldType,
        min_items: Option<usize>,
        max_items: Option<usize>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<Value> {
        let before = errors.len();

        // minItems
        if let Some(min) = min_items {
            if arr.len() < min {
                errors.push(ValidationError::new(
                    path,
                    format!("Array too short (minimum {} items)", min),
                ));
            }
        }

        // maxItems
        if let Some(max) = max_items {
            if arr.len() > max {
                errors.push(ValidationError::new(
                    path,
                    format!("Array too long (maximum {} items)", max),
                ));
            }
        }

        let mut canonical = Vec::with_capacity(arr.len());
        for (i, item) in arr.iter().enumerate() {
            let item_path = format!("{}[{}]", path, i);
            if let Some(v) = self.check(item, items, &item_path, errors) {
                canonical.push(v);
            }
        }

        (errors.len() == before).then(|| Value::Array(canonical))
    }

    fn check_object(
        &self,
        value: &Value,
        schema: &ObjectSchema,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<Value> {
        let ty = FieldType::Object(ObjectSchema::new(schema.name()));
        let obj = self.expect_type(value, value.as_object(), &ty, path, errors)?;
        let before = errors.len();
        let mut canonical = Map::new();

        for field in schema.fields() {
            let field_path = join_path(path, &field.name);
            match obj.get(&field.name) {
                Some(v) => {
                    if let Some(c) = self.check(v, &field.ty, &field_path, errors) {
                        canonical.insert(field.name.clone(), c);
                    }
                }
                None if field.required => {
                    errors.push(ValidationError::new(
                        field_path,
                        format!("Missing required property: {}", field.name),
                    ));
                }
                None => {}
            }
        }

        if self.excess == ExcessFields::Strict {
            for key in obj.keys() {
                if !schema.contains(key) {
                    errors.push(ValidationError::new(
                        join_path(path, key),
                        format!("Additional property not allowed: {}", key),
                    ));
                }
            }
        }

        (errors.len() == before).then(|| Value::Object(canonical))
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::Bool(_) => "boolean",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "null",
    }
}
