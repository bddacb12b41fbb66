use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::ValidationError;

/// Largest value a small positive integer column accepts.
pub const MAX_SMALL_INT: i64 = 32767;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

/// Validation messages keyed by field name, rendered as-is in 400 responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", err.code));
                out.add(field.as_ref(), message);
            }
        }
        out
    }
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// `#RRGGBB`, case-insensitive.
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(validation_error("hex_color", "Color value is invalid"))
    }
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(validation_error(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        ))
    }
}

/// Letters, digits and `@ . + - _`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(validation_error(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntError {
    NotANumber,
    NotPositive,
    TooLarge,
}

/// Accepts a JSON integer or an all-digit string.
pub fn parse_positive_small_int(value: &Value) -> Result<i32, IntError> {
    let number = match value {
        Value::Number(n) => n.as_i64().ok_or(IntError::NotANumber)?,
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse::<i64>().map_err(|_| IntError::TooLarge)?
        }
        _ => return Err(IntError::NotANumber),
    };

    if number <= 0 {
        return Err(IntError::NotPositive);
    }
    if number > MAX_SMALL_INT {
        return Err(IntError::TooLarge);
    }
    Ok(number as i32)
}

/// Accepts a JSON integer or a numeric string as an object id.
pub fn parse_id(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Rendering of a submitted id inside error messages.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
