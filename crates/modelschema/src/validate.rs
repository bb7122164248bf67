//! Field validators.
//!
//! Validators run on successfully deserialized, non-null values. Every
//! validator of a field runs and all failures are reported.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use regex::Regex;

use modelschema_core::{AttributeInfo, SCHEMA_ERROR_KEY, ValidationError, ValidationErrorKind, Value};

/// User-supplied validation function returning an error message on failure.
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

static PATTERNS: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

/// Compile `pattern`, reusing an earlier compilation of the same text.
fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    let patterns = PATTERNS.get_or_init(RwLock::default);
    if let Some(regex) = patterns
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
    {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern)?;
    patterns
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(pattern.to_string())
        .or_insert_with(|| regex.clone());
    Ok(regex)
}

/// Check if a string matches a regex pattern.
///
/// Returns `false` if the pattern is invalid (logs a warning).
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match compiled(pattern) {
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

/// A check applied to a loaded value.
#[derive(Clone)]
pub enum Validator {
    /// Value must equal one of `choices`; `labels` are informational.
    OneOf {
        choices: Vec<Value>,
        labels: Vec<String>,
    },
    /// Length bounds for text (in characters) and arrays.
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Text must match the pattern.
    Regexp(String),
    /// The attribute's own coercion must accept the value.
    Coerce(Arc<AttributeInfo>),
    Custom(ValidateFn),
}

impl Validator {
    pub fn one_of<I, V>(choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Validator::OneOf {
            choices: choices.into_iter().map(Into::into).collect(),
            labels: Vec::new(),
        }
    }

    pub fn max_length(max: usize) -> Self {
        Validator::Length {
            min: None,
            max: Some(max),
        }
    }

    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Validator::Length { min, max }
    }

    pub fn regexp(pattern: impl Into<String>) -> Self {
        Validator::Regexp(pattern.into())
    }

    pub fn coerce(attr: &AttributeInfo) -> Self {
        Validator::Coerce(Arc::new(attr.clone()))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Validator::Custom(Arc::new(f))
    }

    /// Run the check, recording failures under [`SCHEMA_ERROR_KEY`].
    pub fn validate(&self, value: &Value, errors: &mut ValidationError) {
        match self {
            Validator::OneOf { choices, .. } => {
                if !choices.contains(value) {
                    let text = choices
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    errors.add_choice(SCHEMA_ERROR_KEY, &text);
                }
            }
            Validator::Length { min, max } => {
                let len = match value {
                    Value::Text(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    Value::Bytes(b) => b.len(),
                    _ => return,
                };
                if let Some(min) = *min {
                    if len < min {
                        errors.add_min_length(SCHEMA_ERROR_KEY, min);
                    }
                }
                if let Some(max) = *max {
                    if len > max {
                        errors.add_max_length(SCHEMA_ERROR_KEY, max);
                    }
                }
            }
            Validator::Regexp(pattern) => {
                if let Some(text) = value.as_str() {
                    if !matches_pattern(text, pattern) {
                        errors.add_pattern(SCHEMA_ERROR_KEY);
                    }
                }
            }
            Validator::Coerce(attr) => {
                if let Err(err) = attr.coerce_value(value) {
                    errors.add_coercion(SCHEMA_ERROR_KEY, err.to_string());
                }
            }
            Validator::Custom(f) => {
                if let Err(message) = f(value) {
                    errors.add_custom(SCHEMA_ERROR_KEY, message);
                }
            }
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::OneOf { choices, labels } => f
                .debug_struct("OneOf")
                .field("choices", choices)
                .field("labels", labels)
                .finish(),
            Validator::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Validator::Regexp(p) => f.debug_tuple("Regexp").field(p).finish(),
            Validator::Coerce(attr) => f.debug_tuple("Coerce").field(&attr.name).finish(),
            Validator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
