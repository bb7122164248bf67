//! Error types for modelschema operations.

use std::fmt;

/// The primary error type for all modelschema operations.
#[derive(Debug)]
pub enum Error {
    /// Schema or model configuration errors, raised while building schemas
    Config(ConfigError),
    /// A relationship field was used before it was bound to a model
    Binding(BindingError),
    /// Native value coercion errors
    Type(TypeError),
    /// Aggregated field validation errors
    Validation(ValidationError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    /// Create a configuration error without a source.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

#[derive(Debug)]
pub struct BindingError {
    /// Name of the field that was not bound
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub attribute: Option<String>,
}

/// Validation error for field-level and schema-level validation.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The errors in the order they were found. Nested fields use dotted paths.
    pub errors: Vec<FieldValidationError>,
}

/// A single validation error for a field.
#[derive(Debug, Clone)]
pub struct FieldValidationError {
    /// The field (data key) that failed validation
    pub field: String,
    /// The kind of validation that failed
    pub kind: ValidationErrorKind,
    /// Human-readable error message
    pub message: String,
}

/// The type of validation constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Required field is missing
    Required,
    /// Null given for a field that does not allow it
    Null,
    /// Value has the wrong shape or could not be parsed
    Invalid,
    /// Value is not one of the declared choices
    Choice,
    /// String is shorter than minimum length
    MinLength,
    /// String is longer than maximum length
    MaxLength,
    /// Value doesn't match regex pattern
    Pattern,
    /// Input key not known to the schema
    Unknown,
    /// The model's own value coercion rejected the value
    Coercion,
    /// Input as a whole is unusable (e.g. not an object)
    Schema,
    /// Custom validation failed
    Custom,
}

/// Key used for errors that concern the whole input rather than a field.
pub const SCHEMA_ERROR_KEY: &str = "_schema";

impl ValidationError {
    /// Create a new empty validation error container.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    /// Add a required field error.
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(
            field,
            ValidationErrorKind::Required,
            "Missing data for required field.",
        );
    }

    /// Add a null-not-allowed error.
    pub fn add_null(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Null, "Field may not be null.");
    }

    /// Add an unknown field error.
    pub fn add_unknown(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Unknown, "Unknown field.");
    }

    /// Add an invalid value error.
    pub fn add_invalid(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.add(field, ValidationErrorKind::Invalid, message);
    }

    /// Add a max length error.
    pub fn add_max_length(&mut self, field: impl Into<String>, max: usize) {
        self.add(
            field,
            ValidationErrorKind::MaxLength,
            format!("Longer than maximum length {max}."),
        );
    }

    /// Add a min length error.
    pub fn add_min_length(&mut self, field: impl Into<String>, min: usize) {
        self.add(
            field,
            ValidationErrorKind::MinLength,
            format!("Shorter than minimum length {min}."),
        );
    }

    /// Add a choice error listing the accepted choices.
    pub fn add_choice(&mut self, field: impl Into<String>, choices: &str) {
        self.add(
            field,
            ValidationErrorKind::Choice,
            format!("Must be one of: {choices}."),
        );
    }

    /// Add a pattern match error.
    pub fn add_pattern(&mut self, field: impl Into<String>) {
        self.add(
            field,
            ValidationErrorKind::Pattern,
            "String does not match expected pattern.",
        );
    }

    /// Add a coercion error carrying the coercion failure message.
    pub fn add_coercion(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.add(field, ValidationErrorKind::Coercion, message);
    }

    /// Add a custom validation error.
    pub fn add_custom(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.add(field, ValidationErrorKind::Custom, message);
    }

    /// Add an error concerning the whole input.
    pub fn add_schema_error(&mut self, message: impl Into<String>) {
        self.add(SCHEMA_ERROR_KEY, ValidationErrorKind::Schema, message);
    }

    /// Merge errors from a nested load, prefixing their paths with `prefix`.
    pub fn extend_prefixed(&mut self, prefix: &str, nested: ValidationError) {
        for err in nested.errors {
            let field = if err.field == SCHEMA_ERROR_KEY {
                prefix.to_string()
            } else {
                format!("{prefix}.{}", err.field)
            };
            self.errors.push(FieldValidationError { field, ..err });
        }
    }

    /// Check whether any error was recorded for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// All messages recorded for `field`, in order.
    pub fn messages(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// Render as `{"field": ["message", ...]}`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for err in &self.errors {
            let entry = map
                .entry(err.field.clone())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            if let serde_json::Value::Array(messages) = entry {
                messages.push(serde_json::Value::String(err.message.clone()));
            }
        }
        serde_json::Value::Object(map)
    }

    /// Convert to Result, returning Ok(()) if no errors, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(message))
    }

    /// Is this a user-facing validation error?
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Borrow the aggregated validation errors, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Binding(e) => write!(f, "Binding error on '{}': {}", e.field, e.message),
            Error::Type(e) => write!(f, "Type error: {e}"),
            Error::Validation(e) => write!(f, "Validation error: {e}"),
            Error::Serde(msg) => write!(f, "Serialization error: {msg}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(attr) = &self.attribute {
            write!(
                f,
                "expected {} for attribute '{}', found {}",
                self.expected, attr, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<BindingError> for Error {
    fn from(err: BindingError) -> Self {
        Error::Binding(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for modelschema operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_errors_are_prefixed() {
        let mut nested = ValidationError::new();
        nested.add_required("name");
        nested.add_schema_error("Invalid input type.");

        let mut outer = ValidationError::new();
        outer.extend_prefixed("role", nested);

        assert!(outer.has_field("role.name"));
        assert_eq!(outer.messages("role"), vec!["Invalid input type."]);
    }

    #[test]
    fn to_json_groups_messages_by_field() {
        let mut err = ValidationError::new();
        err.add_max_length("name", 3);
        err.add_choice("name", "a, b");
        err.add_unknown("extra");

        assert_eq!(
            err.to_json(),
            json!({
                "name": ["Longer than maximum length 3.", "Must be one of: a, b."],
                "extra": ["Unknown field."],
            })
        );
    }

    #[test]
    fn display_single_and_many() {
        let mut err = ValidationError::new();
        err.add_null("title");
        assert_eq!(
            err.to_string(),
            "validation error on 'title': Field may not be null."
        );
        err.add_required("name");
        assert!(err.to_string().starts_with("validation errors:"));
    }

    #[test]
    fn into_result_and_accessors() {
        assert!(ValidationError::new().into_result().is_ok());

        let mut err = ValidationError::new();
        err.add_custom("x", "bad");
        let wrapped = Error::from(err);
        assert!(wrapped.is_validation());
        assert_eq!(wrapped.validation().unwrap().messages("x"), vec!["bad"]);
        assert!(Error::config("nope").validation().is_none());
    }
}
