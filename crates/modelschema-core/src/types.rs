//! Attribute type definitions, hierarchy and native coercion.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::TypeError;
use crate::value::{DATE_FORMAT, DATETIME_FORMAT, Value, whole_i64};

/// Native attribute kinds understood by the model layer.
///
/// Kinds form a hierarchy (see [`AttributeType::parent`]) that field
/// conversion walks from the most specific kind to the root `Any`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// Root of the hierarchy; matches every attribute.
    Any,

    // Integer types
    Integer,
    BigInteger,
    SmallInteger,
    /// Auto-incrementing integer primary key
    Auto,
    /// Auto-incrementing 64-bit primary key
    BigAuto,

    // Floating point
    Float,
    Double,

    // Fixed precision
    Decimal,

    // String types
    /// Bounded text (`max_length`)
    Char,
    FixedChar,
    Text,

    Boolean,

    // Date/time types
    DateTime,
    Date,
    Time,

    Uuid,
    Blob,

    // Relations
    ForeignKey,
    /// Foreign key whose target model is resolved by name later
    DeferredForeignKey,

    /// Kind unknown to the core, extending `base`.
    Custom(CustomType),
}

/// An extension attribute kind with a named identity and a built-in base.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomType {
    pub name: Arc<str>,
    pub base: Box<AttributeType>,
}

impl AttributeType {
    /// Create a custom kind that behaves like `base` unless a rule targets it.
    pub fn custom(name: impl Into<Arc<str>>, base: AttributeType) -> Self {
        AttributeType::Custom(CustomType {
            name: name.into(),
            base: Box::new(base),
        })
    }

    /// The direct parent of this kind, `None` for `Any`.
    pub fn parent(&self) -> Option<AttributeType> {
        match self {
            AttributeType::Any => None,
            AttributeType::BigInteger | AttributeType::SmallInteger | AttributeType::Auto => {
                Some(AttributeType::Integer)
            }
            AttributeType::BigAuto => Some(AttributeType::Auto),
            AttributeType::Double => Some(AttributeType::Float),
            AttributeType::FixedChar => Some(AttributeType::Char),
            AttributeType::Custom(custom) => Some((*custom.base).clone()),
            _ => Some(AttributeType::Any),
        }
    }

    /// Walk the hierarchy from this kind up to `Any`, closest first.
    pub fn ancestors(&self) -> Vec<AttributeType> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(ty) = current {
            current = ty.parent();
            chain.push(ty);
        }
        chain
    }

    /// Check whether `other` appears in this kind's ancestor chain.
    pub fn is_a(&self, other: &AttributeType) -> bool {
        self.ancestors().iter().any(|ty| ty == other)
    }

    /// Check if this is an auto-generated identifier kind.
    pub fn is_auto(&self) -> bool {
        self.is_a(&AttributeType::Auto)
    }

    /// Check if this kind references another model.
    pub fn is_relation(&self) -> bool {
        self.is_a(&AttributeType::ForeignKey) || self.is_a(&AttributeType::DeferredForeignKey)
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        self.is_a(&AttributeType::Integer)
            || self.is_a(&AttributeType::Float)
            || self.is_a(&AttributeType::Decimal)
    }

    /// Check if this type is text-based.
    pub fn is_text(&self) -> bool {
        self.is_a(&AttributeType::Char) || self.is_a(&AttributeType::Text)
    }

    /// Check if this type is a date/time type.
    pub fn is_temporal(&self) -> bool {
        self.is_a(&AttributeType::DateTime)
            || self.is_a(&AttributeType::Date)
            || self.is_a(&AttributeType::Time)
    }

    /// Short name of the kind.
    pub fn name(&self) -> &str {
        match self {
            AttributeType::Any => "Any",
            AttributeType::Integer => "Integer",
            AttributeType::BigInteger => "BigInteger",
            AttributeType::SmallInteger => "SmallInteger",
            AttributeType::Auto => "Auto",
            AttributeType::BigAuto => "BigAuto",
            AttributeType::Float => "Float",
            AttributeType::Double => "Double",
            AttributeType::Decimal => "Decimal",
            AttributeType::Char => "Char",
            AttributeType::FixedChar => "FixedChar",
            AttributeType::Text => "Text",
            AttributeType::Boolean => "Boolean",
            AttributeType::DateTime => "DateTime",
            AttributeType::Date => "Date",
            AttributeType::Time => "Time",
            AttributeType::Uuid => "Uuid",
            AttributeType::Blob => "Blob",
            AttributeType::ForeignKey => "ForeignKey",
            AttributeType::DeferredForeignKey => "DeferredForeignKey",
            AttributeType::Custom(custom) => &custom.name,
        }
    }

    /// Coerce a value into this kind's native representation.
    ///
    /// This is the model layer's own parser; the schema layer runs it as a
    /// validation guard. Null always passes through. Relation kinds carry no
    /// key type here and pass values through unchanged.
    pub fn coerce(&self, value: &Value) -> Result<Value, TypeError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let fail = |expected: &'static str| TypeError {
            expected,
            actual: describe(value),
            attribute: None,
        };

        match self {
            AttributeType::Integer
            | AttributeType::BigInteger
            | AttributeType::SmallInteger
            | AttributeType::Auto
            | AttributeType::BigAuto => match value {
                Value::BigInt(i) => Ok(Value::BigInt(*i)),
                Value::Bool(b) => Ok(Value::BigInt(i64::from(*b))),
                Value::Double(f) => whole_i64(*f)
                    .map(Value::BigInt)
                    .ok_or_else(|| fail("integer")),
                Value::Text(s) | Value::Decimal(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::BigInt)
                    .map_err(|_| fail("integer")),
                _ => Err(fail("integer")),
            },
            AttributeType::Float | AttributeType::Double => value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
                .map(Value::Double)
                .ok_or_else(|| fail("float")),
            AttributeType::Decimal => match value {
                Value::Decimal(s) => Ok(Value::Decimal(s.clone())),
                Value::BigInt(i) => Ok(Value::Decimal(i.to_string())),
                Value::Double(f) => Ok(Value::Decimal(f.to_string())),
                Value::Text(s) if s.trim().parse::<f64>().is_ok() => {
                    Ok(Value::Decimal(s.trim().to_string()))
                }
                _ => Err(fail("decimal")),
            },
            AttributeType::Char | AttributeType::FixedChar | AttributeType::Text => match value {
                Value::Text(s) => Ok(Value::Text(s.clone())),
                Value::Bytes(b) => String::from_utf8(b.clone())
                    .map(Value::Text)
                    .map_err(|_| fail("utf-8 text")),
                Value::Array(_) | Value::Json(_) => Err(fail("text")),
                other => Ok(Value::Text(other.to_string())),
            },
            AttributeType::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::BigInt(i) => Ok(Value::Bool(*i != 0)),
                Value::Text(s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "1" | "t" | "yes" | "on" => Ok(Value::Bool(true)),
                    "false" | "0" | "f" | "no" | "off" => Ok(Value::Bool(false)),
                    _ => Err(fail("boolean")),
                },
                _ => Err(fail("boolean")),
            },
            AttributeType::DateTime => match value {
                Value::Timestamp(ts) => Ok(Value::Timestamp(*ts)),
                Value::Date(d) => Ok(Value::Timestamp(d.and_time(NaiveTime::MIN))),
                Value::Text(s) => parse_datetime(s)
                    .map(Value::Timestamp)
                    .ok_or_else(|| fail("datetime")),
                _ => Err(fail("datetime")),
            },
            AttributeType::Date => match value {
                Value::Date(d) => Ok(Value::Date(*d)),
                Value::Timestamp(ts) => Ok(Value::Date(ts.date())),
                Value::Text(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .map(Value::Date)
                    .map_err(|_| fail("date")),
                _ => Err(fail("date")),
            },
            AttributeType::Time => match value {
                Value::Time(t) => Ok(Value::Time(*t)),
                Value::Timestamp(ts) => Ok(Value::Time(ts.time())),
                Value::Text(s) => s
                    .parse::<NaiveTime>()
                    .map(Value::Time)
                    .map_err(|_| fail("time")),
                _ => Err(fail("time")),
            },
            AttributeType::Uuid => match value {
                Value::Uuid(u) => Ok(Value::Uuid(*u)),
                Value::Text(s) => Uuid::parse_str(s)
                    .map(Value::Uuid)
                    .map_err(|_| fail("uuid")),
                Value::Bytes(b) => Uuid::from_slice(b)
                    .map(Value::Uuid)
                    .map_err(|_| fail("uuid")),
                _ => Err(fail("uuid")),
            },
            AttributeType::Blob => match value {
                Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
                Value::Text(s) => Ok(Value::Bytes(s.clone().into_bytes())),
                _ => Err(fail("bytes")),
            },
            AttributeType::Custom(custom) => custom.base.coerce(value),
            AttributeType::Any | AttributeType::ForeignKey | AttributeType::DeferredForeignKey => {
                Ok(value.clone())
            }
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse an ISO-8601 datetime, with or without offset. Offsets convert to UTC.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
        return Some(ts);
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Text(s) => format!("'{s}'"),
        other => other.type_name().to_string(),
    }
}
