//! Rendering and parsing of scalar field kinds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as Json;
use uuid::Uuid;

use modelschema_core::{
    DATE_FORMAT, DATETIME_FORMAT, Result, TIME_FORMAT, TypeError, Value, parse_datetime,
    whole_i64,
};

use super::{FieldKind, invalid, timestamp};

fn type_error(expected: &'static str, value: &Value) -> TypeError {
    TypeError {
        expected,
        actual: value.type_name().to_string(),
        attribute: None,
    }
}

/// Render a stored value. Null renders as null for every kind.
pub(super) fn serialize(kind: &FieldKind, value: &Value) -> std::result::Result<Json, TypeError> {
    if value.is_null() {
        return Ok(Json::Null);
    }
    match kind {
        FieldKind::String => Ok(Json::String(match value {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        })),
        FieldKind::Integer => match value {
            Value::BigInt(i) => Ok(Json::from(*i)),
            Value::Bool(b) => Ok(Json::from(i64::from(*b))),
            Value::Double(f) => whole_i64(f.trunc())
                .map(Json::from)
                .ok_or_else(|| type_error("integer", value)),
            Value::Text(s) | Value::Decimal(s) => s
                .trim()
                .parse::<i64>()
                .map(Json::from)
                .map_err(|_| type_error("integer", value)),
            _ => Err(type_error("integer", value)),
        },
        FieldKind::Float => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .map(|f| Value::Double(f).to_json())
            .ok_or_else(|| type_error("float", value)),
        FieldKind::Decimal => match value {
            Value::Decimal(s) | Value::Text(s) => Ok(Json::String(s.clone())),
            Value::BigInt(_) | Value::Double(_) => Ok(Json::String(value.to_string())),
            _ => Err(type_error("decimal", value)),
        },
        FieldKind::Boolean => match value {
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::BigInt(i) => Ok(Json::Bool(*i != 0)),
            Value::Text(s) => parse_bool_text(s)
                .map(Json::Bool)
                .ok_or_else(|| type_error("boolean", value)),
            _ => Err(type_error("boolean", value)),
        },
        FieldKind::DateTime(format) => {
            let ts = as_datetime(value).ok_or_else(|| type_error("datetime", value))?;
            Ok(format_datetime(ts, format.as_deref()))
        }
        FieldKind::Date(format) => {
            let date = match value {
                Value::Date(d) => *d,
                Value::Timestamp(ts) => ts.date(),
                Value::Text(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .map_err(|_| type_error("date", value))?,
                _ => return Err(type_error("date", value)),
            };
            let pattern = temporal_pattern(format.as_deref(), DATE_FORMAT);
            Ok(Json::String(date.format(pattern).to_string()))
        }
        FieldKind::Time(format) => {
            let time = match value {
                Value::Time(t) => *t,
                Value::Timestamp(ts) => ts.time(),
                Value::Text(s) => s
                    .parse::<NaiveTime>()
                    .map_err(|_| type_error("time", value))?,
                _ => return Err(type_error("time", value)),
            };
            let pattern = temporal_pattern(format.as_deref(), TIME_FORMAT);
            Ok(Json::String(time.format(pattern).to_string()))
        }
        FieldKind::Uuid => match value {
            Value::Uuid(u) => Ok(Json::String(u.hyphenated().to_string())),
            Value::Text(s) => Uuid::parse_str(s)
                .map(|u| Json::String(u.hyphenated().to_string()))
                .map_err(|_| type_error("uuid", value)),
            _ => Err(type_error("uuid", value)),
        },
        FieldKind::Timestamp => timestamp::serialize_seconds(value),
        FieldKind::MsTimestamp => timestamp::serialize_millis(value),
        _ => Ok(value.to_json()),
    }
}

/// Parse a non-null input value.
pub(super) fn deserialize(kind: &FieldKind, input: &Json) -> Result<Value> {
    match kind {
        FieldKind::String => match input {
            Json::String(s) => Ok(Value::Text(s.clone())),
            _ => Err(invalid("Not a valid string.")),
        },
        FieldKind::Integer => {
            let parsed = match input {
                Json::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_i64)),
                Json::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            parsed
                .map(Value::BigInt)
                .ok_or_else(|| invalid("Not a valid integer."))
        }
        FieldKind::Float => {
            let parsed = match input {
                Json::Number(n) => n.as_f64(),
                Json::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .filter(|f| f.is_finite())
                .map(Value::Double)
                .ok_or_else(|| invalid("Not a valid number."))
        }
        FieldKind::Decimal => match input {
            Json::Number(n) => Ok(Value::Decimal(n.to_string())),
            Json::String(s) if s.trim().parse::<f64>().is_ok_and(f64::is_finite) => {
                Ok(Value::Decimal(s.trim().to_string()))
            }
            _ => Err(invalid("Not a valid number.")),
        },
        FieldKind::Boolean => {
            let parsed = match input {
                Json::Bool(b) => Some(*b),
                Json::Number(n) => match n.as_i64() {
                    Some(1) => Some(true),
                    Some(0) => Some(false),
                    _ => None,
                },
                Json::String(s) => parse_bool_text(s),
                _ => None,
            };
            parsed
                .map(Value::Bool)
                .ok_or_else(|| invalid("Not a valid boolean."))
        }
        FieldKind::DateTime(format) => parse_datetime_input(input, format.as_deref())
            .map(Value::Timestamp)
            .ok_or_else(|| invalid("Not a valid datetime.")),
        FieldKind::Date(format) => input
            .as_str()
            .and_then(|s| {
                NaiveDate::parse_from_str(s, temporal_pattern(format.as_deref(), DATE_FORMAT)).ok()
            })
            .map(Value::Date)
            .ok_or_else(|| invalid("Not a valid date.")),
        FieldKind::Time(format) => input
            .as_str()
            .and_then(|s| match format.as_deref() {
                None | Some("iso") => s.parse::<NaiveTime>().ok(),
                Some(pattern) => NaiveTime::parse_from_str(s, pattern).ok(),
            })
            .map(Value::Time)
            .ok_or_else(|| invalid("Not a valid time.")),
        FieldKind::Uuid => input
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Value::Uuid)
            .ok_or_else(|| invalid("Not a valid UUID.")),
        FieldKind::Timestamp => timestamp::deserialize_seconds(input),
        FieldKind::MsTimestamp => timestamp::deserialize_millis(input),
        _ => Ok(Value::from_json(input)),
    }
}

fn parse_bool_text(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "t" | "true" | "on" | "y" | "yes" | "1" => Some(true),
        "f" | "false" | "off" | "n" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn temporal_pattern<'a>(format: Option<&'a str>, iso: &'a str) -> &'a str {
    match format {
        None | Some("iso") => iso,
        Some(pattern) => pattern,
    }
}

pub(super) fn as_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        Value::Text(s) => parse_datetime(s),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_datetime(ts: NaiveDateTime, format: Option<&str>) -> Json {
    let micros = ts.and_utc().timestamp_micros() as f64;
    match format {
        None | Some("iso") => Json::String(ts.format(DATETIME_FORMAT).to_string()),
        Some("timestamp") => Value::Double(micros / 1e6).to_json(),
        Some("timestamp_ms") => Value::Double(micros / 1e3).to_json(),
        Some(pattern) => Json::String(ts.format(pattern).to_string()),
    }
}

fn parse_datetime_input(input: &Json, format: Option<&str>) -> Option<NaiveDateTime> {
    let from_micros = |micros: f64| {
        whole_i64(micros.round())
            .and_then(DateTime::from_timestamp_micros)
            .map(|dt| dt.naive_utc())
    };
    match format {
        None | Some("iso") => parse_datetime(input.as_str()?),
        Some("timestamp") => from_micros(number(input)? * 1e6),
        Some("timestamp_ms") => from_micros(number(input)? * 1e3),
        Some(pattern) => {
            let text = input.as_str()?;
            NaiveDateTime::parse_from_str(text, pattern)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(text, pattern)
                        .ok()
                        .map(|d| d.and_time(NaiveTime::MIN))
                })
        }
    }
}

/// A JSON number or numeric string.
pub(super) fn number(input: &Json) -> Option<f64> {
    let parsed = match input {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}
