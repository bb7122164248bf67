//! Epoch timestamp fields.
//!
//! `Timestamp` renders datetimes as whole seconds since the Unix epoch (UTC)
//! and `MsTimestamp` as milliseconds. Both load numbers or numeric strings
//! back into naive UTC datetimes.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value as Json;

use modelschema_core::{Result, TypeError, Value, whole_i64};

use super::invalid;
use super::primitive::{as_datetime, number};

const INVALID: &str = "Not a valid timestamp.";

fn seconds(value: &Value) -> std::result::Result<i64, TypeError> {
    as_datetime(value)
        .map(|ts| ts.and_utc().timestamp())
        .ok_or_else(|| TypeError {
            expected: "datetime",
            actual: value.type_name().to_string(),
            attribute: None,
        })
}

pub(super) fn serialize_seconds(value: &Value) -> std::result::Result<Json, TypeError> {
    seconds(value).map(Json::from)
}

pub(super) fn serialize_millis(value: &Value) -> std::result::Result<Json, TypeError> {
    seconds(value).map(|s| Json::from(s * 1000))
}

fn from_seconds(secs: f64) -> Option<NaiveDateTime> {
    whole_i64((secs * 1e6).round())
        .and_then(DateTime::from_timestamp_micros)
        .map(|dt| dt.naive_utc())
}

/// Zero, empty and `false` are not timestamps.
fn is_blank(input: &Json) -> bool {
    match input {
        Json::Bool(b) => !b,
        Json::String(s) => s.is_empty(),
        Json::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

pub(super) fn deserialize_seconds(input: &Json) -> Result<Value> {
    load(input, 1.0)
}

pub(super) fn deserialize_millis(input: &Json) -> Result<Value> {
    load(input, 1e3)
}

fn load(input: &Json, per_second: f64) -> Result<Value> {
    if is_blank(input) {
        return Err(invalid(INVALID));
    }
    number(input)
        .and_then(|n| from_seconds(n / per_second))
        .map(Value::Timestamp)
        .ok_or_else(|| invalid(INVALID))
}
