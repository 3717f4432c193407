// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Task record representation and timestamp parsing
//!
//! Records are opaque JSON maps; the store only interprets three configured
//! fields: the identity field, the plan id, the start time and the task result.
//! All timestamp parsing is literal wall-clock: a value like
//! `"2024-03-01 00:00:00"` is exactly that instant, never shifted for UTC or
//! a local timezone. The source data already encodes the intended instant.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Days between the spreadsheet serial epoch (1899-12-30) and the Unix epoch.
const SERIAL_EPOCH_OFFSET_DAYS: f64 = 25_569.0;

/// Serial values below this are treated as spreadsheet dates rather than
/// epoch timestamps (2958465 is the serial for 9999-12-31).
const SERIAL_DATE_CUTOFF: f64 = 2_958_466.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Errors raised while interpreting a record's configured fields
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Invalid date value: {0}")]
    InvalidDate(String),

    #[error("Missing field: {0}")]
    MissingField(String),
}

/// Names of the fields the store interprets on every record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldConfig {
    /// Identity field; when absent the key is synthesized from plan id + start time
    pub id: String,
    pub plan_id: String,
    pub start_time: String,
    pub task_result: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            plan_id: "plan_id".to_string(),
            start_time: "start_time".to_string(),
            task_result: "task_result".to_string(),
        }
    }
}

/// An opaque task record: a JSON object with a few interpreted fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct TaskRecord {
    fields: Map<String, Value>,
}

impl TaskRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Identity key: the id field when present, else `{plan_id}_{start_time}`.
    ///
    /// The same rule is used across load, insert, update and delete; diverging
    /// here would desynchronize the bucket reverse map and the record locator.
    pub fn identity_key(&self, fields: &FieldConfig) -> Result<String, RecordError> {
        if let Some(id) = self.fields.get(&fields.id) {
            if !id.is_null() {
                return Ok(scalar_to_string(id));
            }
        }

        let plan = self
            .fields
            .get(&fields.plan_id)
            .filter(|v| !v.is_null())
            .ok_or_else(|| RecordError::MissingField(fields.id.clone()))?;
        let start = self
            .fields
            .get(&fields.start_time)
            .filter(|v| !v.is_null())
            .ok_or_else(|| RecordError::MissingField(fields.start_time.clone()))?;

        Ok(format!(
            "{}_{}",
            scalar_to_string(plan),
            scalar_to_string(start)
        ))
    }

    /// Parse the record's start time as a literal wall-clock instant.
    pub fn start_time(&self, fields: &FieldConfig) -> Result<NaiveDateTime, RecordError> {
        let value = self
            .fields
            .get(&fields.start_time)
            .filter(|v| !v.is_null())
            .ok_or_else(|| RecordError::MissingField(fields.start_time.clone()))?;
        parse_instant(value)
    }

    pub fn plan_id(&self, fields: &FieldConfig) -> Option<String> {
        self.fields
            .get(&fields.plan_id)
            .filter(|v| !v.is_null())
            .map(scalar_to_string)
    }

    pub fn task_result(&self, fields: &FieldConfig) -> Option<&str> {
        self.fields.get(&fields.task_result).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for TaskRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a JSON value into a literal wall-clock instant.
///
/// Accepts datetime strings (`2024-03-01 00:00:00`, ISO `T` form, with or
/// without fractional seconds, bare dates), spreadsheet serial numbers and
/// epoch timestamps in seconds or milliseconds.
pub fn parse_instant(value: &Value) -> Result<NaiveDateTime, RecordError> {
    match value {
        Value::String(s) => parse_instant_str(s),
        Value::Number(n) => {
            let n = n
                .as_f64()
                .ok_or_else(|| RecordError::InvalidDate(n.to_string()))?;
            parse_instant_number(n)
        }
        other => Err(RecordError::InvalidDate(other.to_string())),
    }
}

fn parse_instant_str(s: &str) -> Result<NaiveDateTime, RecordError> {
    let s = s.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(RecordError::InvalidDate(s.to_string()))
}

fn parse_instant_number(n: f64) -> Result<NaiveDateTime, RecordError> {
    if !n.is_finite() {
        return Err(RecordError::InvalidDate(n.to_string()));
    }

    let millis = if n.abs() < SERIAL_DATE_CUTOFF {
        // Spreadsheet serial date
        ((n - SERIAL_EPOCH_OFFSET_DAYS) * MILLIS_PER_DAY).round() as i64
    } else if n.abs() < 1e12 {
        // Epoch seconds
        (n * 1000.0).round() as i64
    } else {
        // Epoch milliseconds
        n.round() as i64
    };

    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| RecordError::InvalidDate(n.to_string()))
}

/// Millisecond representation of a wall-clock instant, used for index keys
/// and range comparisons. Inverse of [`instant_from_millis`].
pub fn instant_millis(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp_millis()
}

pub fn instant_from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> TaskRecord {
        match value {
            Value::Object(map) => TaskRecord::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_identity_key_prefers_id_field() {
        let fields = FieldConfig::default();
        let r = record(json!({"id": 42, "plan_id": "P1", "start_time": "2024-01-01 00:00:00"}));
        assert_eq!(r.identity_key(&fields).unwrap(), "42");
    }

    #[test]
    fn test_identity_key_synthesized_from_plan_and_time() {
        let fields = FieldConfig::default();
        let r = record(json!({"plan_id": "P1", "start_time": "2024-01-01 08:00:00"}));
        assert_eq!(r.identity_key(&fields).unwrap(), "P1_2024-01-01 08:00:00");
    }

    #[test]
    fn test_parse_datetime_string_is_literal() {
        let dt = parse_instant(&json!("2024-03-01 00:00:00")).unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_bare_date() {
        let dt = parse_instant(&json!("2024-02-01")).unwrap();
        assert_eq!(dt.time(), chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_spreadsheet_serial() {
        // 45292 is 2024-01-01
        let dt = parse_instant(&json!(45292)).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_epoch_millis() {
        let dt = parse_instant(&json!(1_704_067_200_000_i64)).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_invalid_date_is_distinguishable() {
        let err = parse_instant(&json!("not a date")).unwrap_err();
        assert!(matches!(err, RecordError::InvalidDate(_)));
    }

    #[test]
    fn test_millis_round_trip() {
        let dt = parse_instant(&json!("2024-06-15 12:30:45")).unwrap();
        assert_eq!(instant_from_millis(instant_millis(dt)).unwrap(), dt);
    }
}
