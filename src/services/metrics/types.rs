use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A typed measurement field value. Replaces the dynamic `any`-typed labels
/// the source system used, per REDESIGN FLAGS — every field kind is an
/// explicit enum variant matched exhaustively by the line-protocol encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// The lingua franca written to the metrics sink (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Sentinel scalars written when a real observation was impossible (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct SentinelConfig {
    pub enabled: bool,
    pub status_down: i64,
    pub latency: i64,
    pub peer_count: i64,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            status_down: 0,
            latency: -1,
            peer_count: -1,
        }
    }
}
