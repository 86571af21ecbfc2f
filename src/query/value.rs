//! Scalar values carried by constant expressions and their wire encoding.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{PlanError, Result};

/// Declared SQL type of a constant or parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    /// Boolean.
    Boolean,
    /// Signed 64-bit integer.
    Bigint,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    Varchar,
    /// Binary payload.
    Varbinary,
    /// Nanoseconds since Unix epoch in UTC.
    Timestamp,
}

impl ValueType {
    /// Wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Boolean => "BOOLEAN",
            ValueType::Bigint => "BIGINT",
            ValueType::Float => "FLOAT",
            ValueType::Varchar => "VARCHAR",
            ValueType::Varbinary => "VARBINARY",
            ValueType::Timestamp => "TIMESTAMP",
        }
    }

    pub(crate) fn parse(context: &'static str, field: &'static str, raw: &Json) -> Result<Self> {
        serde_json::from_value(raw.clone())
            .map_err(|_| PlanError::invalid(context, field, "a known value type name"))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed scalar value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal.
    String(String),
    /// Arbitrary binary payload, hex encoded on the wire.
    Bytes(Vec<u8>),
    /// Nanoseconds since Unix epoch in UTC.
    DateTime(i64),
}

impl Value {
    /// Short name of the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Whether this value may be stored in a slot of type `ty`.
    pub fn fits(&self, ty: ValueType) -> bool {
        matches!(
            (self, ty),
            (Value::Null, _)
                | (Value::Bool(_), ValueType::Boolean)
                | (Value::Int(_), ValueType::Bigint)
                | (Value::Float(_), ValueType::Float)
                | (Value::String(_), ValueType::Varchar)
                | (Value::Bytes(_), ValueType::Varbinary)
                | (Value::DateTime(_), ValueType::Timestamp)
        )
    }

    /// Natural type of a non-null value.
    pub fn natural_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Boolean),
            Value::Int(_) => Some(ValueType::Bigint),
            Value::Float(_) => Some(ValueType::Float),
            Value::String(_) => Some(ValueType::Varchar),
            Value::Bytes(_) => Some(ValueType::Varbinary),
            Value::DateTime(_) => Some(ValueType::Timestamp),
        }
    }

    pub(crate) fn to_json(&self) -> Result<Json> {
        Ok(match self {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Int(v) => Json::from(*v),
            Value::Float(v) => {
                let number = serde_json::Number::from_f64(*v).ok_or(PlanError::NonFiniteFloat)?;
                Json::Number(number)
            }
            Value::String(v) => Json::String(v.clone()),
            Value::Bytes(v) => Json::String(hex::encode(v)),
            Value::DateTime(v) => Json::from(*v),
        })
    }

    pub(crate) fn from_json(ty: ValueType, raw: &Json) -> Result<Self> {
        const CONTEXT: &str = "VALUE_CONSTANT";
        const FIELD: &str = "VALUE";
        match ty {
            ValueType::Boolean => raw
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| PlanError::invalid(CONTEXT, FIELD, "a boolean")),
            ValueType::Bigint => raw
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| PlanError::invalid(CONTEXT, FIELD, "a 64-bit integer")),
            ValueType::Float => raw
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| PlanError::invalid(CONTEXT, FIELD, "a number")),
            ValueType::Varchar => raw
                .as_str()
                .map(|s| Value::String(s.to_owned()))
                .ok_or_else(|| PlanError::invalid(CONTEXT, FIELD, "a string")),
            ValueType::Varbinary => raw
                .as_str()
                .and_then(|s| hex::decode(s).ok())
                .map(Value::Bytes)
                .ok_or_else(|| PlanError::invalid(CONTEXT, FIELD, "a hex string")),
            // Timestamps arrive either as numbers or as decimal strings.
            ValueType::Timestamp => match raw {
                Json::Number(n) => n.as_i64().map(Value::DateTime),
                Json::String(s) => s.parse::<i64>().ok().map(Value::DateTime),
                _ => None,
            }
            .ok_or_else(|| PlanError::invalid(CONTEXT, FIELD, "nanoseconds since epoch")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}
