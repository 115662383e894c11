//! Remote response shapes

use crate::types::Method;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// Result of a `list` call: a page of records plus the full match count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListResponse {
    pub records: Vec<Value>,
    pub total_count: u64,
}

impl ListResponse {
    pub fn new(records: Vec<Value>, total_count: u64) -> Self {
        Self {
            records,
            total_count,
        }
    }

    /// A response whose total equals the number of records.
    pub fn from_records(records: Vec<Value>) -> Self {
        let total_count = records.len() as u64;
        Self {
            records,
            total_count,
        }
    }

    /// Parse the backend wire shape. `None` when `records` is absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        let records = value.get("records")?.as_array()?.clone();
        let total_count = value
            .get("_metadata")
            .and_then(|m| m.get("total_count"))
            .and_then(Value::as_u64)
            .unwrap_or(records.len() as u64);
        Some(Self {
            records,
            total_count,
        })
    }

    pub fn to_value(&self) -> Value {
        json!({
            "records": self.records,
            "_metadata": { "total_count": self.total_count },
        })
    }
}

impl Serialize for ListResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ListResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("list response without a records array"))
    }
}

/// Data returned by a successful sub-request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    List(ListResponse),
    Record(Value),
}

impl ResourceData {
    /// Rebuild a cached value in the shape the method returns. A `get`
    /// record is kept whole even when it holds a `records` array.
    pub fn from_cached(method: Method, value: Value) -> Self {
        match method {
            Method::List => match ListResponse::from_value(&value) {
                Some(list) => ResourceData::List(list),
                None => ResourceData::Record(value),
            },
            Method::Get => ResourceData::Record(value),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ResourceData::List(list) => list.to_value(),
            ResourceData::Record(value) => value.clone(),
        }
    }

    pub fn as_list(&self) -> Option<&ListResponse> {
        match self {
            ResourceData::List(list) => Some(list),
            ResourceData::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&Value> {
        match self {
            ResourceData::Record(value) => Some(value),
            ResourceData::List(_) => None,
        }
    }
}
