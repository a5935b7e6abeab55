use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::Version;

/// Parameters for an outbound JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// Positional parameters as an array
    Array(Vec<Value>),
    /// Named parameters as an object
    Map(Map<String, Value>),
}

impl Params {
    /// Convert to a `serde_json::Value` for the wire envelope
    pub fn to_value(&self) -> Value {
        match self {
            Params::Array(items) => Value::Array(items.clone()),
            Params::Map(map) => Value::Object(map.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::Array(items) => items.is_empty(),
            Params::Map(map) => map.is_empty(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(items: Vec<Value>) -> Self {
        Params::Array(items)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::Map(map)
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Self {
        params.to_value()
    }
}

/// A JSON-RPC request or notification
///
/// An absent `id` makes the message a notification: no response is ever
/// expected or sent for it. Inbound `params` are kept as a raw `Value` so
/// that malformed shapes survive classification and are rejected during
/// parameter adaptation rather than at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Create a call request carrying an id
    pub fn call(id: i64, method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            jsonrpc: Version::V2_0,
            id: Some(id),
            method: method.into(),
            params: params.map(|p| p.to_value()),
        }
    }

    /// Create a notification (no id, no response expected)
    pub fn notification(method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            jsonrpc: Version::V2_0,
            id: None,
            method: method.into(),
            params: params.map(|p| p.to_value()),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}
