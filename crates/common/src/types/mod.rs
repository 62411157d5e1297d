use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Header names the multimap adapter reads from inbound messages.
pub mod headers {
    /// Operation selector, matched case-insensitively.
    pub const OPERATION: &str = "operation";
    /// Entry key, a string or an integer.
    pub const OBJECT_ID: &str = "objectId";
}

/// Key of a multimap entry.
///
/// Integer and string keys are distinct: `4711` and `"4711"` name different slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Int(i64),
    Text(String),
}

impl ObjectId {
    /// Read a key out of a header value. Only strings and integers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Int),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Int(i) => write!(f, "{i}"),
            ObjectId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self { Self::Text(s.to_string()) }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for ObjectId {
    fn from(i: i64) -> Self { Self::Int(i) }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        match id {
            ObjectId::Int(i) => Value::from(i),
            ObjectId::Text(s) => Value::String(s),
        }
    }
}

/// A message flowing through a route: free-form headers plus a JSON body.
///
/// A `null` body means the message carries no payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    #[serde(default)]
    pub body: Value,
}

impl Message {
    pub fn new(body: impl Into<Value>) -> Self {
        Self { headers: BTreeMap::new(), body: body.into() }
    }

    /// A message without payload, e.g. for key-only operations.
    pub fn empty() -> Self { Self::default() }

    pub fn with_header(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    pub fn remove_header(&mut self, name: &str) -> Option<Value> {
        self.headers.remove(name)
    }

    pub fn has_body(&self) -> bool { !self.body.is_null() }

    /// Parse one line of newline-delimited JSON.
    pub fn from_json_line(line: &str) -> Result<Self, CoreError> {
        serde_json::from_str(line.trim()).map_err(|e| CoreError::Parse(e.to_string()))
    }

    /// Encode as a single JSON line, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Encode(e.to_string()))
    }
}
