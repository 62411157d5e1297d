use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::errors::OperationError;

/// The fixed set of multimap operations the producer can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Put,
    Get,
    RemoveValue,
    Delete,
    Clear,
    ValueCount,
    ContainsKey,
    ContainsValue,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::Put,
        Operation::Get,
        Operation::RemoveValue,
        Operation::Delete,
        Operation::Clear,
        Operation::ValueCount,
        Operation::ContainsKey,
        Operation::ContainsValue,
    ];

    /// Wire name, as written in headers and endpoint URIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Put => "put",
            Operation::Get => "get",
            Operation::RemoveValue => "removevalue",
            Operation::Delete => "delete",
            Operation::Clear => "clear",
            Operation::ValueCount => "valueCount",
            Operation::ContainsKey => "containsKey",
            Operation::ContainsValue => "containsValue",
        }
    }

    /// Constant name, e.g. `REMOVE_VALUE`.
    pub fn constant_name(self) -> &'static str {
        match self {
            Operation::Put => "PUT",
            Operation::Get => "GET",
            Operation::RemoveValue => "REMOVE_VALUE",
            Operation::Delete => "DELETE",
            Operation::Clear => "CLEAR",
            Operation::ValueCount => "VALUE_COUNT",
            Operation::ContainsKey => "CONTAINS_KEY",
            Operation::ContainsValue => "CONTAINS_VALUE",
        }
    }

    pub fn requires_key(self) -> bool {
        !matches!(self, Operation::Clear | Operation::ContainsValue)
    }

    pub fn requires_body(self) -> bool {
        matches!(self, Operation::Put | Operation::RemoveValue | Operation::ContainsValue)
    }

    /// Operations whose result is sent on as a response message.
    pub fn has_response(self) -> bool {
        matches!(
            self,
            Operation::Get | Operation::ValueCount | Operation::ContainsKey | Operation::ContainsValue
        )
    }

    pub fn is_mutating(self) -> bool {
        matches!(self, Operation::Put | Operation::RemoveValue | Operation::Delete | Operation::Clear)
    }

    /// Resolve an operation header. Anything but a known name is unsupported.
    pub fn from_header(value: &Value) -> Result<Self, OperationError> {
        match value {
            Value::String(s) => s.parse(),
            other => Err(OperationError::Unsupported(other.to_string())),
        }
    }
}

impl FromStr for Operation {
    type Err = OperationError;

    /// Case-insensitive match against the wire name or the constant name;
    /// surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(name) || op.constant_name().eq_ignore_ascii_case(name))
            .ok_or_else(|| OperationError::Unsupported(s.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
