//! Identifier types and JSON value classification.
//!
//! An [`Id`] correlates a request with its response; a [`ClientId`] is the
//! narrower id shape a client is allowed to mint. `json_kind_name` gives the
//! human-readable JSON kind used throughout the parameter-binding error
//! messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A response/request identifier: a string, an integer, or null.
///
/// Null only ever appears on the server side, when a request's own id could
/// not be recovered (e.g. a parse error). Floating point numbers are never
/// valid ids.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// A string id.
    String(String),
    /// An integer id.
    Int(i64),
    /// A null id, used only for unrecoverable requests.
    Null,
}

impl From<i64> for Id {
    fn from(v: i64) -> Self {
        Id::Int(v)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl<'a> From<&'a str> for Id {
    fn from(s: &'a str) -> Self {
        Id::String(s.into())
    }
}

impl Id {
    /// Recover an `Id` from a raw JSON value found in a `"id"` field, if the
    /// value is one of the permitted shapes (string, integer, or null).
    pub fn from_value(value: &Value) -> Option<Id> {
        match value {
            Value::String(s) => Some(Id::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Id::Int),
            Value::Null => Some(Id::Null),
            _ => None,
        }
    }

    /// Render this id the way its JSON representation would `dump()`:
    /// `null`, a plain decimal integer, or a JSON-quoted string. Used in
    /// diagnostic messages that embed an id, where `Debug`'s `Int(4)`/
    /// `String("x")` forms would be misleading.
    pub fn dump(&self) -> String {
        match self {
            Id::Null => "null".to_string(),
            Id::Int(v) => v.to_string(),
            Id::String(s) => serde_json::to_string(s).expect("strings always serialize"),
        }
    }
}

/// An id a client may mint for an outgoing call: string or integer, never
/// null (there would be nothing to correlate against).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientId {
    /// A string id.
    String(String),
    /// An integer id.
    Int(i64),
}

impl From<i64> for ClientId {
    fn from(v: i64) -> Self {
        ClientId::Int(v)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        ClientId::String(s)
    }
}

impl<'a> From<&'a str> for ClientId {
    fn from(s: &'a str) -> Self {
        ClientId::String(s.into())
    }
}

impl From<ClientId> for Id {
    fn from(id: ClientId) -> Self {
        match id {
            ClientId::Int(v) => Id::Int(v),
            ClientId::String(s) => Id::String(s),
        }
    }
}

impl From<ClientId> for Value {
    fn from(id: ClientId) -> Self {
        match id {
            ClientId::Int(v) => Value::from(v),
            ClientId::String(s) => Value::from(s),
        }
    }
}

/// Classify a JSON value by the kind name used in parameter-binding error
/// messages.
///
/// Numbers are split into `"float"` (has a fractional part), `"integer"`
/// (a negative whole number) and `"unsigned integer"` (a non-negative whole
/// number) — the kind describes the *value found*, not the type a caller
/// expected, so a negative integer is always reported as `"integer"` even
/// when the expected parameter was unsigned.
pub fn json_kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Number(n) => {
            if n.is_f64() && n.as_i64().is_none() && n.as_u64().is_none() {
                "float"
            } else if let Some(i) = n.as_i64() {
                if i < 0 {
                    "integer"
                } else {
                    "unsigned integer"
                }
            } else {
                "unsigned integer"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_roundtrip() {
        let id: Id = serde_json::from_str("1").unwrap();
        assert_eq!(id, Id::Int(1));
        let id: Id = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(id, Id::String("1".into()));
        let id: Id = serde_json::from_str("null").unwrap();
        assert_eq!(id, Id::Null);
    }

    #[test]
    fn kind_name_signed_split() {
        assert_eq!(json_kind_name(&Value::from(5)), "unsigned integer");
        assert_eq!(json_kind_name(&Value::from(-5)), "integer");
        assert_eq!(json_kind_name(&Value::from(1.5)), "float");
        assert_eq!(json_kind_name(&Value::from("x")), "string");
        assert_eq!(json_kind_name(&Value::Null), "null");
    }

    #[test]
    fn client_id_preserves_shape() {
        let id = ClientId::from(4i64);
        let wire: Id = id.clone().into();
        assert_eq!(wire, Id::Int(4));
        let value: Value = id.into();
        assert_eq!(value, Value::from(4));
    }

    #[test]
    fn dump_matches_json_not_debug() {
        assert_eq!(Id::Null.dump(), "null");
        assert_eq!(Id::Int(4).dump(), "4");
        assert_eq!(Id::String("x".into()).dump(), "\"x\"");
    }
}
