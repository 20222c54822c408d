use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Generic tree produced by decoding a table literal.
#[derive(Debug, Clone, PartialEq)]
pub enum TableValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<TableValue>),
    Map(BTreeMap<String, TableValue>),
}

impl TableValue {
    pub fn get(&self, key: &str) -> Option<&TableValue> {
        match self {
            TableValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, TableValue>> {
        match self {
            TableValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[TableValue]> {
        match self {
            TableValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TableValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TableValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of Integer and Float values. Strings are not coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TableValue::Integer(n) => Some(*n as f64),
            TableValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TableValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TableValue::Null)
    }

    /// True for an empty map or an empty sequence. `{}` decodes to the latter,
    /// so callers that expect a map must accept both.
    pub fn is_empty_table(&self) -> bool {
        match self {
            TableValue::Map(map) => map.is_empty(),
            TableValue::Sequence(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TableValue::Null => "nil",
            TableValue::Bool(_) => "boolean",
            TableValue::Integer(_) | TableValue::Float(_) => "number",
            TableValue::String(_) => "string",
            TableValue::Sequence(_) => "sequence",
            TableValue::Map(_) => "map",
        }
    }
}

impl Serialize for TableValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TableValue::Null => serializer.serialize_unit(),
            TableValue::Bool(b) => serializer.serialize_bool(*b),
            TableValue::Integer(n) => serializer.serialize_i64(*n),
            TableValue::Float(f) => serializer.serialize_f64(*f),
            TableValue::String(s) => serializer.serialize_str(s),
            TableValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            TableValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for TableValue {
    fn from(s: &str) -> Self {
        TableValue::String(s.to_string())
    }
}

impl From<i64> for TableValue {
    fn from(n: i64) -> Self {
        TableValue::Integer(n)
    }
}

impl From<f64> for TableValue {
    fn from(f: f64) -> Self {
        TableValue::Float(f)
    }
}

impl From<bool> for TableValue {
    fn from(b: bool) -> Self {
        TableValue::Bool(b)
    }
}
