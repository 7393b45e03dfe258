//! Wire values for XML-RPC.

use serde_json::{Map, Number, Value as JsonValue};

/// A value as carried by an XML-RPC envelope.
///
/// `Nil` encodes as an empty string, which is what the ERP expects for an
/// absent optional argument.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<RpcValue>),
    Struct(RpcStruct),
}

/// Ordered key/value members with unique keys.
///
/// Inserting an existing key replaces its value in place, so the last write
/// wins and the first-seen position is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcStruct {
    members: Vec<(String, RpcValue)>,
}

impl RpcStruct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a member.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RpcValue>) {
        let key = key.into();
        let value = value.into();
        match self.members.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.members.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RpcValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RpcValue> {
        self.members.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RpcValue)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<K: Into<String>, V: Into<RpcValue>> FromIterator<(K, V)> for RpcStruct {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = RpcStruct::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

// =============================================================================
// Accessors
// =============================================================================

impl RpcValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RpcValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, accepting either wire number type.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RpcValue::Int(i) => Some(*i as f64),
            RpcValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RpcValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RpcValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RpcValue]> {
        match self {
            RpcValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&RpcStruct> {
        match self {
            RpcValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Member lookup on a struct value.
    pub fn get(&self, key: &str) -> Option<&RpcValue> {
        self.as_struct().and_then(|s| s.get(key))
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, RpcValue::Array(_) | RpcValue::Struct(_))
    }

    /// Renders the value as JSON, for diagnostics and fault messages.
    pub fn to_json(&self) -> JsonValue {
        match self {
            RpcValue::Nil => JsonValue::Null,
            RpcValue::Bool(b) => JsonValue::Bool(*b),
            RpcValue::Int(i) => JsonValue::Number((*i).into()),
            RpcValue::Double(d) => Number::from_f64(*d)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            RpcValue::String(s) => JsonValue::String(s.clone()),
            RpcValue::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            RpcValue::Struct(members) => JsonValue::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for RpcValue {
    fn from(v: bool) -> Self {
        RpcValue::Bool(v)
    }
}

impl From<i64> for RpcValue {
    fn from(v: i64) -> Self {
        RpcValue::Int(v)
    }
}

impl From<i32> for RpcValue {
    fn from(v: i32) -> Self {
        RpcValue::Int(v.into())
    }
}

impl From<u32> for RpcValue {
    fn from(v: u32) -> Self {
        RpcValue::Int(v.into())
    }
}

impl From<f64> for RpcValue {
    fn from(v: f64) -> Self {
        RpcValue::Double(v)
    }
}

impl From<&str> for RpcValue {
    fn from(v: &str) -> Self {
        RpcValue::String(v.to_string())
    }
}

impl From<String> for RpcValue {
    fn from(v: String) -> Self {
        RpcValue::String(v)
    }
}

impl From<&String> for RpcValue {
    fn from(v: &String) -> Self {
        RpcValue::String(v.clone())
    }
}

impl From<RpcStruct> for RpcValue {
    fn from(v: RpcStruct) -> Self {
        RpcValue::Struct(v)
    }
}

impl<T: Into<RpcValue>> From<Vec<T>> for RpcValue {
    fn from(v: Vec<T>) -> Self {
        RpcValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RpcValue>> From<Option<T>> for RpcValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RpcValue::Nil)
    }
}
