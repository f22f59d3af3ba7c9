//! Host value model
//!
//! [`Value`] is what callers read from and write into objects and
//! collections through the convenience accessors (`get`, `set`, `as_map`,
//! `as_slice`). Character and NUMBER data surface as [`Value::String`] and
//! [`Value::Number`], nested objects as [`Value::Object`] or
//! [`Value::Collection`], and the recursive projections as [`Value::Map`]
//! and [`Value::List`].

use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;

use crate::collection::ObjectCollection;
use crate::dbobject::Object;
use crate::error::{Error, Result};
use crate::types::{Lob, Timestamp};

/// A host-side value
#[derive(Debug)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Signed integer (BINARY_INTEGER, NUMBER that fits in i64)
    Integer(i64),
    /// Unsigned integer
    Unsigned(u64),
    /// BINARY_FLOAT
    Float(f32),
    /// BINARY_DOUBLE, or NUMBER fetched as double
    Double(f64),
    /// Character data
    String(String),
    /// Oracle NUMBER as decimal text (full precision)
    Number(String),
    /// RAW data
    Bytes(Bytes),
    /// DATE / TIMESTAMP value
    Timestamp(Timestamp),
    /// Nested record object
    Object(Object),
    /// Nested collection
    Collection(ObjectCollection),
    /// LOB (CLOB, NCLOB, BLOB, BFILE)
    Lob(Lob),
    /// Attribute name to value projection of a record
    Map(IndexMap<String, Value>),
    /// Element projection of a collection
    List(Vec<Value>),
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Unsigned(_) => "unsigned",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Object(_) => "object",
            Value::Collection(_) => "collection",
            Value::Lob(_) => "lob",
            Value::Map(_) => "map",
            Value::List(_) => "list",
        }
    }

    /// Try to get as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Number(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Unsigned(u) => i64::try_from(*u).ok(),
            Value::Number(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Try to get as a float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Float(f) => Some(*f as f64),
            Value::Integer(i) => Some(*i as f64),
            Value::Unsigned(u) => Some(*u as f64),
            Value::Number(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Try to get as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Try to get as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as a timestamp
    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Try to get as a record object
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Try to get as a collection
    pub fn as_collection(&self) -> Option<&ObjectCollection> {
        match self {
            Value::Collection(coll) => Some(coll),
            _ => None,
        }
    }

    /// Try to get as a LOB
    pub fn as_lob(&self) -> Option<&Lob> {
        match self {
            Value::Lob(lob) => Some(lob),
            _ => None,
        }
    }

    /// Try to get as a map projection
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Try to get as a list projection
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Close the objects this value holds, recursively
    pub fn close(&self) -> Result<()> {
        match self {
            Value::Object(obj) => obj.close(),
            Value::Collection(coll) => coll.close(),
            Value::Map(m) => m.values().try_for_each(Value::close),
            Value::List(l) => l.iter().try_for_each(Value::close),
            _ => Ok(()),
        }
    }

    /// Convert to JSON
    ///
    /// Bytes become lowercase hex strings, timestamps RFC 3339 strings,
    /// NUMBER text a JSON number with all of its digits.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value as Json;
        Ok(match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Unsigned(u) => Json::from(*u),
            Value::Float(f) => float_to_json(*f as f64)?,
            Value::Double(f) => float_to_json(*f)?,
            Value::String(s) => Json::String(s.clone()),
            Value::Number(n) => Json::Number(
                n.parse()
                    .map_err(|_| Error::InvalidNumber(format!("{:?} is not a JSON number", n)))?,
            ),
            Value::Bytes(b) => Json::String(hex::encode(b)),
            Value::Timestamp(ts) => Json::String(ts.to_rfc3339()?),
            Value::Object(obj) => obj.to_json_value()?,
            Value::Collection(coll) => coll.to_json_value()?,
            Value::Lob(lob) => {
                if lob.is_character() {
                    Json::String(lob.read_to_string()?)
                } else {
                    Json::String(hex::encode(lob.read_all()?))
                }
            }
            Value::Map(m) => {
                let mut keys: Vec<&String> = m.keys().collect();
                keys.sort();
                let mut out = serde_json::Map::with_capacity(m.len());
                for key in keys {
                    out.insert(key.clone(), m[key].to_json()?);
                }
                Json::Object(out)
            }
            Value::List(l) => Json::Array(l.iter().map(Value::to_json).collect::<Result<_>>()?),
        })
    }
}

fn float_to_json(f: f64) -> Result<serde_json::Value> {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .ok_or_else(|| Error::conversion(format!("{} has no JSON representation", f)))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Unsigned(a), Value::Unsigned(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // objects and LOBs are equal when they are the same native handle
            (Value::Object(a), Value::Object(b)) => a.handle().is_some() && a.handle() == b.handle(),
            (Value::Collection(a), Value::Collection(b)) => {
                a.handle().is_some() && a.handle() == b.handle()
            }
            (Value::Lob(a), Value::Lob(b)) => a.handle() == b.handle(),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => Value::Number(n.to_string()),
            Json::String(s) => Value::String(s),
            Json::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            Json::Object(o) => Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Unsigned(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(v))
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<ObjectCollection> for Value {
    fn from(v: ObjectCollection) -> Self {
        Value::Collection(v)
    }
}

impl From<Lob> for Value {
    fn from(v: Lob) -> Self {
        Value::Lob(v)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(v: IndexMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Unsigned(u) => write!(f, "{}", u),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Double(fl) => write!(f, "{}", fl),
            Value::String(s) | Value::Number(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::Object(obj) => write!(f, "{}", obj),
            Value::Collection(coll) => write!(f, "{}", coll),
            Value::Lob(lob) => write!(f, "<{}>", lob.oracle_type()),
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from("x"), Value::String("x".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
    }

    #[test]
    fn test_number_text_accessors() {
        let n = Value::Number("12345678901234567890".to_string());
        assert_eq!(n.as_i64(), None);
        assert_eq!(n.as_str(), Some("12345678901234567890"));
        assert_eq!(Value::Number("-7".to_string()).as_i64(), Some(-7));
    }

    #[test]
    fn test_to_json_keeps_number_digits() {
        let n = Value::Number("12345678901234567890.125".to_string());
        assert_eq!(n.to_json().unwrap().to_string(), "12345678901234567890.125");
        assert_eq!(Value::from(vec![0xde, 0xad]).to_json().unwrap(), serde_json::json!("dead"));
    }

    #[test]
    fn test_map_json_keys_sorted() {
        let mut m = IndexMap::new();
        m.insert("b".to_string(), Value::Integer(2));
        m.insert("a".to_string(), Value::Null);
        let json = Value::Map(m).to_json().unwrap().to_string();
        assert_eq!(json, r#"{"a":null,"b":2}"#);
    }

    #[test]
    fn test_from_json() {
        let v = Value::from(serde_json::json!({"id": 1, "tags": ["a", null]}));
        let m = v.as_map().unwrap();
        assert_eq!(m["id"], Value::Number("1".to_string()));
        assert_eq!(
            m["tags"],
            Value::List(vec![Value::String("a".to_string()), Value::Null])
        );
    }

    #[test]
    fn test_non_finite_float_has_no_json() {
        assert!(Value::Double(f64::NAN).to_json().is_err());
    }
}
