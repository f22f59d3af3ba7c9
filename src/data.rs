//! Value cells
//!
//! A [`Data`] cell is the unit every attribute and element access goes
//! through. It carries a native type tag, the nested object type for object
//! values, a null flag and the value itself. Cells are reusable: [`Data::reset`]
//! clears all of it, and the scratch pool resets every cell it takes back.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::constants::{NativeType, OracleType, NUMBER_AS_TEXT_CHARS};
use crate::dbobject::Object;
use crate::error::{Error, Result};
use crate::handle::ObjectRef;
use crate::object_type::ObjectType;
use crate::types::{Lob, Timestamp};
use crate::value::Value;

/// Payload of a non-null cell
#[derive(Debug, Default)]
pub(crate) enum DataValue {
    #[default]
    Empty,
    Boolean(bool),
    Int64(i64),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Bytes { bytes: Bytes, national: bool },
    Timestamp(Timestamp),
    Object(ObjectRef),
    Lob(Lob),
}

/// A single typed value moving between the host and the native layer
///
/// # Examples
///
/// ```rust
/// use oracle_dbobject::{Data, NativeType};
///
/// let mut data = Data::new();
/// assert!(data.is_null());
///
/// data.set_i64(42);
/// assert_eq!(data.native_type(), Some(NativeType::Int64));
/// assert_eq!(data.get_i64(), Some(42));
///
/// data.reset();
/// assert!(data.is_null());
/// assert_eq!(data.native_type(), None);
/// ```
#[derive(Debug)]
pub struct Data {
    native_type: Option<NativeType>,
    object_type: Option<Arc<ObjectType>>,
    is_null: bool,
    value: DataValue,
    buffer: BytesMut,
}

impl Default for Data {
    fn default() -> Self {
        Self {
            native_type: None,
            object_type: None,
            is_null: true,
            value: DataValue::Empty,
            buffer: BytesMut::new(),
        }
    }
}

impl Data {
    /// Create an untyped null cell
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a null cell of the given native type
    pub fn null(native_type: NativeType) -> Self {
        Self {
            native_type: Some(native_type),
            ..Self::default()
        }
    }

    /// Native type tag, `None` for an untyped cell
    pub fn native_type(&self) -> Option<NativeType> {
        self.native_type
    }

    /// Object type of object values
    pub fn object_type(&self) -> Option<&Arc<ObjectType>> {
        self.object_type.as_ref()
    }

    /// Whether the cell holds null
    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// Set to null, keeping the native type and object type
    pub fn set_null(&mut self) {
        self.is_null = true;
        self.value = DataValue::Empty;
    }

    /// Clear value, native type and object type
    pub fn reset(&mut self) {
        self.native_type = None;
        self.object_type = None;
        self.is_null = true;
        self.value = DataValue::Empty;
        self.buffer.clear();
    }

    fn store(&mut self, native_type: NativeType, value: DataValue) {
        self.native_type = Some(native_type);
        self.is_null = false;
        self.value = value;
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Store a boolean
    pub fn set_bool(&mut self, value: bool) {
        self.store(NativeType::Boolean, DataValue::Boolean(value));
    }

    /// Store a signed integer
    pub fn set_i64(&mut self, value: i64) {
        self.store(NativeType::Int64, DataValue::Int64(value));
    }

    /// Store an unsigned integer
    pub fn set_u64(&mut self, value: u64) {
        self.store(NativeType::Uint64, DataValue::Uint64(value));
    }

    /// Store a single precision float
    pub fn set_f32(&mut self, value: f32) {
        self.store(NativeType::Float, DataValue::Float(value));
    }

    /// Store a double precision float
    pub fn set_f64(&mut self, value: f64) {
        self.store(NativeType::Double, DataValue::Double(value));
    }

    /// Store a byte sequence (character data, RAW, or NUMBER text)
    pub fn set_bytes(&mut self, value: impl Into<Bytes>) {
        self.store(
            NativeType::Bytes,
            DataValue::Bytes {
                bytes: value.into(),
                national: false,
            },
        );
    }

    /// Store text
    pub fn set_string(&mut self, value: &str) {
        self.set_bytes(Bytes::copy_from_slice(value.as_bytes()));
    }

    /// Store a date/time
    pub fn set_timestamp(&mut self, value: Timestamp) {
        self.store(NativeType::Timestamp, DataValue::Timestamp(value));
    }

    /// Store a reference to an object; the cell holds its own reference
    pub fn set_object(&mut self, object: &Object) -> Result<()> {
        let handle = object.acquire("set_object")?;
        self.object_type = Some(Arc::clone(object.object_type()));
        self.store(NativeType::Object, DataValue::Object(handle));
        Ok(())
    }

    /// Store a reference to a LOB; the cell holds its own reference
    pub fn set_lob(&mut self, lob: &Lob) -> Result<()> {
        let lob = lob.try_clone()?;
        self.store(NativeType::Lob, DataValue::Lob(lob));
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Boolean value
    pub fn get_bool(&self) -> Option<bool> {
        match (&self.value, self.is_null) {
            (DataValue::Boolean(v), false) => Some(*v),
            _ => None,
        }
    }

    /// Signed integer value
    pub fn get_i64(&self) -> Option<i64> {
        match (&self.value, self.is_null) {
            (DataValue::Int64(v), false) => Some(*v),
            _ => None,
        }
    }

    /// Unsigned integer value
    pub fn get_u64(&self) -> Option<u64> {
        match (&self.value, self.is_null) {
            (DataValue::Uint64(v), false) => Some(*v),
            _ => None,
        }
    }

    /// Single precision float value
    pub fn get_f32(&self) -> Option<f32> {
        match (&self.value, self.is_null) {
            (DataValue::Float(v), false) => Some(*v),
            _ => None,
        }
    }

    /// Double precision float value
    pub fn get_f64(&self) -> Option<f64> {
        match (&self.value, self.is_null) {
            (DataValue::Double(v), false) => Some(*v),
            _ => None,
        }
    }

    /// Byte sequence value
    pub fn get_bytes(&self) -> Option<&Bytes> {
        match (&self.value, self.is_null) {
            (DataValue::Bytes { bytes, .. }, false) => Some(bytes),
            _ => None,
        }
    }

    /// Byte sequence value as UTF-8 text
    pub fn get_str(&self) -> Result<Option<&str>> {
        self.get_bytes()
            .map(|b| {
                std::str::from_utf8(b)
                    .map_err(|e| Error::conversion(format!("invalid UTF-8 text: {}", e)))
            })
            .transpose()
    }

    /// Whether the byte sequence came from a national character set column
    pub fn is_national(&self) -> bool {
        matches!(self.value, DataValue::Bytes { national: true, .. })
    }

    /// Date/time value
    pub fn get_timestamp(&self) -> Option<Timestamp> {
        match (&self.value, self.is_null) {
            (DataValue::Timestamp(v), false) => Some(*v),
            _ => None,
        }
    }

    /// Object value, with its own reference
    ///
    /// An object fetched from an attribute or element depends on its parent
    /// and is only valid while the parent is.
    pub fn get_object(&self) -> Result<Option<Object>> {
        let handle = match (&self.value, self.is_null) {
            (DataValue::Object(handle), false) => handle,
            _ => return Ok(None),
        };
        let object_type = self
            .object_type
            .clone()
            .ok_or_else(|| Error::Internal("object value without object type".to_string()))?;
        Ok(Some(Object::from_parts(object_type, handle.try_clone()?, false)))
    }

    /// LOB value, with its own reference
    pub fn get_lob(&self) -> Result<Option<Lob>> {
        match (&self.value, self.is_null) {
            (DataValue::Lob(lob), false) => Ok(Some(lob.try_clone()?)),
            _ => Ok(None),
        }
    }

    /// Convert to a host value
    pub fn get_value(&self) -> Result<Value> {
        if self.is_null {
            return Ok(Value::Null);
        }
        Ok(match &self.value {
            DataValue::Empty => Value::Null,
            DataValue::Boolean(v) => Value::Boolean(*v),
            DataValue::Int64(v) => Value::Integer(*v),
            DataValue::Uint64(v) => Value::Unsigned(*v),
            DataValue::Float(v) => Value::Float(*v),
            DataValue::Double(v) => Value::Double(*v),
            DataValue::Bytes { bytes, .. } => Value::Bytes(bytes.clone()),
            DataValue::Timestamp(v) => Value::Timestamp(*v),
            DataValue::Lob(lob) => Value::Lob(lob.try_clone()?),
            DataValue::Object(_) => match self.get_object()? {
                Some(object) if object.object_type().is_collection() => {
                    Value::Collection(object.into_collection()?)
                }
                Some(object) => Value::Object(object),
                None => Value::Null,
            },
        })
    }

    /// Store a host value, picking the native type from the value
    pub fn set_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.set_null(),
            Value::Boolean(v) => self.set_bool(*v),
            Value::Integer(v) => self.set_i64(*v),
            Value::Unsigned(v) => self.set_u64(*v),
            Value::Float(v) => self.set_f32(*v),
            Value::Double(v) => self.set_f64(*v),
            Value::String(v) | Value::Number(v) => self.set_string(v),
            Value::Bytes(v) => self.set_bytes(v.clone()),
            Value::Timestamp(v) => self.set_timestamp(*v),
            Value::Object(v) => self.set_object(v)?,
            Value::Collection(v) => self.set_object(v)?,
            Value::Lob(v) => self.set_lob(v)?,
            Value::Map(_) | Value::List(_) => {
                return Err(Error::conversion(format!(
                    "a {} needs an object type to be stored",
                    value.kind()
                )))
            }
        }
        Ok(())
    }

    // =========================================================================
    // Slot-aware conversion
    // =========================================================================

    /// Tag the cell with the native and object type of a slot
    pub(crate) fn stamp(&mut self, slot: &Arc<ObjectType>) {
        self.native_type = slot.native_type();
        self.object_type = slot.is_object().then(|| Arc::clone(slot));
    }

    /// Size the output buffer for a fetch from `slot`
    pub(crate) fn prepare(&mut self, slot: &ObjectType) {
        self.buffer.clear();
        let needed = match slot.oracle_type() {
            OracleType::Number => NUMBER_AS_TEXT_CHARS,
            _ => slot.client_size_in_bytes() as usize,
        };
        self.buffer.reserve(needed);
    }

    pub(crate) fn value(&self) -> &DataValue {
        &self.value
    }

    /// Store a decoded value under the current tag
    pub(crate) fn put(&mut self, value: DataValue) {
        self.is_null = false;
        self.value = value;
    }

    /// Store decoded text through the prepared buffer
    pub(crate) fn put_text(&mut self, text: &str) {
        self.buffer.clear();
        self.buffer.extend_from_slice(text.as_bytes());
        let bytes = self.buffer.split().freeze();
        self.put(DataValue::Bytes {
            bytes,
            national: false,
        });
    }

    /// Convert a host value into the representation `slot` expects
    pub(crate) fn assign(&mut self, value: &Value, slot: &Arc<ObjectType>) -> Result<()> {
        self.reset();
        self.stamp(slot);
        match value {
            Value::Null => Ok(()),
            Value::Object(v) => self.set_object(v),
            Value::Collection(v) => self.set_object(v),
            Value::Lob(v) => self.set_lob(v),
            Value::Map(_) | Value::List(_) => Err(Error::conversion(format!(
                "a {} cannot be stored in {} without building an object",
                value.kind(),
                slot
            ))),
            _ => match slot.native_type() {
                Some(native) => self.coerce(value, native, slot),
                None => self.set_value(value),
            },
        }
    }

    fn coerce(&mut self, value: &Value, native: NativeType, slot: &ObjectType) -> Result<()> {
        let mismatch = || {
            Error::conversion(format!(
                "cannot store {} value in {} as {}",
                value.kind(),
                slot,
                native
            ))
        };
        match native {
            NativeType::Bytes => {
                let bytes = match value {
                    Value::String(s) | Value::Number(s) => Bytes::copy_from_slice(s.as_bytes()),
                    Value::Bytes(b) => b.clone(),
                    Value::Integer(v) => Bytes::from(v.to_string()),
                    Value::Unsigned(v) => Bytes::from(v.to_string()),
                    Value::Float(v) => Bytes::from(v.to_string()),
                    Value::Double(v) => Bytes::from(v.to_string()),
                    Value::Timestamp(v) => Bytes::from(v.to_rfc3339()?),
                    _ => return Err(mismatch()),
                };
                self.set_bytes(bytes);
            }
            NativeType::Int64 => {
                let v = match value {
                    Value::Integer(v) => *v,
                    Value::Unsigned(v) => i64::try_from(*v).map_err(|_| mismatch())?,
                    Value::Double(v) => whole_i64(*v).ok_or_else(mismatch)?,
                    Value::Float(v) => whole_i64(f64::from(*v)).ok_or_else(mismatch)?,
                    Value::String(s) | Value::Number(s) => s.trim().parse().map_err(|_| {
                        Error::InvalidNumber(format!("{:?} is not a {} integer", s, slot))
                    })?,
                    _ => return Err(mismatch()),
                };
                self.set_i64(v);
            }
            NativeType::Uint64 => {
                let v = match value {
                    Value::Unsigned(v) => *v,
                    Value::Integer(v) => u64::try_from(*v).map_err(|_| mismatch())?,
                    Value::String(s) | Value::Number(s) => s.trim().parse().map_err(|_| {
                        Error::InvalidNumber(format!("{:?} is not an unsigned integer", s))
                    })?,
                    _ => return Err(mismatch()),
                };
                self.set_u64(v);
            }
            NativeType::Float | NativeType::Double => {
                let v = match value {
                    Value::Double(v) => *v,
                    Value::Float(v) => *v as f64,
                    Value::Integer(v) => *v as f64,
                    Value::Unsigned(v) => *v as f64,
                    Value::String(s) | Value::Number(s) => s.trim().parse().map_err(|_| {
                        Error::InvalidNumber(format!("{:?} is not a number", s))
                    })?,
                    _ => return Err(mismatch()),
                };
                if native == NativeType::Float {
                    self.set_f32(v as f32);
                } else {
                    self.set_f64(v);
                }
            }
            NativeType::Timestamp => {
                let v = match value {
                    Value::Timestamp(v) => *v,
                    Value::String(s) => Timestamp::parse_rfc3339(s)?,
                    Value::Double(ms) => Timestamp::from_epoch_millis(*ms)?,
                    _ => return Err(mismatch()),
                };
                self.set_timestamp(v);
            }
            NativeType::Boolean => match value {
                Value::Boolean(v) => self.set_bool(*v),
                _ => return Err(mismatch()),
            },
            NativeType::Lob => match value {
                // written into a temporary LOB on the way out
                Value::Bytes(b) => self.set_bytes(b.clone()),
                Value::String(s) => self.set_string(s),
                _ => return Err(mismatch()),
            },
            _ => self.set_value(value)?,
        }
        Ok(())
    }

    /// Convert to a host value, surfacing character and NUMBER data as text
    pub(crate) fn to_value_as(&self, slot: &ObjectType) -> Result<Value> {
        match (&self.value, self.is_null) {
            (DataValue::Bytes { bytes, .. }, false) if slot.oracle_type().is_stringish() => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| Error::conversion(format!("invalid UTF-8 in {}: {}", slot, e)))?
                    .to_string();
                if slot.oracle_type() == OracleType::Number {
                    Ok(Value::Number(text))
                } else {
                    Ok(Value::String(text))
                }
            }
            _ => self.get_value(),
        }
    }
}

/// `v` as an i64 when it is whole and in range
fn whole_i64(v: f64) -> Option<i64> {
    (v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64).then(|| v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_null() {
        let data = Data::null(NativeType::Double);
        assert!(data.is_null());
        assert_eq!(data.native_type(), Some(NativeType::Double));
        assert_eq!(data.get_f64(), None);
        assert!(data.get_value().unwrap().is_null());
    }

    #[test]
    fn test_setters_tag_cell() {
        let mut data = Data::new();
        data.set_string("héllo");
        assert_eq!(data.native_type(), Some(NativeType::Bytes));
        assert_eq!(data.get_str().unwrap(), Some("héllo"));
        assert!(!data.is_national());

        data.set_timestamp(Timestamp::date(2024, 2, 29));
        assert_eq!(data.native_type(), Some(NativeType::Timestamp));
        assert_eq!(data.get_timestamp().map(|t| t.day), Some(29));
        assert_eq!(data.get_bytes(), None);
    }

    #[test]
    fn test_set_null_keeps_tag() {
        let mut data = Data::new();
        data.set_bool(true);
        data.set_null();
        assert!(data.is_null());
        assert_eq!(data.native_type(), Some(NativeType::Boolean));
        assert_eq!(data.get_bool(), None);
    }

    #[test]
    fn test_set_value_rejects_map() {
        let mut data = Data::new();
        let err = data.set_value(&Value::Map(Default::default())).unwrap_err();
        assert!(err.is_conversion_error());
        assert!(data.is_null());
    }

    #[test]
    fn test_whole_i64() {
        assert_eq!(whole_i64(42.0), Some(42));
        assert_eq!(whole_i64(-9.007_199_254_740_992e15), Some(-9_007_199_254_740_992));
        assert_eq!(whole_i64(i64::MIN as f64), Some(i64::MIN));
        assert_eq!(whole_i64(1.5), None);
        assert_eq!(whole_i64(1e30), None);
        assert_eq!(whole_i64(i64::MAX as f64), None);
        assert_eq!(whole_i64(f64::NAN), None);
        assert_eq!(whole_i64(f64::INFINITY), None);
    }

    #[test]
    fn test_put_text_uses_buffer() {
        let mut data = Data::null(NativeType::Bytes);
        data.put_text("12.5");
        assert_eq!(data.get_str().unwrap(), Some("12.5"));
        data.put_text("7");
        assert_eq!(data.get_str().unwrap(), Some("7"));
    }
}
