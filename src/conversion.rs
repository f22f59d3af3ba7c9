//! Conversion between value cells and the native physical representation
//!
//! Both directions dispatch on the pair (declared Oracle type of the slot,
//! native type tag of the cell). A null cell or a null slot short-circuits
//! before any type check. Pairs without a conversion fail with
//! [`Error::UnhandledConversion`] naming both types; object values of the
//! wrong type fail with [`Error::WrongType`] naming both qualified names.
//!
//! | Oracle type                         | Native types                      |
//! |-------------------------------------|-----------------------------------|
//! | VARCHAR2, NVARCHAR2, CHAR, NCHAR, LONG | BYTES                          |
//! | RAW, LONG RAW                       | BYTES                             |
//! | BINARY_INTEGER                      | INT64                             |
//! | BINARY_FLOAT                        | FLOAT (DOUBLE on the way in)      |
//! | BINARY_DOUBLE                       | DOUBLE                            |
//! | NUMBER                              | INT64, UINT64, DOUBLE, BYTES      |
//! | DATE, TIMESTAMP [WITH [LOCAL] TZ]   | TIMESTAMP, DOUBLE (epoch millis)  |
//! | OBJECT                              | OBJECT                            |
//! | BOOLEAN                             | BOOLEAN                           |
//! | CLOB, NCLOB, BLOB, BFILE            | LOB (BYTES on the way in)         |

use std::sync::Arc;

use bytes::Bytes;

use crate::constants::{csfrm, NativeType, OracleType};
use crate::context::Context;
use crate::data::{Data, DataValue};
use crate::error::{Error, Result};
use crate::handle::{LobRef, ObjectRef};
use crate::native::OracleData;
use crate::object_type::ObjectType;
use crate::types::{
    decode_oracle_date, decode_oracle_number, decode_oracle_timestamp, encode_f64, encode_i64,
    encode_oracle_date, encode_oracle_number, encode_oracle_timestamp, encode_u64, Lob, Timestamp,
    DATE_LENGTH,
};

/// Physical value ready for a native set call
///
/// A temporary LOB created for a byte sequence lives until the set call is
/// done; the slot holds its own reference afterwards.
#[derive(Debug)]
pub(crate) struct Encoded {
    pub(crate) data: OracleData,
    _temp_lob: Option<Lob>,
}

impl Encoded {
    fn new(data: OracleData) -> Self {
        Self {
            data,
            _temp_lob: None,
        }
    }
}

fn is_text_type(ot: OracleType) -> bool {
    ot.is_character() || matches!(ot, OracleType::Long | OracleType::LongNvarchar)
}

fn is_raw_type(ot: OracleType) -> bool {
    matches!(ot, OracleType::Raw | OracleType::LongRaw)
}

/// Give back the reference unit of a handle no conversion claimed
fn release_unclaimed(ctx: &Arc<Context>, raw: OracleData) {
    match raw {
        OracleData::Object(h) => drop(ObjectRef::adopt(ctx, h)),
        OracleData::Lob(h) => drop(LobRef::adopt(ctx, h)),
        _ => {}
    }
}

/// Copy a fetched value into a cell already tagged for `slot`
pub(crate) fn decode(
    ctx: &Arc<Context>,
    slot: &ObjectType,
    raw: Option<OracleData>,
    data: &mut Data,
) -> Result<()> {
    let Some(raw) = raw else {
        data.set_null();
        return Ok(());
    };
    let ot = slot.oracle_type();
    let native = data.native_type();
    let unhandled = || Error::UnhandledConversion {
        oracle_type: ot,
        native_type: native,
    };

    match (native, raw) {
        (Some(NativeType::Bytes), OracleData::Text { bytes, csfrm: form }) if is_text_type(ot) => {
            data.put(DataValue::Bytes {
                bytes,
                national: form == csfrm::NCHAR,
            });
        }
        (Some(NativeType::Bytes), OracleData::Raw(bytes)) if is_raw_type(ot) => {
            data.put(DataValue::Bytes {
                bytes,
                national: false,
            });
        }
        (Some(NativeType::Int64), OracleData::Integer(v)) if ot == OracleType::BinaryInteger => {
            data.put(DataValue::Int64(v));
        }
        (Some(NativeType::Float), OracleData::Float(v)) if ot == OracleType::BinaryFloat => {
            data.put(DataValue::Float(v));
        }
        (Some(NativeType::Double), OracleData::Double(v)) if ot == OracleType::BinaryDouble => {
            data.put(DataValue::Double(v));
        }
        (Some(native_type), OracleData::Number(image)) if ot == OracleType::Number => {
            let number = decode_oracle_number(&image)?;
            match native_type {
                NativeType::Double => data.put(DataValue::Double(number.to_f64()?)),
                NativeType::Int64 => data.put(DataValue::Int64(number.to_i64()?)),
                NativeType::Uint64 => data.put(DataValue::Uint64(number.to_u64()?)),
                NativeType::Bytes => data.put_text(number.as_str()),
                _ => return Err(unhandled()),
            }
        }
        (Some(native_type), OracleData::Datetime(image)) if ot.is_datetime() => {
            let mut ts = if image.len() == DATE_LENGTH {
                decode_oracle_date(&image)?
            } else {
                decode_oracle_timestamp(&image)?
            };
            if !ot.has_time_zone() {
                ts = ts.with_offset(0, 0);
            }
            match native_type {
                NativeType::Timestamp => data.put(DataValue::Timestamp(ts)),
                NativeType::Double => data.put(DataValue::Double(ts.to_epoch_millis()?)),
                _ => return Err(unhandled()),
            }
        }
        (Some(NativeType::Object), OracleData::Object(h)) if ot == OracleType::Object => {
            data.put(DataValue::Object(ObjectRef::adopt(ctx, h)));
        }
        (Some(NativeType::Boolean), OracleData::Boolean(v)) if ot == OracleType::Boolean => {
            data.put(DataValue::Boolean(v));
        }
        (Some(NativeType::Lob), OracleData::Lob(h)) if ot.is_lob() => {
            data.put(DataValue::Lob(Lob::new(LobRef::adopt(ctx, h), ot)));
        }
        (_, other) => {
            release_unclaimed(ctx, other);
            return Err(unhandled());
        }
    }
    Ok(())
}

fn check_object_type(slot: &ObjectType, data: &Data) -> Result<()> {
    let expected = slot.full_name();
    let actual = data
        .object_type()
        .map(|t| t.full_name())
        .unwrap_or_default();
    if expected != actual {
        return Err(Error::WrongType { expected, actual });
    }
    Ok(())
}

fn datetime_image(ot: OracleType, ts: &Timestamp) -> Result<Bytes> {
    if ot == OracleType::Date {
        Ok(Bytes::copy_from_slice(&encode_oracle_date(ts)?))
    } else {
        Ok(Bytes::from(encode_oracle_timestamp(ts, ot.has_time_zone())?))
    }
}

/// Build the physical form of a cell for `slot`; `None` is a null value
pub(crate) fn encode(ctx: &Arc<Context>, slot: &ObjectType, data: &Data) -> Result<Option<Encoded>> {
    if data.is_null() {
        return Ok(None);
    }
    let ot = slot.oracle_type();
    let native = data.native_type();
    let unhandled = || Error::UnhandledConversion {
        oracle_type: ot,
        native_type: native,
    };

    let physical = match (native, data.value()) {
        (Some(NativeType::Bytes), DataValue::Bytes { bytes, .. }) if is_text_type(ot) => {
            OracleData::Text {
                bytes: bytes.clone(),
                csfrm: if ot.is_national() {
                    csfrm::NCHAR
                } else {
                    csfrm::IMPLICIT
                },
            }
        }
        (Some(NativeType::Bytes), DataValue::Bytes { bytes, .. }) if is_raw_type(ot) => {
            OracleData::Raw(bytes.clone())
        }
        (Some(NativeType::Int64), DataValue::Int64(v)) if ot == OracleType::BinaryInteger => {
            let v = i32::try_from(*v).map_err(|_| {
                Error::InvalidNumber(format!("{} is out of range for {}", v, slot))
            })?;
            OracleData::Integer(i64::from(v))
        }
        (Some(NativeType::Int64), DataValue::Int64(v)) if ot == OracleType::Number => {
            OracleData::Number(Bytes::from(encode_i64(*v)?))
        }
        (Some(NativeType::Uint64), DataValue::Uint64(v)) if ot == OracleType::Number => {
            OracleData::Number(Bytes::from(encode_u64(*v)?))
        }
        (Some(NativeType::Double), DataValue::Double(v)) if ot == OracleType::Number => {
            OracleData::Number(Bytes::from(encode_f64(*v)?))
        }
        (Some(NativeType::Bytes), DataValue::Bytes { bytes, .. }) if ot == OracleType::Number => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| Error::InvalidNumber(format!("{:?} is not text", bytes)))?;
            OracleData::Number(Bytes::from(encode_oracle_number(text)?))
        }
        (Some(NativeType::Float), DataValue::Float(v)) if ot == OracleType::BinaryFloat => {
            OracleData::Float(*v)
        }
        (Some(NativeType::Double), DataValue::Double(v)) if ot == OracleType::BinaryFloat => {
            OracleData::Float(*v as f32)
        }
        (Some(NativeType::Double), DataValue::Double(v)) if ot == OracleType::BinaryDouble => {
            OracleData::Double(*v)
        }
        (Some(NativeType::Timestamp), DataValue::Timestamp(ts)) if ot.is_datetime() => {
            OracleData::Datetime(datetime_image(ot, ts)?)
        }
        (Some(NativeType::Double), DataValue::Double(millis)) if ot.is_datetime() => {
            OracleData::Datetime(datetime_image(ot, &Timestamp::from_epoch_millis(*millis)?)?)
        }
        (Some(NativeType::Object), DataValue::Object(handle)) if ot == OracleType::Object => {
            check_object_type(slot, data)?;
            OracleData::Object(handle.handle())
        }
        (Some(NativeType::Boolean), DataValue::Boolean(v)) if ot == OracleType::Boolean => {
            OracleData::Boolean(*v)
        }
        (Some(NativeType::Lob), DataValue::Lob(lob)) if ot.is_lob() => OracleData::Lob(lob.handle()),
        (Some(NativeType::Bytes), DataValue::Bytes { bytes, .. }) if ot.is_lob() => {
            let handle = ctx
                .client
                .create_temp_lob(ot)
                .map_err(|e| Error::native(format!("create temporary {}", ot), e))?;
            let lob = Lob::new(LobRef::adopt(ctx, handle), ot);
            lob.set_from_bytes(bytes)?;
            return Ok(Some(Encoded {
                data: OracleData::Lob(handle),
                _temp_lob: Some(lob),
            }));
        }
        _ => return Err(unhandled()),
    };
    Ok(Some(Encoded::new(physical)))
}
