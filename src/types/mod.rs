//! Oracle data type encoding and decoding
//!
//! This module provides the NUMBER, DATE and TIMESTAMP images the native
//! layer stores, and the [`Lob`] value handed out for LOB attributes.

mod date;
mod lob;
mod number;

pub use date::{
    decode_oracle_date, decode_oracle_timestamp, encode_oracle_date, encode_oracle_timestamp,
    Timestamp, DATE_LENGTH, TIMESTAMP_LENGTH, TIMESTAMP_TZ_LENGTH,
};
pub use lob::Lob;
pub use number::{
    decode_oracle_number, encode_f64, encode_i64, encode_oracle_number, encode_u64, OracleNumber,
};
