//! Oracle type numbers, native representation tags and error codes
//!
//! The Oracle type describes how a value is declared in the database; the
//! native type describes the physical representation a [`Data`](crate::Data)
//! cell uses for it on the client side. Every conversion is dispatched on the
//! pair of both.

use std::fmt;

// =============================================================================
// Oracle Data Types
// =============================================================================

/// Oracle data type categories as exposed by the native client
///
/// National character variants (`Nvarchar`, `Nchar`, `Nclob`, `LongNvarchar`)
/// share the wire type number of their narrow counterpart and differ only in
/// character set form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleType {
    /// VARCHAR2 string type
    Varchar,
    /// NVARCHAR2 string type
    Nvarchar,
    /// CHAR fixed-length string
    Char,
    /// NCHAR fixed-length string
    Nchar,
    /// NUMBER type
    Number,
    /// BINARY_INTEGER / PLS_INTEGER (PL/SQL)
    BinaryInteger,
    /// LONG string type
    Long,
    /// LONG national string type
    LongNvarchar,
    /// ROWID
    Rowid,
    /// DATE type
    Date,
    /// RAW binary type
    Raw,
    /// LONG RAW binary type
    LongRaw,
    /// BINARY_FLOAT
    BinaryFloat,
    /// BINARY_DOUBLE
    BinaryDouble,
    /// REF CURSOR
    Cursor,
    /// User-defined object or collection type
    Object,
    /// CLOB
    Clob,
    /// NCLOB
    Nclob,
    /// BLOB
    Blob,
    /// BFILE
    Bfile,
    /// JSON (21c+)
    Json,
    /// VECTOR (23ai)
    Vector,
    /// TIMESTAMP
    Timestamp,
    /// TIMESTAMP WITH TIME ZONE
    TimestampTz,
    /// TIMESTAMP WITH LOCAL TIME ZONE
    TimestampLtz,
    /// INTERVAL YEAR TO MONTH
    IntervalYm,
    /// INTERVAL DAY TO SECOND
    IntervalDs,
    /// BOOLEAN (23c+ and PL/SQL)
    Boolean,
}

impl OracleType {
    /// Wire type number and character set form of this type
    pub fn type_num(&self) -> (u8, u8) {
        let num = match self {
            OracleType::Varchar | OracleType::Nvarchar => 1,
            OracleType::Number => 2,
            OracleType::BinaryInteger => 3,
            OracleType::Long | OracleType::LongNvarchar => 8,
            OracleType::Rowid => 11,
            OracleType::Date => 12,
            OracleType::Raw => 23,
            OracleType::LongRaw => 24,
            OracleType::Char | OracleType::Nchar => 96,
            OracleType::BinaryFloat => 100,
            OracleType::BinaryDouble => 101,
            OracleType::Cursor => 102,
            OracleType::Object => 109,
            OracleType::Clob | OracleType::Nclob => 112,
            OracleType::Blob => 113,
            OracleType::Bfile => 114,
            OracleType::Json => 119,
            OracleType::Vector => 127,
            OracleType::Timestamp => 180,
            OracleType::TimestampTz => 181,
            OracleType::IntervalYm => 182,
            OracleType::IntervalDs => 183,
            OracleType::TimestampLtz => 231,
            OracleType::Boolean => 252,
        };
        let form = if self.is_national() {
            csfrm::NCHAR
        } else {
            csfrm::IMPLICIT
        };
        (num, form)
    }

    /// Check if this is a national character set type
    pub fn is_national(&self) -> bool {
        matches!(
            self,
            OracleType::Nvarchar | OracleType::Nchar | OracleType::Nclob | OracleType::LongNvarchar
        )
    }

    /// Check if this is a character type (fixed or variable, narrow or national)
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            OracleType::Varchar | OracleType::Nvarchar | OracleType::Char | OracleType::Nchar
        )
    }

    /// Check if this type is a LOB referenced by locator
    pub fn is_lob(&self) -> bool {
        matches!(
            self,
            OracleType::Clob | OracleType::Nclob | OracleType::Blob | OracleType::Bfile
        )
    }

    /// Check if this is a DATE or TIMESTAMP variant
    pub fn is_datetime(&self) -> bool {
        matches!(
            self,
            OracleType::Date
                | OracleType::Timestamp
                | OracleType::TimestampTz
                | OracleType::TimestampLtz
        )
    }

    /// Check if values of this type carry a time zone offset
    pub fn has_time_zone(&self) -> bool {
        matches!(self, OracleType::TimestampTz | OracleType::TimestampLtz)
    }

    /// Types whose textual/byte representation is better surfaced as a
    /// string (or decimal number) to callers of the convenience getters
    pub fn is_stringish(&self) -> bool {
        matches!(
            self,
            OracleType::Varchar
                | OracleType::Nvarchar
                | OracleType::Char
                | OracleType::Nchar
                | OracleType::Number
                | OracleType::Clob
                | OracleType::Nclob
                | OracleType::Long
                | OracleType::LongNvarchar
        )
    }

    /// SQL name of the type
    pub fn sql_name(&self) -> &'static str {
        match self {
            OracleType::Varchar => "VARCHAR2",
            OracleType::Nvarchar => "NVARCHAR2",
            OracleType::Char => "CHAR",
            OracleType::Nchar => "NCHAR",
            OracleType::Number => "NUMBER",
            OracleType::BinaryInteger => "BINARY_INTEGER",
            OracleType::Long => "LONG",
            OracleType::LongNvarchar => "LONG NVARCHAR",
            OracleType::Rowid => "ROWID",
            OracleType::Date => "DATE",
            OracleType::Raw => "RAW",
            OracleType::LongRaw => "LONG RAW",
            OracleType::BinaryFloat => "BINARY_FLOAT",
            OracleType::BinaryDouble => "BINARY_DOUBLE",
            OracleType::Cursor => "REF CURSOR",
            OracleType::Object => "OBJECT",
            OracleType::Clob => "CLOB",
            OracleType::Nclob => "NCLOB",
            OracleType::Blob => "BLOB",
            OracleType::Bfile => "BFILE",
            OracleType::Json => "JSON",
            OracleType::Vector => "VECTOR",
            OracleType::Timestamp => "TIMESTAMP",
            OracleType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            OracleType::TimestampLtz => "TIMESTAMP WITH LOCAL TIME ZONE",
            OracleType::IntervalYm => "INTERVAL YEAR TO MONTH",
            OracleType::IntervalDs => "INTERVAL DAY TO SECOND",
            OracleType::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for OracleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl TryFrom<u8> for OracleType {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OracleType::Varchar),
            2 => Ok(OracleType::Number),
            3 => Ok(OracleType::BinaryInteger),
            8 => Ok(OracleType::Long),
            11 => Ok(OracleType::Rowid),
            12 => Ok(OracleType::Date),
            23 => Ok(OracleType::Raw),
            24 => Ok(OracleType::LongRaw),
            96 => Ok(OracleType::Char),
            100 => Ok(OracleType::BinaryFloat),
            101 => Ok(OracleType::BinaryDouble),
            102 => Ok(OracleType::Cursor),
            109 => Ok(OracleType::Object),
            112 => Ok(OracleType::Clob),
            113 => Ok(OracleType::Blob),
            114 => Ok(OracleType::Bfile),
            119 => Ok(OracleType::Json),
            127 => Ok(OracleType::Vector),
            180 => Ok(OracleType::Timestamp),
            181 => Ok(OracleType::TimestampTz),
            182 => Ok(OracleType::IntervalYm),
            183 => Ok(OracleType::IntervalDs),
            231 => Ok(OracleType::TimestampLtz),
            252 => Ok(OracleType::Boolean),
            _ => Err(crate::error::Error::InvalidOracleType(value)),
        }
    }
}

// =============================================================================
// Native Types
// =============================================================================

/// Physical representation selector for a value on the client side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NativeType {
    /// Signed 64-bit integer
    Int64 = 3000,
    /// Unsigned 64-bit integer
    Uint64 = 3001,
    /// 32-bit float
    Float = 3002,
    /// 64-bit float
    Double = 3003,
    /// Byte sequence (text or raw), optionally tagged with an encoding
    Bytes = 3004,
    /// Structured timestamp
    Timestamp = 3005,
    /// Day-to-second interval
    IntervalDs = 3006,
    /// Year-to-month interval
    IntervalYm = 3007,
    /// LOB handle
    Lob = 3008,
    /// Object handle
    Object = 3009,
    /// Statement handle
    Stmt = 3010,
    /// Boolean
    Boolean = 3011,
    /// ROWID handle
    Rowid = 3012,
}

impl NativeType {
    /// Numeric tag as reported in diagnostics
    pub fn num(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeType::Int64 => "INT64",
            NativeType::Uint64 => "UINT64",
            NativeType::Float => "FLOAT",
            NativeType::Double => "DOUBLE",
            NativeType::Bytes => "BYTES",
            NativeType::Timestamp => "TIMESTAMP",
            NativeType::IntervalDs => "INTERVAL_DS",
            NativeType::IntervalYm => "INTERVAL_YM",
            NativeType::Lob => "LOB",
            NativeType::Object => "OBJECT",
            NativeType::Stmt => "STMT",
            NativeType::Boolean => "BOOLEAN",
            NativeType::Rowid => "ROWID",
        };
        write!(f, "{}({})", name, self.num())
    }
}

// =============================================================================
// Character Set Form (CSFRM)
// =============================================================================

/// Character set form (CSFRM) constants
pub mod csfrm {
    /// Implicit charset (database charset)
    pub const IMPLICIT: u8 = 1;
    /// NCHAR charset
    pub const NCHAR: u8 = 2;
}

// =============================================================================
// Collection Types
// =============================================================================

/// Collection type for Oracle collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    /// PL/SQL index-by table (associative array)
    PlsqlIndexTable,
    /// Nested table
    NestedTable,
    /// VARRAY
    Varray,
}

impl CollectionType {
    /// Whether elements may be placed at arbitrary (sparse) indices
    pub fn allows_arbitrary_index(&self) -> bool {
        matches!(self, CollectionType::PlsqlIndexTable)
    }
}

// =============================================================================
// Numeric Precision Thresholds
// =============================================================================

/// Precision limits above which a NUMBER no longer fits its default native
/// representation and is fetched as decimal text instead
#[allow(missing_docs)]
pub mod number_precision {
    pub const MAX_FLOAT: i16 = 8;
    pub const MAX_DOUBLE: i16 = 15;
    pub const MAX_INT64: i16 = 19;
}

/// Buffer size reserved for a NUMBER rendered as text
pub const NUMBER_AS_TEXT_CHARS: usize = 172;

// =============================================================================
// Error Codes
// =============================================================================

/// Error codes this crate reacts to
#[allow(missing_docs)]
pub mod error_code {
    /// ORA-21602: operation does not support the specified typecode
    pub const UNSUPPORTED_TYPECODE: i32 = 21602;
    /// ORA-04043: object does not exist
    pub const OBJECT_DOES_NOT_EXIST: i32 = 4043;
    /// DPI-1062: unexpected OCI return value
    pub const UNEXPECTED_OCI_RETURN: i32 = 1062;
    /// OCI status reported when the object type fetch cannot complete on a
    /// session that is no longer usable
    pub const OCI_TYPE_FETCH_STATUS: i32 = 1041;
    /// DPI-1014: conversion not implemented
    pub const CONVERSION_NOT_IMPLEMENTED: i32 = 1014;
    /// DPI-1024: invalid index
    pub const INVALID_INDEX: i32 = 1024;
    /// DPI-1010: not connected
    pub const NOT_CONNECTED: i32 = 1010;
    /// DPI-1002: invalid handle
    pub const INVALID_HANDLE: i32 = 1002;
    /// ORA-22165: given index is out of range
    pub const INDEX_OUT_OF_RANGE: i32 = 22165;
    /// ORA-22160: element at index does not exist
    pub const ELEMENT_DOES_NOT_EXIST: i32 = 22160;
    /// ORA-22167: given trim size must be less than or equal to the collection size
    pub const TRIM_TOO_LARGE: i32 = 22167;
}
