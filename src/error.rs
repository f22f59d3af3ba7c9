//! Error types for the object type bridge
//!
//! Every fallible operation returns [`Error`]. Failures reported by the native
//! client are carried as a [`NativeError`] and wrapped together with the name
//! of the operation that issued the call, so a message always says what was
//! being done (attribute, index, declared vs. requested type) and what the
//! native layer answered.

use std::fmt;
use thiserror::Error;

use crate::constants::{error_code, NativeType, OracleType};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error reported by the native client layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// Numeric error code (ORA-nnnnn or DPI-nnnn)
    pub code: i32,
    /// Full message, including its code prefix
    pub message: String,
    /// Native function that failed
    pub fn_name: &'static str,
    /// Underlying OCI status, when the failure wraps an unexpected OCI return
    pub oci_status: Option<i32>,
    /// Whether the server marked the error as recoverable
    pub is_recoverable: bool,
}

impl NativeError {
    /// Create a server (ORA) error
    pub fn oracle(code: i32, message: impl AsRef<str>, fn_name: &'static str) -> Self {
        Self {
            code,
            message: format!("ORA-{:05}: {}", code, message.as_ref()),
            fn_name,
            oci_status: None,
            is_recoverable: false,
        }
    }

    /// Create a client library (DPI) error
    pub fn client(code: i32, message: impl AsRef<str>, fn_name: &'static str) -> Self {
        Self {
            code,
            message: format!("DPI-{:04}: {}", code, message.as_ref()),
            fn_name,
            oci_status: None,
            is_recoverable: false,
        }
    }

    /// The client library saw an OCI status it did not expect
    pub fn unexpected_oci_return(status: i32, fn_name: &'static str) -> Self {
        let mut err = Self::client(
            error_code::UNEXPECTED_OCI_RETURN,
            format!("unexpected OCI return value {} in function {}", status, fn_name),
            fn_name,
        );
        err.oci_status = Some(status);
        err
    }

    /// Check if this is the server limitation ORA-21602
    pub fn is_server_limitation(&self) -> bool {
        self.code == error_code::UNSUPPORTED_TYPECODE && self.message.starts_with("ORA-")
    }

    /// Check if the failure means the session can no longer fetch type metadata
    pub fn is_session_unusable(&self) -> bool {
        self.code == error_code::UNEXPECTED_OCI_RETURN
            && self.oci_status == Some(error_code::OCI_TYPE_FETCH_STATUS)
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for NativeError {}

/// Main error type for the object type bridge
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Catalog Errors
    // =========================================================================
    /// Type lookup was asked for an empty name
    #[error("empty object type name")]
    EmptyTypeName,

    /// The session can no longer be used for metadata lookups
    #[error("connection broken: {context}{}",
        source.as_ref().map(|e| format!(": {}", e)).unwrap_or_default())]
    ConnectionBroken {
        context: String,
        source: Option<NativeError>,
    },

    /// The type entry was closed and cannot be used anymore
    #[error("object type {0} is closed")]
    TypeClosed(String),

    /// A collection operation was requested on a record type
    #[error("{0} is not a collection")]
    NotCollection(String),

    // =========================================================================
    // Object Errors
    // =========================================================================
    /// No attribute with the given name exists on the type
    #[error("{operation} {type_name}[{name}]: no such attribute (have: {available:?})")]
    AttributeNotFound {
        operation: &'static str,
        type_name: String,
        name: String,
        available: Vec<String>,
    },

    /// The object handle was already released
    #[error("{operation}: object of type {type_name} is closed")]
    ObjectClosed {
        operation: &'static str,
        type_name: String,
    },

    /// The requested collection element does not exist
    #[error("{operation}{}: element does not exist",
        index.map(|i| format!("({})", i)).unwrap_or_default())]
    NotExist {
        operation: &'static str,
        index: Option<i32>,
    },

    // =========================================================================
    // Conversion Errors
    // =========================================================================
    /// No conversion exists between the Oracle type and the native type
    #[error("unhandled conversion from Oracle type {oracle_type} to native type {}",
        native_type.map(|t| t.to_string()).unwrap_or_else(|| "UNSET".to_string()))]
    UnhandledConversion {
        oracle_type: OracleType,
        native_type: Option<NativeType>,
    },

    /// An object of one type was supplied where another type is declared
    #[error("wrong object type: expected {expected}, got {actual}")]
    WrongType { expected: String, actual: String },

    /// Invalid Oracle type number
    #[error("invalid Oracle type: {0}")]
    InvalidOracleType(u8),

    /// Host value cannot be represented in the requested form
    #[error("data conversion error: {0}")]
    DataConversionError(String),

    /// Invalid NUMBER image or text
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// Invalid DATE/TIMESTAMP image or text
    #[error("invalid date: {0}")]
    InvalidDate(String),

    // =========================================================================
    // Native Errors
    // =========================================================================
    /// A native client call failed
    #[error("{operation}: {source}")]
    Native {
        operation: String,
        #[source]
        source: NativeError,
    },

    /// The ORA-21602 workaround statement failed as well
    #[error("{statement}: {retry}: {original}")]
    FallbackFailed {
        statement: String,
        retry: Box<Error>,
        original: Box<Error>,
    },

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a native failure with the name of the operation that issued it
    pub fn native(operation: impl Into<String>, source: NativeError) -> Self {
        Error::Native {
            operation: operation.into(),
            source,
        }
    }

    /// Create a conversion error
    pub fn conversion(message: impl Into<String>) -> Self {
        Error::DataConversionError(message.into())
    }

    /// The native error behind this error, if any
    pub fn native_error(&self) -> Option<&NativeError> {
        match self {
            Error::Native { source, .. } => Some(source),
            Error::ConnectionBroken { source, .. } => source.as_ref(),
            _ => None,
        }
    }

    /// Check if this is a "not found" error (unknown attribute or type)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::AttributeNotFound { .. })
            || matches!(self.native_error(), Some(e) if e.code == error_code::OBJECT_DOES_NOT_EXIST)
    }

    /// Check if this is a "collection element does not exist" error
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Error::NotExist { .. })
    }

    /// Check if the connection can no longer be used
    pub fn is_connection_broken(&self) -> bool {
        matches!(self, Error::ConnectionBroken { .. })
    }

    /// Check if this is the ORA-21602 server limitation
    pub fn is_server_limitation(&self) -> bool {
        matches!(self, Error::Native { source, .. } if source.is_server_limitation())
    }

    /// Check if the error comes from converting between representations
    pub fn is_conversion_error(&self) -> bool {
        matches!(
            self,
            Error::UnhandledConversion { .. }
                | Error::WrongType { .. }
                | Error::DataConversionError(_)
                | Error::InvalidNumber(_)
                | Error::InvalidDate(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_display() {
        let err = NativeError::oracle(21602, "operation does not support the specified typecode", "dpiObject_setAttributeValue");
        assert_eq!(
            err.to_string(),
            "ORA-21602: operation does not support the specified typecode"
        );
        assert!(err.is_server_limitation());
    }

    #[test]
    fn test_unexpected_oci_return() {
        let err = NativeError::unexpected_oci_return(1041, "dpiConn_getObjectType");
        assert_eq!(
            err.to_string(),
            "DPI-1062: unexpected OCI return value 1041 in function dpiConn_getObjectType"
        );
        assert!(err.is_session_unusable());
        assert!(!NativeError::unexpected_oci_return(1, "x").is_session_unusable());
    }

    #[test]
    fn test_wrapped_native_error() {
        let err = Error::native(
            "set(3)",
            NativeError::oracle(22165, "given index [3] must be in the range of [0] to [1]", "dpiObject_setElementValueByIndex"),
        );
        assert!(err.to_string().starts_with("set(3): ORA-22165"));
        assert!(!err.is_server_limitation());
    }

    #[test]
    fn test_not_exist_display() {
        let err = Error::NotExist {
            operation: "get",
            index: Some(7),
        };
        assert_eq!(err.to_string(), "get(7): element does not exist");
        assert!(err.is_not_exist());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_unhandled_conversion_names_both_types() {
        let err = Error::UnhandledConversion {
            oracle_type: OracleType::Raw,
            native_type: Some(NativeType::Int64),
        };
        assert_eq!(
            err.to_string(),
            "unhandled conversion from Oracle type RAW to native type INT64(3000)"
        );
        assert!(err.is_conversion_error());
    }

    #[test]
    fn test_attribute_not_found_lists_names() {
        let err = Error::AttributeNotFound {
            operation: "get",
            type_name: "HR.PERSON".to_string(),
            name: "AGE".to_string(),
            available: vec!["ID".to_string(), "NAME".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("HR.PERSON[AGE]"));
        assert!(msg.contains("\"ID\", \"NAME\""));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_reader_failures_are_json_errors() {
        fn parse(text: &str) -> Result<serde_json::Value> {
            Ok(serde_json::from_reader(text.as_bytes())?)
        }
        let err = parse("{").unwrap_err();
        assert!(matches!(err, Error::Json(_)), "{:?}", err);
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn test_connection_broken() {
        let err = Error::ConnectionBroken {
            context: "get_object_type(\"X\")".to_string(),
            source: Some(NativeError::unexpected_oci_return(1041, "dpiConn_getObjectType")),
        };
        assert!(err.is_connection_broken());
        assert!(err.to_string().contains("DPI-1062"));
    }
}
