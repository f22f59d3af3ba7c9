#![warn(missing_docs)]

//! # oracle-dbobject
//!
//! Oracle user-defined object types and collections on top of a native
//! client.
//!
//! The crate sits between an ODPI-style native client and application code.
//! It resolves named types through a connection-wide cache, creates and
//! releases object instances, moves attribute and element values between the
//! database's physical representation and host values, and projects objects
//! to and from maps and JSON.
//!
//! ## Features
//!
//! - **Type catalog** - Concurrent cache with single resolution per name,
//!   including self-referential type graphs
//! - **Objects and collections** - Attribute access, sparse collection
//!   navigation, deep map and JSON projection
//! - **Deterministic cleanup** - Every native reference is held by a guard;
//!   `close` is idempotent and cascades into nested objects
//! - **In-memory client** - [`MemoryClient`] implements the native seam for
//!   tests and tooling
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use oracle_dbobject::{Config, DataTypeDef, MemoryClient, TypeCatalog, TypeDef};
//!
//! # fn main() -> oracle_dbobject::Result<()> {
//! let client = MemoryClient::new("HR")
//!     .with_type(
//!         TypeDef::record("HR", "ADDRESS")
//!             .attribute("CITY", DataTypeDef::varchar(40))
//!             .attribute("ZIP", DataTypeDef::varchar(10)),
//!     )
//!     .with_type(
//!         TypeDef::record("HR", "PERSON")
//!             .attribute("ID", DataTypeDef::number(10, 0))
//!             .attribute("NAME", DataTypeDef::varchar(50))
//!             .attribute("HOME", DataTypeDef::object("HR.ADDRESS")),
//!     );
//! let catalog = TypeCatalog::new(Arc::new(client), Config::default());
//!
//! let person = catalog.get_object_type("person")?;
//! let obj = person.new_object()?;
//! obj.from_json_value(serde_json::json!({
//!     "ID": 1,
//!     "NAME": "Ada",
//!     "HOME": {"CITY": "London"}
//! }))?;
//!
//! let json = obj.to_json_value()?;
//! assert_eq!(json["HOME"]["CITY"], "London");
//! assert!(json["HOME"]["ZIP"].is_null());
//!
//! obj.close()?;
//! catalog.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Value Cells
//!
//! [`Data`] is the tagged cell every attribute and element value passes
//! through. The cell's native type decides the host representation:
//!
//! ```rust
//! use oracle_dbobject::{Data, NativeType};
//!
//! let mut data = Data::new();
//! data.set_string("hello");
//! assert_eq!(data.native_type(), Some(NativeType::Bytes));
//! assert_eq!(data.get_str().unwrap(), Some("hello"));
//! ```
//!
//! ## Data Types
//!
//! | Oracle Type | Native Type | Host Value |
//! |-------------|-------------|------------|
//! | VARCHAR2, CHAR, NVARCHAR2, NCHAR | BYTES | `Value::String` |
//! | RAW | BYTES | `Value::Bytes` |
//! | NUMBER (small integer precision) | INT64 | `Value::Integer` |
//! | NUMBER (other) | BYTES | `Value::Number` (decimal text) |
//! | BINARY_FLOAT, BINARY_DOUBLE | FLOAT, DOUBLE | `Value::Float`, `Value::Double` |
//! | DATE, TIMESTAMP [WITH [LOCAL] TIME ZONE] | TIMESTAMP | `Value::Timestamp` |
//! | BOOLEAN | BOOLEAN | `Value::Boolean` |
//! | CLOB, NCLOB, BLOB, BFILE | LOB | `Value::Lob` |
//! | Object type | OBJECT | `Value::Object`, `Value::Collection` |

pub mod catalog;
pub mod collection;
pub mod config;
pub mod constants;
mod context;
mod conversion;
pub mod data;
pub mod dbobject;
pub mod error;
pub mod fallback;
mod handle;
mod json;
pub mod native;
pub mod object_type;
mod pool;
pub mod types;
pub mod value;

pub use catalog::TypeCatalog;
pub use collection::ObjectCollection;
pub use config::Config;
pub use constants::{CollectionType, NativeType, OracleType};
pub use data::Data;
pub use dbobject::Object;
pub use error::{Error, NativeError, Result};
pub use fallback::{set_attribute_with_fallback, Bind, StatementExecutor};
pub use native::{
    AttrHandle, DataTypeDef, LobHandle, MemoryClient, NativeClient, ObjectHandle, OracleData,
    TypeDef, TypeHandle,
};
pub use object_type::{ObjectAttribute, ObjectType};
pub use types::{Lob, Timestamp};
pub use value::Value;

// Re-export serde_json for users working with JSON projections
pub use serde_json;
