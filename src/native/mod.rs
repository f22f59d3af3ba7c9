//! Native client seam
//!
//! [`NativeClient`] is the primitive surface the bridge drives: type lookup
//! and description, object creation and reference counting, attribute and
//! element access on the physical representation ([`OracleData`]), and LOB
//! access. Handles are plain ids; every handle a call returns carries one
//! reference unit that the caller must give back through the matching
//! `*_release` call.
//!
//! Conversion between the physical representation and [`Data`](crate::Data)
//! cells happens on this side of the seam, in the conversion module.

mod memory;

pub use memory::{DataTypeDef, MemoryClient, TypeDef};

use std::fmt;

use bytes::Bytes;

use crate::constants::{NativeType, OracleType};
use crate::error::NativeError;

/// Result of a native client call
pub type NativeResult<T> = std::result::Result<T, NativeError>;

macro_rules! handle_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle_id!(
    /// Native object type handle
    TypeHandle
);
handle_id!(
    /// Native object attribute handle
    AttrHandle
);
handle_id!(
    /// Native object (record or collection instance) handle
    ObjectHandle
);
handle_id!(
    /// Native LOB handle
    LobHandle
);

/// Type description of a value slot (attribute or collection element)
#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeInfo {
    /// Declared Oracle type
    pub oracle_type: OracleType,
    /// Native representation the client would pick by default
    pub default_native_type: Option<NativeType>,
    /// Size in the database, in bytes
    pub db_size_in_bytes: u32,
    /// Size on the client, in bytes
    pub client_size_in_bytes: u32,
    /// Size in characters for character types
    pub size_in_chars: u32,
    /// NUMBER precision (0 when unconstrained)
    pub precision: i16,
    /// NUMBER scale (-127 when unconstrained)
    pub scale: i8,
    /// Fractional seconds precision for TIMESTAMP types
    pub fs_precision: u8,
    /// Object type of the slot, owned by the describing handle
    pub object_type: Option<TypeHandle>,
}

/// Description of an object type
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTypeInfo {
    /// Owning schema
    pub schema: String,
    /// Type name
    pub name: String,
    /// Package name for PL/SQL types, empty otherwise
    pub package_name: String,
    /// Whether the type is a collection
    pub is_collection: bool,
    /// Collection flavor, for collections
    pub collection_type: Option<crate::constants::CollectionType>,
    /// Element description, for collections
    pub element_type_info: Option<DataTypeInfo>,
    /// Number of attributes, for records
    pub num_attributes: u16,
}

/// Description of an object attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttrInfo {
    /// Attribute name, as stored in the data dictionary
    pub name: String,
    /// Attribute type
    pub type_info: DataTypeInfo,
}

/// Physical representation of a single non-null value
#[derive(Debug, Clone, PartialEq)]
pub enum OracleData {
    /// Character data with its character set form
    Text {
        /// Encoded characters
        bytes: Bytes,
        /// Character set form (implicit or national)
        csfrm: u8,
    },
    /// RAW data
    Raw(Bytes),
    /// Native integer (BINARY_INTEGER / PLS_INTEGER)
    Integer(i64),
    /// BINARY_FLOAT
    Float(f32),
    /// BINARY_DOUBLE
    Double(f64),
    /// NUMBER image
    Number(Bytes),
    /// DATE / TIMESTAMP image (7, 11 or 13 bytes)
    Datetime(Bytes),
    /// BOOLEAN
    Boolean(bool),
    /// Object instance; one reference unit travels with the handle
    Object(ObjectHandle),
    /// LOB; one reference unit travels with the handle
    Lob(LobHandle),
}

impl OracleData {
    /// Short name of the representation, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            OracleData::Text { .. } => "text",
            OracleData::Raw(_) => "raw",
            OracleData::Integer(_) => "integer",
            OracleData::Float(_) => "float",
            OracleData::Double(_) => "double",
            OracleData::Number(_) => "number",
            OracleData::Datetime(_) => "datetime",
            OracleData::Boolean(_) => "boolean",
            OracleData::Object(_) => "object",
            OracleData::Lob(_) => "lob",
        }
    }
}

/// Primitive operations of the native client library
///
/// Implementations must be safe to call from several threads; the bridge
/// serializes access per object but not per client.
pub trait NativeClient: Send + Sync + fmt::Debug {
    /// Whether the session can still be used
    fn is_connected(&self) -> bool;

    // =========================================================================
    // Types
    // =========================================================================

    /// Look up an object type by name, exactly as given
    fn get_object_type(&self, name: &str) -> NativeResult<TypeHandle>;

    /// Describe an object type
    fn type_info(&self, ty: TypeHandle) -> NativeResult<ObjectTypeInfo>;

    /// Attribute handles of a record type, in declaration order
    fn type_attributes(&self, ty: TypeHandle) -> NativeResult<Vec<AttrHandle>>;

    /// Describe an attribute
    fn attr_info(&self, attr: AttrHandle) -> NativeResult<AttrInfo>;

    /// Add a reference to a type handle
    fn type_add_ref(&self, ty: TypeHandle) -> NativeResult<()>;

    /// Release a reference to a type handle
    fn type_release(&self, ty: TypeHandle) -> NativeResult<()>;

    /// Add a reference to an attribute handle
    fn attr_add_ref(&self, attr: AttrHandle) -> NativeResult<()>;

    /// Release a reference to an attribute handle
    fn attr_release(&self, attr: AttrHandle) -> NativeResult<()>;

    // =========================================================================
    // Objects
    // =========================================================================

    /// Create a new instance of the type
    fn create_object(&self, ty: TypeHandle) -> NativeResult<ObjectHandle>;

    /// Add a reference to an object handle
    fn object_add_ref(&self, obj: ObjectHandle) -> NativeResult<()>;

    /// Release a reference to an object handle
    fn object_release(&self, obj: ObjectHandle) -> NativeResult<()>;

    /// Read an attribute; `None` is a null value
    fn get_attribute(&self, obj: ObjectHandle, attr: AttrHandle) -> NativeResult<Option<OracleData>>;

    /// Write an attribute; `None` stores a null value. Object values are
    /// copied, the caller keeps its reference.
    fn set_attribute(
        &self,
        obj: ObjectHandle,
        attr: AttrHandle,
        value: Option<&OracleData>,
    ) -> NativeResult<()>;

    // =========================================================================
    // Collections
    // =========================================================================

    /// Number of existing elements
    fn collection_size(&self, obj: ObjectHandle) -> NativeResult<i32>;

    /// Lowest existing index
    fn first_index(&self, obj: ObjectHandle) -> NativeResult<Option<i32>>;

    /// Highest existing index
    fn last_index(&self, obj: ObjectHandle) -> NativeResult<Option<i32>>;

    /// Next existing index after `index`
    fn next_index(&self, obj: ObjectHandle, index: i32) -> NativeResult<Option<i32>>;

    /// Previous existing index before `index`
    fn prev_index(&self, obj: ObjectHandle, index: i32) -> NativeResult<Option<i32>>;

    /// Whether an element exists at `index`
    fn element_exists(&self, obj: ObjectHandle, index: i32) -> NativeResult<bool>;

    /// Read the element at `index`; `None` is a null element
    fn get_element(&self, obj: ObjectHandle, index: i32) -> NativeResult<Option<OracleData>>;

    /// Write the element at `index`
    fn set_element(&self, obj: ObjectHandle, index: i32, value: Option<&OracleData>) -> NativeResult<()>;

    /// Append an element after the last one
    fn append_element(&self, obj: ObjectHandle, value: Option<&OracleData>) -> NativeResult<()>;

    /// Delete the element at `index`, leaving a gap
    fn delete_element(&self, obj: ObjectHandle, index: i32) -> NativeResult<()>;

    /// Remove `count` elements from the end
    fn trim(&self, obj: ObjectHandle, count: u32) -> NativeResult<()>;

    // =========================================================================
    // LOBs
    // =========================================================================

    /// Create an empty temporary LOB
    fn create_temp_lob(&self, oracle_type: OracleType) -> NativeResult<LobHandle>;

    /// Add a reference to a LOB handle
    fn lob_add_ref(&self, lob: LobHandle) -> NativeResult<()>;

    /// Release a reference to a LOB handle
    fn lob_release(&self, lob: LobHandle) -> NativeResult<()>;

    /// Size of the LOB in bytes
    fn lob_size(&self, lob: LobHandle) -> NativeResult<u64>;

    /// Read the whole LOB content
    fn lob_read_all(&self, lob: LobHandle) -> NativeResult<Bytes>;

    /// Replace the whole LOB content
    fn lob_set_from_bytes(&self, lob: LobHandle, data: &[u8]) -> NativeResult<()>;

    /// Write at a byte offset, extending the LOB as needed
    fn lob_write(&self, lob: LobHandle, offset: u64, data: &[u8]) -> NativeResult<()>;
}
