//! Type catalog entries
//!
//! An [`ObjectType`] describes the type of a value slot. Named object and
//! collection types own a native type handle and carry their shape: an
//! ordered attribute list for records, an element type for collections.
//! Scalar slot types (the type of a VARCHAR2 attribute, say) only carry the
//! declared Oracle type, its sizing, and the native type values are fetched
//! as.
//!
//! Named entries are shared through the [`TypeCatalog`](crate::TypeCatalog)
//! cache, so every attribute or element referring to the same qualified name
//! points at the same entry.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::collection::ObjectCollection;
use crate::constants::{number_precision, CollectionType, NativeType, OracleType};
use crate::context::Context;
use crate::dbobject::Object;
use crate::error::{Error, Result};
use crate::handle::{AttrRef, ObjectRef, TypeRef};
use crate::native::{AttrHandle, DataTypeInfo, ObjectTypeInfo, TypeHandle};

/// Native type values of a slot are fetched as
///
/// NUMBER values whose default representation cannot hold every value of
/// the declared precision and scale are fetched as decimal text instead.
pub(crate) fn effective_native_type(info: &DataTypeInfo) -> Option<NativeType> {
    let native = info.default_native_type;
    if info.oracle_type != OracleType::Number {
        return native;
    }
    let limit = match native {
        Some(NativeType::Float) => number_precision::MAX_FLOAT,
        Some(NativeType::Double) => number_precision::MAX_DOUBLE,
        Some(NativeType::Int64) => number_precision::MAX_INT64,
        _ => return native,
    };
    if info.scale != 0 || info.precision > limit {
        Some(NativeType::Bytes)
    } else {
        native
    }
}

enum Shape {
    Scalar,
    /// Registered in the cache, attributes or element not resolved yet
    Pending(TypeRef),
    Record {
        handle: TypeRef,
        attributes: IndexMap<String, Arc<ObjectAttribute>>,
    },
    Collection {
        handle: TypeRef,
        element: Arc<ObjectType>,
    },
    Closed,
}

/// Type of an object, collection, attribute or element
pub struct ObjectType {
    schema: String,
    package_name: String,
    name: String,
    oracle_type: OracleType,
    native_type: Option<NativeType>,
    db_size_in_bytes: u32,
    client_size_in_bytes: u32,
    size_in_chars: u32,
    precision: i16,
    scale: i8,
    fs_precision: u8,
    collection_type: Option<CollectionType>,
    shape: RwLock<Shape>,
}

impl ObjectType {
    /// Slot type without a native handle
    pub(crate) fn scalar(info: &DataTypeInfo) -> Self {
        Self {
            schema: String::new(),
            package_name: String::new(),
            name: String::new(),
            oracle_type: info.oracle_type,
            native_type: effective_native_type(info),
            db_size_in_bytes: info.db_size_in_bytes,
            client_size_in_bytes: info.client_size_in_bytes,
            size_in_chars: info.size_in_chars,
            precision: info.precision,
            scale: info.scale,
            fs_precision: info.fs_precision,
            collection_type: None,
            shape: RwLock::new(Shape::Scalar),
        }
    }

    /// Named type whose shape is filled in by `complete_*`
    pub(crate) fn pending(info: &ObjectTypeInfo, handle: TypeRef) -> Self {
        Self {
            schema: info.schema.clone(),
            package_name: info.package_name.clone(),
            name: info.name.clone(),
            oracle_type: OracleType::Object,
            native_type: Some(NativeType::Object),
            db_size_in_bytes: 0,
            client_size_in_bytes: 0,
            size_in_chars: 0,
            precision: 0,
            scale: 0,
            fs_precision: 0,
            collection_type: info.collection_type,
            shape: RwLock::new(Shape::Pending(handle)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Shape> {
        self.shape.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Shape> {
        self.shape.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_pending(&self) -> Result<TypeRef> {
        let mut shape = self.write();
        match std::mem::replace(&mut *shape, Shape::Closed) {
            Shape::Pending(handle) => Ok(handle),
            other => {
                *shape = other;
                Err(Error::Internal(format!("{} is not being resolved", self.full_name())))
            }
        }
    }

    pub(crate) fn complete_record(&self, attributes: Vec<ObjectAttribute>) -> Result<()> {
        let handle = self.take_pending()?;
        let attributes = attributes
            .into_iter()
            .map(|a| (a.name.clone(), Arc::new(a)))
            .collect();
        *self.write() = Shape::Record { handle, attributes };
        Ok(())
    }

    pub(crate) fn complete_collection(&self, element: Arc<ObjectType>) -> Result<()> {
        let handle = self.take_pending()?;
        *self.write() = Shape::Collection { handle, element };
        Ok(())
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Owning schema (empty for scalar types)
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Package name for PL/SQL types, empty otherwise
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Type name (empty for scalar types)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `SCHEMA.NAME` or `SCHEMA.PACKAGE.NAME`; the SQL type name for scalars
    pub fn full_name(&self) -> String {
        if self.name.is_empty() {
            self.oracle_type.sql_name().to_string()
        } else if self.package_name.is_empty() {
            format!("{}.{}", self.schema, self.name)
        } else {
            format!("{}.{}.{}", self.schema, self.package_name, self.name)
        }
    }

    /// Declared Oracle type
    pub fn oracle_type(&self) -> OracleType {
        self.oracle_type
    }

    /// Native type values are fetched as
    pub fn native_type(&self) -> Option<NativeType> {
        self.native_type
    }

    /// Size in the database, in bytes
    pub fn db_size_in_bytes(&self) -> u32 {
        self.db_size_in_bytes
    }

    /// Size on the client, in bytes
    pub fn client_size_in_bytes(&self) -> u32 {
        self.client_size_in_bytes
    }

    /// Size in characters
    pub fn size_in_chars(&self) -> u32 {
        self.size_in_chars
    }

    /// NUMBER precision
    pub fn precision(&self) -> i16 {
        self.precision
    }

    /// NUMBER scale
    pub fn scale(&self) -> i8 {
        self.scale
    }

    /// Fractional seconds precision
    pub fn fs_precision(&self) -> u8 {
        self.fs_precision
    }

    /// Collection flavor
    pub fn collection_type(&self) -> Option<CollectionType> {
        self.collection_type
    }

    /// Check if this is a collection type
    pub fn is_collection(&self) -> bool {
        self.collection_type.is_some()
    }

    /// Check if values of this type are objects (records or collections)
    pub fn is_object(&self) -> bool {
        self.oracle_type == OracleType::Object
    }

    /// Check if the entry was closed
    pub fn is_closed(&self) -> bool {
        matches!(*self.read(), Shape::Closed)
    }

    // =========================================================================
    // Shape
    // =========================================================================

    /// Attributes in declaration order
    pub fn attributes(&self) -> Vec<Arc<ObjectAttribute>> {
        let mut attrs: Vec<_> = match &*self.read() {
            Shape::Record { attributes, .. } => attributes.values().cloned().collect(),
            _ => Vec::new(),
        };
        attrs.sort_by_key(|a| a.sequence);
        attrs
    }

    /// Attribute names in declaration order
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes().iter().map(|a| a.name.clone()).collect()
    }

    /// Attribute by exact name
    pub fn attribute(&self, name: &str) -> Option<Arc<ObjectAttribute>> {
        match &*self.read() {
            Shape::Record { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        }
    }

    /// Attribute by exact name, then unquoted or upper-cased
    pub(crate) fn lookup_attribute(&self, name: &str) -> Option<Arc<ObjectAttribute>> {
        self.attribute(name).or_else(|| {
            let canonical = if name.starts_with('"') {
                name.trim_matches('"').to_string()
            } else {
                name.to_uppercase()
            };
            (canonical != name)
                .then(|| self.attribute(&canonical))
                .flatten()
        })
    }

    /// Attribute lookup failing with the list of known names
    pub(crate) fn require_attribute(
        &self,
        operation: &'static str,
        name: &str,
    ) -> Result<Arc<ObjectAttribute>> {
        if self.is_closed() {
            return Err(Error::TypeClosed(self.full_name()));
        }
        self.lookup_attribute(name)
            .ok_or_else(|| Error::AttributeNotFound {
                operation,
                type_name: self.full_name(),
                name: name.to_string(),
                available: self.attribute_names(),
            })
    }

    /// Element type of a collection
    pub fn element_type(&self) -> Option<Arc<ObjectType>> {
        match &*self.read() {
            Shape::Collection { element, .. } => Some(Arc::clone(element)),
            _ => None,
        }
    }

    pub(crate) fn native_handle(&self) -> Result<(Arc<Context>, TypeHandle)> {
        match &*self.read() {
            Shape::Pending(handle)
            | Shape::Record { handle, .. }
            | Shape::Collection { handle, .. } => {
                Ok((Arc::clone(handle.context()), handle.handle()))
            }
            Shape::Closed => Err(Error::TypeClosed(self.full_name())),
            Shape::Scalar => Err(Error::conversion(format!(
                "{} is not an object type",
                self.full_name()
            ))),
        }
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Create a new instance with every attribute set to a typed null
    pub fn new_object(self: &Arc<Self>) -> Result<Object> {
        let (ctx, handle) = self.native_handle()?;
        let raw = ctx
            .client
            .create_object(handle)
            .map_err(|e| Error::native(format!("new_object {}", self.full_name()), e))?;
        let object = Object::from_parts(Arc::clone(self), ObjectRef::adopt(&ctx, raw), true);
        if !self.is_collection() {
            if let Err(e) = object.reset_attributes() {
                if let Err(close_err) = object.close() {
                    tracing::error!(type_name = %self, error = %close_err, "failed to close half-built object");
                }
                return Err(e);
            }
        }
        tracing::trace!(type_name = %self, handle = %raw, "created object");
        Ok(object)
    }

    /// Create a new, empty collection
    pub fn new_collection(self: &Arc<Self>) -> Result<ObjectCollection> {
        if !self.is_collection() {
            return Err(Error::NotCollection(self.full_name()));
        }
        self.new_object()?.into_collection()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Release the native type handle and close attribute and element types
    ///
    /// Closing twice is a no-op. Every handle is released even when one of
    /// the releases fails; the first failure is returned.
    pub fn close(&self) -> Result<()> {
        let shape = {
            let mut shape = self.write();
            match &*shape {
                Shape::Scalar | Shape::Closed => return Ok(()),
                _ => std::mem::replace(&mut *shape, Shape::Closed),
            }
        };
        tracing::debug!(type_name = %self, "closing object type");

        let mut first_err: Option<Error> = None;
        let mut keep = |result: Result<()>| {
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        };
        match shape {
            Shape::Pending(handle) => keep(handle.release()),
            Shape::Record { handle, attributes } => {
                for (_, attr) in attributes {
                    keep(attr.object_type.close());
                    if let Ok(attr) = Arc::try_unwrap(attr) {
                        keep(attr.handle.release());
                    }
                }
                keep(handle.release());
            }
            Shape::Collection { handle, element } => {
                keep(element.close());
                keep(handle.release());
            }
            Shape::Scalar | Shape::Closed => {}
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

// Shapes can refer back to their own entry, so Debug stays shallow.
impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("name", &self.full_name())
            .field("oracle_type", &self.oracle_type)
            .field("native_type", &self.native_type)
            .field("collection_type", &self.collection_type)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Attribute of a record type
#[derive(Debug)]
pub struct ObjectAttribute {
    name: String,
    sequence: usize,
    object_type: Arc<ObjectType>,
    handle: AttrRef,
}

impl ObjectAttribute {
    pub(crate) fn new(
        name: String,
        sequence: usize,
        object_type: Arc<ObjectType>,
        handle: AttrRef,
    ) -> Self {
        Self {
            name,
            sequence,
            object_type,
            handle,
        }
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 0-based position in the declaration
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Type of the attribute
    pub fn object_type(&self) -> &Arc<ObjectType> {
        &self.object_type
    }

    pub(crate) fn handle(&self) -> AttrHandle {
        self.handle.handle()
    }
}
