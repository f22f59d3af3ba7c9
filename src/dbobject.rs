//! Object instances
//!
//! An [`Object`] is a live native object of a given [`ObjectType`]. It holds
//! one reference unit on the native handle until [`Object::close`]; closing
//! twice is a no-op. Attribute access goes through [`Data`] cells and the
//! conversion engine; the convenience accessors ([`Object::get`],
//! [`Object::set`], [`Object::as_map`], [`Object::from_map`]) borrow scratch
//! cells from the catalog's pool.
//!
//! Objects fetched from an attribute or collection element depend on the
//! instance they came from: they see its storage, are valid while it is, and
//! closing them only gives their reference back.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use tracing::Level;

use crate::collection::ObjectCollection;
use crate::constants::NativeType;
use crate::context::Context;
use crate::conversion;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::handle::ObjectRef;
use crate::native::ObjectHandle;
use crate::object_type::{ObjectAttribute, ObjectType};
use crate::types::Timestamp;
use crate::value::Value;

/// Live instance of an object type
pub struct Object {
    object_type: Arc<ObjectType>,
    handle: Mutex<Option<ObjectRef>>,
    owns_instance: bool,
}

impl Object {
    pub(crate) fn from_parts(object_type: Arc<ObjectType>, handle: ObjectRef, owns_instance: bool) -> Self {
        Self {
            object_type,
            handle: Mutex::new(Some(handle)),
            owns_instance,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ObjectRef>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn closed(&self, operation: &'static str) -> Error {
        Error::ObjectClosed {
            operation,
            type_name: self.object_type.full_name(),
        }
    }

    /// Type of the object
    pub fn object_type(&self) -> &Arc<ObjectType> {
        &self.object_type
    }

    /// Native handle, `None` once closed
    pub fn handle(&self) -> Option<ObjectHandle> {
        self.lock().as_ref().map(ObjectRef::handle)
    }

    /// Check if the object was closed
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Whether this object owns its instance rather than viewing a parent's
    pub fn owns_instance(&self) -> bool {
        self.owns_instance
    }

    /// A new reference unit on the handle
    pub(crate) fn acquire(&self, operation: &'static str) -> Result<ObjectRef> {
        match self.lock().as_ref() {
            Some(handle) => handle.try_clone(),
            None => Err(self.closed(operation)),
        }
    }

    pub(crate) fn context(&self) -> Option<Arc<Context>> {
        self.lock().as_ref().map(|h| Arc::clone(h.context()))
    }

    /// Run `f` with the live handle
    pub(crate) fn with_handle<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&ObjectRef) -> Result<T>,
    ) -> Result<T> {
        let guard = self.lock();
        match guard.as_ref() {
            Some(handle) => f(handle),
            None => Err(self.closed(operation)),
        }
    }

    // =========================================================================
    // Attribute access
    // =========================================================================

    /// Fetch an attribute into `data`
    ///
    /// On a closed object `data` becomes a typed null without a native call.
    pub fn get_attribute(&self, data: &mut Data, name: &str) -> Result<()> {
        let attr = self.object_type.require_attribute("get", name)?;
        let guard = self.lock();
        match guard.as_ref() {
            Some(handle) => self.fetch_attribute(handle, &attr, data),
            None => {
                data.reset();
                data.stamp(attr.object_type());
                Ok(())
            }
        }
    }

    fn fetch_attribute(&self, handle: &ObjectRef, attr: &ObjectAttribute, data: &mut Data) -> Result<()> {
        let slot = attr.object_type();
        data.reset();
        data.stamp(slot);
        data.prepare(slot);
        let raw = handle
            .client()
            .get_attribute(handle.handle(), attr.handle())
            .map_err(|e| Error::native(self.describe("get", attr, data.native_type()), e))?;
        conversion::decode(handle.context(), slot, raw, data)?;
        if tracing::enabled!(Level::TRACE) {
            tracing::trace!(
                type_name = %self.object_type,
                attribute = attr.name(),
                data = ?data,
                "get attribute"
            );
        }
        Ok(())
    }

    /// Store `data` into an attribute
    ///
    /// The name is tried as given, then unquoted or upper-cased. An untyped
    /// cell is tagged with the attribute's type and stored as null. Text
    /// stored into a DATE or TIMESTAMP attribute is parsed as RFC 3339.
    pub fn set_attribute(&self, name: &str, data: &mut Data) -> Result<()> {
        let attr = self.object_type.require_attribute("set", name)?;
        let slot = attr.object_type();
        if data.native_type().is_none() {
            data.stamp(slot);
            data.set_null();
        }
        if slot.oracle_type().is_datetime()
            && data.native_type() == Some(NativeType::Bytes)
            && !data.is_null()
        {
            let parsed = data
                .get_str()
                .ok()
                .flatten()
                .and_then(|text| Timestamp::parse_rfc3339(text).ok());
            if let Some(ts) = parsed {
                data.set_timestamp(ts);
            }
        }
        self.with_handle("set", |handle| self.store_attribute(handle, &attr, data))
    }

    fn store_attribute(&self, handle: &ObjectRef, attr: &ObjectAttribute, data: &Data) -> Result<()> {
        let encoded = conversion::encode(handle.context(), attr.object_type(), data)?;
        handle
            .client()
            .set_attribute(handle.handle(), attr.handle(), encoded.as_ref().map(|e| &e.data))
            .map_err(|e| Error::native(self.describe("set", attr, data.native_type()), e))?;
        if tracing::enabled!(Level::TRACE) {
            tracing::trace!(
                type_name = %self.object_type,
                attribute = attr.name(),
                data = ?data,
                "set attribute"
            );
        }
        Ok(())
    }

    fn describe(&self, operation: &str, attr: &ObjectAttribute, native: Option<NativeType>) -> String {
        format!(
            "{} {}[{}] declared {} as {}",
            operation,
            self.object_type,
            attr.name(),
            attr.object_type(),
            native.map(|n| n.to_string()).unwrap_or_else(|| "UNSET".to_string())
        )
    }

    /// Set every attribute to a typed null
    pub fn reset_attributes(&self) -> Result<()> {
        self.with_handle("reset_attributes", |handle| self.reset_with(handle))
    }

    fn reset_with(&self, handle: &ObjectRef) -> Result<()> {
        let mut cell = handle.context().scratch.get();
        for attr in self.object_type.attributes() {
            cell.reset();
            cell.stamp(attr.object_type());
            self.store_attribute(handle, &attr, &cell)?;
        }
        Ok(())
    }

    /// Read an attribute as a host value
    ///
    /// Character and NUMBER data come back as [`Value::String`] and
    /// [`Value::Number`]; nested collections as [`Value::Collection`].
    /// A closed object reads as [`Value::Null`].
    pub fn get(&self, name: &str) -> Result<Value> {
        let attr = self.object_type.require_attribute("get", name)?;
        let guard = self.lock();
        let Some(handle) = guard.as_ref() else {
            return Ok(Value::Null);
        };
        let mut cell = handle.context().scratch.get();
        self.fetch_attribute(handle, &attr, &mut cell)?;
        cell.to_value_as(attr.object_type())
    }

    /// Store a host value into an attribute
    ///
    /// Maps and lists stored into object-typed attributes are built into a
    /// fresh nested instance first.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let attr = self.object_type.require_attribute("set", name)?;
        self.set_value(&attr, &value.into(), true)
    }

    fn set_value(&self, attr: &Arc<ObjectAttribute>, value: &Value, recursive: bool) -> Result<()> {
        let slot = attr.object_type();
        if recursive && slot.is_object() && matches!(value, Value::Map(_) | Value::List(_)) {
            let built = build_nested(slot, value)?;
            let stored = self.set_value(attr, &built, false);
            let closed = built.close();
            return stored.and(closed);
        }
        let ctx = self
            .context()
            .ok_or_else(|| self.closed("set"))?;
        let mut cell = ctx.scratch.get();
        cell.assign(value, slot)?;
        self.with_handle("set", |handle| self.store_attribute(handle, attr, &cell))
    }

    // =========================================================================
    // Projections
    // =========================================================================

    /// Attribute name to value map in declaration order, without nulls
    ///
    /// In recursive mode nested objects become maps and nested collections
    /// lists, with the nested instances closed along the way.
    pub fn as_map(&self, recursive: bool) -> Result<IndexMap<String, Value>> {
        let mut map = IndexMap::new();
        for attr in self.object_type.attributes() {
            let value = self.get(attr.name())?;
            let value = if recursive { project(value)? } else { value };
            if !value.is_null() {
                map.insert(attr.name().to_string(), value);
            }
        }
        Ok(map)
    }

    /// Set attributes from a map
    ///
    /// Keys are matched as given, then unquoted or upper-cased. In recursive
    /// mode map and list values of object-typed attributes are built into
    /// fresh nested instances, stored, and closed again.
    pub fn from_map(&self, recursive: bool, map: &IndexMap<String, Value>) -> Result<()> {
        for (key, value) in map {
            let attr = self.object_type.require_attribute("from_map", key)?;
            self.set_value(&attr, value, recursive)?;
        }
        Ok(())
    }

    /// View a collection-typed object as a collection
    pub fn into_collection(self) -> Result<ObjectCollection> {
        ObjectCollection::new(self)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the object and give back its reference
    ///
    /// Object-valued attributes are closed first (failures are logged), then
    /// every attribute is reset to null and the handle released. Closing an
    /// object that depends on a parent only releases the handle.
    pub fn close(&self) -> Result<()> {
        let Some(handle) = self.lock().take() else {
            return Ok(());
        };
        tracing::trace!(type_name = %self.object_type, handle = %handle.handle(), "closing object");
        let mut reset = Ok(());
        if self.owns_instance && !self.object_type.is_collection() {
            self.close_nested(&handle);
            reset = self.reset_with(&handle);
            if let Err(e) = &reset {
                tracing::warn!(type_name = %self.object_type, error = %e, "failed to reset attributes on close");
            }
        }
        let released = handle.release();
        reset.and(released)
    }

    fn close_nested(&self, handle: &ObjectRef) {
        let mut cell = handle.context().scratch.get();
        for attr in self.object_type.attributes() {
            if !attr.object_type().is_object() {
                continue;
            }
            let nested = self
                .fetch_attribute(handle, &attr, &mut cell)
                .and_then(|_| cell.get_object());
            let closed = match nested {
                Ok(Some(obj)) => obj.close(),
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = closed {
                tracing::error!(
                    type_name = %self.object_type,
                    attribute = attr.name(),
                    error = %e,
                    "failed to close nested object"
                );
            }
        }
    }
}

/// Build a nested instance of `slot` from a map or list projection
pub(crate) fn build_nested(slot: &Arc<ObjectType>, value: &Value) -> Result<Value> {
    match value {
        Value::Map(map) if !slot.is_collection() => {
            let obj = slot.new_object()?;
            if let Err(e) = obj.from_map(true, map) {
                close_quietly(&obj);
                return Err(e);
            }
            Ok(Value::Object(obj))
        }
        Value::List(items) if slot.is_collection() => {
            let coll = slot.new_collection()?;
            if let Err(e) = coll.from_slice(items) {
                close_quietly(&coll);
                return Err(e);
            }
            Ok(Value::Collection(coll))
        }
        other => Err(Error::conversion(format!(
            "cannot build {} from a {}",
            slot,
            other.kind()
        ))),
    }
}

fn close_quietly(obj: &Object) {
    if let Err(e) = obj.close() {
        tracing::error!(type_name = %obj.object_type, error = %e, "failed to close temporary object");
    }
}

/// Turn nested objects into maps and nested collections into lists
pub(crate) fn project(value: Value) -> Result<Value> {
    match value {
        Value::Object(obj) => {
            let map = obj.as_map(true);
            let closed = obj.close();
            let map = map?;
            closed?;
            Ok(Value::Map(map))
        }
        Value::Collection(coll) => {
            let items = coll.as_slice();
            let closed = coll.close();
            let items = items?.into_iter().map(project).collect::<Result<Vec<_>>>()?;
            closed?;
            Ok(Value::List(items))
        }
        other => Ok(other),
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        let handle = self.handle.get_mut().unwrap_or_else(|p| p.into_inner());
        let Some(ctx) = handle.as_ref().map(|h| Arc::clone(h.context())) else {
            return;
        };
        if !self.owns_instance {
            return;
        }
        if ctx.config.warn_unclosed {
            tracing::warn!(type_name = %self.object_type, "object dropped without close");
        }
        if ctx.config.close_on_drop {
            if let Err(e) = self.close() {
                tracing::error!(type_name = %self.object_type, error = %e, "close on drop failed");
            }
        }
        // otherwise the handle guard gives its unit back as it drops
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.object_type.full_name())
            .field("handle", &self.handle())
            .field("owns_instance", &self.owns_instance)
            .finish()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object_type.full_name())?;
        match self.to_json_value() {
            Ok(json) => write!(f, "{}", json),
            Err(_) => Ok(()),
        }
    }
}
