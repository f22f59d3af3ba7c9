//! Collection view over a collection-typed object
//!
//! Indices of PL/SQL index-by tables may be sparse and negative; nested
//! tables and VARRAYs start at 0. Navigation walks the indices that exist.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::Level;

use crate::conversion;
use crate::data::Data;
use crate::dbobject::{build_nested, Object};
use crate::error::{Error, Result};
use crate::handle::ObjectRef;
use crate::native::{NativeClient, NativeResult, ObjectHandle};
use crate::object_type::ObjectType;
use crate::value::Value;

fn label(operation: &str, index: Option<i32>) -> String {
    match index {
        Some(i) => format!("{}({})", operation, i),
        None => operation.to_string(),
    }
}

/// Collection-typed [`Object`] with index navigation
///
/// Derefs to the underlying [`Object`] for type information and
/// [`Object::close`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use oracle_dbobject::{CollectionType, Config, DataTypeDef, MemoryClient, TypeCatalog, TypeDef};
///
/// let client = MemoryClient::new("HR").with_type(TypeDef::collection(
///     "HR",
///     "NUM_LIST",
///     CollectionType::NestedTable,
///     DataTypeDef::number(10, 0),
/// ));
/// let catalog = TypeCatalog::new(Arc::new(client), Config::default());
///
/// let coll = catalog.get_object_type("NUM_LIST").unwrap().new_collection().unwrap();
/// coll.append_value(1).unwrap();
/// coll.append_value(2).unwrap();
/// assert_eq!(coll.len().unwrap(), 2);
/// assert_eq!(coll.get(1).unwrap().as_i64(), Some(2));
/// coll.close().unwrap();
/// ```
pub struct ObjectCollection {
    object: Object,
    element: Arc<ObjectType>,
}

impl ObjectCollection {
    pub(crate) fn new(object: Object) -> Result<Self> {
        let ty = Arc::clone(object.object_type());
        if !ty.is_collection() {
            return Err(Error::NotCollection(ty.full_name()));
        }
        let element = ty
            .element_type()
            .ok_or_else(|| Error::TypeClosed(ty.full_name()))?;
        Ok(Self { object, element })
    }

    /// Element type
    pub fn element_type(&self) -> &Arc<ObjectType> {
        &self.element
    }

    /// Back to the plain object
    pub fn into_object(self) -> Object {
        self.object
    }

    fn call<T>(
        &self,
        operation: &'static str,
        index: Option<i32>,
        f: impl FnOnce(&dyn NativeClient, ObjectHandle) -> NativeResult<T>,
    ) -> Result<T> {
        self.object.with_handle(operation, |h| {
            f(h.client(), h.handle()).map_err(|e| Error::native(label(operation, index), e))
        })
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Number of existing elements
    pub fn len(&self) -> Result<usize> {
        let size = self.call("len", None, |c, h| c.collection_size(h))?;
        Ok(size.max(0) as usize)
    }

    /// Check if the collection has no elements
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Lowest existing index
    pub fn first(&self) -> Result<i32> {
        if self.is_empty()? {
            return Err(Error::NotExist {
                operation: "first",
                index: None,
            });
        }
        self.call("first", None, |c, h| c.first_index(h))?
            .ok_or(Error::NotExist {
                operation: "first",
                index: None,
            })
    }

    /// Highest existing index
    pub fn last(&self) -> Result<i32> {
        if self.is_empty()? {
            return Err(Error::NotExist {
                operation: "last",
                index: None,
            });
        }
        self.call("last", None, |c, h| c.last_index(h))?
            .ok_or(Error::NotExist {
                operation: "last",
                index: None,
            })
    }

    /// Next existing index after `index`
    pub fn next(&self, index: i32) -> Result<i32> {
        self.call("next", Some(index), |c, h| c.next_index(h, index))?
            .ok_or(Error::NotExist {
                operation: "next",
                index: Some(index),
            })
    }

    /// Previous existing index before `index`
    pub fn prev(&self, index: i32) -> Result<i32> {
        self.call("prev", Some(index), |c, h| c.prev_index(h, index))?
            .ok_or(Error::NotExist {
                operation: "prev",
                index: Some(index),
            })
    }

    /// Check if an element exists at `index`
    pub fn exists(&self, index: i32) -> Result<bool> {
        self.call("exists", Some(index), |c, h| c.element_exists(h, index))
    }

    /// Existing indices in ascending order
    pub fn indices(&self) -> Result<Vec<i32>> {
        let mut indices = Vec::new();
        if self.is_empty()? {
            return Ok(indices);
        }
        let mut index = self.first()?;
        loop {
            indices.push(index);
            match self.next(index) {
                Ok(next) => index = next,
                Err(e) if e.is_not_exist() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(indices)
    }

    // =========================================================================
    // Elements
    // =========================================================================

    /// Fetch the element at `index` into `data`
    ///
    /// A missing index is an error; a null element leaves `data` null.
    pub fn get_item(&self, data: &mut Data, index: i32) -> Result<()> {
        self.object
            .with_handle("get", |h| self.fetch(h, index, data))
    }

    fn fetch(&self, h: &ObjectRef, index: i32, data: &mut Data) -> Result<()> {
        let client = h.client();
        let exists = client
            .element_exists(h.handle(), index)
            .map_err(|e| Error::native(label("get", Some(index)), e))?;
        if !exists {
            return Err(Error::NotExist {
                operation: "get",
                index: Some(index),
            });
        }
        data.reset();
        data.stamp(&self.element);
        data.prepare(&self.element);
        let raw = client
            .get_element(h.handle(), index)
            .map_err(|e| Error::native(label("get", Some(index)), e))?;
        conversion::decode(h.context(), &self.element, raw, data)?;
        if tracing::enabled!(Level::TRACE) {
            tracing::trace!(collection = %self.object.object_type(), index = index, data = ?data, "get element");
        }
        Ok(())
    }

    /// Element at `index` as a host value
    pub fn get(&self, index: i32) -> Result<Value> {
        self.object.with_handle("get", |h| {
            let mut cell = h.context().scratch.get();
            self.fetch(h, index, &mut cell)?;
            cell.to_value_as(&self.element)
        })
    }

    /// Store `data` at `index`
    pub fn set_item(&self, index: i32, data: &Data) -> Result<()> {
        self.object
            .with_handle("set", |h| self.store(h, "set", Some(index), data))
    }

    /// Append `data` after the last element
    pub fn append(&self, data: &Data) -> Result<()> {
        self.object
            .with_handle("append", |h| self.store(h, "append", None, data))
    }

    fn store(&self, h: &ObjectRef, operation: &'static str, index: Option<i32>, data: &Data) -> Result<()> {
        let encoded = conversion::encode(h.context(), &self.element, data)?;
        let value = encoded.as_ref().map(|e| &e.data);
        let result = match index {
            Some(i) => h.client().set_element(h.handle(), i, value),
            None => h.client().append_element(h.handle(), value),
        };
        result.map_err(|e| Error::native(label(operation, index), e))
    }

    /// Store a host value at `index`
    pub fn set(&self, index: i32, value: impl Into<Value>) -> Result<()> {
        self.with_cell(&value.into(), |cell| self.set_item(index, cell))
    }

    /// Append a host value
    ///
    /// Maps and lists appended to a collection of objects are built into a
    /// fresh instance first; the collection keeps a copy.
    pub fn append_value(&self, value: impl Into<Value>) -> Result<()> {
        self.with_cell(&value.into(), |cell| self.append(cell))
    }

    /// Append a copy of an object
    pub fn append_object(&self, object: &Object) -> Result<()> {
        let ctx = self
            .object
            .context()
            .ok_or_else(|| self.object.closed("append"))?;
        let mut cell = ctx.scratch.get();
        cell.stamp(&self.element);
        cell.set_object(object)?;
        self.append(&cell)
    }

    fn with_cell<T>(&self, value: &Value, f: impl FnOnce(&Data) -> Result<T>) -> Result<T> {
        if self.element.is_object() && matches!(value, Value::Map(_) | Value::List(_)) {
            let built = build_nested(&self.element, value)?;
            let result = self.with_cell(&built, f);
            let closed = built.close();
            return result.and_then(|v| closed.map(|_| v));
        }
        let ctx = self
            .object
            .context()
            .ok_or_else(|| self.object.closed("set"))?;
        let mut cell = ctx.scratch.get();
        cell.assign(value, &self.element)?;
        f(&cell)
    }

    /// Delete the element at `index`
    pub fn delete(&self, index: i32) -> Result<()> {
        self.call("delete", Some(index), |c, h| c.delete_element(h, index))
    }

    /// Remove `count` elements from the end
    pub fn trim(&self, count: u32) -> Result<()> {
        self.call("trim", None, |c, h| c.trim(h, count))
    }

    // =========================================================================
    // Projections
    // =========================================================================

    /// Existing elements in index order
    pub fn as_slice(&self) -> Result<Vec<Value>> {
        self.indices()?.into_iter().map(|i| self.get(i)).collect()
    }

    /// Append every value in order
    pub fn from_slice(&self, values: &[Value]) -> Result<()> {
        values.iter().try_for_each(|v| self.with_cell(v, |cell| self.append(cell)))
    }

    /// Object elements as attribute maps; a null element becomes an empty map
    pub fn as_map_slice(&self, recursive: bool) -> Result<Vec<IndexMap<String, Value>>> {
        if !self.element.is_object() || self.element.is_collection() {
            return Err(Error::conversion(format!(
                "elements of {} are not objects",
                self.object.object_type()
            )));
        }
        let mut maps = Vec::new();
        for index in self.indices()? {
            let map = match self.get(index)? {
                Value::Object(obj) => {
                    let map = obj.as_map(recursive);
                    let closed = obj.close();
                    let map = map?;
                    closed?;
                    map
                }
                _ => IndexMap::new(),
            };
            maps.push(map);
        }
        Ok(maps)
    }

    /// Append one new element per map
    pub fn from_map_slice(&self, recursive: bool, maps: &[IndexMap<String, Value>]) -> Result<()> {
        if !self.element.is_object() || self.element.is_collection() {
            return Err(Error::conversion(format!(
                "elements of {} are not objects",
                self.object.object_type()
            )));
        }
        for map in maps {
            let obj = self.element.new_object()?;
            let appended = obj
                .from_map(recursive, map)
                .and_then(|_| self.append_object(&obj));
            let closed = obj.close();
            appended?;
            closed?;
        }
        Ok(())
    }
}

impl Deref for ObjectCollection {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.object
    }
}

impl fmt::Debug for ObjectCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCollection")
            .field("object", &self.object)
            .field("element", &self.element.full_name())
            .finish()
    }
}

impl fmt::Display for ObjectCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object.object_type().full_name())?;
        match self.to_json_value() {
            Ok(json) => write!(f, "{}", json),
            Err(_) => Ok(()),
        }
    }
}
