//! Object type catalog
//!
//! [`TypeCatalog`] resolves object type names into shared [`ObjectType`]
//! entries and caches them for the lifetime of the connection. Lookups of a
//! warm name only take the read lock; first-time resolution runs under the
//! write lock, so a name is resolved by the native layer at most once no
//! matter how many threads ask for it.
//!
//! Nested attribute and element types are resolved through the same cache,
//! keyed by qualified name. A new entry is registered before its attributes
//! are described, which is what lets self-referential type graphs resolve.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::Config;
use crate::constants::OracleType;
use crate::context::Context;
use crate::dbobject::Object;
use crate::error::{Error, NativeError, Result};
use crate::handle::{AttrRef, LobRef, ObjectRef, TypeRef};
use crate::native::{DataTypeInfo, NativeClient, ObjectHandle, TypeHandle};
use crate::object_type::{ObjectAttribute, ObjectType};
use crate::types::Lob;

type Cache = HashMap<String, Arc<ObjectType>>;

/// Cache of resolved object types for one connection
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use oracle_dbobject::{Config, DataTypeDef, MemoryClient, TypeCatalog, TypeDef};
///
/// let client = MemoryClient::new("HR").with_type(
///     TypeDef::record("HR", "PERSON")
///         .attribute("ID", DataTypeDef::number(10, 0))
///         .attribute("NAME", DataTypeDef::varchar(50)),
/// );
/// let catalog = TypeCatalog::new(Arc::new(client), Config::default());
///
/// let person = catalog.get_object_type("person").unwrap();
/// assert_eq!(person.full_name(), "HR.PERSON");
/// assert_eq!(person.attribute_names(), vec!["ID", "NAME"]);
///
/// let obj = person.new_object().unwrap();
/// obj.set("ID", 7).unwrap();
/// assert_eq!(obj.get("ID").unwrap().as_i64(), Some(7));
/// obj.close().unwrap();
/// catalog.close().unwrap();
/// ```
#[derive(Debug)]
pub struct TypeCatalog {
    ctx: Arc<Context>,
    cache: RwLock<Cache>,
}

impl TypeCatalog {
    /// Create an empty catalog over a native client
    pub fn new(client: Arc<dyn NativeClient>, config: Config) -> Self {
        Self {
            ctx: Context::new(client, config),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Native client behind the catalog
    pub fn client(&self) -> &Arc<dyn NativeClient> {
        &self.ctx.client
    }

    /// Number of idle scratch cells
    pub fn idle_scratch_cells(&self) -> usize {
        self.ctx.scratch.idle()
    }

    fn read(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of cache keys (requested names and qualified names)
    pub fn cached_len(&self) -> usize {
        self.read().len()
    }

    /// Resolve an object type by name
    ///
    /// Unquoted names are tried upper-cased first, then as given; quoted
    /// names are used verbatim. The entry is cached under the requested name,
    /// the spelling that matched and the qualified name. With a configured
    /// `default_schema`, unquoted unqualified names also hit entries cached
    /// under their schema-qualified form.
    pub fn get_object_type(&self, name: &str) -> Result<Arc<ObjectType>> {
        if name.is_empty() {
            return Err(Error::EmptyTypeName);
        }
        let quoted = name.contains('"');
        let upper = (!quoted).then(|| name.to_uppercase()).filter(|u| u != name);
        let qualified = (!quoted && self.ctx.config.default_schema.is_some())
            .then(|| self.ctx.config.qualify(upper.as_deref().unwrap_or(name)))
            .filter(|q| q != name);
        let keys: Vec<&str> = std::iter::once(name)
            .chain(upper.as_deref())
            .chain(qualified.as_deref())
            .collect();

        {
            let cache = self.read();
            if let Some(entry) = lookup_live(&cache, &keys) {
                tracing::trace!(name = name, "object type cache hit");
                return Ok(entry);
            }
        }

        let mut cache = self.write();
        if let Some(entry) = lookup_live(&cache, &keys) {
            tracing::trace!(name = name, "object type cache hit after wait");
            return Ok(entry);
        }
        cache.retain(|key, entry| {
            let live = !entry.is_closed();
            if !live {
                tracing::debug!(key = key.as_str(), "evicting closed object type");
            }
            live
        });
        tracing::trace!(name = name, "object type cache miss");

        let (handle, found_as) = self.lookup_native(name, upper.as_deref())?;
        let entry = self.resolve(&mut cache, TypeRef::adopt(&self.ctx, handle))?;
        cache.insert(name.to_string(), Arc::clone(&entry));
        if found_as != name {
            cache.insert(found_as.to_string(), Arc::clone(&entry));
        }
        Ok(entry)
    }

    /// Native lookup; returns the handle and the spelling that matched
    fn lookup_native<'a>(&self, name: &'a str, upper: Option<&'a str>) -> Result<(TypeHandle, &'a str)> {
        let context = || format!("get_object_type({:?})", name);
        if !self.ctx.client.is_connected() {
            return Err(Error::ConnectionBroken {
                context: context(),
                source: None,
            });
        }
        let candidates: Vec<&str> = upper.into_iter().chain(std::iter::once(name)).collect();
        let mut last_err: Option<NativeError> = None;
        for candidate in candidates {
            match self.ctx.client.get_object_type(candidate) {
                Ok(handle) => return Ok((handle, candidate)),
                Err(e) if e.is_session_unusable() => {
                    return Err(Error::ConnectionBroken {
                        context: context(),
                        source: Some(e),
                    });
                }
                Err(e) => {
                    tracing::trace!(name = candidate, error = %e, "object type lookup failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(Error::native(context(), e)),
            None => Err(Error::Internal(format!("no lookup candidates for {:?}", name))),
        }
    }

    /// Build the entry for a native type handle, memoized by qualified name
    fn resolve(&self, cache: &mut Cache, handle: TypeRef) -> Result<Arc<ObjectType>> {
        let client = self.ctx.client.as_ref();
        let info = client
            .type_info(handle.handle())
            .map_err(|e| Error::native(format!("describe {}", handle.handle()), e))?;
        let full_name = if info.package_name.is_empty() {
            format!("{}.{}", info.schema, info.name)
        } else {
            format!("{}.{}.{}", info.schema, info.package_name, info.name)
        };
        if let Some(existing) = cache.get(&full_name).filter(|e| !e.is_closed()) {
            // the extra unit on `handle` goes back when it drops
            return Ok(Arc::clone(existing));
        }

        let entry = Arc::new(ObjectType::pending(&info, handle));
        cache.insert(full_name.clone(), Arc::clone(&entry));

        let completed = if info.is_collection {
            self.resolve_collection(cache, &entry, info.element_type_info.as_ref())
        } else {
            self.resolve_record(cache, &entry)
        };
        if let Err(e) = completed {
            cache.remove(&full_name);
            if let Err(close_err) = entry.close() {
                tracing::error!(type_name = full_name.as_str(), error = %close_err, "failed to close unresolved type");
            }
            return Err(e);
        }
        tracing::debug!(
            type_name = full_name.as_str(),
            collection = info.is_collection,
            attributes = info.num_attributes,
            "resolved object type"
        );
        Ok(entry)
    }

    fn resolve_collection(
        &self,
        cache: &mut Cache,
        entry: &Arc<ObjectType>,
        element: Option<&DataTypeInfo>,
    ) -> Result<()> {
        let element = element.ok_or_else(|| {
            Error::Internal(format!("collection {} has no element type", entry.full_name()))
        })?;
        let element_type = self.resolve_slot(cache, element)?;
        entry.complete_collection(element_type)
    }

    fn resolve_record(&self, cache: &mut Cache, entry: &Arc<ObjectType>) -> Result<()> {
        let client = self.ctx.client.as_ref();
        let (_, type_handle) = entry.native_handle()?;
        let handles = client
            .type_attributes(type_handle)
            .map_err(|e| Error::native(format!("attributes of {}", entry.full_name()), e))?;
        // adopt every unit up front so an early return releases them all
        let handles: Vec<AttrRef> = handles
            .into_iter()
            .map(|h| AttrRef::adopt(&self.ctx, h))
            .collect();

        let mut attributes = Vec::with_capacity(handles.len());
        for (sequence, handle) in handles.into_iter().enumerate() {
            let info = client.attr_info(handle.handle()).map_err(|e| {
                Error::native(format!("describe attribute {} of {}", sequence, entry.full_name()), e)
            })?;
            let attr_type = self.resolve_slot(cache, &info.type_info)?;
            tracing::trace!(
                type_name = %entry,
                attribute = info.name.as_str(),
                sequence = sequence,
                attr_type = %attr_type,
                "resolved attribute"
            );
            attributes.push(ObjectAttribute::new(info.name, sequence, attr_type, handle));
        }
        entry.complete_record(attributes)
    }

    /// Type of an attribute or element slot
    fn resolve_slot(&self, cache: &mut Cache, info: &DataTypeInfo) -> Result<Arc<ObjectType>> {
        match info.object_type {
            // the describing handle owns this unit, take one of our own
            Some(nested) => self.resolve(cache, TypeRef::acquire(&self.ctx, nested)?),
            None => Ok(Arc::new(ObjectType::scalar(info))),
        }
    }

    /// Wrap an object handle returned by the execution layer
    ///
    /// The handle gains a reference; the caller keeps its own.
    pub fn wrap_object(&self, object_type: &Arc<ObjectType>, handle: ObjectHandle) -> Result<Object> {
        if !object_type.is_object() {
            return Err(Error::conversion(format!(
                "{} is not an object type",
                object_type.full_name()
            )));
        }
        let handle = ObjectRef::acquire(&self.ctx, handle)?;
        Ok(Object::from_parts(Arc::clone(object_type), handle, true))
    }

    /// Create an empty temporary LOB
    pub fn new_temp_lob(&self, oracle_type: OracleType) -> Result<Lob> {
        let handle = self
            .ctx
            .client
            .create_temp_lob(oracle_type)
            .map_err(|e| Error::native(format!("create temporary {}", oracle_type), e))?;
        Ok(Lob::new(LobRef::adopt(&self.ctx, handle), oracle_type))
    }

    /// Close every cached entry and empty the cache
    pub fn close(&self) -> Result<()> {
        let entries: Vec<Arc<ObjectType>> = {
            let mut cache = self.write();
            cache.drain().map(|(_, e)| e).collect()
        };
        tracing::debug!(entries = entries.len(), "closing type catalog");
        let mut first_err = None;
        for entry in entries {
            if let Err(e) = entry.close() {
                tracing::error!(type_name = %entry, error = %e, "failed to close object type");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn lookup_live(cache: &Cache, keys: &[&str]) -> Option<Arc<ObjectType>> {
    keys.iter()
        .filter_map(|k| cache.get(*k))
        .find(|e| !e.is_closed())
        .cloned()
}
