//! In-process native client
//!
//! [`MemoryClient`] keeps every native handle in an arena of reference
//! counted records. Object handles point at instances; an instance is shared
//! by the handle that created it, by the attribute or element slot that
//! embeds it, and by every dependent handle fetched from such a slot. A
//! dependent handle also holds a reference on its parent handle, so the
//! parent stays alive as long as anything fetched from it does.
//!
//! Setting an object value copies the source instance into the slot (in
//! place when the slot already holds an instance, so dependents keep seeing
//! the slot). LOBs are shared by reference.
//!
//! Types are registered up front with [`TypeDef`] and looked up by their
//! exact (case-sensitive) name, the way the data dictionary stores them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::{
    AttrHandle, AttrInfo, DataTypeInfo, LobHandle, NativeClient, NativeResult, ObjectHandle,
    ObjectTypeInfo, OracleData, TypeHandle,
};
use crate::constants::{csfrm, error_code, CollectionType, NativeType, OracleType};
use crate::error::NativeError;
use crate::types::{DATE_LENGTH, TIMESTAMP_LENGTH, TIMESTAMP_TZ_LENGTH};

// =============================================================================
// Type definitions
// =============================================================================

/// Declared type of an attribute or collection element
#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeDef {
    oracle_type: OracleType,
    size: u32,
    precision: i16,
    scale: i8,
    fs_precision: u8,
    object_type: Option<String>,
}

impl DataTypeDef {
    /// Plain declaration of the given Oracle type
    pub fn new(oracle_type: OracleType) -> Self {
        Self {
            oracle_type,
            size: 0,
            precision: 0,
            scale: 0,
            fs_precision: 0,
            object_type: None,
        }
    }

    /// VARCHAR2(size)
    pub fn varchar(size: u32) -> Self {
        Self::new(OracleType::Varchar).with_size(size)
    }

    /// NVARCHAR2(size)
    pub fn nvarchar(size: u32) -> Self {
        Self::new(OracleType::Nvarchar).with_size(size)
    }

    /// CHAR(size)
    pub fn char(size: u32) -> Self {
        Self::new(OracleType::Char).with_size(size)
    }

    /// NCHAR(size)
    pub fn nchar(size: u32) -> Self {
        Self::new(OracleType::Nchar).with_size(size)
    }

    /// RAW(size)
    pub fn raw(size: u32) -> Self {
        Self::new(OracleType::Raw).with_size(size)
    }

    /// NUMBER(precision, scale)
    pub fn number(precision: i16, scale: i8) -> Self {
        let mut def = Self::new(OracleType::Number).with_size(22);
        def.precision = precision;
        def.scale = scale;
        def
    }

    /// NUMBER without precision or scale
    pub fn unconstrained_number() -> Self {
        Self::number(0, -127)
    }

    /// BINARY_INTEGER / PLS_INTEGER
    pub fn binary_integer() -> Self {
        Self::new(OracleType::BinaryInteger)
    }

    /// BINARY_FLOAT
    pub fn binary_float() -> Self {
        Self::new(OracleType::BinaryFloat).with_size(4)
    }

    /// BINARY_DOUBLE
    pub fn binary_double() -> Self {
        Self::new(OracleType::BinaryDouble).with_size(8)
    }

    /// DATE
    pub fn date() -> Self {
        Self::new(OracleType::Date).with_size(DATE_LENGTH as u32)
    }

    /// TIMESTAMP(fs_precision)
    pub fn timestamp(fs_precision: u8) -> Self {
        let mut def = Self::new(OracleType::Timestamp).with_size(TIMESTAMP_LENGTH as u32);
        def.fs_precision = fs_precision;
        def
    }

    /// TIMESTAMP(fs_precision) WITH TIME ZONE
    pub fn timestamp_tz(fs_precision: u8) -> Self {
        let mut def = Self::new(OracleType::TimestampTz).with_size(TIMESTAMP_TZ_LENGTH as u32);
        def.fs_precision = fs_precision;
        def
    }

    /// TIMESTAMP(fs_precision) WITH LOCAL TIME ZONE
    pub fn timestamp_ltz(fs_precision: u8) -> Self {
        let mut def = Self::new(OracleType::TimestampLtz).with_size(TIMESTAMP_TZ_LENGTH as u32);
        def.fs_precision = fs_precision;
        def
    }

    /// CLOB
    pub fn clob() -> Self {
        Self::new(OracleType::Clob)
    }

    /// NCLOB
    pub fn nclob() -> Self {
        Self::new(OracleType::Nclob)
    }

    /// BLOB
    pub fn blob() -> Self {
        Self::new(OracleType::Blob)
    }

    /// BOOLEAN
    pub fn boolean() -> Self {
        Self::new(OracleType::Boolean)
    }

    /// Nested object or collection, by full name (`SCHEMA.NAME` or
    /// `SCHEMA.PACKAGE.NAME`)
    pub fn object(full_name: impl Into<String>) -> Self {
        let mut def = Self::new(OracleType::Object);
        def.object_type = Some(full_name.into());
        def
    }

    fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Oracle type of the declaration
    pub fn oracle_type(&self) -> OracleType {
        self.oracle_type
    }

    /// Native representation the client picks by default
    pub fn default_native_type(&self) -> Option<NativeType> {
        let native = match self.oracle_type {
            OracleType::Varchar
            | OracleType::Nvarchar
            | OracleType::Char
            | OracleType::Nchar
            | OracleType::Long
            | OracleType::LongNvarchar
            | OracleType::Raw
            | OracleType::LongRaw
            | OracleType::Json
            | OracleType::Vector => NativeType::Bytes,
            OracleType::Number if self.scale == 0 && self.precision > 0 => NativeType::Int64,
            OracleType::Number => NativeType::Double,
            OracleType::BinaryInteger => NativeType::Int64,
            OracleType::BinaryFloat => NativeType::Float,
            OracleType::BinaryDouble => NativeType::Double,
            OracleType::Date
            | OracleType::Timestamp
            | OracleType::TimestampTz
            | OracleType::TimestampLtz => NativeType::Timestamp,
            OracleType::IntervalDs => NativeType::IntervalDs,
            OracleType::IntervalYm => NativeType::IntervalYm,
            OracleType::Clob | OracleType::Nclob | OracleType::Blob | OracleType::Bfile => {
                NativeType::Lob
            }
            OracleType::Object => NativeType::Object,
            OracleType::Boolean => NativeType::Boolean,
            OracleType::Rowid => NativeType::Rowid,
            OracleType::Cursor => NativeType::Stmt,
        };
        Some(native)
    }

    fn type_info(&self, object_type: Option<TypeHandle>) -> DataTypeInfo {
        let (db_size, client_size, chars) = if self.oracle_type.is_character() {
            let per_char = if self.oracle_type.is_national() { 2 } else { 1 };
            (self.size * per_char, self.size * 4, self.size)
        } else {
            (self.size, self.size, 0)
        };
        DataTypeInfo {
            oracle_type: self.oracle_type,
            default_native_type: self.default_native_type(),
            db_size_in_bytes: db_size,
            client_size_in_bytes: client_size,
            size_in_chars: chars,
            precision: self.precision,
            scale: self.scale,
            fs_precision: self.fs_precision,
            object_type,
        }
    }
}

#[derive(Debug, Clone)]
enum ShapeDef {
    Record(Vec<(String, DataTypeDef)>),
    Collection {
        kind: CollectionType,
        element: DataTypeDef,
        max_size: Option<u32>,
    },
}

/// Definition of a user-defined object or collection type
#[derive(Debug, Clone)]
pub struct TypeDef {
    schema: String,
    package: Option<String>,
    name: String,
    shape: ShapeDef,
}

impl TypeDef {
    /// Record type with no attributes yet
    pub fn record(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            package: None,
            name: name.into(),
            shape: ShapeDef::Record(Vec::new()),
        }
    }

    /// Collection type of the given flavor
    pub fn collection(
        schema: impl Into<String>,
        name: impl Into<String>,
        kind: CollectionType,
        element: DataTypeDef,
    ) -> Self {
        Self {
            schema: schema.into(),
            package: None,
            name: name.into(),
            shape: ShapeDef::Collection {
                kind,
                element,
                max_size: None,
            },
        }
    }

    /// Declare the type inside a PL/SQL package
    pub fn in_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Append an attribute (records only)
    pub fn attribute(mut self, name: impl Into<String>, ty: DataTypeDef) -> Self {
        if let ShapeDef::Record(attrs) = &mut self.shape {
            attrs.push((name.into(), ty));
        }
        self
    }

    /// Limit the number of elements (VARRAY)
    pub fn max_size(mut self, size: u32) -> Self {
        if let ShapeDef::Collection { max_size, .. } = &mut self.shape {
            *max_size = Some(size);
        }
        self
    }

    /// `SCHEMA.NAME` or `SCHEMA.PACKAGE.NAME`
    pub fn full_name(&self) -> String {
        match &self.package {
            Some(pkg) => format!("{}.{}.{}", self.schema, pkg, self.name),
            None => format!("{}.{}", self.schema, self.name),
        }
    }

    fn attributes(&self) -> &[(String, DataTypeDef)] {
        match &self.shape {
            ShapeDef::Record(attrs) => attrs,
            ShapeDef::Collection { .. } => &[],
        }
    }
}

// =============================================================================
// Handle records
// =============================================================================

#[derive(Debug)]
struct TypeRecord {
    def: Arc<TypeDef>,
    refs: u32,
    element_type: Option<u64>,
}

#[derive(Debug)]
struct AttrRecord {
    def: Arc<TypeDef>,
    index: usize,
    refs: u32,
    object_type: Option<u64>,
}

#[derive(Debug)]
struct ObjectRecord {
    def: Arc<TypeDef>,
    instance: u64,
    refs: u32,
    depends_on: Option<u64>,
}

#[derive(Debug)]
struct InstanceRecord {
    refs: u32,
    data: InstanceData,
}

#[derive(Debug, Clone)]
enum InstanceData {
    Record(Vec<Option<Stored>>),
    Collection(BTreeMap<i32, Option<Stored>>),
}

#[derive(Debug, Clone)]
enum Stored {
    Scalar(OracleData),
    Instance(u64),
    Lob(u64),
}

#[derive(Debug)]
struct LobRecord {
    oracle_type: OracleType,
    data: Vec<u8>,
    refs: u32,
}

#[derive(Debug, Default)]
struct Faults {
    session_unusable: bool,
    limitation: HashSet<(String, String)>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    definitions: HashMap<String, Arc<TypeDef>>,
    types: HashMap<u64, TypeRecord>,
    attrs: HashMap<u64, AttrRecord>,
    objects: HashMap<u64, ObjectRecord>,
    instances: HashMap<u64, InstanceRecord>,
    lobs: HashMap<u64, LobRecord>,
    faults: Faults,
}

fn invalid_handle(kind: &str, id: u64, fn_name: &'static str) -> NativeError {
    NativeError::client(
        error_code::INVALID_HANDLE,
        format!("not a valid {} handle ({})", kind, id),
        fn_name,
    )
}

fn not_implemented(slot: &DataTypeDef, data: &OracleData, fn_name: &'static str) -> NativeError {
    NativeError::client(
        error_code::CONVERSION_NOT_IMPLEMENTED,
        format!(
            "conversion between Oracle type {} and {} value is not implemented",
            slot.oracle_type,
            data.kind()
        ),
        fn_name,
    )
}

fn element_missing(index: i32, fn_name: &'static str) -> NativeError {
    NativeError::oracle(
        error_code::ELEMENT_DOES_NOT_EXIST,
        format!("element at index [{}] does not exist", index),
        fn_name,
    )
}

impl State {
    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn definition(&self, full_name: &str, fn_name: &'static str) -> NativeResult<Arc<TypeDef>> {
        self.definitions.get(full_name).cloned().ok_or_else(|| {
            NativeError::oracle(
                error_code::OBJECT_DOES_NOT_EXIST,
                format!("object {} does not exist", full_name),
                fn_name,
            )
        })
    }

    fn new_type_handle(&mut self, def: Arc<TypeDef>) -> u64 {
        let id = self.alloc();
        self.types.insert(
            id,
            TypeRecord {
                def,
                refs: 1,
                element_type: None,
            },
        );
        id
    }

    fn object(&self, id: u64, fn_name: &'static str) -> NativeResult<&ObjectRecord> {
        self.objects
            .get(&id)
            .ok_or_else(|| invalid_handle("object", id, fn_name))
    }

    fn instance_mut(&mut self, id: u64, fn_name: &'static str) -> NativeResult<&mut InstanceData> {
        self.instances
            .get_mut(&id)
            .map(|i| &mut i.data)
            .ok_or_else(|| invalid_handle("instance", id, fn_name))
    }

    fn new_instance(&mut self, def: &TypeDef) -> u64 {
        let data = match &def.shape {
            ShapeDef::Record(attrs) => InstanceData::Record(vec![None; attrs.len()]),
            ShapeDef::Collection { .. } => InstanceData::Collection(BTreeMap::new()),
        };
        let id = self.alloc();
        self.instances.insert(id, InstanceRecord { refs: 1, data });
        id
    }

    fn release_type(&mut self, id: u64) {
        let Some(rec) = self.types.get_mut(&id) else {
            return;
        };
        rec.refs -= 1;
        if rec.refs == 0 {
            if let Some(owned) = self.types.remove(&id).and_then(|r| r.element_type) {
                self.release_type(owned);
            }
        }
    }

    fn release_attr(&mut self, id: u64) {
        let Some(rec) = self.attrs.get_mut(&id) else {
            return;
        };
        rec.refs -= 1;
        if rec.refs == 0 {
            if let Some(owned) = self.attrs.remove(&id).and_then(|r| r.object_type) {
                self.release_type(owned);
            }
        }
    }

    fn release_object(&mut self, id: u64) {
        let Some(rec) = self.objects.get_mut(&id) else {
            return;
        };
        rec.refs -= 1;
        if rec.refs == 0 {
            if let Some(rec) = self.objects.remove(&id) {
                self.release_instance(rec.instance);
                if let Some(parent) = rec.depends_on {
                    self.release_object(parent);
                }
            }
        }
    }

    fn release_instance(&mut self, id: u64) {
        let Some(rec) = self.instances.get_mut(&id) else {
            return;
        };
        rec.refs -= 1;
        if rec.refs == 0 {
            if let Some(rec) = self.instances.remove(&id) {
                self.release_data(rec.data);
            }
        }
    }

    fn release_data(&mut self, data: InstanceData) {
        let stored: Vec<Stored> = match data {
            InstanceData::Record(slots) => slots.into_iter().flatten().collect(),
            InstanceData::Collection(elements) => elements.into_values().flatten().collect(),
        };
        for s in stored {
            self.release_stored(s);
        }
    }

    fn release_stored(&mut self, stored: Stored) {
        match stored {
            Stored::Scalar(_) => {}
            Stored::Instance(id) => self.release_instance(id),
            Stored::Lob(id) => self.release_lob(id),
        }
    }

    fn release_lob(&mut self, id: u64) {
        let Some(rec) = self.lobs.get_mut(&id) else {
            return;
        };
        rec.refs -= 1;
        if rec.refs == 0 {
            self.lobs.remove(&id);
        }
    }

    /// Deep copy of an instance's content; nested instances are duplicated,
    /// LOBs gain a reference.
    fn copy_data(&mut self, id: u64, fn_name: &'static str) -> NativeResult<InstanceData> {
        let data = self
            .instances
            .get(&id)
            .map(|r| r.data.clone())
            .ok_or_else(|| invalid_handle("instance", id, fn_name))?;
        let copy_slot = |state: &mut State, slot: Option<Stored>| -> NativeResult<Option<Stored>> {
            Ok(match slot {
                Some(Stored::Instance(child)) => {
                    let data = state.copy_data(child, fn_name)?;
                    let new_id = state.alloc();
                    state.instances.insert(new_id, InstanceRecord { refs: 1, data });
                    Some(Stored::Instance(new_id))
                }
                Some(Stored::Lob(lob)) => {
                    if let Some(rec) = state.lobs.get_mut(&lob) {
                        rec.refs += 1;
                    }
                    Some(Stored::Lob(lob))
                }
                other => other,
            })
        };
        Ok(match data {
            InstanceData::Record(slots) => {
                let mut copied = Vec::with_capacity(slots.len());
                for slot in slots {
                    copied.push(copy_slot(self, slot)?);
                }
                InstanceData::Record(copied)
            }
            InstanceData::Collection(elements) => {
                let mut copied = BTreeMap::new();
                for (index, slot) in elements {
                    copied.insert(index, copy_slot(self, slot)?);
                }
                InstanceData::Collection(copied)
            }
        })
    }

    fn check_value(&self, slot: &DataTypeDef, data: &OracleData, fn_name: &'static str) -> NativeResult<()> {
        let ot = slot.oracle_type;
        let ok = match data {
            OracleData::Text { bytes, csfrm: form } => {
                let wanted = if ot.is_national() { csfrm::NCHAR } else { csfrm::IMPLICIT };
                if (ot.is_character() || matches!(ot, OracleType::Long | OracleType::LongNvarchar))
                    && *form == wanted
                {
                    let chars = std::str::from_utf8(bytes)
                        .map(|s| s.chars().count())
                        .unwrap_or(bytes.len());
                    if slot.size > 0 && chars > slot.size as usize {
                        return Err(NativeError::oracle(
                            6502,
                            "PL/SQL: numeric or value error: character string buffer too small",
                            fn_name,
                        ));
                    }
                    true
                } else {
                    false
                }
            }
            OracleData::Raw(bytes) => {
                if slot.size > 0 && ot == OracleType::Raw && bytes.len() > slot.size as usize {
                    return Err(NativeError::oracle(
                        6502,
                        "PL/SQL: numeric or value error: raw variable length too long",
                        fn_name,
                    ));
                }
                matches!(ot, OracleType::Raw | OracleType::LongRaw)
            }
            OracleData::Integer(_) => ot == OracleType::BinaryInteger,
            OracleData::Float(_) => ot == OracleType::BinaryFloat,
            OracleData::Double(_) => ot == OracleType::BinaryDouble,
            OracleData::Number(_) => ot == OracleType::Number,
            OracleData::Datetime(bytes) => match ot {
                OracleType::Date => bytes.len() == DATE_LENGTH,
                OracleType::Timestamp => bytes.len() == TIMESTAMP_LENGTH,
                OracleType::TimestampTz | OracleType::TimestampLtz => {
                    bytes.len() == TIMESTAMP_TZ_LENGTH
                }
                _ => false,
            },
            OracleData::Boolean(_) => ot == OracleType::Boolean,
            OracleData::Object(h) => {
                let rec = self.object(h.0, fn_name)?;
                let actual = rec.def.full_name();
                match &slot.object_type {
                    Some(expected) if *expected == actual => true,
                    Some(expected) => {
                        return Err(NativeError::client(
                            1056,
                            format!("object type {} is not {}", actual, expected),
                            fn_name,
                        ))
                    }
                    None => false,
                }
            }
            OracleData::Lob(h) => {
                let rec = self
                    .lobs
                    .get(&h.0)
                    .ok_or_else(|| invalid_handle("LOB", h.0, fn_name))?;
                rec.oracle_type == ot
            }
        };
        if ok {
            Ok(())
        } else {
            Err(not_implemented(slot, data, fn_name))
        }
    }

    /// Build the stored form of `value` for a slot currently holding
    /// `existing`; the previous content is released.
    fn store(
        &mut self,
        slot: &DataTypeDef,
        value: Option<&OracleData>,
        existing: Option<Stored>,
        fn_name: &'static str,
    ) -> NativeResult<Option<Stored>> {
        if let Some(data) = value {
            self.check_value(slot, data, fn_name)?;
        }
        let new = match value {
            None => None,
            Some(OracleData::Object(h)) => {
                let source = self.object(h.0, fn_name)?.instance;
                let data = self.copy_data(source, fn_name)?;
                match existing {
                    Some(Stored::Instance(target)) => {
                        let old = std::mem::replace(self.instance_mut(target, fn_name)?, data);
                        self.release_data(old);
                        return Ok(Some(Stored::Instance(target)));
                    }
                    _ => {
                        let id = self.alloc();
                        self.instances.insert(id, InstanceRecord { refs: 1, data });
                        Some(Stored::Instance(id))
                    }
                }
            }
            Some(OracleData::Lob(h)) => {
                if let Some(rec) = self.lobs.get_mut(&h.0) {
                    rec.refs += 1;
                }
                Some(Stored::Lob(h.0))
            }
            Some(scalar) => Some(Stored::Scalar(scalar.clone())),
        };
        if let Some(old) = existing {
            self.release_stored(old);
        }
        Ok(new)
    }

    /// Hand out a stored value; nested instances come back as dependent
    /// handles of `parent`.
    fn fetch(
        &mut self,
        slot: &DataTypeDef,
        stored: Option<Stored>,
        parent: u64,
        fn_name: &'static str,
    ) -> NativeResult<Option<OracleData>> {
        Ok(match stored {
            None => None,
            Some(Stored::Scalar(data)) => Some(data),
            Some(Stored::Lob(id)) => {
                let rec = self
                    .lobs
                    .get_mut(&id)
                    .ok_or_else(|| invalid_handle("LOB", id, fn_name))?;
                rec.refs += 1;
                Some(OracleData::Lob(LobHandle(id)))
            }
            Some(Stored::Instance(instance)) => {
                let name = slot.object_type.as_deref().unwrap_or_default();
                let def = self.definition(name, fn_name)?;
                if let Some(rec) = self.instances.get_mut(&instance) {
                    rec.refs += 1;
                }
                if let Some(rec) = self.objects.get_mut(&parent) {
                    rec.refs += 1;
                }
                let id = self.alloc();
                self.objects.insert(
                    id,
                    ObjectRecord {
                        def,
                        instance,
                        refs: 1,
                        depends_on: Some(parent),
                    },
                );
                Some(OracleData::Object(ObjectHandle(id)))
            }
        })
    }

    fn collection_parts(
        &self,
        obj: ObjectHandle,
        fn_name: &'static str,
    ) -> NativeResult<(u64, CollectionType, DataTypeDef, Option<u32>)> {
        let rec = self.object(obj.0, fn_name)?;
        match &rec.def.shape {
            ShapeDef::Collection {
                kind,
                element,
                max_size,
            } => Ok((rec.instance, *kind, element.clone(), *max_size)),
            ShapeDef::Record(_) => Err(NativeError::client(
                1023,
                format!("object {} is not a collection", rec.def.full_name()),
                fn_name,
            )),
        }
    }

    fn elements(&self, instance: u64, fn_name: &'static str) -> NativeResult<&BTreeMap<i32, Option<Stored>>> {
        match self.instances.get(&instance).map(|r| &r.data) {
            Some(InstanceData::Collection(elements)) => Ok(elements),
            _ => Err(invalid_handle("collection instance", instance, fn_name)),
        }
    }

    fn elements_mut(
        &mut self,
        instance: u64,
        fn_name: &'static str,
    ) -> NativeResult<&mut BTreeMap<i32, Option<Stored>>> {
        match self.instance_mut(instance, fn_name)? {
            InstanceData::Collection(elements) => Ok(elements),
            InstanceData::Record(_) => Err(invalid_handle("collection instance", instance, fn_name)),
        }
    }
}

// =============================================================================
// MemoryClient
// =============================================================================

/// Native client that keeps types, objects and LOBs in process memory
#[derive(Debug)]
pub struct MemoryClient {
    default_schema: String,
    state: Mutex<State>,
    connected: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryClient {
    /// Create an empty client; unqualified names resolve in `default_schema`
    pub fn new(default_schema: impl Into<String>) -> Self {
        Self {
            default_schema: default_schema.into(),
            state: Mutex::new(State::default()),
            connected: AtomicBool::new(true),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Register a type (builder form)
    pub fn with_type(self, def: TypeDef) -> Self {
        self.define(def);
        self
    }

    /// Register or replace a type
    pub fn define(&self, def: TypeDef) {
        let key = def.full_name();
        self.state().definitions.insert(key, Arc::new(def));
    }

    /// Schema used for unqualified names
    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Number of `get_object_type` calls served
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of live object handles
    pub fn live_objects(&self) -> usize {
        self.state().objects.len()
    }

    /// Number of live object instances (including embedded ones)
    pub fn live_instances(&self) -> usize {
        self.state().instances.len()
    }

    /// Number of live type and attribute handles
    pub fn live_type_handles(&self) -> usize {
        let state = self.state();
        state.types.len() + state.attrs.len()
    }

    /// Number of live LOBs
    pub fn live_lobs(&self) -> usize {
        self.state().lobs.len()
    }

    /// Reference count of an object handle, `None` once released
    pub fn object_refs(&self, obj: ObjectHandle) -> Option<u32> {
        self.state().objects.get(&obj.0).map(|r| r.refs)
    }

    /// Reference count of a type handle, `None` once released
    pub fn type_refs(&self, ty: TypeHandle) -> Option<u32> {
        self.state().types.get(&ty.0).map(|r| r.refs)
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Mark the session as gone
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Mark the session as usable again
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Make type lookups fail the way an unusable session does
    pub fn fail_lookups_with_session_error(&self, fail: bool) {
        self.state().faults.session_unusable = fail;
    }

    /// Make setting `attribute` on `type_full_name` fail with ORA-21602
    pub fn fail_set_attribute(&self, type_full_name: impl Into<String>, attribute: impl Into<String>) {
        self.state()
            .faults
            .limitation
            .insert((type_full_name.into(), attribute.into()));
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        self.state().faults = Faults::default();
    }

    fn candidates(&self, name: &str) -> Vec<String> {
        let parts: Vec<&str> = name.split('.').map(|p| p.trim_matches('"')).collect();
        match parts.as_slice() {
            [n] => vec![format!("{}.{}", self.default_schema, n)],
            [a, b] => vec![
                format!("{}.{}", a, b),
                format!("{}.{}.{}", self.default_schema, a, b),
            ],
            [a, b, c] => vec![format!("{}.{}.{}", a, b, c)],
            _ => Vec::new(),
        }
    }
}

impl NativeClient for MemoryClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_object_type(&self, name: &str) -> NativeResult<TypeHandle> {
        const FN: &str = "dpiConn_getObjectType";
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.is_connected() {
            return Err(NativeError::client(error_code::NOT_CONNECTED, "not connected", FN));
        }
        let mut state = self.state();
        if state.faults.session_unusable {
            return Err(NativeError::unexpected_oci_return(
                error_code::OCI_TYPE_FETCH_STATUS,
                FN,
            ));
        }
        let def = self
            .candidates(name)
            .iter()
            .find_map(|key| state.definitions.get(key).cloned())
            .ok_or_else(|| {
                NativeError::oracle(
                    error_code::OBJECT_DOES_NOT_EXIST,
                    format!("object {} does not exist", name),
                    FN,
                )
            })?;
        Ok(TypeHandle(state.new_type_handle(def)))
    }

    fn type_info(&self, ty: TypeHandle) -> NativeResult<ObjectTypeInfo> {
        const FN: &str = "dpiObjectType_getInfo";
        let mut state = self.state();
        let rec = state
            .types
            .get(&ty.0)
            .ok_or_else(|| invalid_handle("object type", ty.0, FN))?;
        let def = rec.def.clone();
        let mut owned = rec.element_type;

        let (collection_type, element_type_info) = match &def.shape {
            ShapeDef::Record(_) => (None, None),
            ShapeDef::Collection { kind, element, .. } => {
                if let (None, Some(name)) = (owned, &element.object_type) {
                    let element_def = state.definition(name, FN)?;
                    let id = state.new_type_handle(element_def);
                    if let Some(rec) = state.types.get_mut(&ty.0) {
                        rec.element_type = Some(id);
                    }
                    owned = Some(id);
                }
                (Some(*kind), Some(element.type_info(owned.map(TypeHandle))))
            }
        };

        Ok(ObjectTypeInfo {
            schema: def.schema.clone(),
            name: def.name.clone(),
            package_name: def.package.clone().unwrap_or_default(),
            is_collection: collection_type.is_some(),
            collection_type,
            element_type_info,
            num_attributes: def.attributes().len() as u16,
        })
    }

    fn type_attributes(&self, ty: TypeHandle) -> NativeResult<Vec<AttrHandle>> {
        const FN: &str = "dpiObjectType_getAttributes";
        let mut state = self.state();
        let def = state
            .types
            .get(&ty.0)
            .map(|r| r.def.clone())
            .ok_or_else(|| invalid_handle("object type", ty.0, FN))?;
        let mut handles = Vec::with_capacity(def.attributes().len());
        for index in 0..def.attributes().len() {
            let id = state.alloc();
            state.attrs.insert(
                id,
                AttrRecord {
                    def: def.clone(),
                    index,
                    refs: 1,
                    object_type: None,
                },
            );
            handles.push(AttrHandle(id));
        }
        Ok(handles)
    }

    fn attr_info(&self, attr: AttrHandle) -> NativeResult<AttrInfo> {
        const FN: &str = "dpiObjectAttr_getInfo";
        let mut state = self.state();
        let rec = state
            .attrs
            .get(&attr.0)
            .ok_or_else(|| invalid_handle("attribute", attr.0, FN))?;
        let (name, ty) = rec.def.attributes()[rec.index].clone();
        let mut owned = rec.object_type;
        if let (None, Some(type_name)) = (owned, &ty.object_type) {
            let def = state.definition(type_name, FN)?;
            let id = state.new_type_handle(def);
            if let Some(rec) = state.attrs.get_mut(&attr.0) {
                rec.object_type = Some(id);
            }
            owned = Some(id);
        }
        Ok(AttrInfo {
            name,
            type_info: ty.type_info(owned.map(TypeHandle)),
        })
    }

    fn type_add_ref(&self, ty: TypeHandle) -> NativeResult<()> {
        let mut state = self.state();
        let rec = state
            .types
            .get_mut(&ty.0)
            .ok_or_else(|| invalid_handle("object type", ty.0, "dpiObjectType_addRef"))?;
        rec.refs += 1;
        Ok(())
    }

    fn type_release(&self, ty: TypeHandle) -> NativeResult<()> {
        let mut state = self.state();
        if !state.types.contains_key(&ty.0) {
            return Err(invalid_handle("object type", ty.0, "dpiObjectType_release"));
        }
        state.release_type(ty.0);
        Ok(())
    }

    fn attr_add_ref(&self, attr: AttrHandle) -> NativeResult<()> {
        let mut state = self.state();
        let rec = state
            .attrs
            .get_mut(&attr.0)
            .ok_or_else(|| invalid_handle("attribute", attr.0, "dpiObjectAttr_addRef"))?;
        rec.refs += 1;
        Ok(())
    }

    fn attr_release(&self, attr: AttrHandle) -> NativeResult<()> {
        let mut state = self.state();
        if !state.attrs.contains_key(&attr.0) {
            return Err(invalid_handle("attribute", attr.0, "dpiObjectAttr_release"));
        }
        state.release_attr(attr.0);
        Ok(())
    }

    fn create_object(&self, ty: TypeHandle) -> NativeResult<ObjectHandle> {
        const FN: &str = "dpiObjectType_createObject";
        let mut state = self.state();
        let def = state
            .types
            .get(&ty.0)
            .map(|r| r.def.clone())
            .ok_or_else(|| invalid_handle("object type", ty.0, FN))?;
        let instance = state.new_instance(&def);
        let id = state.alloc();
        state.objects.insert(
            id,
            ObjectRecord {
                def,
                instance,
                refs: 1,
                depends_on: None,
            },
        );
        Ok(ObjectHandle(id))
    }

    fn object_add_ref(&self, obj: ObjectHandle) -> NativeResult<()> {
        let mut state = self.state();
        let rec = state
            .objects
            .get_mut(&obj.0)
            .ok_or_else(|| invalid_handle("object", obj.0, "dpiObject_addRef"))?;
        rec.refs += 1;
        Ok(())
    }

    fn object_release(&self, obj: ObjectHandle) -> NativeResult<()> {
        let mut state = self.state();
        if !state.objects.contains_key(&obj.0) {
            return Err(invalid_handle("object", obj.0, "dpiObject_release"));
        }
        state.release_object(obj.0);
        Ok(())
    }

    fn get_attribute(&self, obj: ObjectHandle, attr: AttrHandle) -> NativeResult<Option<OracleData>> {
        const FN: &str = "dpiObject_getAttributeValue";
        let mut state = self.state();
        let (instance, index, slot) = attribute_slot(&state, obj, attr, FN)?;
        let stored = match state.instances.get(&instance).map(|r| &r.data) {
            Some(InstanceData::Record(slots)) => slots.get(index).cloned().flatten(),
            _ => return Err(invalid_handle("instance", instance, FN)),
        };
        state.fetch(&slot, stored, obj.0, FN)
    }

    fn set_attribute(
        &self,
        obj: ObjectHandle,
        attr: AttrHandle,
        value: Option<&OracleData>,
    ) -> NativeResult<()> {
        const FN: &str = "dpiObject_setAttributeValue";
        let mut state = self.state();
        let (instance, index, slot) = attribute_slot(&state, obj, attr, FN)?;
        let type_name = state.object(obj.0, FN)?.def.full_name();
        if state
            .faults
            .limitation
            .contains(&(type_name, attr_name(&state, attr)))
        {
            return Err(NativeError::oracle(
                error_code::UNSUPPORTED_TYPECODE,
                "operation does not support the specified typecode",
                FN,
            ));
        }
        let existing = match state.instance_mut(instance, FN)? {
            InstanceData::Record(slots) => slots.get_mut(index).and_then(Option::take),
            InstanceData::Collection(_) => return Err(invalid_handle("instance", instance, FN)),
        };
        let stored = match state.store(&slot, value, existing.clone(), FN) {
            Ok(stored) => stored,
            Err(e) => {
                // put the previous value back untouched
                if let InstanceData::Record(slots) = state.instance_mut(instance, FN)? {
                    slots[index] = existing;
                }
                return Err(e);
            }
        };
        if let InstanceData::Record(slots) = state.instance_mut(instance, FN)? {
            slots[index] = stored;
        }
        Ok(())
    }

    fn collection_size(&self, obj: ObjectHandle) -> NativeResult<i32> {
        const FN: &str = "dpiObject_getSize";
        let state = self.state();
        let (instance, ..) = state.collection_parts(obj, FN)?;
        Ok(state.elements(instance, FN)?.len() as i32)
    }

    fn first_index(&self, obj: ObjectHandle) -> NativeResult<Option<i32>> {
        const FN: &str = "dpiObject_getFirstIndex";
        let state = self.state();
        let (instance, ..) = state.collection_parts(obj, FN)?;
        Ok(state.elements(instance, FN)?.keys().next().copied())
    }

    fn last_index(&self, obj: ObjectHandle) -> NativeResult<Option<i32>> {
        const FN: &str = "dpiObject_getLastIndex";
        let state = self.state();
        let (instance, ..) = state.collection_parts(obj, FN)?;
        Ok(state.elements(instance, FN)?.keys().next_back().copied())
    }

    fn next_index(&self, obj: ObjectHandle, index: i32) -> NativeResult<Option<i32>> {
        const FN: &str = "dpiObject_getNextIndex";
        let state = self.state();
        let (instance, ..) = state.collection_parts(obj, FN)?;
        if index == i32::MAX {
            return Ok(None);
        }
        Ok(state
            .elements(instance, FN)?
            .range(index + 1..)
            .next()
            .map(|(i, _)| *i))
    }

    fn prev_index(&self, obj: ObjectHandle, index: i32) -> NativeResult<Option<i32>> {
        const FN: &str = "dpiObject_getPrevIndex";
        let state = self.state();
        let (instance, ..) = state.collection_parts(obj, FN)?;
        Ok(state
            .elements(instance, FN)?
            .range(..index)
            .next_back()
            .map(|(i, _)| *i))
    }

    fn element_exists(&self, obj: ObjectHandle, index: i32) -> NativeResult<bool> {
        const FN: &str = "dpiObject_getElementExistsByIndex";
        let state = self.state();
        let (instance, ..) = state.collection_parts(obj, FN)?;
        Ok(state.elements(instance, FN)?.contains_key(&index))
    }

    fn get_element(&self, obj: ObjectHandle, index: i32) -> NativeResult<Option<OracleData>> {
        const FN: &str = "dpiObject_getElementValueByIndex";
        let mut state = self.state();
        let (instance, _, element, _) = state.collection_parts(obj, FN)?;
        let stored = state
            .elements(instance, FN)?
            .get(&index)
            .cloned()
            .ok_or_else(|| element_missing(index, FN))?;
        state.fetch(&element, stored, obj.0, FN)
    }

    fn set_element(&self, obj: ObjectHandle, index: i32, value: Option<&OracleData>) -> NativeResult<()> {
        const FN: &str = "dpiObject_setElementValueByIndex";
        let mut state = self.state();
        let (instance, kind, element, _) = state.collection_parts(obj, FN)?;
        let elements = state.elements_mut(instance, FN)?;
        let existing = match elements.get_mut(&index) {
            Some(slot) => slot.take(),
            None => {
                let high_water = elements.keys().next_back().map_or(0, |last| *last + 1);
                if !kind.allows_arbitrary_index() && !(0..high_water).contains(&index) {
                    return Err(NativeError::oracle(
                        error_code::INDEX_OUT_OF_RANGE,
                        format!(
                            "given index [{}] must be in the range of [0] to [{}]",
                            index,
                            high_water - 1
                        ),
                        FN,
                    ));
                }
                None
            }
        };
        let stored = match state.store(&element, value, existing.clone(), FN) {
            Ok(stored) => stored,
            Err(e) => {
                if existing.is_some() {
                    state.elements_mut(instance, FN)?.insert(index, existing);
                }
                return Err(e);
            }
        };
        state.elements_mut(instance, FN)?.insert(index, stored);
        Ok(())
    }

    fn append_element(&self, obj: ObjectHandle, value: Option<&OracleData>) -> NativeResult<()> {
        const FN: &str = "dpiObject_appendElement";
        let mut state = self.state();
        let (instance, _, element, max_size) = state.collection_parts(obj, FN)?;
        let elements = state.elements(instance, FN)?;
        let index = elements.keys().next_back().map_or(0, |last| *last + 1);
        if let Some(max) = max_size {
            if elements.len() as u32 >= max {
                return Err(NativeError::oracle(
                    error_code::INDEX_OUT_OF_RANGE,
                    format!("given index [{}] must be in the range of [0] to [{}]", index, max - 1),
                    FN,
                ));
            }
        }
        let stored = state.store(&element, value, None, FN)?;
        state.elements_mut(instance, FN)?.insert(index, stored);
        Ok(())
    }

    fn delete_element(&self, obj: ObjectHandle, index: i32) -> NativeResult<()> {
        const FN: &str = "dpiObject_deleteElementByIndex";
        let mut state = self.state();
        let (instance, kind, ..) = state.collection_parts(obj, FN)?;
        if kind == CollectionType::Varray {
            return Err(NativeError::client(
                error_code::INVALID_INDEX,
                "elements cannot be deleted from a VARRAY",
                FN,
            ));
        }
        let removed = state
            .elements_mut(instance, FN)?
            .remove(&index)
            .ok_or_else(|| element_missing(index, FN))?;
        if let Some(stored) = removed {
            state.release_stored(stored);
        }
        Ok(())
    }

    fn trim(&self, obj: ObjectHandle, count: u32) -> NativeResult<()> {
        const FN: &str = "dpiObject_trim";
        let mut state = self.state();
        let (instance, ..) = state.collection_parts(obj, FN)?;
        let elements = state.elements_mut(instance, FN)?;
        if count as usize > elements.len() {
            return Err(NativeError::oracle(
                error_code::TRIM_TOO_LARGE,
                format!(
                    "given trim size [{}] must be less than or equal to [{}]",
                    count,
                    elements.len()
                ),
                FN,
            ));
        }
        let mut removed = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if let Some((_, slot)) = elements.pop_last() {
                removed.extend(slot);
            }
        }
        for stored in removed {
            state.release_stored(stored);
        }
        Ok(())
    }

    fn create_temp_lob(&self, oracle_type: OracleType) -> NativeResult<LobHandle> {
        const FN: &str = "dpiConn_newTempLob";
        if !oracle_type.is_lob() || oracle_type == OracleType::Bfile {
            return Err(NativeError::client(
                1021,
                format!("Oracle type {} is invalid", oracle_type),
                FN,
            ));
        }
        let mut state = self.state();
        let id = state.alloc();
        state.lobs.insert(
            id,
            LobRecord {
                oracle_type,
                data: Vec::new(),
                refs: 1,
            },
        );
        Ok(LobHandle(id))
    }

    fn lob_add_ref(&self, lob: LobHandle) -> NativeResult<()> {
        let mut state = self.state();
        let rec = state
            .lobs
            .get_mut(&lob.0)
            .ok_or_else(|| invalid_handle("LOB", lob.0, "dpiLob_addRef"))?;
        rec.refs += 1;
        Ok(())
    }

    fn lob_release(&self, lob: LobHandle) -> NativeResult<()> {
        let mut state = self.state();
        if !state.lobs.contains_key(&lob.0) {
            return Err(invalid_handle("LOB", lob.0, "dpiLob_release"));
        }
        state.release_lob(lob.0);
        Ok(())
    }

    fn lob_size(&self, lob: LobHandle) -> NativeResult<u64> {
        let state = self.state();
        state
            .lobs
            .get(&lob.0)
            .map(|r| r.data.len() as u64)
            .ok_or_else(|| invalid_handle("LOB", lob.0, "dpiLob_getSize"))
    }

    fn lob_read_all(&self, lob: LobHandle) -> NativeResult<Bytes> {
        let state = self.state();
        state
            .lobs
            .get(&lob.0)
            .map(|r| Bytes::copy_from_slice(&r.data))
            .ok_or_else(|| invalid_handle("LOB", lob.0, "dpiLob_readBytes"))
    }

    fn lob_set_from_bytes(&self, lob: LobHandle, data: &[u8]) -> NativeResult<()> {
        let mut state = self.state();
        let rec = state
            .lobs
            .get_mut(&lob.0)
            .ok_or_else(|| invalid_handle("LOB", lob.0, "dpiLob_setFromBytes"))?;
        rec.data = data.to_vec();
        Ok(())
    }

    fn lob_write(&self, lob: LobHandle, offset: u64, data: &[u8]) -> NativeResult<()> {
        let mut state = self.state();
        let rec = state
            .lobs
            .get_mut(&lob.0)
            .ok_or_else(|| invalid_handle("LOB", lob.0, "dpiLob_writeBytes"))?;
        let start = offset as usize;
        let end = start + data.len();
        if rec.data.len() < end {
            rec.data.resize(end, 0);
        }
        rec.data[start..end].copy_from_slice(data);
        Ok(())
    }
}

fn attribute_slot(
    state: &State,
    obj: ObjectHandle,
    attr: AttrHandle,
    fn_name: &'static str,
) -> NativeResult<(u64, usize, DataTypeDef)> {
    let object = state.object(obj.0, fn_name)?;
    let attribute = state
        .attrs
        .get(&attr.0)
        .ok_or_else(|| invalid_handle("attribute", attr.0, fn_name))?;
    if !Arc::ptr_eq(&object.def, &attribute.def) && object.def.full_name() != attribute.def.full_name() {
        return Err(NativeError::client(
            1022,
            format!(
                "attribute of {} does not belong to object type {}",
                attribute.def.full_name(),
                object.def.full_name()
            ),
            fn_name,
        ));
    }
    let slot = attribute.def.attributes()[attribute.index].1.clone();
    Ok((object.instance, attribute.index, slot))
}

fn attr_name(state: &State, attr: AttrHandle) -> String {
    state
        .attrs
        .get(&attr.0)
        .map(|a| a.def.attributes()[a.index].0.clone())
        .unwrap_or_default()
}
