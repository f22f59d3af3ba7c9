//! JSON projection of objects and collections
//!
//! Objects become JSON objects with sorted keys and `null` for null
//! attributes; collections become arrays in ascending index order holding
//! only the indices that exist.

use std::io::{Read, Write};

use serde_json::{Map, Value as Json};

use crate::collection::ObjectCollection;
use crate::dbobject::Object;
use crate::error::{Error, Result};
use crate::value::Value;

/// JSON form of a fetched value; nested instances are closed afterwards
fn project(value: Value) -> Result<Json> {
    let json = value.to_json();
    let closed = value.close();
    let json = json?;
    closed?;
    Ok(json)
}

impl Object {
    /// Write the JSON projection to `writer`
    pub fn to_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &self.to_json_value()?)?;
        Ok(())
    }

    /// JSON projection
    pub fn to_json_value(&self) -> Result<Json> {
        let mut map = Map::new();
        for attr in self.object_type().attributes() {
            let json = project(self.get(attr.name())?)?;
            map.insert(attr.name().to_string(), json);
        }
        Ok(Json::Object(map))
    }

    /// Read a JSON object from `reader` and set the attributes it names
    pub fn from_json<R: Read>(&self, reader: R) -> Result<()> {
        let json: Json = serde_json::from_reader(reader)?;
        self.from_json_value(json)
    }

    /// Set attributes from a JSON object, building nested instances
    pub fn from_json_value(&self, json: Json) -> Result<()> {
        match Value::from(json) {
            Value::Map(map) => self.from_map(true, &map),
            other => Err(Error::conversion(format!(
                "{} needs a JSON object, got a {}",
                self.object_type(),
                other.kind()
            ))),
        }
    }
}

impl ObjectCollection {
    /// Write the JSON projection to `writer`
    pub fn to_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &self.to_json_value()?)?;
        Ok(())
    }

    /// JSON projection
    pub fn to_json_value(&self) -> Result<Json> {
        let items = self
            .indices()?
            .into_iter()
            .map(|i| self.get(i).and_then(project))
            .collect::<Result<Vec<_>>>()?;
        Ok(Json::Array(items))
    }

    /// Read a JSON array from `reader` and append its elements
    pub fn from_json<R: Read>(&self, reader: R) -> Result<()> {
        let json: Json = serde_json::from_reader(reader)?;
        self.from_json_value(json)
    }

    /// Append the elements of a JSON array
    pub fn from_json_value(&self, json: Json) -> Result<()> {
        match Value::from(json) {
            Value::List(items) => self.from_slice(&items),
            other => Err(Error::conversion(format!(
                "{} needs a JSON array, got a {}",
                self.object_type(),
                other.kind()
            ))),
        }
    }
}
