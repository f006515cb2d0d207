//! Sandbox
//!
//! Buffered edits to one JSON object stored under a single key.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use super::Client;

/// A local copy of a collection, written back on `commit`
#[derive(Debug, Clone, PartialEq)]
pub struct Sandbox {
    name: String,
    values: Map<String, Value>,
}

impl Sandbox {
    pub(crate) fn new(name: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Key the collection is stored under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Fetch a field and decode it into `T`
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>> {
        match self.values.get(field) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) -> Result<()> {
        self.values.insert(field.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Write the whole collection back through `client`
    pub fn commit(&self, client: &mut Client) -> Result<()> {
        tracing::debug!("Sandbox '{}' is now propagating changes to the database", self.name);
        client.write(&self.name, &self.values)
    }
}
