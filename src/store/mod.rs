//! Remote document store boundary and the scoped CRUD built on it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::RemoteError;

pub mod memory;
pub mod scoped;

pub use memory::{MemoryRemoteStore, StoreOp};
pub use scoped::CollectionScope;

/// Stored fields of a remote document.
pub type Fields = serde_json::Map<String, Value>;

/// A remote document as listed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Path-addressed document operations. `collection` paths look like
/// `users/u1/posts`, `document` paths like `users/u1/posts/p1`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, RemoteError>;

    /// Create a document and return the identifier the store assigned.
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, RemoteError>;

    /// Partial update: only the given fields are written.
    async fn update(&self, document: &str, fields: Fields) -> Result<(), RemoteError>;

    async fn delete(&self, document: &str) -> Result<(), RemoteError>;
}

/// Property set for a partial update. An entry may be undefined (`None`); those
/// are dropped before anything is sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    entries: BTreeMap<String, Option<Value>>,
}

impl Patch {
    pub fn new() -> Self { Self::default() }

    pub fn set<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.entries.insert(key.into(), Some(value.into()));
        self
    }

    /// `None` leaves the field untouched.
    pub fn maybe<K: Into<String>, V: Into<Value>>(mut self, key: K, value: Option<V>) -> Self {
        self.entries.insert(key.into(), value.map(Into::into));
        self
    }

    pub fn from_fields(fields: Fields) -> Self {
        Self { entries: fields.into_iter().map(|(k, v)| (k, Some(v))).collect() }
    }

    /// Build from any serializable partial object; it must serialize to a map.
    pub fn from_serialize<T: Serialize>(partial: &T) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(partial)? {
            Value::Object(map) => Ok(Self::from_fields(map)),
            other => Err(serde::ser::Error::custom(format!("patch must be an object, got {}", other))),
        }
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Defined entries only.
    pub fn cleaned(&self) -> Fields {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cleaned_strips_undefined_but_keeps_null() {
        let p = Patch::new().set("x", 5).maybe::<_, i64>("y", None).set("z", Value::Null);
        assert_eq!(p.len(), 3);
        assert_eq!(Value::Object(p.cleaned()), json!({ "x": 5, "z": null }));
    }

    #[test]
    fn from_serialize_rejects_scalars() {
        assert!(Patch::from_serialize(&7).is_err());
        #[derive(Serialize)]
        struct Partial { #[serde(skip_serializing_if = "Option::is_none")] title: Option<String>, done: bool }
        let p = Patch::from_serialize(&Partial { title: None, done: true }).unwrap();
        assert_eq!(Value::Object(p.cleaned()), json!({ "done": true }));
    }
}
