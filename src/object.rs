//! Domain objects synchronized with a scoped remote collection.
//!
//! Every type converts itself explicitly to and from remote document fields. The
//! provided methods go through serde and fit any struct whose identifier is an
//! `Option<String>` field; types with other layouts override them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::DeserializationError;
use crate::store::{Document, Fields};

pub const ID_FIELD: &str = "id";

pub trait DomainObject: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Store-assigned identifier; `None` until the object is persisted.
    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);

    /// Stored fields, without the identifier. `None` values count as undefined
    /// and are omitted.
    fn to_fields(&self, handle: &str) -> Result<Fields, DeserializationError> {
        let id = self.id().unwrap_or_default().to_string();
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove(ID_FIELD);
                map.retain(|_, v| !v.is_null());
                Ok(map)
            }
            Ok(other) => Err(DeserializationError::new(handle.to_string(), id, format!("expected an object, got {}", other))),
            Err(e) => Err(DeserializationError::new(handle.to_string(), id, e)),
        }
    }

    /// Rebuild an object from a remote document: stored fields plus the document id.
    fn from_document(handle: &str, doc: Document) -> Result<Self, DeserializationError> {
        let Document { id, mut fields } = doc;
        fields.remove(ID_FIELD);
        let mut obj: Self = serde_json::from_value(Value::Object(fields))
            .map_err(|e| DeserializationError::new(handle.to_string(), id.clone(), e))?;
        obj.set_id(id);
        Ok(obj)
    }

    /// Merge already-cleaned patch fields into this object. On error `self` is unchanged.
    fn apply_patch(&mut self, handle: &str, patch: &Fields) -> Result<(), DeserializationError> {
        let id = self.id().map(str::to_string);
        let mut fields = self.to_fields(handle)?;
        for (k, v) in patch.iter() {
            if k == ID_FIELD { continue; }
            fields.insert(k.clone(), v.clone());
        }
        let mut next: Self = serde_json::from_value(Value::Object(fields))
            .map_err(|e| DeserializationError::new(handle.to_string(), id.clone().unwrap_or_default(), e))?;
        if let Some(id) = id { next.set_id(id); }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Day {
        #[serde(default)]
        id: Option<String>,
        title: String,
        #[serde(default)]
        note: Option<String>,
    }

    impl DomainObject for Day {
        fn id(&self) -> Option<&str> { self.id.as_deref() }
        fn set_id(&mut self, id: String) { self.id = Some(id); }
    }

    fn fields(v: Value) -> Fields { v.as_object().cloned().unwrap() }

    #[test]
    fn to_fields_drops_id_and_undefined() {
        let d = Day { id: Some("d1".into()), title: "mon".into(), note: None };
        assert_eq!(Value::Object(d.to_fields("day").unwrap()), json!({ "title": "mon" }));
    }

    #[test]
    fn from_document_seeds_identifier() {
        let doc = Document { id: "d7".into(), fields: fields(json!({ "title": "sun", "note": "rest" })) };
        let d = Day::from_document("day", doc).unwrap();
        assert_eq!(d.id.as_deref(), Some("d7"));
        assert_eq!(d.note.as_deref(), Some("rest"));
    }

    #[test]
    fn from_document_reports_type_mismatch() {
        let doc = Document { id: "d8".into(), fields: fields(json!({ "title": 3 })) };
        let err = Day::from_document("day", doc).unwrap_err();
        assert_eq!(err.id, "d8");
        assert_eq!(err.handle, "day");
    }

    #[test]
    fn apply_patch_merges_and_keeps_id() {
        let mut d = Day { id: Some("d1".into()), title: "mon".into(), note: None };
        d.apply_patch("day", &fields(json!({ "note": "gym", "id": "other" }))).unwrap();
        assert_eq!(d, Day { id: Some("d1".into()), title: "mon".into(), note: Some("gym".into()) });

        let before = d.clone();
        assert!(d.apply_patch("day", &fields(json!({ "title": false }))).is_err());
        assert_eq!(d, before);
    }
}
