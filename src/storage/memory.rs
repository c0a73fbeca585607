//! In-process document store.
//!
//! Collections keep insertion order so listings behave like a store that returns
//! documents in arrival order. Not durable: everything is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use super::{Document, DocumentFields, DocumentRef, DocumentStore, Fields, StoreError, StoreResult};

#[derive(Default)]
struct Collection {
    order: Vec<String>,
    docs: HashMap<String, Fields>,
}

impl Collection {
    fn upsert(&mut self, id: &str, fields: Fields) {
        if self.docs.insert(id.to_string(), fields).is_none() {
            self.order.push(id.to_string());
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &Fields)> {
        self.order.iter().filter_map(move |id| self.docs.get(id).map(|f| (id, f)))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document given as plain JSON fields.
    pub fn insert_json(&self, collection: &str, id: &str, fields: Fields) {
        let mut map = self.collections.write();
        map.entry(collection.to_string()).or_default().upsert(id, fields);
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Fields> {
        let map = self.collections.read();
        map.get(collection).and_then(|c| c.docs.get(id).cloned())
    }

    pub fn len(&self, collection: &str) -> usize {
        let map = self.collections.read();
        map.get(collection).map(|c| c.docs.len()).unwrap_or(0)
    }

    /// Load `{collection: {id: {field: value}}}` seed data; returns the number of documents loaded.
    pub fn load_seed(&self, seed: &JsonValue) -> StoreResult<usize> {
        let collections = seed
            .as_object()
            .ok_or_else(|| StoreError::Decode("seed root must be an object".to_string()))?;
        let mut loaded = 0;
        for (collection, docs) in collections {
            let docs = docs
                .as_object()
                .ok_or_else(|| StoreError::Decode(format!("seed collection {collection} must be an object")))?;
            for (id, fields) in docs {
                let fields = fields
                    .as_object()
                    .ok_or_else(|| StoreError::Decode(format!("seed document {collection}/{id} must be an object")))?;
                self.insert_json(collection, id, fields.clone());
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self, collection: &str, limit: usize) -> StoreResult<Vec<DocumentRef>> {
        let map = self.collections.read();
        Ok(map
            .get(collection)
            .map(|c| c.iter().take(limit).map(|(id, _)| DocumentRef { id: id.clone() }).collect())
            .unwrap_or_default())
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        let map = self.collections.read();
        let Some(c) = map.get(collection) else { return Ok(Vec::new()) };
        Ok(c.iter()
            .filter(|(_, f)| f.get(field).and_then(|v| v.as_str()) == Some(value))
            .take(limit)
            .map(|(id, f)| Document { id: id.clone(), fields: f.clone() })
            .collect())
    }

    async fn put_document(&self, collection: &str, id: &str, fields: DocumentFields) -> StoreResult<()> {
        let plain: Fields = fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        self.insert_json(collection, id, plain);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
