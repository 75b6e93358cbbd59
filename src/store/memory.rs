use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::document::{DocumentStore, Filter, FilterOp, OrderBy};
use super::{BlobStore, StoreError};

/// In-memory document store used by unit and integration tests in place of
/// Postgres. Documents are kept per collection in insertion-id order.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(doc: &Value, filter: &Filter) -> bool {
    let field = doc.get(&filter.field);
    match filter.op {
        FilterOp::Eq => field == Some(&filter.value),
        FilterOp::ArrayContains => field
            .and_then(Value::as_array)
            .map(|arr| arr.contains(&filter.value))
            .unwrap_or(false),
    }
}

/// Total order over JSON values, close enough to JSONB ordering for the
/// fields the service sorts on (numeric timestamps, strings).
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| StoreError::missing(collection, id))?;

        if let Value::Object(fields) = doc {
            for (key, value) in patch {
                fields.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(c) = collections.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Value> = collections
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|doc| filters.iter().all(|f| matches(doc, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            docs.sort_by(|a, b| {
                let x = a.get(&order.field).unwrap_or(&Value::Null);
                let y = b.get(&order.field).unwrap_or(&Value::Null);
                let ord = cmp_values(x, y);
                if order.descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = limit {
            docs.truncate(limit.max(0) as usize);
        }

        Ok(docs)
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<i64, StoreError> {
        let collections = self.collections.read().await;
        let n = collections
            .get(collection)
            .map(|c| c.values().filter(|doc| filters.iter().all(|f| matches(doc, f))).count())
            .unwrap_or(0);
        Ok(n as i64)
    }
}

/// In-memory blob store counterpart for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: whether any bytes are stored at `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StoreError> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StoreError::BlobMissing(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}
