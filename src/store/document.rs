use async_trait::async_trait;
use serde_json::{Map, Value};

use super::StoreError;

/// Comparison applied by a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field value equals the given value.
    Eq,
    /// Field value is an array containing the given value.
    ArrayContains,
}

/// A single equality/containment predicate over a document field.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), op: FilterOp::Eq, value: value.into() }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), op: FilterOp::ArrayContains, value: value.into() }
    }
}

/// Single-field ordering for query results.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: false }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: true }
    }
}

/// Schemaless per-collection document database: point lookups, simple
/// equality/array-containment filters, ordered scans, and counts.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Creates or fully replaces a document.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Shallow-merges `patch` into an existing document. Fails with
    /// `StoreError::Missing` if the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Deletes a document. Deleting an absent document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>, StoreError>;

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<i64, StoreError>;
}
