pub mod blob;
pub mod document;
pub mod memory;
pub mod postgres;

pub use blob::BlobStore;
pub use document::{DocumentStore, Filter, FilterOp, OrderBy};
pub use memory::{MemoryBlobStore, MemoryDocumentStore};
pub use postgres::{PgBlobStore, PgDocumentStore};

/// Errors surfaced by the document and blob store collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    Missing { collection: String, id: String },
    #[error("blob '{0}' not found")]
    BlobMissing(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid field name: {0}")]
    InvalidField(String),
}

impl StoreError {
    pub fn missing(collection: &str, id: &str) -> Self {
        StoreError::Missing {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}
