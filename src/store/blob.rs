use async_trait::async_trait;

use super::StoreError;

/// Key-addressed byte storage for uploaded schema files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StoreError>;

    /// Fails with `StoreError::BlobMissing` if no blob exists at `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Deleting an absent blob is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
