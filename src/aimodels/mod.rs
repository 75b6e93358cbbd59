use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::{DocumentStore, StoreError};

pub const AIMODELS: &str = "aimodels";

/// A model offered to projects for assisted test generation. Catalog rows
/// are seeded out of band; this service only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub model_id: String,
    pub is_free: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

pub struct AiModelService {
    documents: Arc<dyn DocumentStore>,
}

impl AiModelService {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn list(&self) -> Result<Vec<AiModel>, StoreError> {
        let docs = self.documents.query(AIMODELS, &[], None, None).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::Serialization))
            .collect()
    }
}
