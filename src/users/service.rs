use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::store::{DocumentStore, Filter, StoreError};

use super::model::{User, UserCreate, UserUpdate};

pub const USERS: &str = "users";

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Thin CRUD over the users collection. One document per user, keyed by the
/// verifier's subject id.
pub struct UserService {
    documents: Arc<dyn DocumentStore>,
}

fn to_doc<T: serde::Serialize>(value: &T) -> Result<Value, UserError> {
    serde_json::to_value(value).map_err(|e| UserError::Store(StoreError::Serialization(e)))
}

fn from_doc(doc: Value) -> Result<User, UserError> {
    serde_json::from_value(doc).map_err(|e| UserError::Store(StoreError::Serialization(e)))
}

impl UserService {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn create(&self, uid: &str, request: UserCreate) -> Result<User, UserError> {
        let timestamp = Utc::now().timestamp();
        let search_name =
            format!("{} {}", request.first_name.to_lowercase(), request.last_name.to_lowercase())
                .trim()
                .to_string();

        let user = User {
            uuid: uid.to_string(),
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            photo_url: None,
            account_type: request.account_type,
            organization_name: request.organization_name,
            search_name,
            created_at: timestamp,
            updated_at: Some(timestamp),
            subscription: Default::default(),
        };

        self.documents.set(USERS, uid, to_doc(&user)?).await?;
        Ok(user)
    }

    pub async fn get(&self, uid: &str) -> Result<User, UserError> {
        let doc = self.documents.get(USERS, uid).await?.ok_or(UserError::NotFound)?;
        from_doc(doc)
    }

    pub async fn update(&self, uid: &str, update: UserUpdate) -> Result<User, UserError> {
        let mut patch = Map::new();
        if let Some(first_name) = &update.first_name {
            patch.insert("first_name".to_string(), Value::String(first_name.clone()));
        }
        if let Some(last_name) = &update.last_name {
            patch.insert("last_name".to_string(), Value::String(last_name.clone()));
        }
        if let Some(photo_url) = &update.photo_url {
            patch.insert("photo_url".to_string(), Value::String(photo_url.clone()));
        }
        if let Some(email) = &update.email {
            patch.insert("email".to_string(), Value::String(email.clone()));
        }
        if let Some(subscription) = &update.subscription {
            patch.insert("subscription".to_string(), to_doc(subscription)?);
        }

        // Keep search_name in sync when either name part changes
        if update.first_name.is_some() || update.last_name.is_some() {
            let current = self.get(uid).await?;
            let first = update.first_name.as_deref().unwrap_or(&current.first_name);
            let last = update.last_name.as_deref().unwrap_or(&current.last_name);
            let search_name =
                format!("{} {}", first.to_lowercase(), last.to_lowercase()).trim().to_string();
            patch.insert("search_name".to_string(), Value::String(search_name));
        }

        patch.insert("updated_at".to_string(), Value::from(Utc::now().timestamp()));

        match self.documents.update(USERS, uid, patch).await {
            Ok(()) => self.get(uid).await,
            Err(StoreError::Missing { .. }) => Err(UserError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, uid: &str) -> Result<(), UserError> {
        self.documents.delete(USERS, uid).await?;
        Ok(())
    }

    /// Email-existence check backing the public signup probe. The email is
    /// lowercased and trimmed before comparison.
    pub async fn exists_by_email(&self, email: &str) -> Result<bool, UserError> {
        let email = email.to_lowercase().trim().to_string();
        let n = self.documents.count(USERS, &[Filter::eq("email", email)]).await?;
        Ok(n > 0)
    }
}
