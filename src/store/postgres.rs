use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::{PgPool, Row};

use super::document::{DocumentStore, Filter, FilterOp, OrderBy};
use super::{BlobStore, StoreError};

/// Document store backed by a single Postgres JSONB table.
///
/// Collections are rows sharing a `collection` discriminator rather than
/// separate tables, so the store stays schemaless the way the service
/// expects.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(sqlx::Error::from)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Field names are interpolated into SQL as JSONB path literals, so only
/// plain identifiers are accepted.
fn check_field(field: &str) -> Result<(), StoreError> {
    let ok = !field.is_empty()
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidField(field.to_string()))
    }
}

fn filter_clauses(filters: &[Filter], first_arg: usize) -> Result<String, StoreError> {
    let mut sql = String::new();
    for (i, filter) in filters.iter().enumerate() {
        check_field(&filter.field)?;
        let arg = first_arg + i;
        let clause = match filter.op {
            FilterOp::Eq => format!(" AND data->'{}' = ${}", filter.field, arg),
            FilterOp::ArrayContains => format!(" AND data->'{}' @> ${}", filter.field, arg),
        };
        sql.push_str(&clause);
    }
    Ok(sql)
}

/// The bound JSONB argument for a filter: equality binds the value itself,
/// containment binds a one-element array.
fn filter_arg(filter: &Filter) -> Value {
    match filter.op {
        FilterOp::Eq => filter.value.clone(),
        FilterOp::ArrayContains => json!([filter.value]),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<Value, _>("data")))
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(collection)
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3 WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(patch))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::missing(collection, id));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut sql = String::from("SELECT data FROM documents WHERE collection = $1");
        sql.push_str(&filter_clauses(filters, 2)?);

        if let Some(order) = order {
            check_field(&order.field)?;
            let dir = if order.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY data->'{}' {}", order.field, dir));
        }
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }

        let mut query = sqlx::query(&sql).bind(collection);
        for filter in filters {
            query = query.bind(filter_arg(filter));
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| r.get::<Value, _>("data")).collect())
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<i64, StoreError> {
        let mut sql = String::from("SELECT COUNT(*) AS n FROM documents WHERE collection = $1");
        sql.push_str(&filter_clauses(filters, 2)?);

        let mut query = sqlx::query(&sql).bind(collection);
        for filter in filters {
            query = query.bind(filter_arg(filter));
        }

        let row = query.fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("n"))
    }
}

/// Blob store backed by a Postgres bytea table. Stands in for a cloud
/// object-store bucket; the workflow engine only sees the `BlobStore` trait.
#[derive(Clone)]
pub struct PgBlobStore {
    pool: PgPool,
}

impl PgBlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlobStore for PgBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO blobs (key, bytes, content_type) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET bytes = EXCLUDED.bytes, content_type = EXCLUDED.content_type",
        )
        .bind(key)
        .bind(bytes)
        .bind(content_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let row = sqlx::query("SELECT bytes FROM blobs WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(r.get::<Vec<u8>, _>("bytes")),
            None => Err(StoreError::BlobMissing(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM blobs WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
