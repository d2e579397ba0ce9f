//! Database Connection Pool Module
//!
//! This module provides PostgreSQL connection pooling using deadpool-postgres
//! and [`PgDocumentStore`], the durable [`DocumentStore`] behind the API.
//!
//! Every collection shares one table. A document's fields are stored as a
//! JSONB object next to its collection and id:
//!
//! ```sql
//! wharf_documents(collection TEXT, id TEXT, fields JSONB, inserted_at TIMESTAMPTZ)
//! ```

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use wharf_core::{
    Collection, Document, Fields, Filter, Record, RecordId, StorageError, WharfResult,
};
use wharf_storage::DocumentStore;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connect, wait, create and recycle timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "wharf".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("WHARF_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("WHARF_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("WHARF_DB_NAME").unwrap_or_else(|_| "wharf".to_string()),
            user: std::env::var("WHARF_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("WHARF_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("WHARF_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("WHARF_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened until the pool is first used.
    pub fn create_pool(&self) -> WharfResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let mut timeouts = Timeouts::new();
        timeouts.wait = Some(self.timeout);
        timeouts.create = Some(self.timeout);
        timeouts.recycle = Some(self.timeout);
        let mut pool_config = PoolConfig::new(self.max_size);
        pool_config.timeouts = timeouts;
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Unavailable {
                reason: format!("Failed to create pool: {}", e),
            })?;

        Ok(pool)
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: PoolError) -> StorageError {
    tracing::error!("Connection pool error: {:?}", err);
    StorageError::Unavailable {
        reason: format!("Failed to acquire database connection: {}", err),
    }
}

fn query_error(collection: &Collection, err: tokio_postgres::Error) -> StorageError {
    tracing::error!(collection = %collection, "Database error: {:?}", err);
    if err.is_closed() {
        StorageError::Unavailable {
            reason: err.to_string(),
        }
    } else {
        StorageError::QueryFailed {
            collection: collection.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Insert failures: a primary key clash is a duplicate id.
fn insert_error(
    collection: &Collection,
    id: &RecordId,
    err: tokio_postgres::Error,
) -> StorageError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return StorageError::DuplicateId {
            collection: collection.to_string(),
            id: id.clone(),
        };
    }
    query_error(collection, err)
}

// ============================================================================
// QUERY BUILDING
// ============================================================================

type Param = Box<dyn ToSql + Sync + Send>;

/// SQL predicate for `filter`, appended after `collection = $1`.
///
/// Placeholders are numbered from `$2`.
fn filter_clause(filter: &Filter) -> (String, Vec<Param>) {
    match filter {
        Filter::All => (String::new(), Vec::new()),
        Filter::Id(id) => (
            " AND id = $2".to_string(),
            vec![Box::new(id.as_str().to_string()) as Param],
        ),
        Filter::FieldEq { field, value } => (
            " AND fields -> $2::text = $3::jsonb".to_string(),
            vec![Box::new(field.clone()) as Param, Box::new(value.clone()) as Param],
        ),
    }
}

/// Statement parameters: the collection name followed by `extra`.
fn bind<'a>(collection: &'a String, extra: &'a [Param]) -> Vec<&'a (dyn ToSql + Sync)> {
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(extra.len() + 1);
    params.push(collection);
    params.extend(extra.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)));
    params
}

fn row_to_record(collection: &Collection, row: &Row) -> Result<Record, StorageError> {
    let id: String = row.try_get("id").map_err(|e| query_error(collection, e))?;
    let fields: JsonValue = row
        .try_get("fields")
        .map_err(|e| query_error(collection, e))?;

    match fields {
        JsonValue::Object(map) => Ok(Record::new(RecordId::new(id), map)),
        other => Err(StorageError::CorruptRecord {
            collection: collection.to_string(),
            id: RecordId::new(id),
            reason: format!("fields column holds {} instead of an object", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS wharf_documents (
    collection  TEXT        NOT NULL,
    id          TEXT        NOT NULL,
    fields      JSONB       NOT NULL,
    inserted_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, id)
);
CREATE INDEX IF NOT EXISTS wharf_documents_order_idx
    ON wharf_documents (collection, inserted_at, id);
";

// ============================================================================
// DOCUMENT STORE
// ============================================================================

/// PostgreSQL-backed document store.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: Pool,
}

impl PgDocumentStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration.
    pub fn from_config(config: &DbConfig) -> WharfResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create the documents table and its ordering index if missing.
    pub async fn ensure_schema(&self) -> WharfResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA).await.map_err(|e| {
            tracing::error!("Schema creation failed: {:?}", e);
            StorageError::Unavailable {
                reason: format!("Failed to create schema: {}", e),
            }
        })?;
        tracing::info!("Document schema ready");
        Ok(())
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool.get().await.map_err(pool_error)
    }

    async fn select(
        &self,
        collection: &Collection,
        filter: &Filter,
        limit_one: bool,
    ) -> Result<Vec<Record>, StorageError> {
        let conn = self.get_conn().await?;
        let (clause, extra) = filter_clause(filter);
        let sql = format!(
            "SELECT id, fields FROM wharf_documents WHERE collection = $1{} \
             ORDER BY inserted_at, id{}",
            clause,
            if limit_one { " LIMIT 1" } else { "" }
        );
        let name = collection.to_string();

        let rows = conn
            .query(sql.as_str(), &bind(&name, &extra))
            .await
            .map_err(|e| query_error(collection, e))?;

        rows.iter().map(|row| row_to_record(collection, row)).collect()
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, collection: &Collection, filter: &Filter) -> WharfResult<Vec<Record>> {
        Ok(self.select(collection, filter, false).await?)
    }

    async fn find_one(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> WharfResult<Option<Record>> {
        Ok(self.select(collection, filter, true).await?.into_iter().next())
    }

    async fn insert_one(
        &self,
        collection: &Collection,
        document: Document,
    ) -> WharfResult<RecordId> {
        let conn = self.get_conn().await?;
        let (id, fields) = document.into_parts();
        let id = id.unwrap_or_else(RecordId::generate);
        let name = collection.to_string();
        let id_text = id.as_str().to_string();
        let fields = JsonValue::Object(fields);

        conn.execute(
            "INSERT INTO wharf_documents (collection, id, fields) VALUES ($1, $2, $3)",
            &[&name, &id_text, &fields],
        )
        .await
        .map_err(|e| insert_error(collection, &id, e))?;

        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &Collection,
        filter: &Filter,
        fields: Fields,
    ) -> WharfResult<u64> {
        let conn = self.get_conn().await?;
        let (clause, mut extra) = filter_clause(filter);
        extra.push(Box::new(JsonValue::Object(fields)));
        let sql = format!(
            "UPDATE wharf_documents SET fields = ${} \
             WHERE collection = $1 AND id = (\
                 SELECT id FROM wharf_documents WHERE collection = $1{} \
                 ORDER BY inserted_at, id LIMIT 1)",
            extra.len() + 1,
            clause
        );
        let name = collection.to_string();

        let count = conn
            .execute(sql.as_str(), &bind(&name, &extra))
            .await
            .map_err(|e| query_error(collection, e))?;
        Ok(count)
    }

    async fn delete_one(&self, collection: &Collection, filter: &Filter) -> WharfResult<u64> {
        let conn = self.get_conn().await?;
        let (clause, extra) = filter_clause(filter);
        let sql = format!(
            "DELETE FROM wharf_documents \
             WHERE collection = $1 AND id = (\
                 SELECT id FROM wharf_documents WHERE collection = $1{} \
                 ORDER BY inserted_at, id LIMIT 1)",
            clause
        );
        let name = collection.to_string();

        let count = conn
            .execute(sql.as_str(), &bind(&name, &extra))
            .await
            .map_err(|e| query_error(collection, e))?;
        Ok(count)
    }

    async fn health_check(&self) -> WharfResult<()> {
        let conn = self.get_conn().await?;
        conn.simple_query("SELECT 1").await.map_err(|e| {
            tracing::error!("Health check failed: {:?}", e);
            StorageError::Unavailable {
                reason: e.to_string(),
            }
        })?;
        Ok(())
    }
}
