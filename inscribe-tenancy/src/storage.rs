//! Per-tenant storage gateway
//!
//! Every tenant owns one SQLite file under `<data_dir>/tenants/<subdomain>.db`;
//! the shared directory store (tenants, users, reset tokens) lives in
//! `<data_dir>/directory.db`. Stores are opened lazily with `create_if_missing`
//! and WAL journaling, and their schema is created on first open.
//!
//! Open tenant pools are kept in an LRU registry. Concurrent first access to
//! the same tenant shares one initialization, so exactly one pool is cached.

use crate::error::StorageError;
use crate::tenant::is_valid_label;
use inscribe_log::{debug, info, warn};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

pub type Result<T> = std::result::Result<T, StorageError>;

/// A row, keyed by column name
pub type Record = Map<String, Value>;

/// Default bound on simultaneously open tenant stores
pub const DEFAULT_MAX_OPEN_STORES: usize = 256;

/// Schema of every tenant store
pub const TENANT_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL DEFAULT '',
        excerpt TEXT,
        status TEXT NOT NULL DEFAULT 'draft'
            CHECK (status IN ('draft', 'published', 'archived')),
        seo_title TEXT,
        seo_description TEXT,
        author TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        published_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status, published_at)",
];

/// Schema of the shared directory store
pub const DIRECTORY_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        id TEXT PRIMARY KEY,
        subdomain TEXT NOT NULL UNIQUE,
        custom_domain TEXT UNIQUE,
        display_name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        provider_metadata TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS password_reset_tokens (
        token_hash TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        expires_at INTEGER NOT NULL,
        used INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_tenant ON users(tenant_id)",
];

/// Statement parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v.into())
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Build a `Vec<SqlValue>` from heterogeneous values
///
/// ```
/// use inscribe_tenancy::{params, SqlValue};
///
/// let p = params!["hello", 42i64, None::<String>];
/// assert_eq!(p[1], SqlValue::Integer(42));
/// assert_eq!(p[2], SqlValue::Null);
/// ```
#[macro_export]
macro_rules! params {
    () => { Vec::<$crate::SqlValue>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::SqlValue::from($value)),+]
    };
}

/// Outcome of a write statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub last_insert_id: i64,
    pub rows_affected: u64,
}

/// One statement of a transactional batch
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Gateway construction options
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub max_open_stores: usize,
    pub max_connections_per_store: u32,
    pub busy_timeout: Duration,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_open_stores: DEFAULT_MAX_OPEN_STORES,
            max_connections_per_store: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_open_stores(mut self, max: usize) -> Self {
        self.max_open_stores = max;
        self
    }
}

type StoreCell = Arc<OnceCell<SqlitePool>>;

/// Opens, caches and queries tenant stores
pub struct StorageGateway {
    config: StorageConfig,
    directory: OnceCell<SqlitePool>,
    tenants: Mutex<LruCache<String, StoreCell>>,
}

impl StorageGateway {
    pub fn new(config: StorageConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_open_stores).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            directory: OnceCell::new(),
            tenants: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// File backing the tenant's store
    pub fn store_path(&self, tenant: &str) -> Result<PathBuf> {
        validate_store_name(tenant)?;
        Ok(self
            .config
            .data_dir
            .join("tenants")
            .join(format!("{}.db", tenant)))
    }

    pub fn directory_path(&self) -> PathBuf {
        self.config.data_dir.join("directory.db")
    }

    /// Number of tenant pools currently cached
    pub fn open_stores(&self) -> usize {
        self.tenants.lock().len()
    }

    /// Run a read statement. `None` addresses the shared directory store.
    pub async fn query(
        &self,
        tenant: Option<&str>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Record>> {
        let pool = self.pool(tenant).await?;
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    /// First row of a read statement, if any
    pub async fn query_one(
        &self,
        tenant: Option<&str>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<Record>> {
        let pool = self.pool(tenant).await?;
        let row = bind_params(sqlx::query(sql), params)
            .fetch_optional(&pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    /// Run a write statement. `None` addresses the shared directory store.
    pub async fn run(
        &self,
        tenant: Option<&str>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<RunResult> {
        let pool = self.pool(tenant).await?;
        let result = bind_params(sqlx::query(sql), params)
            .execute(&pool)
            .await?;
        Ok(RunResult {
            last_insert_id: result.last_insert_rowid(),
            rows_affected: result.rows_affected(),
        })
    }

    /// Run `statements` in one transaction. The first failure rolls the whole
    /// batch back and is returned as [`StorageError::Statement`].
    pub async fn transaction(
        &self,
        tenant: Option<&str>,
        statements: &[Statement],
    ) -> Result<Vec<RunResult>> {
        let pool = self.pool(tenant).await?;
        let mut tx = pool.begin().await?;
        let mut results = Vec::with_capacity(statements.len());

        for (index, statement) in statements.iter().enumerate() {
            let outcome = bind_params(sqlx::query(&statement.sql), &statement.params)
                .execute(&mut *tx)
                .await;

            match outcome {
                Ok(result) => results.push(RunResult {
                    last_insert_id: result.last_insert_rowid(),
                    rows_affected: result.rows_affected(),
                }),
                Err(err) => {
                    let tenant = tenant.unwrap_or("<directory>");
                    match tx.rollback().await {
                        Ok(()) => debug!(
                            tenant,
                            index,
                            total = statements.len(),
                            "Transaction rolled back"
                        ),
                        Err(rollback) => warn!(
                            tenant,
                            index,
                            error = %rollback,
                            "Transaction rollback failed"
                        ),
                    }
                    return Err(StorageError::Statement {
                        index,
                        source: Box::new(err.into()),
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(results)
    }

    async fn pool(&self, tenant: Option<&str>) -> Result<SqlitePool> {
        match tenant {
            None => self.directory_pool().await,
            Some(name) => self.tenant_pool(name).await,
        }
    }

    async fn directory_pool(&self) -> Result<SqlitePool> {
        let path = self.directory_path();
        self.directory
            .get_or_try_init(|| open_store(path, DIRECTORY_SCHEMA, &self.config))
            .await
            .cloned()
    }

    async fn tenant_pool(&self, tenant: &str) -> Result<SqlitePool> {
        let path = self.store_path(tenant)?;

        // Insert-or-get the cell under the lock; open outside it
        let cell = {
            let mut stores = self.tenants.lock();
            if let Some(cell) = stores.get(tenant).cloned() {
                cell
            } else {
                let cell: StoreCell = Arc::new(OnceCell::new());
                if let Some((evicted, _)) = stores.push(tenant.to_string(), cell.clone()) {
                    // Dropping the last handle closes the pool once in-flight work finishes
                    debug!(tenant = %evicted, "Evicted tenant store from registry");
                }
                cell
            }
        };

        cell.get_or_try_init(|| open_store(path, TENANT_SCHEMA, &self.config))
            .await
            .cloned()
    }
}

fn validate_store_name(tenant: &str) -> Result<()> {
    if !is_valid_label(tenant) {
        return Err(StorageError::InvalidTenant(tenant.to_string()));
    }
    Ok(())
}

async fn open_store(path: PathBuf, schema: &[&str], config: &StorageConfig) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections_per_store)
        .connect_with(options)
        .await
        .map_err(|source| StorageError::Open {
            path: path.display().to_string(),
            source,
        })?;

    for statement in schema {
        sqlx::query(statement).execute(&pool).await?;
    }

    info!(path = %path.display(), "Opened store");
    Ok(pool)
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Blob(v) => query.bind(v.clone()),
        };
    }
    query
}

fn row_to_record(row: &SqliteRow) -> Result<Record> {
    let mut record = Map::new();

    for column in row.columns() {
        let index = column.ordinal();
        let name = column.name().to_string();
        let decode_err = |e: sqlx::Error| StorageError::Decode {
            column: name.clone(),
            reason: e.to_string(),
        };

        let raw = row.try_get_raw(index).map_err(decode_err)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index).map_err(decode_err)?),
                "REAL" | "NUMERIC" => Value::from(row.try_get::<f64, _>(index).map_err(decode_err)?),
                "BLOB" => Value::String(hex::encode(
                    row.try_get::<Vec<u8>, _>(index).map_err(decode_err)?,
                )),
                _ => Value::String(row.try_get::<String, _>(index).map_err(decode_err)?),
            }
        };

        record.insert(name, value);
    }

    Ok(record)
}
