//! Thin wrapper around the embedded SurrealDB SDK
//!
//! Cloning is cheap: the connection is Arc-wrapped, which also avoids
//! "lock held by current process" errors when a RocksDB path is opened by
//! more than one handle.

use atlas_core::{AtlasError, AtlasResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

/// Connection settings for the embedded database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrealDbConfig {
    pub namespace: String,
    pub database: String,
    /// Storage path; empty or `":memory:"` selects the in-memory engine.
    pub path: String,
}

impl Default for SurrealDbConfig {
    fn default() -> Self {
        Self {
            namespace: "atlas".to_string(),
            database: "knowledge".to_string(),
            path: ":memory:".to_string(),
        }
    }
}

struct SurrealClientInner {
    db: Surreal<Db>,
    config: SurrealDbConfig,
}

/// Shared handle to one embedded SurrealDB instance.
#[derive(Clone)]
pub struct SurrealClient {
    inner: Arc<SurrealClientInner>,
}

impl std::fmt::Debug for SurrealClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl SurrealClient {
    pub async fn new(config: SurrealDbConfig) -> AtlasResult<Self> {
        let db = if config.path.is_empty() || config.path == ":memory:" {
            Surreal::new::<Mem>(()).await.map_err(|e| {
                AtlasError::storage(format!("failed to create in-memory database: {}", e))
            })?
        } else {
            Surreal::new::<RocksDb>(config.path.as_str())
                .await
                .map_err(|e| {
                    AtlasError::storage(format!(
                        "failed to open database at {}: {}",
                        config.path, e
                    ))
                })?
        };

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                AtlasError::storage(format!(
                    "failed to select namespace '{}' database '{}': {}",
                    config.namespace, config.database, e
                ))
            })?;

        Ok(Self {
            inner: Arc::new(SurrealClientInner { db, config }),
        })
    }

    /// In-memory instance, mostly for tests.
    pub async fn new_memory() -> AtlasResult<Self> {
        Self::new(SurrealDbConfig::default()).await
    }

    /// RocksDB-backed instance persisting under `path`.
    pub async fn new_file(path: &str) -> AtlasResult<Self> {
        Self::new(SurrealDbConfig {
            path: path.to_string(),
            ..Default::default()
        })
        .await
    }

    /// Run one statement, binding each key of the `bindings` object as a
    /// query parameter. Results are discarded.
    pub async fn execute(&self, sql: &str, bindings: Value) -> AtlasResult<()> {
        self.run(sql, bindings).await.map(|_| ())
    }

    /// Run one SELECT statement and deserialize its rows.
    pub async fn select<T: DeserializeOwned>(
        &self,
        sql: &str,
        bindings: Value,
    ) -> AtlasResult<Vec<T>> {
        let mut response = self.run(sql, bindings).await?;
        response
            .take::<Vec<T>>(0)
            .map_err(|e| AtlasError::storage(format!("failed to decode query results: {}", e)))
    }

    /// Like [`Self::select`], but expects at most one row.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        sql: &str,
        bindings: Value,
    ) -> AtlasResult<Option<T>> {
        Ok(self.select(sql, bindings).await?.into_iter().next())
    }

    async fn run(&self, sql: &str, bindings: Value) -> AtlasResult<surrealdb::Response> {
        let mut query = self.inner.db.query(sql);
        if let Value::Object(map) = bindings {
            for (key, value) in map {
                query = query.bind((key, value));
            }
        }

        let response = query
            .await
            .map_err(|e| AtlasError::storage(format!("query failed: {}", e)))?;
        response
            .check()
            .map_err(|e| AtlasError::storage(format!("query returned error: {}", e)))
    }
}
