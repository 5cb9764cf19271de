//! Database module for artifactfinder
//!
//! Handles SQLite storage for the artifact index including:
//! - Schema creation and migrations
//! - A bounded pool of configured connections
//! - Single-writer/multi-reader scopes over the pool
//! - Typed artifact, pending artifact and symbol operations

pub mod connection;
pub mod dao;
pub mod pool;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info};

pub use connection::{ConnectionProvider, DbScope};
pub use dao::{ArtifactDao, WritableArtifactDao};
pub use pool::{ObjectPool, Pooled};

/// Default number of pooled connections for a file-backed store
pub const DEFAULT_POOL_LIMIT: usize = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the artifact index store
#[derive(Clone)]
pub struct ArtifactFinderDb {
    provider: Arc<ConnectionProvider>,
    path: Option<PathBuf>,
}

impl ArtifactFinderDb {
    /// Open or create a store at the given path
    pub async fn open<P: AsRef<Path>>(path: P, pool_limit: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
        Self::build(Some(path), pool_limit).await
    }

    /// Create an in-memory store.
    ///
    /// Every in-memory connection is its own database, so the pool holds one.
    pub async fn in_memory() -> Result<Self> {
        Self::build(None, 1).await
    }

    async fn build(path: Option<PathBuf>, pool_limit: usize) -> Result<Self> {
        let creator_path = path.clone();
        let pool = ObjectPool::with_initializer(
            pool_limit,
            move || {
                let path = creator_path.clone();
                async move { open_connection(path.as_deref()) }
            },
            |conn: &mut Connection| {
                let applied = schema::create_all_tables(conn)?;
                debug!("Applied {} schema migrations", applied);
                Ok(())
            },
        )?;

        let db = Self {
            provider: Arc::new(ConnectionProvider::new(pool)),
            path,
        };
        // first connection runs the migrations; fail here rather than on first use
        drop(db.scope().await?);

        match db.path {
            Some(ref path) => info!("Opened artifact index at {}", path.display()),
            None => info!("Opened in-memory artifact index"),
        }
        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    /// Open a logical scope; see [`DbScope`]
    pub async fn scope(&self) -> Result<DbScope> {
        self.provider.scope().await
    }

    pub async fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ArtifactDao<'_>) -> Result<R>,
    {
        self.provider.read(f).await
    }

    pub async fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&WritableArtifactDao<'_>) -> Result<R>,
    {
        self.provider.write(f).await
    }
}

fn open_connection(path: Option<&Path>) -> Result<Connection> {
    let conn = match path {
        Some(path) => Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?,
        None => Connection::open_in_memory()?,
    };
    configure_connection(&conn, path.is_some())?;
    Ok(conn)
}

/// Apply the per-connection settings every pooled connection needs
pub(crate) fn configure_connection(conn: &Connection, wal: bool) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    // lookups are stored lowercased; LIKE must not fold case on top of that
    conn.pragma_update(None, "case_sensitive_like", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if wal {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Journal mode: {}", mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = ArtifactFinderDb::in_memory().await.unwrap();
        let version = db
            .read(|dao| schema::schema_version(dao.connection()))
            .await
            .unwrap();
        assert_eq!(version, schema::latest_version());
        assert_eq!(db.provider().pool().limit(), 1);
    }

    #[tokio::test]
    async fn test_file_store_shares_data_across_connections() {
        let dir = TempDir::new().unwrap();
        let db = ArtifactFinderDb::open(dir.path().join("nested/index.db"), 2)
            .await
            .unwrap();

        let mut writer = db.scope().await.unwrap();
        writer
            .write(|dao| {
                dao.insert_pending_artifact(
                    "g",
                    "a",
                    &crate::version::Version::new(1, 0, 0, None),
                    crate::types::Artifactory::Google,
                )
            })
            .await
            .unwrap();

        // a second pooled connection sees the committed row
        let reader = db.scope().await.unwrap();
        assert_eq!(reader.read(|dao| dao.stats()).unwrap().pending_total, 1);
        assert_eq!(db.provider().pool().created(), 2);
    }

    #[tokio::test]
    async fn test_file_store_uses_wal() {
        let dir = TempDir::new().unwrap();
        let db = ArtifactFinderDb::open(dir.path().join("index.db"), 1)
            .await
            .unwrap();
        let mode: String = db
            .read(|dao| {
                Ok(dao
                    .connection()
                    .query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        {
            let db = ArtifactFinderDb::open(&path, 1).await.unwrap();
            db.write(|dao| {
                dao.insert_pending_artifact(
                    "g",
                    "a",
                    &crate::version::Version::new(1, 0, 0, None),
                    crate::types::Artifactory::Maven,
                )
            })
            .await
            .unwrap();
        }
        let db = ArtifactFinderDb::open(&path, 1).await.unwrap();
        assert_eq!(db.read(|dao| dao.stats()).await.unwrap().pending_total, 1);
    }

    #[test]
    fn test_zero_pool_limit_is_fatal() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let result = rt.block_on(ArtifactFinderDb::open(dir.path().join("index.db"), 0));
        assert!(result.is_err());
    }
}
