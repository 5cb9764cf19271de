//! Read/write coordination over pooled connections
//!
//! A [`DbScope`] is one logical unit of database work. It holds a single
//! pooled connection for its whole life, so everything done through it shares
//! that connection. Scopes read concurrently, bounded by the pool size. The
//! first write through a scope takes the store-wide writer permit, which the
//! scope keeps until it is dropped; later writes in the same scope reuse it.

use std::sync::Arc;

use anyhow::Result;
use rusqlite::Connection;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use super::dao::{ArtifactDao, WritableArtifactDao};
use super::pool::{ObjectPool, Pooled};

/// Hands out [`DbScope`]s backed by a connection pool and a single writer permit
pub struct ConnectionProvider {
    pool: ObjectPool<Connection>,
    writer: Arc<Mutex<()>>,
}

impl ConnectionProvider {
    pub fn new(pool: ObjectPool<Connection>) -> Self {
        Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &ObjectPool<Connection> {
        &self.pool
    }

    /// Open a logical scope, waiting for a pooled connection if none is free
    pub async fn scope(&self) -> Result<DbScope> {
        let conn = self.pool.acquire().await?;
        Ok(DbScope {
            permit: None,
            conn,
            writer: Arc::clone(&self.writer),
        })
    }

    /// Run a read-only block in a fresh scope
    pub async fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ArtifactDao<'_>) -> Result<R>,
    {
        let scope = self.scope().await?;
        scope.read(f)
    }

    /// Run a block in a fresh scope holding the writer permit
    pub async fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&WritableArtifactDao<'_>) -> Result<R>,
    {
        let mut scope = self.scope().await?;
        scope.write(f).await
    }
}

/// One logical unit of database work.
///
/// Pass `&mut DbScope` down to nested operations instead of opening a new
/// scope; a nested scope would need a second connection and, for writes,
/// would wait on a permit its caller already holds.
pub struct DbScope {
    // released before the connection goes back to the pool
    permit: Option<OwnedMutexGuard<()>>,
    conn: Pooled<Connection>,
    writer: Arc<Mutex<()>>,
}

impl DbScope {
    /// Whether this scope currently holds the writer permit
    pub fn is_writer(&self) -> bool {
        self.permit.is_some()
    }

    pub fn dao(&self) -> ArtifactDao<'_> {
        ArtifactDao::new(&self.conn)
    }

    pub fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ArtifactDao<'_>) -> Result<R>,
    {
        f(&self.dao())
    }

    /// Take the writer permit unless this scope already holds it
    pub async fn upgrade(&mut self) {
        if self.permit.is_none() {
            trace!("Waiting for writer permit");
            self.permit = Some(Arc::clone(&self.writer).lock_owned().await);
        }
    }

    /// Upgrade to writer and return a dao that can modify the store
    pub async fn writer(&mut self) -> WritableArtifactDao<'_> {
        self.upgrade().await;
        WritableArtifactDao::new(&self.conn)
    }

    pub async fn write<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&WritableArtifactDao<'_>) -> Result<R>,
    {
        let dao = self.writer().await;
        f(&dao)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    const LIMIT: usize = 3;

    fn provider() -> Arc<ConnectionProvider> {
        let pool = ObjectPool::new(LIMIT, || async {
            Connection::open_in_memory().map_err(anyhow::Error::from)
        })
        .unwrap();
        Arc::new(ConnectionProvider::new(pool))
    }

    #[derive(Clone, Copy)]
    enum Job {
        Read,
        Write,
        ReadThenWrite,
    }

    async fn run(provider: &Arc<ConnectionProvider>, jobs: &[Job]) -> Vec<u64> {
        let start = Instant::now();
        let mut handles = Vec::new();
        for job in jobs.iter().copied() {
            let provider = Arc::clone(provider);
            handles.push(tokio::spawn(async move {
                let mut scope = provider.scope().await.unwrap();
                match job {
                    Job::Read => sleep(Duration::from_millis(100)).await,
                    Job::Write => {
                        scope.upgrade().await;
                        sleep(Duration::from_millis(100)).await;
                    }
                    Job::ReadThenWrite => {
                        sleep(Duration::from_millis(100)).await;
                        scope.upgrade().await;
                        sleep(Duration::from_millis(5)).await;
                    }
                }
                drop(scope);
                start.elapsed().as_millis() as u64
            }));
            // spawn order decides queue order
            tokio::task::yield_now().await;
        }

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap());
        }
        finished.sort_unstable();
        finished
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_run_concurrently() {
        let provider = provider();
        let finished = run(&provider, &[Job::Read; 3]).await;
        assert_eq!(finished, vec![100, 100, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_bounded_by_pool() {
        let provider = provider();
        let finished = run(&provider, &[Job::Read; 4]).await;
        assert_eq!(finished, vec![100, 100, 100, 200]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_are_serialized() {
        let provider = provider();
        let finished = run(&provider, &[Job::Write; 3]).await;
        assert_eq!(finished, vec![100, 200, 300]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_past_pool_limit() {
        let provider = provider();
        let finished = run(&provider, &[Job::Write; 4]).await;
        assert_eq!(finished, vec![100, 200, 300, 400]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_then_write_only_serializes_writes() {
        let provider = provider();
        let finished = run(&provider, &[Job::ReadThenWrite; 3]).await;
        assert_eq!(finished, vec![105, 110, 115]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_then_write_past_pool_limit() {
        let provider = provider();
        let finished = run(&provider, &[Job::ReadThenWrite; 5]).await;
        assert_eq!(finished, vec![105, 110, 115, 210, 215]);
    }

    #[tokio::test]
    async fn test_upgrade_keeps_connection_and_is_reentrant() {
        let pool = ObjectPool::new(1, || async {
            Connection::open_in_memory().map_err(anyhow::Error::from)
        })
        .unwrap();
        let provider = ConnectionProvider::new(pool);

        let mut scope = provider.scope().await.unwrap();
        assert!(!scope.is_writer());
        scope
            .read(|dao| {
                dao.connection().execute_batch("CREATE TABLE t (x INTEGER)")?;
                Ok(())
            })
            .unwrap();

        scope.upgrade().await;
        assert!(scope.is_writer());
        // a second upgrade must not wait on the permit this scope holds
        let count = scope
            .write(|dao| {
                dao.connection().execute("INSERT INTO t (x) VALUES (1)", [])?;
                let count: i64 =
                    dao.connection().query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?;
                Ok(count)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(provider.pool().created(), 1);
    }

    #[tokio::test]
    async fn test_dropping_scope_releases_permit() {
        let provider = provider();
        {
            let mut scope = provider.scope().await.unwrap();
            scope.upgrade().await;
        }
        let mut scope = provider.scope().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), scope.upgrade())
            .await
            .unwrap();
        assert!(scope.is_writer());
    }
}
