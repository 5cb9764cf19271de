//! Bounded pool of lazily created resources
//!
//! At most `limit` resources are ever created. Idle resources are handed out
//! in FIFO order; when none is idle and the limit is reached, `acquire` waits
//! until a resource comes back. Waiters are served in arrival order.

use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::future::BoxFuture;
use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};

use crate::error::FinderError;

type Creator<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;
type Initializer<T> = Box<dyn Fn(&mut T) -> Result<()> + Send + Sync>;

struct PoolInner<T> {
    limit: usize,
    idle: Mutex<VecDeque<T>>,
    permits: Arc<Semaphore>,
    created: AtomicUsize,
    creator: Creator<T>,
    initializer: Option<Initializer<T>>,
    initialized: OnceCell<()>,
}

/// A cloneable handle to a shared resource pool
pub struct ObjectPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> ObjectPool<T> {
    /// Create a pool that builds resources with `creator`, at most `limit` of them
    pub fn new<F, Fut>(limit: usize, creator: F) -> Result<Self, FinderError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::build(limit, creator, None)
    }

    /// Like [`ObjectPool::new`], running `initializer` once on the first resource created
    pub fn with_initializer<F, Fut, I>(
        limit: usize,
        creator: F,
        initializer: I,
    ) -> Result<Self, FinderError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        I: Fn(&mut T) -> Result<()> + Send + Sync + 'static,
    {
        Self::build(limit, creator, Some(Box::new(initializer)))
    }

    fn build<F, Fut>(
        limit: usize,
        creator: F,
        initializer: Option<Initializer<T>>,
    ) -> Result<Self, FinderError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if limit == 0 {
            return Err(FinderError::InvalidPoolLimit(limit));
        }
        let creator: Creator<T> = Box::new(move || Box::pin(creator()));
        Ok(Self {
            inner: Arc::new(PoolInner {
                limit,
                idle: Mutex::new(VecDeque::new()),
                permits: Arc::new(Semaphore::new(limit)),
                created: AtomicUsize::new(0),
                creator,
                initializer,
                initialized: OnceCell::new(),
            }),
        })
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Number of resources created so far
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::SeqCst)
    }

    /// Number of resources currently sitting idle
    pub fn idle(&self) -> usize {
        self.inner.lock_idle().len()
    }

    /// Take a resource, creating one if none is idle and the limit allows.
    ///
    /// The resource goes back to the pool when the returned guard drops.
    pub async fn acquire(&self) -> Result<Pooled<T>> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| FinderError::PoolClosed)?;

        // holding a permit guarantees an idle item or room to create one
        if let Some(item) = self.inner.lock_idle().pop_front() {
            return Ok(Pooled::new(item, Arc::clone(&self.inner), permit));
        }

        let item = self.create().await?;
        Ok(Pooled::new(item, Arc::clone(&self.inner), permit))
    }

    async fn create(&self) -> Result<T> {
        self.inner.created.fetch_add(1, Ordering::SeqCst);
        let mut item = match (self.inner.creator)().await {
            Ok(item) => item,
            Err(e) => {
                self.inner.created.fetch_sub(1, Ordering::SeqCst);
                return Err(e);
            }
        };

        if let Some(ref initializer) = self.inner.initializer {
            let init = self
                .inner
                .initialized
                .get_or_try_init(|| async { initializer(&mut item) })
                .await;
            if let Err(e) = init {
                self.inner.created.fetch_sub(1, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(item)
    }

    /// Run `block` with a pooled resource, returning it afterwards on every path
    pub async fn use_with<R, F>(&self, block: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R>,
    {
        let mut item = self.acquire().await?;
        block(&mut item)
    }
}

impl<T> PoolInner<T> {
    fn lock_idle(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        // the queue holds plain values, so a poisoned lock is still consistent
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A resource on loan from an [`ObjectPool`]
pub struct Pooled<T> {
    item: Option<T>,
    pool: Arc<PoolInner<T>>,
    // dropped after the item is back in the idle queue
    _permit: OwnedSemaphorePermit,
}

impl<T> Pooled<T> {
    fn new(item: T, pool: Arc<PoolInner<T>>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            item: Some(item),
            pool,
            _permit: permit,
        }
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // only vacated inside drop
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.lock_idle().push_back(item);
        }
    }
}
