//! Bounded worker pool over a lazily produced job source
//!
//! Idle workers ask a single producer task for work; the producer pulls the
//! next item from the source only once a worker is waiting for it, so nothing
//! is pulled that no worker will run.
//! The source yields `Option<T>`: `Some(item)` is a job, `None` ends
//! production early. A job that fails or panics is logged and dropped without
//! disturbing the other workers.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use futures::{stream, FutureExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Upper bound on workers picked for a list of jobs
const MAX_LIST_WORKERS: usize = 5;

/// Jobs per worker when sizing the pool for a list
const JOBS_PER_WORKER: usize = 5;

/// A waiting worker's slot for its next job
type JobSlot<T> = oneshot::Sender<T>;

/// Drain `source` with `workers` concurrent consumers and collect the results.
///
/// Returns once the producer and every worker have finished. The results hold
/// one entry per job that succeeded, in completion order.
pub async fn distribute_jobs<T, R, S, F, Fut>(source: S, workers: usize, consumer: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    S: Stream<Item = Option<T>> + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    distribute_jobs_until(source, workers, consumer, CancellationToken::new()).await
}

/// Like [`distribute_jobs`], but stops producing once `cancel` fires.
///
/// Jobs already handed to a worker run to completion. The source is never
/// pulled after cancellation, and every item pulled reaches a worker.
pub async fn distribute_jobs_until<T, R, S, F, Fut>(
    source: S,
    workers: usize,
    consumer: F,
    cancel: CancellationToken,
) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    S: Stream<Item = Option<T>> + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let workers = workers.max(1);
    // at most one outstanding request per worker
    let (requests_tx, requests_rx) = mpsc::channel(workers);
    let consumer = Arc::new(consumer);
    let results = Arc::new(Mutex::new(Vec::new()));

    let mut tasks = JoinSet::new();
    tasks.spawn(produce(source, requests_rx, cancel));
    for worker_id in 0..workers {
        tasks.spawn(consume(
            worker_id,
            requests_tx.clone(),
            Arc::clone(&consumer),
            Arc::clone(&results),
        ));
    }
    drop(requests_tx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("Job runner task ended abnormally: {}", e);
        }
    }

    let mut results = results.lock().await;
    std::mem::take(&mut *results)
}

/// Run `consumer` over a list of jobs.
///
/// Without an explicit worker count, one worker is used per five jobs, between
/// one and five workers.
pub async fn distribute_list<T, R, F, Fut>(
    items: Vec<T>,
    workers: Option<usize>,
    consumer: F,
) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let workers = workers.unwrap_or_else(|| default_workers(items.len()));
    let source = stream::iter(items.into_iter().map(Some));
    distribute_jobs(source, workers, consumer).await
}

pub fn default_workers(jobs: usize) -> usize {
    (jobs / JOBS_PER_WORKER).clamp(1, MAX_LIST_WORKERS)
}

async fn produce<T, S>(
    source: S,
    mut requests: mpsc::Receiver<JobSlot<T>>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Option<T>> + Send + 'static,
{
    let mut source = std::pin::pin!(source);
    let mut produced = 0usize;

    loop {
        let slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Job production cancelled after {} jobs", produced);
                break;
            }
            slot = requests.recv() => match slot {
                Some(slot) => slot,
                None => break,
            },
        };

        // a worker is waiting, so the pulled item always has a taker
        let item = match source.next().await {
            Some(Some(item)) => item,
            Some(None) => {
                debug!("Job source ended production after {} jobs", produced);
                break;
            }
            None => break,
        };

        if slot.send(item).is_err() {
            warn!("Worker left before taking job {}", produced + 1);
            break;
        }
        produced += 1;
    }
    // dropping the request receiver releases every waiting worker
}

async fn consume<T, R, F, Fut>(
    worker_id: usize,
    requests: mpsc::Sender<JobSlot<T>>,
    consumer: Arc<F>,
    results: Arc<Mutex<Vec<R>>>,
) where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    trace!(worker_id, "Worker starting");
    let mut processed = 0usize;

    loop {
        let (slot, job) = oneshot::channel();
        if requests.send(slot).await.is_err() {
            break;
        }
        let Ok(item) = job.await else {
            break;
        };

        match AssertUnwindSafe(consumer(item)).catch_unwind().await {
            Ok(Ok(result)) => results.lock().await.push(result),
            Ok(Err(e)) => warn!(worker_id, "Job failed: {:#}", e),
            Err(_) => warn!(worker_id, "Job panicked"),
        }
        processed += 1;
    }

    trace!(worker_id, processed, "Worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{sleep, timeout, Instant};

    #[tokio::test]
    async fn test_every_job_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = stream::iter((0..50).map(Some));

        let mut results = distribute_jobs(source, 4, move |n: i32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(n * 2)
            }
        })
        .await;

        results.sort_unstable();
        assert_eq!(calls.load(Ordering::SeqCst), 50);
        assert_eq!(results, (0..50).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failed_jobs_are_dropped() {
        let source = stream::iter((0..10).map(Some));
        let mut results = distribute_jobs(source, 3, |n: i32| async move {
            if n % 2 == 0 {
                anyhow::bail!("even job {}", n);
            }
            Ok(n)
        })
        .await;

        results.sort_unstable();
        assert_eq!(results, vec![1, 3, 5, 7, 9]);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_worker() {
        let source = stream::iter((0..6).map(Some));
        let mut results = distribute_jobs(source, 1, |n: i32| async move {
            if n == 2 {
                panic!("job {} exploded", n);
            }
            Ok::<_, anyhow::Error>(n)
        })
        .await;

        results.sort_unstable();
        assert_eq!(results, vec![0, 1, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_none_ends_production() {
        let source = stream::iter(vec![Some(1), Some(2), None, Some(3)]);
        let mut results = distribute_jobs(source, 2, |n: i32| async move { Ok::<_, anyhow::Error>(n) }).await;
        results.sort_unstable();
        assert_eq!(results, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_endless_source_stops_on_none() {
        // a generator that would otherwise never end
        let source = stream::unfold(0, |n| async move {
            let item = if n < 10 { Some(n) } else { None };
            Some((item, n + 1))
        });
        let results = timeout(
            Duration::from_secs(5),
            distribute_jobs(source, 3, |n: i32| async move { Ok::<_, anyhow::Error>(n) }),
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 10);
    }

    #[tokio::test]
    async fn test_cancel_stops_endless_source() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let source = stream::repeat(Some(1));

        let results = timeout(
            Duration::from_secs(5),
            distribute_jobs_until(
                source,
                2,
                move |n: i32| {
                    let trigger = trigger.clone();
                    async move {
                        trigger.cancel();
                        Ok::<_, anyhow::Error>(n)
                    }
                },
                cancel,
            ),
        )
        .await
        .unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_leaves_no_pulled_job_behind() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let pulls = Arc::new(AtomicUsize::new(0));
        let pulled = Arc::clone(&pulls);
        let source = stream::repeat_with(move || {
            pulled.fetch_add(1, Ordering::SeqCst);
            Some(1)
        });

        let results = timeout(
            Duration::from_secs(5),
            distribute_jobs_until(
                source,
                3,
                move |n: i32| {
                    let trigger = trigger.clone();
                    async move {
                        trigger.cancel();
                        sleep(Duration::from_millis(20)).await;
                        Ok::<_, anyhow::Error>(n)
                    }
                },
                cancel,
            ),
        )
        .await
        .unwrap();

        assert!(!results.is_empty());
        // every item taken from the source was run
        assert_eq!(pulls.load(Ordering::SeqCst), results.len());
    }

    #[tokio::test]
    async fn test_source_is_not_pulled_ahead_of_workers() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let pulled = Arc::clone(&pulls);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let source = stream::iter(0..4).map(move |n| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Some(n)
        });

        let pulls_at_start = Arc::clone(&pulls);
        distribute_jobs(source, 1, move |n: usize| {
            let recorder = Arc::clone(&recorder);
            let pulls = Arc::clone(&pulls_at_start);
            async move {
                sleep(Duration::from_millis(5)).await;
                recorder.lock().await.push((n, pulls.load(Ordering::SeqCst)));
                Ok::<_, anyhow::Error>(n)
            }
        })
        .await;

        // a single worker only ever sees the source pulled up to its own job
        let seen = seen.lock().await.clone();
        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_run_concurrently() {
        let start = Instant::now();
        let source = stream::iter((0..6).map(Some));
        let results = distribute_jobs(source, 3, |n: i32| async move {
            sleep(Duration::from_millis(100)).await;
            Ok::<_, anyhow::Error>(n)
        })
        .await;

        assert_eq!(results.len(), 6);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_empty_source() {
        let results: Vec<i32> =
            distribute_jobs(stream::empty(), 4, |n: i32| async move { Ok::<_, anyhow::Error>(n) }).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_distribute_list() {
        let mut results =
            distribute_list(vec!["a", "bb", "ccc"], None, |s: &'static str| async move {
                Ok::<_, anyhow::Error>(s.len())
            })
            .await;
        results.sort_unstable();
        assert_eq!(results, vec![1, 2, 3]);
    }

    #[test]
    fn test_default_workers() {
        assert_eq!(default_workers(0), 1);
        assert_eq!(default_workers(4), 1);
        assert_eq!(default_workers(12), 2);
        assert_eq!(default_workers(100), 5);
    }
}
