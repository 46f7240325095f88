//! Background indexing: one independent task per changed issue.
//!
//! Delivery is at-least-once. A task may be retried or delivered twice; the
//! fingerprint check in [`IndexingPipeline::index`] makes the repeat a no-op.
//! Two tasks for the same issue racing each other resolve last-writer-wins.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::{IndexOutcome, IndexingPipeline};
use crate::embeddings::Embedder;
use crate::error::{Result, SemSearchError};
use crate::issues::{IssueId, IssueSource};

/// An issue whose embedding may be out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueChanged {
    pub issue_id: IssueId,
}

/// Accepts indexing work without waiting for it.
pub trait Scheduler {
    fn schedule(&self, event: IssueChanged) -> Result<()>;
}

/// Called once per finished task with its final result.
pub type Observer = Arc<dyn Fn(IssueId, &Result<IndexOutcome>) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub workers: usize,
    /// Total attempts per task, including the first
    pub max_attempts: usize,
    pub retry_base: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            retry_base: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    pub indexed: usize,
    pub skipped: usize,
    pub missing: usize,
    pub disabled: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    indexed: AtomicUsize,
    skipped: AtomicUsize,
    missing: AtomicUsize,
    disabled: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn record(&self, result: &Result<IndexOutcome>) {
        let counter = match result {
            Ok(IndexOutcome::Indexed { .. }) => &self.indexed,
            Ok(IndexOutcome::Skipped) => &self.skipped,
            Ok(IndexOutcome::Missing) => &self.missing,
            Ok(IndexOutcome::Disabled) => &self.disabled,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self) -> PoolReport {
        PoolReport {
            indexed: self.indexed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            disabled: self.disabled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Fixed set of tokio workers draining an unbounded queue of [`IssueChanged`].
pub struct WorkerPool {
    sender: mpsc::UnboundedSender<IssueChanged>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawn the workers. Must be called inside a tokio runtime.
    pub fn start<E, S>(
        pipeline: Arc<IndexingPipeline<E>>,
        source: Arc<S>,
        options: PoolOptions,
        observer: Option<Observer>,
    ) -> Self
    where
        E: Embedder + 'static,
        S: IssueSource + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..options.workers.max(1))
            .map(|_| {
                tokio::spawn(worker(
                    pipeline.clone(),
                    source.clone(),
                    receiver.clone(),
                    counters.clone(),
                    options,
                    observer.clone(),
                ))
            })
            .collect();

        Self {
            sender,
            workers,
            counters,
        }
    }

    /// Close the queue, wait for every scheduled task, and report.
    pub async fn shutdown(self) -> PoolReport {
        drop(self.sender);
        for handle in self.workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "indexing worker panicked");
            }
        }
        self.counters.report()
    }
}

impl Scheduler for WorkerPool {
    fn schedule(&self, event: IssueChanged) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| SemSearchError::Queue("indexing queue is closed".into()))
    }
}

async fn worker<E, S>(
    pipeline: Arc<IndexingPipeline<E>>,
    source: Arc<S>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<IssueChanged>>>,
    counters: Arc<Counters>,
    options: PoolOptions,
    observer: Option<Observer>,
) where
    E: Embedder + 'static,
    S: IssueSource + Send + Sync + 'static,
{
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(event) = next else {
            break;
        };

        let result = run_with_retries(&pipeline, source.as_ref(), event.issue_id, options).await;
        counters.record(&result);
        if let Some(observer) = &observer {
            observer(event.issue_id, &result);
        }
    }
}

async fn run_with_retries<E, S>(
    pipeline: &IndexingPipeline<E>,
    source: &S,
    issue_id: IssueId,
    options: PoolOptions,
) -> Result<IndexOutcome>
where
    E: Embedder,
    S: IssueSource + Sync,
{
    let mut attempt = 1;
    loop {
        match pipeline.run(source, issue_id).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if attempt < options.max_attempts => {
                tracing::warn!(issue_id, attempt, error = %e, "indexing failed, retrying");
                tokio::time::sleep(retry_backoff(options.retry_base, attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn retry_backoff(base: Duration, attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    base * (1 << capped)
}

/// Schedule every known issue for indexing and return how many were queued.
///
/// Returns as soon as the events are handed over; nothing here waits on indexing.
pub fn sync_all<S, Q>(source: &S, scheduler: &Q) -> Result<usize>
where
    S: IssueSource + ?Sized,
    Q: Scheduler + ?Sized,
{
    let ids = source.issue_ids()?;
    for issue_id in &ids {
        scheduler.schedule(IssueChanged {
            issue_id: *issue_id,
        })?;
    }
    tracing::info!(count = ids.len(), "scheduled embedding generation for all issues");
    Ok(ids.len())
}
