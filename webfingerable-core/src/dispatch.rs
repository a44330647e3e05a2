//! Bounded dispatch of probe jobs.
//!
//! The dispatcher pulls domains from a [`CursorSource`], drops blocklisted
//! ones, and submits the rest to a [`TaskPool`] of fixed capacity. As soon as
//! a submission fills the pool the source is paused; it is resumed once the
//! pool drains a slot. Each task probes one domain and persists its outcome
//! before releasing its slot, so counters and stored rows agree.

use crate::blocklist::Blocklist;
use crate::cursor::CursorSource;
use crate::error::DispatchError;
use crate::progress::{Progress, ProgressSnapshot};
use crate::sink::ResultSink;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, info, warn};
use webfingerable_scanner::{Probe, ProbeJob};

/// Fixed-capacity set of in-flight tasks.
pub struct TaskPool<T> {
    capacity: usize,
    slots: Arc<Semaphore>,
    tasks: JoinSet<T>,
}

impl<T: Send + 'static> TaskPool<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    pub fn is_saturated(&self) -> bool {
        self.in_flight() >= self.capacity
    }

    /// Spawn `task` into a free slot. Fails if every slot is taken.
    pub fn submit<F>(&mut self, task: F) -> Result<(), DispatchError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let slot = self
            .slots
            .clone()
            .try_acquire_owned()
            .map_err(|_| DispatchError::PoolSaturated(self.capacity))?;

        self.tasks.spawn(async move {
            let output = task.await;
            drop(slot);
            output
        });
        Ok(())
    }

    /// Wait until at least one slot is free.
    pub async fn drained(&self) -> Result<(), DispatchError> {
        let _slot = self.slots.acquire().await.map_err(|_| DispatchError::PoolClosed)?;
        Ok(())
    }

    /// Collect a finished task without waiting, if there is one.
    pub fn try_reap(&mut self) -> Option<Result<T, JoinError>> {
        self.tasks.try_join_next()
    }

    /// Wait for the next task to finish; `None` once the pool is idle.
    pub async fn join_next(&mut self) -> Option<Result<T, JoinError>> {
        self.tasks.join_next().await
    }
}

/// Counters and flow statistics for one finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub progress: ProgressSnapshot,
    pub skipped: usize,
    pub pages_fetched: usize,
    pub pauses: usize,
    pub resumes: usize,
}

pub struct Dispatcher<P> {
    probe: Arc<P>,
    sink: ResultSink,
    blocklist: Arc<Blocklist>,
    progress: Arc<Progress>,
    capacity: usize,
    expiry: i64,
}

impl<P: Probe> Dispatcher<P> {
    pub fn new(probe: Arc<P>, sink: ResultSink, capacity: usize, expiry: i64) -> Self {
        Self {
            probe,
            sink,
            blocklist: Arc::new(Blocklist::default()),
            progress: Arc::new(Progress::new()),
            capacity: capacity.max(1),
            expiry,
        }
    }

    pub fn with_blocklist(mut self, blocklist: Arc<Blocklist>) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    /// Drive `source` to the end, then wait for in-flight probes to finish.
    ///
    /// Store failures, whether from the source or while persisting a result,
    /// and task panics abort the run. Probe errors do not: they are stored as
    /// failure rows and counted.
    pub async fn run(&self, source: &mut CursorSource<String>) -> Result<RunReport, DispatchError> {
        let mut pool: TaskPool<Result<(), DispatchError>> = TaskPool::new(self.capacity);
        let mut report = RunReport::default();

        info!("Dispatching with {} slots", pool.capacity());

        loop {
            Self::reap_finished(&mut pool)?;

            let domain = match source.next() {
                Some(Ok(domain)) => domain,
                Some(Err(e)) => return Err(DispatchError::Store(e)),
                None => break,
            };

            if self.blocklist.is_blocked(&domain) {
                info!("Skipping {} as it is blocked", domain);
                report.skipped += 1;
                continue;
            }

            self.progress.inc_submitted();
            pool.submit(self.probe_task(domain))?;

            if pool.is_saturated() {
                debug!("pausing... {} in flight", pool.in_flight());
                source.pause();
                report.pauses += 1;

                pool.drained().await?;

                if source.resume() {
                    debug!("resuming... {} in flight", pool.in_flight());
                    report.resumes += 1;
                }
            }
        }

        info!("Source ended after {} pages; waiting for in-flight probes", source.pages_fetched());

        while let Some(finished) = pool.join_next().await {
            finished??;
        }

        report.pages_fetched = source.pages_fetched();
        report.progress = self.progress.snapshot();

        info!(
            "done: submitted={} completed={} failed={} skipped={}",
            report.progress.submitted, report.progress.completed, report.progress.failed, report.skipped
        );

        Ok(report)
    }

    fn reap_finished(pool: &mut TaskPool<Result<(), DispatchError>>) -> Result<(), DispatchError> {
        while let Some(finished) = pool.try_reap() {
            finished??;
        }
        Ok(())
    }

    fn probe_task(
        &self,
        domain: String,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send + 'static {
        let probe = self.probe.clone();
        let sink = self.sink.clone();
        let progress = self.progress.clone();
        let job = ProbeJob::new(domain.clone(), self.expiry);

        async move {
            // SQLite writes block, so they go to the blocking pool
            match probe.probe(job).await {
                Ok(Some(result)) => {
                    task::spawn_blocking(move || sink.persist_success(&result)).await??;
                    progress.inc_completed();
                }
                Ok(None) => {
                    // Nothing was due; nothing to persist.
                    progress.inc_completed();
                }
                Err(cause) => {
                    warn!("Probe of {} failed: {}", domain, cause);
                    let cause = cause.to_string();
                    task::spawn_blocking(move || sink.persist_failure(&domain, &cause)).await??;
                    progress.inc_failed();
                }
            }
            Ok::<(), DispatchError>(())
        }
    }
}
