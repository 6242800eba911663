//! Priority job queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::{DelayedJob, Job, JobPriority, JobScheduler, Shutdown};

/// Priority assigned to delayed jobs once their time has come.
const DELAYED_PRIORITY: JobPriority = JobPriority::Normal;

struct Entry {
    priority: JobPriority,
    seq: u64,
    job: Job,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Max-heap: higher priority first, then lower sequence number.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    name: &'static str,
    heap: Mutex<BinaryHeap<Entry>>,
    seq: AtomicU64,
    notify: Notify,
    shutdown: Shutdown,
}

/// Strict-priority job queue, FIFO within a priority.
///
/// The queue is drained either by [`JobQueue::run_pending`] in the
/// caller's task or by a single worker task started with
/// [`JobQueue::spawn_worker`]. Either way jobs run one at a time, which
/// makes the queue a single-writer context.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("name", &self.inner.name)
            .field("pending", &self.len())
            .finish()
    }
}

impl JobQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(name: &'static str, shutdown: Shutdown) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                heap: Mutex::new(BinaryHeap::new()),
                seq: AtomicU64::new(0),
                notify: Notify::new(),
                shutdown,
            }),
        }
    }

    fn heap(&self) -> MutexGuard<'_, BinaryHeap<Entry>> {
        self.inner
            .heap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap().len()
    }

    /// Returns true if no job is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap().is_empty()
    }

    /// Names of the queued jobs, in execution order.
    #[must_use]
    pub fn pending_names(&self) -> Vec<String> {
        let mut entries: Vec<(JobPriority, u64, String)> = self
            .heap()
            .iter()
            .map(|e| (e.priority, e.seq, e.job.name().to_string()))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        entries.into_iter().map(|(_, _, name)| name).collect()
    }

    fn pop(&self) -> Option<Job> {
        self.heap().pop().map(|entry| entry.job)
    }

    async fn execute(&self, job: Job) {
        let name = job.name().to_string();
        if self.inner.shutdown.is_triggered() {
            debug!("[{}] skipping {name}: shutting down", self.inner.name);
            return;
        }
        debug!("[{}] running {name}", self.inner.name);
        match job.run().await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                debug!("[{}] {name} dropped: {e}", self.inner.name);
            }
            Err(e) => {
                error!("[{}] {name} failed: {e}", self.inner.name);
            }
        }
    }

    /// Runs queued jobs in the current task until the queue is empty,
    /// including jobs queued while draining. Returns how many ran.
    pub async fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Some(job) = self.pop() {
            self.execute(job).await;
            count += 1;
        }
        count
    }

    /// Starts the single worker task of this queue.
    ///
    /// The worker exits once shutdown is requested.
    #[must_use]
    pub fn spawn_worker(&self) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            info!("[{}] worker started", queue.inner.name);
            loop {
                if queue.inner.shutdown.is_triggered() {
                    break;
                }
                if let Some(job) = queue.pop() {
                    queue.execute(job).await;
                    continue;
                }
                tokio::select! {
                    () = queue.inner.notify.notified() => {}
                    () = queue.inner.shutdown.wait() => break,
                }
            }
            info!("[{}] worker stopped", queue.inner.name);
        })
    }
}

impl JobScheduler for JobQueue {
    fn queue_job(&self, priority: JobPriority, job: Job) {
        let seq = self.inner.seq.fetch_add(1, AtomicOrdering::Relaxed);
        debug!(
            "[{}] queued {} at {priority:?}",
            self.inner.name,
            job.name()
        );
        self.heap().push(Entry { priority, seq, job });
        self.inner.notify.notify_one();
    }

    fn queue_job_at(&self, when: Instant, job: Job) -> DelayedJob {
        let name = job.name().to_string();
        let queue = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(when).await;
            queue.queue_job(DELAYED_PRIORITY, job);
        });
        DelayedJob::new(name, handle.abort_handle())
    }
}
