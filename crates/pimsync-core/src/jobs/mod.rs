//! Job scheduling.
//!
//! Work is wrapped into named, priority-tagged [`Job`]s and submitted to
//! a [`JobScheduler`]. The synchronizer runs two queues: the external
//! access queue (opens external objects, builds descriptors) and the
//! resource-store writer queue (applies descriptors). Descriptors are the
//! only values handed from one to the other.

mod guard;
mod queue;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::Result;

pub use guard::{ExportGuard, ExportTicket};
pub use queue::JobQueue;

/// Priority of a job, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum JobPriority {
    /// Background work such as full enumeration.
    Lowest,
    /// Regular notification processing.
    #[default]
    Normal,
    /// Newly arrived mail.
    AboveNormal,
    /// User-triggered work such as exports.
    Immediate,
}

type JobFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// A named unit of work.
pub struct Job {
    name: String,
    future: JobFuture,
}

impl Job {
    /// Wraps a future into a job.
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: Box::pin(future),
        }
    }

    /// Job name, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the job to completion.
    ///
    /// # Errors
    ///
    /// Returns whatever error the wrapped work returns.
    pub async fn run(self) -> Result<()> {
        self.future.await
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Handle to a job scheduled for later.
///
/// Dropping the handle does not cancel the job.
#[derive(Debug)]
pub struct DelayedJob {
    name: String,
    handle: AbortHandle,
}

impl DelayedJob {
    pub(crate) const fn new(name: String, handle: AbortHandle) -> Self {
        Self { name, handle }
    }

    /// Name of the scheduled job.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancels the job if it has not been queued yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Returns true once the timer has fired or the job was cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Accepts units of work.
///
/// Submission is fire-and-forget: results are only observed through
/// the side effects of the job and the failure log.
pub trait JobScheduler: Send + Sync {
    /// Queues a job at a priority.
    fn queue_job(&self, priority: JobPriority, job: Job);

    /// Queues a job once `when` is reached.
    ///
    /// Must be called from within a Tokio runtime.
    fn queue_job_at(&self, when: Instant, job: Job) -> DelayedJob;
}

/// Process-wide shutdown flag.
///
/// Checked before externally triggered work is started and whenever a
/// queued job is about to run. In-flight jobs are not interrupted.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests shutdown.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once shutdown was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until shutdown is requested.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Returns `Err(Error::Shutdown)` once shutdown was requested.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Shutdown`] if the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            Err(crate::Error::Shutdown)
        } else {
            Ok(())
        }
    }
}
