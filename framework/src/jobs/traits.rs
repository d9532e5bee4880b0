use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use time::OffsetDateTime;

use super::entry::{JobEntry, JobOpts};
use super::JobError;

/// A serializable job bound to a named queue.
///
/// The job's fields become the stored payload and `perform` handles it. Each
/// queue carries exactly one job type, so the payload shape is fixed per queue.
#[async_trait]
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the queue this job is submitted to (e.g. `"welcomeEmailQueue"`).
    const QUEUE: &'static str;

    /// Application state provided at execution time.
    type Context: Send + Sync + 'static;

    /// Default options for this job type. Override to customise.
    fn default_opts() -> JobOpts {
        JobOpts::default()
    }

    /// Execute the job. Return `Ok(Some(value))` to store a result on the
    /// entry, or `Ok(None)` when there is nothing to record.
    async fn perform(self, ctx: &Self::Context) -> JobResult;
}

/// Convenience alias for the return type of [`Job::perform`].
pub type JobResult = Result<Option<serde_json::Value>, Box<dyn std::error::Error + Send + Sync>>;

/// Backend-agnostic queue storage.
///
/// The [`Worker`](super::Worker) owns all state transitions (retry, expiry,
/// completion) and writes the modified entry back through `update`, so each
/// method maps to a single storage operation.
#[async_trait]
pub trait QueueProvider: Send + Sync + 'static {
    /// Insert a new job entry.
    async fn insert(&self, entry: &JobEntry) -> Result<(), JobError>;

    /// Atomically claim the next eligible job of `queue`.
    ///
    /// Eligible means pending with `run_at <= now`, or still `Running` under a
    /// lock taken before `stale_before` (its worker died mid-job). The
    /// implementation must set `status` to `Running`, `locked_at` to now,
    /// `locked_by` to the worker id, and increment `attempts`. Returns `None`
    /// when no eligible job exists.
    async fn claim_next(
        &self,
        queue: &str,
        worker_id: &str,
        stale_before: OffsetDateTime,
    ) -> Result<Option<JobEntry>, JobError>;

    /// Persist an updated job entry by id.
    async fn update(&self, entry: &JobEntry) -> Result<(), JobError>;

    /// Delete completed, failed and expired entries that finished before `older_than`.
    async fn purge_finished(&self, older_than: OffsetDateTime) -> Result<u64, JobError>;
}

/// Queue handle shared between request handlers, workers and the scheduler.
pub type SharedQueue = Arc<dyn QueueProvider>;
