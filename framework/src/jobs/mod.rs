//! Background job queue with pluggable backends, retry, and expiry.
//!
//! # Architecture
//!
//! - [`Job`]: Serializable payload bound to a named queue, with the logic that handles it.
//! - [`JobEntry`]: The stored representation of a queued job. Maps directly to a
//!   row of the `jobs` table when using [`PgQueue`].
//! - [`QueueProvider`]: Backend-agnostic storage trait, shared as [`SharedQueue`].
//! - [`MemoryQueue`]: In-memory provider for development and testing.
//! - [`PgQueue`]: Postgres provider, claims with `FOR UPDATE SKIP LOCKED`.
//! - [`JobRegistry`]: Maps queue names to deserialization + execution logic.
//! - [`Worker`]: Runs one consumer loop per registered queue.
//! - [`Scheduler`]: Interval tasks such as purging finished entries.
//!
//! # Quick Start
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct WelcomeEmail { email: String }
//!
//! #[async_trait]
//! impl Job for WelcomeEmail {
//!     const QUEUE: &'static str = "welcomeEmailQueue";
//!     type Context = AppState;
//!
//!     async fn perform(self, ctx: &AppState) -> JobResult {
//!         ctx.mail.send(&self.email, &Notification::Welcome).await?;
//!         Ok(None)
//!     }
//! }
//!
//! enqueue(queue.as_ref(), WelcomeEmail { email: "a@b.com".into() }).await?;
//!
//! let registry = JobRegistry::new().register::<WelcomeEmail>();
//! let workers = Worker::new(queue, registry, app_state).start();
//! ```

mod entry;
mod memory;
mod postgres;
mod registry;
mod scheduler;
mod traits;
mod worker;

pub use entry::{JobEntry, JobOpts, JobStatus, Retry};
pub use memory::MemoryQueue;
pub use postgres::PgQueue;
pub use registry::JobRegistry;
pub use scheduler::Scheduler;
pub use traits::{Job, JobResult, QueueProvider, SharedQueue};
pub use worker::{Worker, WorkerHandle};

pub use tokio_cron_scheduler::JobScheduler;

use time::OffsetDateTime;
use tokio_cron_scheduler::JobSchedulerError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("scheduler error: {0}")]
    Schedule(#[from] JobSchedulerError),
    #[error("no handler registered for queue {0}")]
    UnknownQueue(String),
    #[error("corrupt job entry: {0}")]
    Corrupt(String),
    #[error("{0}")]
    Other(String),
}

/// Serialize a [`Job`] into a [`JobEntry`] using its default options.
pub fn into_entry<J: Job>(job: &J) -> Result<JobEntry, JobError> {
    into_entry_with(job, J::default_opts())
}

/// Serialize a [`Job`] into a [`JobEntry`] with explicit options.
pub fn into_entry_with<J: Job>(job: &J, opts: JobOpts) -> Result<JobEntry, JobError> {
    Ok(build_entry(J::QUEUE, serde_json::to_value(job)?, &opts))
}

/// Serialize a job and insert it into its queue. Returns the entry id.
pub async fn enqueue<J: Job>(queue: &dyn QueueProvider, job: J) -> Result<Uuid, JobError> {
    enqueue_with(queue, job, J::default_opts()).await
}

/// Serialize a job with options and insert it into its queue.
pub async fn enqueue_with<J: Job>(
    queue: &dyn QueueProvider,
    job: J,
    opts: JobOpts,
) -> Result<Uuid, JobError> {
    let entry = into_entry_with(&job, opts)?;
    let id = entry.id;
    queue.insert(&entry).await?;
    tracing::debug!(%id, queue = J::QUEUE, "job enqueued");
    Ok(id)
}

pub(crate) fn build_entry(queue: &str, payload: serde_json::Value, opts: &JobOpts) -> JobEntry {
    let now = OffsetDateTime::now_utc();
    JobEntry {
        id: Uuid::new_v4(),
        queue: queue.to_string(),
        payload,
        status: JobStatus::Pending,
        attempts: 0,
        max_attempts: opts.max_attempts,
        run_at: opts.delay.map(|d| now + d).unwrap_or(now),
        expires_at: opts.expires_in.map(|d| now + d),
        locked_at: None,
        locked_by: None,
        last_error: None,
        result: None,
        created_at: now,
        completed_at: None,
    }
}
