//! Queue workers and periodic housekeeping.

use std::time::Duration;

use shopkit::jobs::{JobError, JobScheduler, Scheduler, Worker, WorkerHandle};

use crate::notifications;
use crate::state::AppState;

const RETENTION_INTERVAL: Duration = Duration::from_secs(3600);
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Notification workers and the housekeeping scheduler, running until
/// [`Background::shutdown`].
pub struct Background {
    workers: WorkerHandle,
    scheduler: JobScheduler,
}

impl Background {
    /// Stop the scheduler, then let in-flight mail jobs finish.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.scheduler.shutdown().await {
            tracing::warn!(error = %e, "scheduler did not shut down cleanly");
        }
        self.workers.shutdown().await;
    }
}

/// Start notification workers for `queues` (all when empty) and the scheduler.
pub async fn start(state: &AppState, queues: &[String]) -> Result<Background, JobError> {
    let workers = Worker::new(
        state.queue.clone(),
        notifications::registry(),
        state.mail.clone(),
    )
    .only(queues.iter().map(String::as_str))?
    .start();

    let scheduler = Scheduler::new(state.queue.clone()).await?;
    scheduler
        .retention(RETENTION_INTERVAL, state.config.job_retention())
        .await?;

    let cache = state.user_cache.clone();
    scheduler
        .every(CACHE_SWEEP_INTERVAL, move || {
            let cache = cache.clone();
            async move {
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "swept expired user cache entries");
                }
            }
        })
        .await?;

    Ok(Background {
        workers,
        scheduler: scheduler.start().await?,
    })
}
