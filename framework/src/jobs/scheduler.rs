use std::future::Future;
use std::time::Duration;

use time::OffsetDateTime;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use super::traits::SharedQueue;
use super::JobError;

/// Interval tasks that run alongside the workers.
///
/// ```ignore
/// let scheduler = Scheduler::new(queue.clone()).await?;
/// scheduler.retention(Duration::from_secs(3600), Duration::from_secs(7 * 86400)).await?;
/// let _running = scheduler.start().await?;
/// ```
pub struct Scheduler {
    queue: SharedQueue,
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn new(queue: SharedQueue) -> Result<Self, JobError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { queue, inner })
    }

    /// Run `task` every `interval`.
    pub async fn every<F, Fut>(&self, interval: Duration, task: F) -> Result<(), JobError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let repeated = CronJob::new_repeated_async(interval, move |_uuid, _lock| Box::pin(task()))?;
        self.inner.add(repeated).await?;
        Ok(())
    }

    /// Purge finished queue entries older than `max_age`, checking every `interval`.
    pub async fn retention(&self, interval: Duration, max_age: Duration) -> Result<(), JobError> {
        let queue = self.queue.clone();
        self.every(interval, move || {
            let queue = queue.clone();
            async move {
                let cutoff = OffsetDateTime::now_utc() - max_age;
                match queue.purge_finished(cutoff).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "purged finished jobs"),
                    Err(e) => tracing::error!(error = %e, "job retention purge failed"),
                }
            }
        })
        .await
    }

    /// Start the scheduler. Keep the returned handle alive while tasks should run.
    pub async fn start(self) -> Result<JobScheduler, JobError> {
        self.inner.start().await?;
        tracing::info!("⏳ Scheduler running");
        Ok(self.inner)
    }
}
