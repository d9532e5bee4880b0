use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::entry::{JobEntry, JobStatus, Retry};
use super::registry::JobRegistry;
use super::traits::SharedQueue;
use super::JobError;

const MAX_BACKOFF_SECS: u64 = 300;
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(300);

/// Job processor running one consumer loop per queue of a [`JobRegistry`].
///
/// The worker owns all state-transition logic: on success it marks the entry
/// completed, on failure it decides whether to retry (with backoff) or mark
/// permanently failed, and it checks expiry before dispatching. Entries left
/// `Running` by a worker that died are claimed again once their lock is older
/// than [`Worker::lock_timeout`].
///
/// ```ignore
/// let registry = JobRegistry::new()
///     .register::<WelcomeEmail>()
///     .register::<OrderConfirmationEmail>();
///
/// let handle = Worker::new(queue, registry, app_state)
///     .poll_interval(Duration::from_millis(500))
///     .start();
/// shutdown_signal().await;
/// handle.shutdown().await;
/// ```
pub struct Worker<S: Send + Sync + 'static> {
    queue: SharedQueue,
    registry: Arc<JobRegistry<S>>,
    ctx: Arc<S>,
    queues: Vec<String>,
    concurrency: usize,
    poll_interval: Duration,
    lock_timeout: Duration,
    worker_id: String,
}

impl<S: Send + Sync + 'static> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            registry: self.registry.clone(),
            ctx: self.ctx.clone(),
            queues: self.queues.clone(),
            concurrency: self.concurrency,
            poll_interval: self.poll_interval,
            lock_timeout: self.lock_timeout,
            worker_id: self.worker_id.clone(),
        }
    }
}

/// Running consumer loops started by [`Worker::start`].
///
/// Dropping the handle stops claiming without waiting for in-flight jobs.
pub struct WorkerHandle {
    stop: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Stop claiming new jobs and wait for the ones in flight to be recorded.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for handle in self.loops {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "worker loop panicked");
            }
        }
        tracing::info!("worker stopped");
    }
}

impl<S: Send + Sync + 'static> Worker<S> {
    pub fn new(queue: SharedQueue, registry: JobRegistry<S>, ctx: S) -> Self {
        let queues = registry.queues().into_iter().map(String::from).collect();
        Self {
            queue,
            registry: Arc::new(registry),
            ctx: Arc::new(ctx),
            queues,
            concurrency: 1,
            poll_interval: Duration::from_secs(1),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            worker_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Jobs processed in parallel per queue (default: 1, strictly serial).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// How often to poll when idle (default: 1s). Backs off slightly during
    /// idle streaks.
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    /// How long a claimed entry may stay `Running` before another worker
    /// takes it over (default: 5 minutes). Must exceed the slowest job.
    pub fn lock_timeout(mut self, d: Duration) -> Self {
        self.lock_timeout = d;
        self
    }

    /// Restrict the worker to a subset of the registered queues.
    pub fn only<I, Q>(mut self, queues: I) -> Result<Self, JobError>
    where
        I: IntoIterator<Item = Q>,
        Q: Into<String>,
    {
        let selected: Vec<String> = queues.into_iter().map(Into::into).collect();
        if let Some(unknown) = selected.iter().find(|q| !self.registry.contains(q)) {
            return Err(JobError::UnknownQueue(unknown.clone()));
        }
        if !selected.is_empty() {
            self.queues = selected;
        }
        Ok(self)
    }

    pub fn queues(&self) -> &[String] {
        &self.queues
    }

    /// Spawn one background loop per queue and return immediately.
    pub fn start(self) -> WorkerHandle {
        let (stop, stopped) = watch::channel(false);
        let loops = self
            .queues
            .iter()
            .map(|queue| self.spawn_loop(queue.clone(), stopped.clone()))
            .collect();
        tracing::info!(queues = ?self.queues, worker_id = %self.worker_id, "⏳ Worker running");
        WorkerHandle { stop, loops }
    }

    /// Claim and run a single job from `queue`, if one is eligible.
    ///
    /// Returns the entry as written back to the queue.
    pub async fn process_next(&self, queue: &str) -> Result<Option<JobEntry>, JobError> {
        let Some(entry) = self.claim(queue).await? else {
            return Ok(None);
        };
        let entry = self.execute(entry).await;
        self.queue.update(&entry).await?;
        Ok(Some(entry))
    }

    async fn claim(&self, queue: &str) -> Result<Option<JobEntry>, JobError> {
        let stale_before = OffsetDateTime::now_utc() - self.lock_timeout;
        self.queue
            .claim_next(queue, &self.worker_id, stale_before)
            .await
    }

    fn spawn_loop(&self, queue: String, mut stopped: watch::Receiver<bool>) -> JoinHandle<()> {
        let worker = self.clone();

        tokio::spawn(async move {
            let permits = worker.concurrency as u32;
            let semaphore = Arc::new(Semaphore::new(worker.concurrency));
            let mut idle_streak: u32 = 0;

            while !*stopped.borrow() {
                let permit = tokio::select! {
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                    _ = stopped.changed() => break,
                };

                let entry = match worker.claim(&queue).await {
                    Ok(Some(e)) => e,
                    Ok(None) => {
                        drop(permit);
                        idle_streak = idle_streak.saturating_add(1);
                        let backoff = worker
                            .poll_interval
                            .mul_f64((1.5_f64).min(1.0 + idle_streak as f64 * 0.1));
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = stopped.changed() => {}
                        }
                        continue;
                    }
                    Err(e) => {
                        drop(permit);
                        tracing::error!(error = %e, %queue, "failed to poll queue");
                        tokio::select! {
                            _ = tokio::time::sleep(worker.poll_interval) => {}
                            _ = stopped.changed() => {}
                        }
                        continue;
                    }
                };

                idle_streak = 0;
                let worker = worker.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    let entry = worker.execute(entry).await;
                    if let Err(e) = worker.queue.update(&entry).await {
                        tracing::error!(job_id = %entry.id, error = %e, "failed to record job outcome");
                    }
                });
            }

            // Every permit back means every in-flight job has been recorded.
            if semaphore.acquire_many(permits).await.is_ok() {
                tracing::debug!(%queue, "queue loop drained");
            }
        })
    }

    /// Run a claimed entry and apply the resulting state transition.
    async fn execute(&self, mut entry: JobEntry) -> JobEntry {
        let job_id = entry.id;
        let queue = entry.queue.clone();
        let now = OffsetDateTime::now_utc();

        if entry.is_expired(now) {
            tracing::info!(%job_id, %queue, "job expired, skipping");
            entry.finish(JobStatus::Expired, None, now);
            return entry;
        }

        if entry.attempts > entry.max_attempts {
            tracing::error!(%job_id, %queue, attempts = entry.attempts, "job abandoned by its worker too often");
            let error = entry
                .last_error
                .take()
                .unwrap_or_else(|| "lock expired on the final attempt".to_string());
            entry.finish(JobStatus::Failed, Some(error), now);
            return entry;
        }

        let Some(handler) = self.registry.get(&queue).cloned() else {
            tracing::error!(%job_id, %queue, "no handler registered");
            let error = JobError::UnknownQueue(queue).to_string();
            entry.finish(JobStatus::Failed, Some(error), now);
            return entry;
        };

        let span = tracing::info_span!("job", %job_id, %queue, attempt = entry.attempts);
        let result = handler(entry.payload.clone(), self.ctx.clone())
            .instrument(span)
            .await;

        match result {
            Ok(job_result) => {
                tracing::info!(%job_id, %queue, "job completed");
                entry.complete(job_result, OffsetDateTime::now_utc());
            }
            Err(e) => {
                let error = e.to_string();
                let backoff = Duration::from_secs(retry_backoff_secs(entry.attempts));
                match entry.fail_attempt(error.clone(), backoff, OffsetDateTime::now_utc()) {
                    Retry::After(delay) => tracing::warn!(
                        %job_id, %queue,
                        attempt = entry.attempts,
                        %error,
                        backoff_secs = delay.as_secs(),
                        "job failed, scheduling retry"
                    ),
                    Retry::Exhausted => tracing::error!(
                        %job_id, %queue,
                        attempts = entry.attempts,
                        %error,
                        "job permanently failed"
                    ),
                }
            }
        }

        entry
    }
}

/// Exponential backoff after the given number of attempts, capped at 5 minutes.
pub(crate) fn retry_backoff_secs(attempts: i32) -> u64 {
    let exp = attempts.clamp(0, 31) as u32;
    2_u64.saturating_pow(exp).min(MAX_BACKOFF_SECS)
}

#[cfg(test)]
mod tests {
    use super::retry_backoff_secs;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(retry_backoff_secs(1), 2);
        assert_eq!(retry_backoff_secs(2), 4);
        assert_eq!(retry_backoff_secs(8), 256);
        assert_eq!(retry_backoff_secs(9), 300);
        assert_eq!(retry_backoff_secs(40), 300);
    }
}
