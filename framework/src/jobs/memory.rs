use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::entry::{JobEntry, JobStatus};
use super::traits::QueueProvider;
use super::JobError;

/// In-memory [`QueueProvider`] for development and testing.
///
/// Jobs are stored in a `Vec` behind a mutex. Not durable, all jobs are lost
/// on restart.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    entries: Arc<Mutex<Vec<JobEntry>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored entry, in insertion order.
    pub async fn snapshot(&self) -> Vec<JobEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<JobEntry> {
        self.entries.lock().await.iter().find(|e| e.id == id).cloned()
    }

    /// Entries currently stored for `queue`.
    pub async fn entries_for(&self, queue: &str) -> Vec<JobEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.queue == queue)
            .cloned()
            .collect()
    }

    /// Make every pending entry eligible now, skipping retry backoff.
    pub async fn release_delayed(&self) {
        let now = OffsetDateTime::now_utc();
        for entry in self.entries.lock().await.iter_mut() {
            if entry.status == JobStatus::Pending && entry.run_at > now {
                entry.run_at = now;
            }
        }
    }
}

#[async_trait]
impl QueueProvider for MemoryQueue {
    async fn insert(&self, entry: &JobEntry) -> Result<(), JobError> {
        let mut entries = self.entries.lock().await;
        entries.push(entry.clone());
        Ok(())
    }

    async fn claim_next(
        &self,
        queue: &str,
        worker_id: &str,
        stale_before: OffsetDateTime,
    ) -> Result<Option<JobEntry>, JobError> {
        let mut entries = self.entries.lock().await;
        let now = OffsetDateTime::now_utc();

        let next = entries
            .iter_mut()
            .filter(|e| e.queue == queue)
            .filter(|e| match e.status {
                JobStatus::Pending => e.run_at <= now,
                JobStatus::Running => e.locked_at.is_some_and(|at| at < stale_before),
                _ => false,
            })
            .min_by_key(|e| e.run_at);

        Ok(next.map(|entry| {
            entry.status = JobStatus::Running;
            entry.locked_at = Some(now);
            entry.locked_by = Some(worker_id.to_string());
            entry.attempts += 1;
            entry.clone()
        }))
    }

    async fn update(&self, entry: &JobEntry) -> Result<(), JobError> {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry.clone();
        }
        Ok(())
    }

    async fn purge_finished(&self, older_than: OffsetDateTime) -> Result<u64, JobError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| {
            !(e.status.is_finished() && e.completed_at.unwrap_or(e.created_at) < older_than)
        });
        Ok((before - entries.len()) as u64)
    }
}
