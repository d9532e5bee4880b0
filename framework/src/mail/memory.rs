use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Email, MailError, Mailer, SendResult};

/// Mailer that records messages instead of delivering them.
///
/// Clones share the same outbox, which grows without bound. Meant for tests,
/// use [`LogMailer`](super::LogMailer) for a running server.
#[derive(Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Email>>>,
    failures: Arc<AtomicUsize>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sends with a provider error.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, address: &str) -> Vec<Email> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|e| e.to.iter().any(|to| to == address))
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<SendResult, MailError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(MailError::Provider {
                status: 503,
                message: "simulated failure".into(),
            });
        }

        let mut sent = self.sent.lock().await;
        sent.push(email.clone());
        let message_id = format!("memory-{}", sent.len());
        tracing::info!(to = ?email.to, subject = %email.subject, %message_id, "email recorded");

        Ok(SendResult {
            message_id: Some(message_id),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
