use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Email, MailError, Mailer, SendResult};

/// Mailer that only writes messages to the log. Nothing is kept, so it is
/// safe to leave running.
#[derive(Clone, Default)]
pub struct LogMailer {
    sent: Arc<AtomicU64>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<SendResult, MailError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        let message_id = format!("log-{n}");
        tracing::info!(to = ?email.to, subject = %email.subject, %message_id, "email logged");
        if let Some(text) = email.body.text() {
            tracing::debug!(%message_id, body = %text, "email text");
        }
        if let Some(html) = email.body.html() {
            tracing::debug!(%message_id, body = %html, "email html");
        }

        Ok(SendResult {
            message_id: Some(message_id),
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
