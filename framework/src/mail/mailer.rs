//! The transport interface shared by every mail backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Email, MailError};

/// Outcome of a successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    /// Provider-assigned message id, when the transport reports one.
    pub message_id: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<SendResult, MailError>;

    /// Short transport name for logs.
    fn name(&self) -> &'static str;
}
