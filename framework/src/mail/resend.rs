//! Resend HTTP API transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Email, MailError, Mailer, SendResult};

pub const DEFAULT_BASE_URL: &str = "https://api.resend.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends through `POST {base_url}/emails`.
///
/// The API key is checked on every send, so a mailer built without one still
/// constructs but every send fails with [`MailError::MissingConfig`] before
/// any request is made.
#[derive(Clone)]
pub struct ResendMailer {
    api_key: Option<String>,
    base_url: String,
    from: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendErrorBody {
    message: Option<String>,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, from: impl Into<String>) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            from: from.into(),
            client,
        })
    }

    /// Point at a different API host, e.g. a mock server in tests.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<SendResult, MailError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| MailError::MissingConfig("RESEND_API_KEY".into()))?;

        let request = ResendRequest {
            from: email.from.as_deref().unwrap_or(&self.from),
            to: &email.to,
            subject: &email.subject,
            html: email.body.html(),
            text: email.body.text(),
            reply_to: email.reply_to.as_deref(),
        };

        tracing::debug!(to = ?email.to, subject = %email.subject, "sending email via Resend");

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: ResendResponse = response
                .json()
                .await
                .map_err(|e| MailError::Transport(e.to_string()))?;
            tracing::debug!(message_id = ?body.id, "email accepted by Resend");
            return Ok(SendResult { message_id: body.id });
        }

        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ResendErrorBody>(&raw)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(raw);
        tracing::warn!(status = status.as_u16(), %message, "Resend API error");

        Err(MailError::Provider {
            status: status.as_u16(),
            message,
        })
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}
