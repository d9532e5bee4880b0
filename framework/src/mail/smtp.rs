use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

use super::{Email, EmailBody, MailError, Mailer, SendResult};
use crate::config::EnvConfig;

type Transport = AsyncSmtpTransport<Tokio1Executor>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    #[default]
    Starttls,
    Tls,
    /// Plaintext, for local relays such as Mailpit.
    None,
}

/// SMTP settings, read from `SMTP_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from: String,
    #[serde(default)]
    pub tls: TlsMode,
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
}

fn default_port() -> u16 {
    587
}

fn default_timeout_secs() -> u64 {
    10
}

impl SmtpConfig {
    pub fn from_env() -> Result<Self, MailError> {
        <Self as EnvConfig>::from_env_with_prefix("SMTP")
            .map_err(|e| MailError::MissingConfig(format!("SMTP_*: {e}")))
    }
}

/// Delivers through an SMTP relay with lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<Transport>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_env() -> Result<Self, MailError> {
        Self::new(SmtpConfig::from_env()?)
    }

    pub fn new(config: SmtpConfig) -> Result<Self, MailError> {
        let from = mailbox(&config.from)?;
        let relay_error = |e: lettre::transport::smtp::Error| MailError::Smtp(e.to_string());

        let mut builder = match config.tls {
            TlsMode::Starttls => Transport::starttls_relay(&config.host).map_err(relay_error)?,
            TlsMode::Tls => Transport::relay(&config.host).map_err(relay_error)?,
            TlsMode::None => Transport::builder_dangerous(&config.host),
        }
        .port(config.port)
        .timeout(Some(Duration::from_secs(config.timeout)));

        if let (Some(user), Some(pass)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(SmtpMailer {
            transport: Arc::new(builder.build()),
            from,
        })
    }

    fn to_message(&self, email: &Email) -> Result<Message, MailError> {
        let from = match email.from.as_deref() {
            Some(addr) => mailbox(addr)?,
            None => self.from.clone(),
        };

        let mut builder = Message::builder()
            .from(from)
            .subject(&email.subject)
            .message_id(None);
        for addr in &email.to {
            builder = builder.to(mailbox(addr)?);
        }
        if let Some(addr) = email.reply_to.as_deref() {
            builder = builder.reply_to(mailbox(addr)?);
        }

        match &email.body {
            EmailBody::Text(text) => builder.body(text.clone()),
            EmailBody::Html(html) => builder.singlepart(SinglePart::html(html.clone())),
            EmailBody::Multipart { text, html } => {
                builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))
            }
        }
        .map_err(|e| MailError::Build(e.to_string()))
    }
}

fn mailbox(addr: &str) -> Result<Mailbox, MailError> {
    addr.parse()
        .map_err(|_| MailError::InvalidAddress(addr.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<SendResult, MailError> {
        let message = self.to_message(email)?;
        let message_id = message
            .headers()
            .get_raw("Message-ID")
            .map(str::to_owned);

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        Ok(SendResult { message_id })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> SmtpMailer {
        SmtpMailer::new(SmtpConfig {
            host: "localhost".into(),
            port: 1025,
            username: None,
            password: None,
            from: "Shop <shop@example.com>".into(),
            tls: TlsMode::None,
            timeout: 1,
        })
        .unwrap()
    }

    #[test]
    fn builds_multipart_message_with_id() {
        let email = Email::builder()
            .to("ada@example.com")
            .subject("Hi")
            .text("hi")
            .html("<p>hi</p>")
            .build()
            .unwrap();

        let message = mailer().to_message(&email).unwrap();
        assert!(message.headers().get_raw("Message-ID").is_some());
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("From: Shop <shop@example.com>"));
    }

    #[test]
    fn rejects_bad_recipient() {
        let email = Email::builder()
            .to("not an address")
            .subject("Hi")
            .text("hi")
            .build()
            .unwrap();

        assert!(matches!(
            mailer().to_message(&email),
            Err(MailError::InvalidAddress(_))
        ));
    }
}
