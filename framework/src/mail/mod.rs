//! Email delivery behind a single [`Mailer`] interface.
//!
//! Transports:
//!
//! - [`ResendMailer`]: Resend HTTP API (`POST /emails`).
//! - [`SmtpMailer`]: SMTP via [lettre](https://lettre.rs).
//! - [`LogMailer`]: writes messages to the log instead of sending them.
//! - [`MemoryMailer`]: records messages in memory, for tests.
//!
//! ```ignore
//! let mailer = ResendMailer::new(api_key, "Storefront <no-reply@example.com>")?;
//!
//! let email = Email::builder()
//!     .to("user@example.com")
//!     .subject("Welcome!")
//!     .html("<p>Thanks for signing up.</p>")
//!     .build()?;
//! let sent = mailer.send(&email).await?;
//! ```
//!
//! # SMTP environment variables
//!
//! [`SmtpConfig`] is read with [`EnvConfig`](crate::EnvConfig):
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `SMTP_HOST` | Yes | SMTP server hostname |
//! | `SMTP_PORT` | No | Port (default: 587) |
//! | `SMTP_USERNAME` | No | Username for authentication |
//! | `SMTP_PASSWORD` | No | Password for authentication |
//! | `SMTP_FROM` | Yes | Default sender address |
//! | `SMTP_TLS` | No | `starttls` (default), `tls`, or `none` |
//! | `SMTP_TIMEOUT` | No | Connection timeout in seconds (default: 10) |

mod log;
mod mailer;
mod memory;
mod message;
mod resend;
mod smtp;

pub use log::LogMailer;
pub use mailer::{Mailer, SendResult};
pub use memory::MemoryMailer;
pub use message::{Email, EmailBody, EmailBuilder};
pub use resend::{ResendMailer, DEFAULT_BASE_URL as RESEND_BASE_URL};
pub use smtp::{SmtpConfig, SmtpMailer, TlsMode};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("failed to render template: {0}")]
    Template(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail provider rejected message ({status}): {message}")]
    Provider { status: u16, message: String },
}
