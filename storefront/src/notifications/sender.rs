use std::sync::Arc;

use askama::Template;
use shopkit::mail::{Email, MailError, Mailer, SendResult};
use time::OffsetDateTime;

use crate::config::Config;
use crate::verification::TOKEN_TTL;

use super::OrderConfirmationEmail;

/// A transactional email and the fields its template needs.
#[derive(Debug, Clone)]
pub enum Notification {
    Verification { token: String },
    Welcome,
    OrderConfirmation(OrderConfirmationEmail),
}

#[derive(Template)]
#[template(path = "verification.html")]
struct VerificationTemplate<'a> {
    store_name: &'a str,
    year: i32,
    token: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "welcome.html")]
struct WelcomeTemplate<'a> {
    store_name: &'a str,
    store_url: &'a str,
    year: i32,
}

#[derive(Template)]
#[template(path = "order_confirmation.html")]
struct OrderConfirmationTemplate<'a> {
    store_name: &'a str,
    year: i32,
    customer_name: &'a str,
    order_id: &'a str,
    order_date: &'a str,
    payment_method: &'a str,
    currency: &'a str,
    total_amount: f64,
}

/// Renders notifications and hands them to the configured [`Mailer`].
///
/// Signup calls it inline for the verification code, the queue workers call
/// it for everything else.
#[derive(Clone)]
pub struct MailSender {
    mailer: Arc<dyn Mailer>,
    from: String,
    store_name: String,
    store_url: String,
    currency: String,
}

impl MailSender {
    pub fn new(mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        MailSender {
            mailer,
            from: config.mail_from.clone(),
            store_name: config.store_name.clone(),
            store_url: config.store_url.clone(),
            currency: config.currency_symbol.clone(),
        }
    }

    pub async fn send(
        &self,
        recipient: &str,
        notification: &Notification,
    ) -> Result<SendResult, MailError> {
        let email = self.render(recipient, notification)?;
        let result = self.mailer.send(&email).await?;
        tracing::info!(
            to = recipient,
            subject = %email.subject,
            message_id = ?result.message_id,
            transport = self.mailer.name(),
            "email sent"
        );
        Ok(result)
    }

    pub fn render(&self, recipient: &str, notification: &Notification) -> Result<Email, MailError> {
        let year = OffsetDateTime::now_utc().year();
        let store_name = self.store_name.as_str();

        let (subject, html) = match notification {
            Notification::Verification { token } => (
                format!("Your {store_name} Verification Code"),
                VerificationTemplate {
                    store_name,
                    year,
                    token,
                    ttl_minutes: TOKEN_TTL.whole_minutes(),
                }
                .render(),
            ),
            Notification::Welcome => (
                format!("Welcome to {store_name}: Where Style Begins"),
                WelcomeTemplate {
                    store_name,
                    store_url: &self.store_url,
                    year,
                }
                .render(),
            ),
            Notification::OrderConfirmation(order) => (
                "Your order has been confirmed 🎉".to_string(),
                OrderConfirmationTemplate {
                    store_name,
                    year,
                    customer_name: &order.customer_name,
                    order_id: &order.order_id,
                    order_date: &order.order_date,
                    payment_method: &order.payment_method,
                    currency: &self.currency,
                    total_amount: order.total_amount,
                }
                .render(),
            ),
        };
        let html = html.map_err(|e| MailError::Template(e.to_string()))?;

        Email::builder()
            .to(recipient)
            .from(&self.from)
            .subject(subject)
            .html(html)
            .build()
    }
}
