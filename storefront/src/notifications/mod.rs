//! Transactional email: payloads, producers and queue handlers.
//!
//! The verification code is sent inline during signup. Welcome and order
//! confirmation emails go through the job queue and are delivered by a
//! [`Worker`](shopkit::jobs::Worker) running [`registry`].

mod sender;

pub use sender::{MailSender, Notification};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shopkit::jobs::{self, Job, JobError, JobRegistry, JobResult, QueueProvider};
use time::format_description::well_known::Rfc2822;
use uuid::Uuid;

use crate::orders::Order;

pub const WELCOME_QUEUE: &str = "welcomeEmailQueue";
pub const ORDER_CONFIRM_QUEUE: &str = "orderConfirmEmailQueue";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeEmail {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmationEmail {
    pub order_id: String,
    pub email: String,
    pub customer_name: String,
    pub order_date: String,
    pub total_amount: f64,
    #[serde(alias = "paymentmethod")]
    pub payment_method: String,
}

impl OrderConfirmationEmail {
    pub fn for_order(order: &Order, email: impl Into<String>, customer_name: impl Into<String>) -> Self {
        OrderConfirmationEmail {
            order_id: order.id.to_string(),
            email: email.into(),
            customer_name: customer_name.into(),
            order_date: order
                .created_at
                .format(&Rfc2822)
                .unwrap_or_else(|_| order.created_at.date().to_string()),
            total_amount: order.total_amount,
            payment_method: order.payment_method.clone(),
        }
    }
}

#[async_trait]
impl Job for WelcomeEmail {
    const QUEUE: &'static str = WELCOME_QUEUE;
    type Context = MailSender;

    async fn perform(self, mail: &MailSender) -> JobResult {
        let sent = mail.send(&self.email, &Notification::Welcome).await?;
        Ok(Some(serde_json::to_value(sent)?))
    }
}

#[async_trait]
impl Job for OrderConfirmationEmail {
    const QUEUE: &'static str = ORDER_CONFIRM_QUEUE;
    type Context = MailSender;

    async fn perform(self, mail: &MailSender) -> JobResult {
        let recipient = self.email.clone();
        let sent = mail
            .send(&recipient, &Notification::OrderConfirmation(self))
            .await?;
        Ok(Some(serde_json::to_value(sent)?))
    }
}

/// Handlers for every notification queue.
pub fn registry() -> JobRegistry<MailSender> {
    JobRegistry::new()
        .register::<WelcomeEmail>()
        .register::<OrderConfirmationEmail>()
}

pub async fn enqueue_welcome_email(
    queue: &dyn QueueProvider,
    email: impl Into<String>,
) -> Result<Uuid, JobError> {
    jobs::enqueue(queue, WelcomeEmail { email: email.into() }).await
}

pub async fn enqueue_order_confirmation(
    queue: &dyn QueueProvider,
    order: OrderConfirmationEmail,
) -> Result<Uuid, JobError> {
    jobs::enqueue(queue, order).await
}
