mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use shopkit::jobs::{JobStatus, QueueProvider, Worker};
use shopkit::mail::{MemoryMailer, ResendMailer};
use storefront::notifications::{
    self, MailSender, OrderConfirmationEmail, ORDER_CONFIRM_QUEUE, WELCOME_QUEUE,
};

use common::{app, app_with_mailer, TestApp};

fn worker(app: &TestApp) -> Worker<MailSender> {
    Worker::new(
        app.state.queue.clone(),
        notifications::registry(),
        app.state.mail.clone(),
    )
}

#[tokio::test]
async fn welcome_job_is_delivered_by_the_worker() {
    let app = app();
    app.signup("Ada", "ada@example.com", "hunter22").await;
    app.mailer.clear().await;

    let entry = worker(&app)
        .process_next(WELCOME_QUEUE)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(entry.status, JobStatus::Completed);
    assert_eq!(entry.result, Some(json!({"messageId": "memory-1"})));

    let sent = app.mailer.sent_to("ada@example.com").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Welcome to Nexa: Where Style Begins");
    assert!(sent[0].body.html().unwrap().contains("Start Shopping"));

    assert!(worker(&app)
        .process_next(WELCOME_QUEUE)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn placing_an_order_queues_an_escaped_confirmation() {
    let app = app();
    let cookie = app
        .signup("<b>Ada</b>", "ada@example.com", "hunter22")
        .await;

    let res = app
        .post(
            "/orders",
            json!({"totalAmount": 1499.5, "paymentMethod": "UPI"}),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["statusCode"], 201);
    assert_eq!(res.body["message"], "Order placed");
    assert_eq!(res.body["data"]["totalAmount"], 1499.5);
    let order_id = res.body["data"]["id"].as_str().unwrap().to_string();

    let jobs = app.queue.entries_for(ORDER_CONFIRM_QUEUE).await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload["orderId"], order_id.as_str());
    assert_eq!(jobs[0].payload["customerName"], "<b>Ada</b>");
    assert_eq!(jobs[0].payload["paymentMethod"], "UPI");

    app.mailer.clear().await;
    let entry = worker(&app)
        .process_next(ORDER_CONFIRM_QUEUE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, JobStatus::Completed);

    let sent = app.mailer.sent_to("ada@example.com").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Your order has been confirmed 🎉");
    let html = sent[0].body.html().unwrap();
    assert!(html.contains("&lt;b&gt;Ada&lt;/b&gt;"));
    assert!(!html.contains("<b>Ada</b>"));
    assert!(html.contains(&order_id));
    assert!(html.contains("₹1499.5"));
}

#[tokio::test]
async fn orders_require_a_session_and_a_valid_body() {
    let app = app();
    let res = app
        .post(
            "/orders",
            json!({"totalAmount": 10, "paymentMethod": "UPI"}),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let cookie = app.signup("Ada", "ada@example.com", "hunter22").await;
    let res = app
        .post(
            "/orders",
            json!({"totalAmount": 0, "paymentMethod": ""}),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let errors = res.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.ends_with(": Payment method is required")));
    assert!(errors.iter().any(|e| e.ends_with(": Total amount must be greater than 0")));
    assert!(app.queue.entries_for(ORDER_CONFIRM_QUEUE).await.is_empty());
}

#[tokio::test]
async fn order_history_lists_only_the_callers_orders() {
    let app = app();
    let ada = app.signup("Ada", "ada@example.com", "hunter22").await;
    let bob = app.signup("Bob", "bob@example.com", "hunter22").await;

    for amount in [10, 20] {
        app.post(
            "/orders",
            json!({"totalAmount": amount, "paymentMethod": "COD"}),
            Some(&ada),
        )
        .await;
    }
    app.post(
        "/orders",
        json!({"totalAmount": 99, "paymentMethod": "UPI"}),
        Some(&bob),
    )
    .await;

    let res = app.get("/orders", Some(&ada)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_send_is_retried_then_recovers() {
    let app = app();
    notifications::enqueue_welcome_email(app.state.queue.as_ref(), "ada@example.com")
        .await
        .unwrap();
    app.mailer.fail_next(1);

    let worker = worker(&app);
    let entry = worker.process_next(WELCOME_QUEUE).await.unwrap().unwrap();
    assert_eq!(entry.status, JobStatus::Pending);
    assert_eq!(entry.attempts, 1);
    assert!(entry.last_error.unwrap().contains("simulated failure"));

    // backoff keeps it out of reach until released
    assert!(worker.process_next(WELCOME_QUEUE).await.unwrap().is_none());
    app.queue.release_delayed().await;

    let entry = worker.process_next(WELCOME_QUEUE).await.unwrap().unwrap();
    assert_eq!(entry.status, JobStatus::Completed);
    assert_eq!(entry.attempts, 2);
    assert!(entry.last_error.is_none());
    assert_eq!(app.mailer.sent_to("ada@example.com").await.len(), 1);
}

#[tokio::test]
async fn job_fails_after_max_attempts() {
    let app = app();
    let order = OrderConfirmationEmail {
        order_id: "ord-1".into(),
        email: "ada@example.com".into(),
        customer_name: "Ada".into(),
        order_date: "Mon, 19 Oct 2026 10:00:00 +0000".into(),
        total_amount: 10.0,
        payment_method: "COD".into(),
    };
    let id = notifications::enqueue_order_confirmation(app.state.queue.as_ref(), order)
        .await
        .unwrap();
    app.mailer.fail_next(3);

    let worker = worker(&app);
    for _ in 0..3 {
        worker.process_next(ORDER_CONFIRM_QUEUE).await.unwrap().unwrap();
        app.queue.release_delayed().await;
    }

    let entry = app.queue.get(id).await.unwrap();
    assert_eq!(entry.status, JobStatus::Failed);
    assert_eq!(entry.attempts, 3);
    assert!(entry.completed_at.is_some());
    assert!(app.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn legacy_payment_key_is_accepted_from_the_queue() {
    let app = app();
    let entry = shopkit::jobs::JobEntry {
        payload: json!({
            "orderId": "ord-7",
            "email": "ada@example.com",
            "customerName": "Ada",
            "orderDate": "Mon, 19 Oct 2026 10:00:00 +0000",
            "totalAmount": 250,
            "paymentmethod": "Card"
        }),
        ..shopkit::jobs::into_entry(&OrderConfirmationEmail {
            order_id: String::new(),
            email: String::new(),
            customer_name: String::new(),
            order_date: String::new(),
            total_amount: 0.0,
            payment_method: String::new(),
        })
        .unwrap()
    };
    app.state.queue.insert(&entry).await.unwrap();

    let done = worker(&app)
        .process_next(ORDER_CONFIRM_QUEUE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    let sent = app.mailer.sent_to("ada@example.com").await;
    assert!(sent[0].body.html().unwrap().contains("Card"));
}

#[tokio::test]
async fn missing_resend_key_fails_the_job_without_a_request() {
    let resend = ResendMailer::new(None, "Nexa <send@example.com>")
        .unwrap()
        .base_url("http://127.0.0.1:9");
    let app = app_with_mailer(MemoryMailer::new(), Arc::new(resend));

    notifications::enqueue_welcome_email(app.state.queue.as_ref(), "ada@example.com")
        .await
        .unwrap();

    let entry = worker(&app)
        .process_next(WELCOME_QUEUE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, JobStatus::Pending);
    assert_eq!(
        entry.last_error.as_deref(),
        Some("missing required config: RESEND_API_KEY")
    );
}
