use shopkit::mail::{Email, MailError, Mailer, MemoryMailer, ResendMailer};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn welcome() -> Email {
    Email::builder()
        .to("ada@example.com")
        .subject("Welcome")
        .html("<p>hello</p>")
        .build()
        .unwrap()
}

#[tokio::test]
async fn resend_posts_email_and_returns_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test"))
        .and(body_partial_json(serde_json::json!({
            "from": "Shop <no-reply@example.com>",
            "to": ["ada@example.com"],
            "subject": "Welcome",
            "html": "<p>hello</p>",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "msg_123" })))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = ResendMailer::new(Some("re_test".into()), "Shop <no-reply@example.com>")
        .unwrap()
        .base_url(server.uri());

    let sent = mailer.send(&welcome()).await.unwrap();
    assert_eq!(sent.message_id.as_deref(), Some("msg_123"));
}

#[tokio::test]
async fn resend_provider_error_carries_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "statusCode": 422,
            "name": "validation_error",
            "message": "Invalid `to` field."
        })))
        .mount(&server)
        .await;

    let mailer = ResendMailer::new(Some("re_test".into()), "no-reply@example.com")
        .unwrap()
        .base_url(server.uri());

    match mailer.send(&welcome()).await {
        Err(MailError::Provider { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message, "Invalid `to` field.");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn resend_without_api_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mailer = ResendMailer::new(None, "no-reply@example.com")
        .unwrap()
        .base_url(server.uri());
    assert!(!mailer.is_configured());

    let err = mailer.send(&welcome()).await.unwrap_err();
    assert!(matches!(err, MailError::MissingConfig(ref key) if key == "RESEND_API_KEY"));

    let blank = ResendMailer::new(Some("  ".into()), "no-reply@example.com").unwrap();
    assert!(!blank.is_configured());
}

#[tokio::test]
async fn memory_mailer_records_and_simulates_failures() {
    let mailer = MemoryMailer::new();
    mailer.fail_next(1);

    assert!(matches!(
        mailer.send(&welcome()).await,
        Err(MailError::Provider { status: 503, .. })
    ));
    let sent = mailer.send(&welcome()).await.unwrap();
    assert_eq!(sent.message_id.as_deref(), Some("memory-1"));

    assert_eq!(mailer.sent_to("ada@example.com").await.len(), 1);
    assert!(mailer.sent_to("bob@example.com").await.is_empty());
}
