use http::StatusCode;
use shopkit::error::HttpError;
use shopkit_macros::HttpError;

#[derive(thiserror::Error, Debug, HttpError)]
enum ApiError {
    #[error("authentication required")]
    #[http_error(UNAUTHORIZED)]
    Unauthorized,

    #[error("user already exists")]
    #[http_error(409, "User already exists")]
    Conflict,

    #[error("invalid request body")]
    #[http_error(BAD_REQUEST, "Invalid request body")]
    Validation(#[http_details] Vec<String>),

    #[error("provider rejected send ({0}): {1}")]
    #[http_error(BAD_GATEWAY, "provider status {0}")]
    Provider(u16, String),

    #[error("send failed for {recipient}")]
    #[http_error(INTERNAL_SERVER_ERROR, "Failed to send email to {recipient}")]
    Send {
        recipient: String,
        #[http_details]
        errors: Vec<String>,
    },

    #[error("db error: {0}")]
    #[http_error(INTERNAL_SERVER_ERROR, "an internal server error occurred")]
    Anyhow(#[from] anyhow::Error),
}

#[test]
fn unit_variants_use_display_or_override() {
    let unauthorized = ApiError::Unauthorized;
    assert_eq!(unauthorized.http_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(unauthorized.http_message(), "authentication required");
    assert!(unauthorized.http_details().is_empty());

    let conflict = ApiError::Conflict;
    assert_eq!(conflict.http_code(), StatusCode::CONFLICT);
    assert_eq!(conflict.http_message(), "User already exists");
}

#[test]
fn tuple_variants_interpolate_by_index() {
    let provider = ApiError::Provider(422, "bad recipient".into());
    assert_eq!(provider.http_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(provider.http_message(), "provider status 422");
}

#[test]
fn details_are_exposed_from_marked_fields() {
    let validation = ApiError::Validation(vec!["email: invalid email".into()]);
    assert_eq!(validation.http_code(), StatusCode::BAD_REQUEST);
    assert_eq!(validation.http_message(), "Invalid request body");
    assert_eq!(validation.http_details(), vec!["email: invalid email".to_string()]);

    let send = ApiError::Send {
        recipient: "a@x.com".into(),
        errors: vec!["rate limited".into()],
    };
    assert_eq!(send.http_message(), "Failed to send email to a@x.com");
    assert_eq!(send.http_details(), vec!["rate limited".to_string()]);
}

#[test]
fn server_errors_hide_internal_detail() {
    let anyhow_error = ApiError::Anyhow(anyhow::anyhow!("connection refused"));
    assert_eq!(anyhow_error.http_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        anyhow_error.http_message(),
        "an internal server error occurred"
    );
    assert!(anyhow_error.http_details().is_empty());
}
