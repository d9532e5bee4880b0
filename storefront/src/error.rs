use axum::response::{IntoResponse, Response};
use shopkit::auth::AuthError;
use shopkit::error::error_response;
use shopkit::mail::MailError;
use shopkit::HttpError;

use crate::store::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error, HttpError)]
pub enum Error {
    #[error("invalid request body")]
    #[http_error(BAD_REQUEST, "Invalid request body")]
    Validation(#[http_details] Vec<String>),

    #[error("verify token or email missing")]
    #[http_error(BAD_REQUEST, "Verify token and email are required")]
    MissingVerifyFields,

    #[error("user already exists")]
    #[http_error(CONFLICT, "User already exists")]
    UserExists(#[http_details] Vec<String>),

    #[error("user not found")]
    #[http_error(NOT_FOUND, "User not found")]
    UserNotFound(#[http_details] Vec<String>),

    #[error("invalid password")]
    #[http_error(UNAUTHORIZED, "Invalid Password")]
    InvalidPassword,

    #[error("invalid verification token")]
    #[http_error(UNAUTHORIZED, "Invalid token")]
    InvalidToken,

    #[error("verification token expired")]
    #[http_error(UNAUTHORIZED, "Token has expired")]
    TokenExpired,

    #[error("unauthorized")]
    #[http_error(UNAUTHORIZED, "Unauthorized")]
    Unauthorized,

    #[error("failed to send verification email: {source}")]
    #[http_error(INTERNAL_SERVER_ERROR, "Failed to send verification email")]
    VerificationEmail {
        #[http_details]
        errors: Vec<String>,
        source: MailError,
    },

    #[error(transparent)]
    #[http_error(INTERNAL_SERVER_ERROR, "an internal server error occurred")]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[http_error(INTERNAL_SERVER_ERROR, "an internal server error occurred")]
    Auth(AuthError),
}

impl Error {
    pub fn validation(detail: impl Into<String>) -> Self {
        Error::Validation(vec![detail.into()])
    }

    pub fn verification_email(source: MailError) -> Self {
        let errors = match &source {
            MailError::Provider { message, .. } => vec![message.clone()],
            _ => Vec::new(),
        };
        Error::VerificationEmail { errors, source }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => Error::Unauthorized,
            other => Error::Auth(other),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use shopkit::error::HttpError as _;

    #[test]
    fn details_reach_the_envelope() {
        let err = Error::UserExists(vec!["User with this email already exists".into()]);
        assert_eq!(err.http_code(), StatusCode::CONFLICT);
        assert_eq!(err.http_message(), "User already exists");
        assert_eq!(err.http_details(), vec!["User with this email already exists"]);
    }

    #[test]
    fn internal_errors_stay_private() {
        let err = Error::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.http_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.http_message(), "an internal server error occurred");
        assert!(err.http_details().is_empty());
    }

    #[test]
    fn provider_message_is_listed_for_verification_failures() {
        let err = Error::verification_email(MailError::Provider {
            status: 422,
            message: "domain not verified".into(),
        });
        assert_eq!(err.http_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.http_details(), vec!["domain not verified"]);
    }

    #[test]
    fn unauthorized_auth_error_maps_to_401() {
        let err = Error::from(AuthError::Unauthorized);
        assert_eq!(err.http_code(), StatusCode::UNAUTHORIZED);
    }
}
