use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use shopkit::auth::{AuthError, Claims, ClaimsExtractor};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::error::Error;

/// JSON body that must pass its `validator` rules.
///
/// Malformed bodies and rule violations are both rejected with
/// [`Error::Validation`], one `field: message` entry per failure.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| Error::validation(e.body_text()))?;

        data.validate()
            .map_err(|e| Error::Validation(field_messages(&e)))?;

        Ok(ValidatedJson(data))
    }
}

fn field_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                format!("{field}: {message}")
            })
        })
        .collect()
}

/// The caller's identity, from a verified session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: String,
}

#[async_trait]
impl<S: Send + Sync> ClaimsExtractor<S> for AuthUser {
    type Rejection = Error;

    async fn try_extract(claims: Claims, _state: &S) -> Result<Self, Self::Rejection> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Unauthorized)?;
        Ok(AuthUser {
            id,
            role: claims.role,
        })
    }
}
