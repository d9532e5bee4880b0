use std::ops::Deref;
use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash};
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{self, SameSite};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, Cookie, HeaderMapExt};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha384;
use time::OffsetDateTime;

use crate::error::error_response;
use crate::HttpError;

const DEFAULT_SESSION_LENGTH: time::Duration = time::Duration::hours(24);
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, HttpError)]
pub enum AuthError {
    #[error("Unauthorized")]
    #[http_error(UNAUTHORIZED)]
    Unauthorized,

    #[error("JWT secret too short (len={0}, need at least 32 bytes)")]
    #[http_error(INTERNAL_SERVER_ERROR, "an internal server error occurred")]
    WeakSecret(usize),

    #[error("failed to sign token: {0}")]
    #[http_error(INTERNAL_SERVER_ERROR, "an internal server error occurred")]
    Signing(String),

    #[error("password hashing error: {0}")]
    #[http_error(INTERNAL_SERVER_ERROR, "an internal server error occurred")]
    PasswordHash(argon2::password_hash::Error),

    #[error("password hashing task panicked")]
    #[http_error(INTERNAL_SERVER_ERROR, "an internal server error occurred")]
    PasswordHashPanic,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

/// Settings for the session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    name: &'static str,
    http_only: bool,
    secure: bool,
    same_site: SameSite,
    path: &'static str,
}

impl CookieConfig {
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }
    pub fn path(mut self, path: &'static str) -> Self {
        self.path = path;
        self
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        CookieConfig {
            name: "accessToken",
            http_only: true,
            secure: true,
            same_site: SameSite::Strict,
            path: "/",
        }
    }
}

/// Session claims carried in the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    /// Standard JWT `exp` claim, unix seconds.
    pub exp: i64,
}

impl Claims {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.exp <= now.unix_timestamp()
    }
}

#[derive(Clone)]
pub struct JwtManager(Arc<JwtConfig>);

pub struct JwtConfig {
    key: Hmac<Sha384>,
    duration: time::Duration,
    cookie_config: CookieConfig,
}

impl JwtConfig {
    pub fn new(secret: &str) -> Result<JwtConfig, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret(secret.len()));
        }
        // HS-384 over the recommended HS-256 for a harder to brute-force signature
        let key = Hmac::<Sha384>::new_from_slice(secret.as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(JwtConfig {
            key,
            duration: DEFAULT_SESSION_LENGTH,
            cookie_config: CookieConfig::default(),
        })
    }

    pub fn duration(mut self, duration: time::Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn cookie_config(mut self, cookie_config: CookieConfig) -> Self {
        self.cookie_config = cookie_config;
        self
    }

    pub fn build(self) -> JwtManager {
        JwtManager(Arc::new(self))
    }
}

impl JwtManager {
    /// Claims for a session starting now.
    pub fn claims_for(&self, subject: impl Into<String>, role: impl Into<String>) -> Claims {
        let now = OffsetDateTime::now_utc();
        Claims {
            sub: subject.into(),
            role: role.into(),
            iat: now.unix_timestamp(),
            exp: (now + self.0.duration).unix_timestamp(),
        }
    }

    pub fn generate_token(&self, claims: &Claims) -> Result<String, AuthError> {
        claims
            .sign_with_key(&self.0.key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn generate_session_cookie(&self, token: &str) -> cookie::Cookie<'static> {
        let cfg = &self.0.cookie_config;
        cookie::Cookie::build((cfg.name, token.to_owned()))
            .http_only(cfg.http_only)
            .secure(cfg.secure)
            .same_site(cfg.same_site)
            .path(cfg.path)
            .max_age(self.0.duration)
            .build()
    }

    /// Empty, already expired session cookie. Overwrites the client's copy.
    pub fn removal_cookie(&self) -> cookie::Cookie<'static> {
        let cfg = &self.0.cookie_config;
        cookie::Cookie::build((cfg.name, ""))
            .http_only(cfg.http_only)
            .secure(cfg.secure)
            .same_site(cfg.same_site)
            .path(cfg.path)
            .max_age(time::Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build()
    }

    /// Sign a session for `subject` and add its cookie to `jar`.
    pub fn start_session(
        &self,
        jar: cookie::CookieJar,
        subject: impl Into<String>,
        role: impl Into<String>,
    ) -> Result<(cookie::CookieJar, String), AuthError> {
        let claims = self.claims_for(subject, role);
        let token = self.generate_token(&claims)?;
        let jar = jar.add(self.generate_session_cookie(&token));
        Ok((jar, token))
    }

    /// Always emits the removal cookie, whether or not the request carried one.
    pub fn end_session(&self, jar: cookie::CookieJar) -> cookie::CookieJar {
        jar.add(self.removal_cookie())
    }

    /// Returns Ok(None) if the request did not carry a token.
    ///
    /// A bearer token takes precedence over the session cookie.
    pub fn extract_claims(&self, headers: &HeaderMap) -> Result<Option<Claims>, AuthError> {
        if let Some(auth_header) = headers.typed_get::<Authorization<Bearer>>() {
            return self.verify_token(auth_header.token()).map(Some);
        }

        if let Some(cookie) = headers.typed_get::<Cookie>() {
            if let Some(token) = cookie.get(self.0.cookie_config.name) {
                return self.verify_token(token).map(Some);
            }
        }

        Ok(None)
    }

    /// Parse and verify a token, rejecting expired sessions.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims: Claims = token.verify_with_key(&self.0.key).map_err(|e| {
            tracing::debug!("JWT failed to verify: {}", e);
            AuthError::Unauthorized
        })?;

        if claims.is_expired(OffsetDateTime::now_utc()) {
            tracing::debug!(sub = %claims.sub, "session expired");
            return Err(AuthError::Unauthorized);
        }

        Ok(claims)
    }
}

/// Converts verified claims into an extractor type.
///
/// A basic `AuthUser` merely converts claims, an admin extractor would also
/// check the role.
#[async_trait]
pub trait ClaimsExtractor<S: Send + Sync>: Sized {
    type Rejection: From<AuthError> + IntoResponse;

    async fn try_extract(claims: Claims, state: &S) -> Result<Self, Self::Rejection>;
}

/// Extractor for routes that MUST be authenticated.
///
/// Allows `Jwt(user): Jwt<AuthUser>` in handlers. Requires `FromRef<S>` for
/// [`JwtManager`] on the router state.
pub struct Jwt<J>(pub J);

impl<J> Deref for Jwt<J> {
    type Target = J;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, J> FromRequestParts<S> for Jwt<J>
where
    S: Send + Sync,
    JwtManager: FromRef<S>,
    J: ClaimsExtractor<S>,
{
    type Rejection = J::Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jwt = JwtManager::from_ref(state);
        let claims = jwt
            .extract_claims(&parts.headers)?
            .ok_or(AuthError::Unauthorized)?;
        Ok(Jwt(J::try_extract(claims, state).await?))
    }
}

/// Extractor for routes that MAY be authenticated.
///
/// `None` when no token was sent. A token that fails verification is treated
/// like no token at all.
pub struct JwtOption<J>(pub Option<J>);

impl<J> Deref for JwtOption<J> {
    type Target = Option<J>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, J> FromRequestParts<S> for JwtOption<J>
where
    S: Send + Sync,
    JwtManager: FromRef<S>,
    J: ClaimsExtractor<S>,
{
    type Rejection = J::Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jwt = JwtManager::from_ref(state);
        match jwt.extract_claims(&parts.headers) {
            Ok(Some(claims)) => Ok(JwtOption(J::try_extract(claims, state).await.ok())),
            Ok(None) | Err(AuthError::Unauthorized) => Ok(JwtOption(None)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Hashes a password. Produced hash is a "PHC String" that includes a random salt
///
/// The underlying Argon2 hashing is computationally intensive,
/// therefore performed on a thread where blocking is acceptable
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || -> Result<String, AuthError> {
        let salt = SaltString::generate(rand::thread_rng());
        Ok(
            PasswordHash::generate(Argon2::default(), password, salt.as_salt())
                .inspect_err(|e| tracing::warn!("failed to generate password hash: {}", e))
                .map_err(AuthError::PasswordHash)?
                .to_string(),
        )
    })
    .await
    .map_err(|_| AuthError::PasswordHashPanic)?
}

/// Verifies a password against a "PHC String" hash. A mismatch is `Unauthorized`.
pub async fn verify_password(password: String, password_hash: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || -> Result<(), AuthError> {
        let hash = PasswordHash::new(&password_hash)
            .inspect_err(|err| tracing::warn!("invalid password hash: {}", err))
            .map_err(AuthError::PasswordHash)?;

        match hash.verify_password(&[&Argon2::default()], password) {
            Ok(_) => Ok(()),
            Err(argon2::password_hash::Error::Password) => Err(AuthError::Unauthorized),
            Err(err) => {
                tracing::trace!("failed to verify password hash: {}", err);
                Err(AuthError::PasswordHash(err))
            }
        }
    })
    .await
    .map_err(|_| AuthError::PasswordHashPanic)?
}
