use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use shopkit::auth::{self, Jwt, JwtOption};
use shopkit::error::ApiResponse;
use time::OffsetDateTime;
use validator::Validate;

use super::extract::{AuthUser, ValidatedJson};
use crate::error::{Error, Result};
use crate::notifications::{self, Notification};
use crate::state::AppState;
use crate::store::StoreError;
use crate::users::{LoginView, NewUser, SignupView, UserProfile};
use crate::verification::{self, VerificationChallenge, VerifyError};

#[derive(Debug, Deserialize, Validate)]
pub struct SignupReq {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyReq {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginReq {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

pub async fn signup(
    state: State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<SignupReq>,
) -> Result<(CookieJar, ApiResponse<SignupView>)> {
    if state.users.find_by_email(&req.email).await?.is_some() {
        return Err(user_exists());
    }

    let password_hash = auth::hash_password(req.password).await?;
    let challenge = VerificationChallenge::issue(OffsetDateTime::now_utc());
    let token = challenge.token.clone();

    let user = state
        .users
        .create(NewUser {
            name: req.name,
            email: req.email,
            password_hash,
            verification: challenge,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => user_exists(),
            other => other.into(),
        })?;
    tracing::info!(user_id = %user.id, "user signed up");

    // The account stays even if the code cannot be delivered.
    state
        .mail
        .send(&user.email, &Notification::Verification { token })
        .await
        .map_err(Error::verification_email)?;

    if let Err(e) = notifications::enqueue_welcome_email(state.queue.as_ref(), &user.email).await {
        tracing::error!(user_id = %user.id, error = %e, "failed to enqueue welcome email");
    }

    let (jar, _) = state
        .jwt
        .start_session(jar, user.id.to_string(), user.role.as_str())?;

    Ok((jar, ApiResponse::ok(SignupView::from(&user), "Sign up successful")))
}

pub async fn verify_token(
    state: State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyReq>,
) -> Result<ApiResponse<()>> {
    let (Some(email), Some(token)) = (non_empty(req.email), non_empty(req.token)) else {
        return Err(Error::MissingVerifyFields);
    };

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(Error::UserNotFound(Vec::new()))?;

    let now = OffsetDateTime::now_utc();
    verification::check(user.verification.as_ref(), &token, now).map_err(|e| match e {
        VerifyError::Invalid => Error::InvalidToken,
        VerifyError::Expired => Error::TokenExpired,
    })?;

    // A concurrent request may have consumed the token since the read above.
    if !state.users.mark_verified(user.id, &token, now).await? {
        return Err(Error::InvalidToken);
    }
    state.user_cache.invalidate(&user.id).await;
    tracing::info!(user_id = %user.id, "email verified");

    Ok(ApiResponse::ok((), "Email verified successfully"))
}

pub async fn login(
    state: State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginReq>,
) -> Result<(CookieJar, ApiResponse<LoginView>)> {
    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| Error::UserNotFound(vec!["User with this email does not exist".into()]))?;

    auth::verify_password(req.password, user.password_hash.clone())
        .await
        .map_err(|e| match e {
            auth::AuthError::Unauthorized => Error::InvalidPassword,
            other => other.into(),
        })?;

    let (jar, _) = state
        .jwt
        .start_session(jar, user.id.to_string(), user.role.as_str())?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok((jar, ApiResponse::ok(LoginView::from(&user), "Logged in")))
}

pub async fn me(auth_user: Jwt<AuthUser>, state: State<AppState>) -> Result<ApiResponse<UserProfile>> {
    if let Some(profile) = state.user_cache.get(&auth_user.id).await {
        tracing::debug!(user_id = %auth_user.id, "profile served from cache");
        return Ok(ApiResponse::ok(profile, "user fetched successfully"));
    }

    let user = state
        .users
        .find_by_id(auth_user.id)
        .await?
        .ok_or(Error::UserNotFound(Vec::new()))?;
    let profile = UserProfile::from(&user);
    state.user_cache.insert(user.id, profile.clone()).await;

    Ok(ApiResponse::ok(profile, "user fetched successfully"))
}

pub async fn logout(
    auth_user: JwtOption<AuthUser>,
    state: State<AppState>,
    jar: CookieJar,
) -> (CookieJar, ApiResponse<()>) {
    if let Some(user) = auth_user.as_ref() {
        state.user_cache.invalidate(&user.id).await;
    }
    let jar = state.jwt.end_session(jar);
    (jar, ApiResponse::ok((), "Logged out successfully"))
}

fn user_exists() -> Error {
    Error::UserExists(vec!["User with this email already exists".into()])
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
