use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::StoreError;
use crate::verification::{self, VerificationChallenge};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(StoreError::Database(sqlx::Error::Decode(
                format!("unknown role {other:?}").into(),
            ))),
        }
    }
}

/// A stored account. Never serialized directly; handlers respond with the
/// projections below so the password hash stays private.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub verification: Option<VerificationChallenge>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub verification: VerificationChallenge,
}

/// Returned by signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
}

/// Returned by login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Returned by `/me`, and what the current-user cache holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for SignupView {
    fn from(user: &User) -> Self {
        SignupView {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            email_verified: user.email_verified,
        }
    }
}

impl From<&User> for LoginView {
    fn from(user: &User) -> Self {
        LoginView {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Set `email_verified` and clear the challenge, but only while `token`
    /// is still the live, unexpired challenge at `now`. Returns `false` when
    /// nothing matched, so a token is consumed at most once.
    async fn mark_verified(
        &self,
        id: Uuid,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError>;
}

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored user, for tests that need to age a challenge.
    pub async fn put(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn remove(&self, id: Uuid) -> Option<User> {
        self.users.write().await.remove(&id)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict(new.email));
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: Role::User,
            email_verified: false,
            verification: Some(new.verification),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn mark_verified(
        &self,
        id: Uuid,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        if verification::check(user.verification.as_ref(), token, now).is_err() {
            return Ok(false);
        }
        user.email_verified = true;
        user.verification = None;
        user.updated_at = now;
        Ok(true)
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, email_verified, \
                            verify_token, verify_token_expires_at, created_at, updated_at";

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role")?;
    let token: Option<String> = row.try_get("verify_token")?;
    let expires_at: Option<OffsetDateTime> = row.try_get("verify_token_expires_at")?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse()?,
        email_verified: row.try_get("email_verified")?,
        verification: token
            .zip(expires_at)
            .map(|(token, expires_at)| VerificationChallenge { token, expires_at }),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, verify_token, verify_token_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.verification.token)
        .bind(new.verification.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, &new.email))?;

        user_from_row(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn mark_verified(
        &self,
        id: Uuid,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, verify_token = NULL, verify_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND verify_token = $2 AND verify_token_expires_at > $3
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            verification: VerificationChallenge::issue(OffsetDateTime::now_utc()),
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryUserStore::new();
        store.create(new_user("ada@example.com")).await.unwrap();

        let err = store.create(new_user("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn mark_verified_clears_challenge() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("ada@example.com")).await.unwrap();
        assert!(!user.email_verified);
        let token = user.verification.as_ref().unwrap().token.clone();
        let now = OffsetDateTime::now_utc();

        assert!(store.mark_verified(user.id, &token, now).await.unwrap());
        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(user.email_verified);
        assert!(user.verification.is_none());

        assert!(!store.mark_verified(Uuid::new_v4(), &token, now).await.unwrap());
    }

    #[tokio::test]
    async fn token_is_consumed_once_even_after_two_successful_checks() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("ada@example.com")).await.unwrap();
        let now = OffsetDateTime::now_utc();

        // two requests read the same record before either writes
        let first = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        let second = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        let token = first.verification.as_ref().unwrap().token.clone();
        assert!(verification::check(first.verification.as_ref(), &token, now).is_ok());
        assert!(verification::check(second.verification.as_ref(), &token, now).is_ok());

        assert!(store.mark_verified(created.id, &token, now).await.unwrap());
        assert!(!store.mark_verified(created.id, &token, now).await.unwrap());
    }

    #[tokio::test]
    async fn wrong_or_lapsed_token_does_not_verify() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("ada@example.com")).await.unwrap();
        let challenge = user.verification.clone().unwrap();

        assert!(!store
            .mark_verified(user.id, "000000x", OffsetDateTime::now_utc())
            .await
            .unwrap());
        assert!(!store
            .mark_verified(user.id, &challenge.token, challenge.expires_at)
            .await
            .unwrap());

        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(!user.email_verified);
        assert!(user.verification.is_some());
    }

    #[test]
    fn projections_omit_password_hash() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "secret-hash".into(),
            role: Role::User,
            email_verified: false,
            verification: None,
            created_at: now,
            updated_at: now,
        };

        let signup = serde_json::to_value(SignupView::from(&user)).unwrap();
        assert_eq!(
            signup,
            serde_json::json!({
                "id": user.id,
                "email": "ada@example.com",
                "role": "user",
                "emailVerified": false
            })
        );

        let login = serde_json::to_string(&LoginView::from(&user)).unwrap();
        assert!(login.contains("createdAt"));
        assert!(!login.contains("secret-hash"));
    }
}
