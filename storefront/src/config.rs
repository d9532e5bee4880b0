use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use shopkit::{AppEnv, EnvConfig};

const DEV_HMAC_KEY: &str = "storefront-development-signing-key-change-me";

/// Which transport delivers mail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    #[default]
    Resend,
    Smtp,
    /// Record messages in memory and log them.
    Log,
}

/// Application settings, read from the environment (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    app_env: Option<AppEnv>,
    #[serde(default)]
    node_env: Option<AppEnv>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_hmac_key")]
    pub hmac_key: String,
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
    #[serde(default)]
    pub mail_provider: MailProvider,
    #[serde(default)]
    pub resend_api_key: Option<String>,
    #[serde(default = "default_resend_base_url")]
    pub resend_base_url: String,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,
    #[serde(default = "default_store_name")]
    pub store_name: String,
    #[serde(default = "default_store_url")]
    pub store_url: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_user_cache_ttl_secs")]
    pub user_cache_ttl_secs: u64,
    #[serde(default = "default_job_retention_hours")]
    pub job_retention_hours: u64,
}

fn default_port() -> u16 {
    3030
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_hmac_key() -> String {
    DEV_HMAC_KEY.to_string()
}
fn default_session_hours() -> i64 {
    24
}
fn default_resend_base_url() -> String {
    shopkit::mail::RESEND_BASE_URL.to_string()
}
fn default_mail_from() -> String {
    "Storefront <no-reply@example.com>".to_string()
}
fn default_store_name() -> String {
    "Storefront".to_string()
}
fn default_store_url() -> String {
    "http://localhost:3030".to_string()
}
fn default_currency_symbol() -> String {
    "₹".to_string()
}
fn default_user_cache_ttl_secs() -> u64 {
    300
}
fn default_job_retention_hours() -> u64 {
    168
}

impl Config {
    /// Load `.env` if present, then read the environment.
    pub fn load() -> Result<Self, shopkit::config::ConfigError> {
        shopkit::config::load_dotenv();
        Self::from_env()
    }

    /// Warn about development defaults left in place. Call once logging is up.
    pub fn warn_on_defaults(&self) {
        if self.env().is_production() && self.hmac_key == DEV_HMAC_KEY {
            tracing::warn!("HMAC_KEY is unset in production, using the development key");
        }
        if self.database_url.is_none() {
            tracing::warn!("DATABASE_URL is unset, data and queued jobs live in memory only");
        }
    }

    /// Settings for the given environment, everything else at defaults.
    pub fn for_env(env: AppEnv) -> Self {
        Config {
            app_env: Some(env),
            ..Default::default()
        }
    }

    /// `APP_ENV`, falling back to `NODE_ENV`.
    pub fn env(&self) -> AppEnv {
        self.app_env.or(self.node_env).unwrap_or_default()
    }

    pub fn session_length(&self) -> time::Duration {
        time::Duration::hours(self.session_hours.max(1))
    }

    pub fn user_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_cache_ttl_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_hours * 3600)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: default_port(),
            app_env: None,
            node_env: None,
            log_dir: default_log_dir(),
            database_url: None,
            hmac_key: default_hmac_key(),
            session_hours: default_session_hours(),
            mail_provider: MailProvider::default(),
            resend_api_key: None,
            resend_base_url: default_resend_base_url(),
            mail_from: default_mail_from(),
            store_name: default_store_name(),
            store_url: default_store_url(),
            currency_symbol: default_currency_symbol(),
            user_cache_ttl_secs: default_user_cache_ttl_secs(),
            job_retention_hours: default_job_retention_hours(),
        }
    }
}
