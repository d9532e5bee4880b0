use std::sync::Arc;

use axum::extract::FromRef;
use shopkit::auth::{AuthError, CookieConfig, JwtConfig, JwtManager};
use shopkit::cache::TtlCache;
use shopkit::jobs::{MemoryQueue, PgQueue, SharedQueue};
use shopkit::mail::{LogMailer, MailError, Mailer, ResendMailer, SmtpMailer};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::{Config, MailProvider};
use crate::notifications::MailSender;
use crate::orders::{MemoryOrderStore, OrderStore, PgOrderStore};
use crate::users::{MemoryUserStore, PgUserStore, UserProfile, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("mail transport: {0}")]
    Mail(#[from] MailError),
    #[error("session signing: {0}")]
    Auth(#[from] AuthError),
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderStore>,
    pub queue: SharedQueue,
    pub mail: MailSender,
    pub jwt: JwtManager,
    pub user_cache: TtlCache<Uuid, UserProfile>,
}

impl AppState {
    /// Postgres-backed stores and queue when a pool is given, in-memory otherwise.
    pub fn from_config(config: Config, pool: Option<PgPool>) -> Result<Self, SetupError> {
        let mailer = build_mailer(&config)?;
        let (users, orders, queue): (Arc<dyn UserStore>, Arc<dyn OrderStore>, SharedQueue) =
            match pool {
                Some(pool) => (
                    Arc::new(PgUserStore::new(pool.clone())),
                    Arc::new(PgOrderStore::new(pool.clone())),
                    Arc::new(PgQueue::new(pool)),
                ),
                None => {
                    tracing::info!("using in-memory stores and queue");
                    (
                        Arc::new(MemoryUserStore::new()),
                        Arc::new(MemoryOrderStore::new()),
                        Arc::new(MemoryQueue::new()),
                    )
                }
            };

        Self::assemble(config, users, orders, queue, mailer)
    }

    /// In-memory state around the given parts. Used by tests.
    pub fn with_parts(
        config: Config,
        users: Arc<dyn UserStore>,
        queue: SharedQueue,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, SetupError> {
        Self::assemble(
            config,
            users,
            Arc::new(MemoryOrderStore::new()),
            queue,
            mailer,
        )
    }

    fn assemble(
        config: Config,
        users: Arc<dyn UserStore>,
        orders: Arc<dyn OrderStore>,
        queue: SharedQueue,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, SetupError> {
        let cookies = CookieConfig::default().secure(config.env().is_production());
        let jwt = JwtConfig::new(&config.hmac_key)?
            .duration(config.session_length())
            .cookie_config(cookies)
            .build();

        Ok(AppState {
            mail: MailSender::new(mailer, &config),
            user_cache: TtlCache::new(config.user_cache_ttl()),
            config: Arc::new(config),
            users,
            orders,
            queue,
            jwt,
        })
    }
}

fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>, MailError> {
    let mailer: Arc<dyn Mailer> = match config.mail_provider {
        MailProvider::Resend => {
            let resend = ResendMailer::new(config.resend_api_key.clone(), &config.mail_from)?
                .base_url(&config.resend_base_url);
            if !resend.is_configured() {
                tracing::warn!("RESEND_API_KEY is not set, every send will fail");
            }
            Arc::new(resend)
        }
        MailProvider::Smtp => Arc::new(SmtpMailer::from_env()?),
        MailProvider::Log => Arc::new(LogMailer::new()),
    };
    tracing::info!(transport = mailer.name(), "mail transport ready");
    Ok(mailer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_provider_does_not_keep_messages() {
        let mut config = Config::default();
        config.mail_provider = MailProvider::Log;
        assert_eq!(build_mailer(&config).unwrap().name(), "log");
    }
}
