use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppEnv;

/// Where and how loudly to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub env: AppEnv,
    /// Directory for the daily-rotated JSON log. Console only when `None`.
    pub dir: Option<PathBuf>,
    /// File name prefix, the date is appended on rotation.
    pub file_prefix: String,
}

impl LogConfig {
    pub fn new(env: AppEnv) -> Self {
        LogConfig {
            env,
            dir: None,
            file_prefix: "app.log".into(),
        }
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// `RUST_LOG` wins, otherwise the environment's default level.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.env.default_log_level()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("cannot open log directory: {0}")]
    File(#[from] InitError),
    #[error("cannot install log subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Install the global subscriber: human readable console output plus an
/// optional JSON file layer.
///
/// Keep the returned guard alive for the life of the process, dropping it
/// flushes and stops the file writer.
pub fn init(cfg: &LogConfig) -> Result<Option<WorkerGuard>, LogError> {
    let console = fmt::layer().with_target(true);

    match &cfg.dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(cfg.file_prefix.clone())
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().json().with_writer(writer).with_ansi(false);

            tracing_subscriber::registry()
                .with(cfg.filter())
                .with(console)
                .with(file)
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(cfg.filter())
                .with(console)
                .try_init()?;
            Ok(None)
        }
    }
}
