use std::net::Ipv4Addr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use shopkit::logging::{self, LogConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use storefront::{background, routes, AppState, Config};

#[derive(Parser)]
#[command(name = "storefront", about = "Storefront API and notification workers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Also run the notification workers in this process.
        #[arg(long)]
        with_workers: bool,
    },
    /// Run notification workers only.
    Worker {
        /// Restrict to the named queue. Repeatable.
        #[arg(long = "queue", value_name = "NAME")]
        queues: Vec<String>,
    },
    /// Apply database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("failed to read configuration")?;

    let log_config = LogConfig::new(config.env())
        .dir(&config.log_dir)
        .file_prefix("storefront.log");
    let _log_guard = logging::init(&log_config)?;
    config.warn_on_defaults();

    let pool = connect(&config).await?;

    match cli.command.unwrap_or(Command::Serve { with_workers: false }) {
        Command::Migrate => {
            let pool = pool.context("DATABASE_URL is required to run migrations")?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("migrations applied");
        }
        Command::Worker { queues } => {
            if pool.is_none() {
                anyhow::bail!("DATABASE_URL is required for a standalone worker");
            }
            let state = AppState::from_config(config, pool)?;
            let background = background::start(&state, &queues).await?;
            shopkit::shutdown_signal().await;
            background.shutdown().await;
        }
        Command::Serve { with_workers } => {
            // An in-memory queue is only visible to workers in this process.
            let with_workers = with_workers || pool.is_none();
            let port = config.port;
            let state = AppState::from_config(config, pool)?;
            let background = if with_workers {
                Some(background::start(&state, &[]).await?)
            } else {
                None
            };
            shopkit::serve((Ipv4Addr::UNSPECIFIED, port), routes::router(state)).await?;
            if let Some(background) = background {
                background.shutdown().await;
            }
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<Option<PgPool>> {
    let Some(url) = config.database_url.as_deref() else {
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to database")?;
    Ok(Some(pool))
}
