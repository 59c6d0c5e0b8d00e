use std::path::Path;

use anyhow::{Context, Result};
use huddle_auth::Authenticator;
use huddle_config::AppConfig;
use huddle_database::initialize_database;
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global fmt subscriber, filtered by `RUST_LOG` (default `info`).
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::DEBUG)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Long-lived handles shared by the HTTP server and the admin commands.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());

        ensure_media_directory(Path::new(&config.media.directory)).await?;

        info!(
            database = %config.database.url,
            media = %config.media.directory,
            "backend services ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
        })
    }
}

async fn ensure_media_directory(directory: &Path) -> Result<()> {
    tokio::fs::create_dir_all(directory)
        .await
        .with_context(|| format!("failed to create media directory {}", directory.display()))
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
