use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use wayfarer_core::config::{AppConfig, ConfigError, LoadOptions};
use wayfarer_db::{connect_with_settings, migrations, DbPool};
use wayfarer_delivery::dispatcher::{Dispatcher, RetryPolicy};
use wayfarer_delivery::transport::{ChannelTransport, HttpTransport, NoopTransport, TransportError};

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dispatcher: Arc<Dispatcher>,
}

impl Application {
    pub fn api_state(&self) -> AppState {
        AppState::new(self.db_pool.clone(), self.dispatcher.clone(), &self.config)
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("delivery transport initialization failed: {0}")]
    Transport(#[source] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let retry_policy =
        RetryPolicy { max_retries: config.delivery.max_retries, ..RetryPolicy::default() };
    let dispatcher = Arc::new(Dispatcher::new(build_transport(&config)?, retry_policy));

    Ok(Application { config, db_pool, dispatcher })
}

/// Config validation guarantees an API key accompanies a provider URL, so
/// anything short of the full pair falls back to the logging-only transport.
fn build_transport(config: &AppConfig) -> Result<Arc<dyn ChannelTransport>, BootstrapError> {
    match (&config.delivery.provider_base_url, &config.delivery.provider_api_key) {
        (Some(base_url), Some(api_key)) => {
            let transport = HttpTransport::new(
                base_url,
                api_key.clone(),
                Duration::from_secs(config.delivery.send_timeout_secs),
            )
            .map_err(BootstrapError::Transport)?;
            info!(
                event_name = "system.bootstrap.delivery_transport",
                correlation_id = "bootstrap",
                transport_mode = "http",
                "delivery provider configured"
            );
            Ok(Arc::new(transport))
        }
        _ => {
            info!(
                event_name = "system.bootstrap.delivery_transport",
                correlation_id = "bootstrap",
                transport_mode = "noop",
                "no delivery provider configured; outbound messages are logged only"
            );
            Ok(Arc::new(NoopTransport))
        }
    }
}
