use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tutor_alerts::api::{ApiServer, AppState};
use tutor_alerts::config::AppConfig;
use tutor_alerts::database::{
    self,
    repositories::{SqlxIdentityRepository, SqlxNotificationRepository},
};
use tutor_alerts::logging;
use tutor_alerts::notification::{DeliveryBroadcaster, NotificationGateway, RoomHub};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let (logging_config, _log_guard) = logging::init_logging(config.log_dir.as_deref())?;

    let pool = match config.database_max_connections {
        Some(size) => database::init_pool_with_size(&config.database_url, size).await?,
        None => database::init_pool(&config.database_url).await?,
    };
    database::run_migrations(&pool).await?;

    let hub = RoomHub::with_capacity(config.room_capacity);
    let gateway = NotificationGateway::new(
        Arc::new(SqlxNotificationRepository::new(pool.clone())),
        Arc::new(SqlxIdentityRepository::new(pool.clone())),
        DeliveryBroadcaster::new(Arc::new(hub.clone())),
    )
    .with_limits(config.list_limits);

    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.clone());

    let state = AppState::new(gateway, hub)
        .with_pool(pool.clone())
        .with_logging_config(logging_config);
    let server = ApiServer::new(config.api.clone(), state).with_cancel_token(shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.cancel();
        }
    });

    tracing::info!("tutor-alerts initialized successfully");
    server.run().await?;

    pool.close().await;
    tracing::info!("tutor-alerts stopped");
    Ok(())
}
