use anyhow::{Context, Result};
use event_schema::streams;
use event_stream::{EventConsumer, EventLog, RedisEventLog};
use forum_sync_service::config::{Config, LogFormat};
use forum_sync_service::forum::{DiscordForumClient, ForumAdapter};
use forum_sync_service::handlers::{
    ForceSyncHandler, ResourceEventHandler, StreamWorker, FORCE_SYNC_GROUP, RESOURCE_SYNC_GROUP,
};
use forum_sync_service::jobs::ReconcileJob;
use forum_sync_service::metrics;
use forum_sync_service::services::{ForumSync, ForumTarget};
use forum_sync_service::store::{PgStore, MIGRATOR};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

fn init_tracing(format: LogFormat) {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "forum_sync_service=info,event_stream=info,info".into());
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.app.log_format);
    info!(env = %config.app.env, "Starting forum-sync-service");

    let event_log: Arc<dyn EventLog> = Arc::new(
        RedisEventLog::connect(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?,
    );

    config.database.log_config();
    let pool = db_pool::create_pool(config.database.clone())
        .await
        .context("Failed to create database pool")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    let store = Arc::new(PgStore::new(pool));

    let forum: Arc<dyn ForumAdapter> = Arc::new(
        DiscordForumClient::new(&config.discord.api_base, &config.discord.bot_token)
            .context("Failed to build Discord client")?,
    );

    let sync = ForumSync::new(
        forum,
        store.clone(),
        store,
        ForumTarget {
            guild_id: config.discord.guild_id,
            forum_channel_id: config.discord.forum_channel_id,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let resource_worker = StreamWorker::start(
        streams::RESOURCES,
        RESOURCE_SYNC_GROUP,
        EventConsumer::new(event_log.clone()),
        Arc::new(ResourceEventHandler::new(
            sync.clone(),
            config.discord.update_channel_id,
        )),
        config.workers.poll_interval(),
    )
    .await
    .context("Failed to start resource worker")?;

    let force_sync_worker = StreamWorker::start(
        streams::FORCE_SYNC,
        FORCE_SYNC_GROUP,
        EventConsumer::new(event_log.clone()),
        Arc::new(ForceSyncHandler::new(sync.clone())),
        config.workers.poll_interval(),
    )
    .await
    .context("Failed to start force-sync worker")?;

    let reconcile = ReconcileJob::new(sync, config.discord.notification_channel_id);

    let metrics_server =
        metrics::metrics_server(config.app.metrics_port).context("Failed to bind metrics server")?;
    let metrics_handle = metrics_server.handle();
    info!(port = config.app.metrics_port, "Metrics server listening");

    let tasks = vec![
        tokio::spawn(resource_worker.run(shutdown_rx.clone())),
        tokio::spawn(force_sync_worker.run(shutdown_rx.clone())),
        tokio::spawn(reconcile.run(config.workers.sweep_interval(), shutdown_rx)),
    ];
    let metrics_task = tokio::spawn(metrics_server);

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    metrics_handle.stop(true).await;

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task panicked");
        }
    }
    if let Ok(Err(e)) = metrics_task.await {
        error!(error = %e, "Metrics server failed");
    }

    info!("forum-sync-service stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
