//! Main entry point for the Ampere notification server.

use std::sync::Arc;

use ampere_notify::{
    DeliveryWorker, DispatchEngine, InMemoryTaskQueue, ReqwestTransport, WorkerPool,
};
use ampere_persistence::{ExternalDbPersistService, PersistenceService, create_schema};
use ampere_server::{AppState, Configuration, startup, token};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configuration = Configuration::new()?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    let prometheus = if configuration.metrics_enabled() {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };
    ampere_notify::metrics::init_metrics();

    // Credential token, when the database uses short-lived passwords
    let (token_cache, rotation) = match configuration.db_token_url() {
        Some(token_url) => {
            let cache = token::token_cache(configuration.notification_timeout())?;
            let rotation = token::CredentialRotation::start(cache.clone(), token_url.clone()).await?;
            cache.start_refresh(configuration.db_token_refresh());
            info!(token_url = %token_url, "Database token authentication enabled");
            (Some(cache), Some(Arc::new(rotation)))
        }
        None => (None, None),
    };

    let db_token = rotation.as_ref().map(|r| r.current());
    let db = configuration
        .database_connection(db_token.as_deref())
        .await?;
    if configuration.db_init_schema() {
        create_schema(&db).await?;
        info!("Database schema initialized");
    }

    let db_service = Arc::new(ExternalDbPersistService::new(db));
    let rotation_task = rotation.map(|rotation| {
        rotation.spawn(
            configuration.clone(),
            db_service.clone(),
            configuration.db_token_refresh(),
        )
    });

    let persistence: Arc<dyn PersistenceService> = db_service;
    if let Err(e) = persistence.health_check().await {
        warn!(error = %e, "Database health check failed at start-up");
    }

    let queue = Arc::new(InMemoryTaskQueue::new(
        configuration.notification_queue_capacity(),
    ));
    let transport = Arc::new(ReqwestTransport::new(configuration.notification_timeout())?);
    let delivery = Arc::new(DeliveryWorker::new(transport, configuration.retry_policy()));
    let pool = WorkerPool::start(
        configuration.notification_workers(),
        queue.clone(),
        delivery,
    );

    let app_state = Arc::new(AppState {
        persistence: persistence.clone(),
        dispatch: Arc::new(DispatchEngine::new(persistence, queue.clone())),
        prometheus,
    });

    let shutdown_signal = startup::wait_for_shutdown_signal().await;
    let mut shutdown_rx = shutdown_signal.subscribe();

    let address = configuration.server_address();
    let port = configuration.server_port();
    let server = startup::http_server(app_state, address.clone(), port)?;
    let server_handle = server.handle();
    info!(address = %address, port, "Ampere server started");

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            server_handle.stop(true).await;
        }
    }

    queue.close();
    pool.shutdown(configuration.notification_drain_timeout()).await;
    if let Some(task) = rotation_task {
        task.abort();
    }
    if let Some(cache) = token_cache {
        cache.shutdown();
    }

    info!("Ampere server stopped");
    Ok(())
}
