use actix_web::{web, App, HttpServer};
use anyhow::Context;
use marketplace_service::{
    handlers, logging, metrics,
    push::{FcmTransport, PushTransport},
    store::{DocumentStore, MemoryStore, PgStore},
    AppState, Config,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    logging::init_tracing();

    tracing::info!(env = %config.app.env, "Starting marketplace service");

    let store: Arc<dyn DocumentStore> = match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(&config.database, url)
                .await
                .context("Failed to connect to database")?;
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Successfully connected to database");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let transport: Option<Arc<dyn PushTransport>> = match &config.push.fcm_credentials_path {
        Some(path) => {
            let transport = FcmTransport::from_key_file(path, config.push.fcm_project_id.clone())
                .await
                .context("Failed to initialize FCM transport")?;
            Some(Arc::new(transport))
        }
        None => {
            tracing::info!("FCM_CREDENTIALS_PATH not set, push delivery disabled");
            None
        }
    };

    let state = AppState::new(
        store.clone(),
        config.notifications.retention_days,
        transport,
    );

    // Triggers follow the change feed for the life of the process
    let runner = state.trigger_runner();
    let rx = store.subscribe();
    tokio::spawn(async move {
        runner.run(rx).await;
    });

    let janitor = state.notifications.clone();
    let purge_every = Duration::from_secs(config.notifications.purge_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            if let Err(e) = janitor.purge_expired().await {
                tracing::error!(error = ?e, "Notification purge failed");
            }
        }
    });

    let addr = format!("{}:{}", config.app.host, config.app.http_port);
    tracing::info!("Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(TracingLogger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(|cfg| {
                state.configure(cfg);
                handlers::register_routes(cfg);
            })
    })
    .bind(&addr)?
    .run()
    .await?;

    Ok(())
}
