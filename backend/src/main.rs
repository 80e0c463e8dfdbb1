use actix_web::{web, App, HttpServer};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use tennis_backend::config::Config;
use tennis_backend::db::DocumentStore;
use tennis_backend::middleware::cors_middleware;
use tennis_backend::routes;
use tennis_backend::service::sender_from_config;
use tennis_backend::state::AppState;
use tennis_backend::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize telemetry
    init_telemetry(&config.server.rust_log);

    let store = Arc::new(
        DocumentStore::load(&config.storage)
            .await
            .context("Failed to load document store")?,
    );

    let sender = sender_from_config(&config.whatsapp).context("Failed to build WhatsApp sender")?;
    tracing::info!(
        provider = sender.provider(),
        expose_code = config.tac.expose_code,
        "TAC delivery configured"
    );

    let state = web::Data::new(AppState::new(&config, store.clone(), sender));

    if config.tac.sweep_interval_secs > 0 {
        let sweeper = state.clone();
        let period = Duration::from_secs(config.tac.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match sweeper.tac.sweep(Utc::now()).await {
                    Ok(report) => tracing::debug!(
                        challenges = report.challenges,
                        sessions = report.sessions,
                        "Sweep finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "Sweep failed"),
                }
            }
        });
    }

    tracing::info!(
        "Starting tennis league backend on {}:{}",
        config.server.host,
        config.server.port
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_middleware())
            .wrap(actix_web::middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await?;

    store.flush().await.context("Failed to flush document store")?;
    Ok(())
}
