//! # Tasklane API Server
//!
//! Serves the REST API and the WebSocket channel, and runs the reminder
//! scheduler in-process.
//!
//! ## Startup
//!
//! 1. Load configuration (`.env` is read outside production)
//! 2. Connect to PostgreSQL and apply migrations
//! 3. Start the reminder worker, which reschedules pending reminders
//! 4. Serve until Ctrl-C, then drain requests and stop the worker
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tasklane-api
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{
    filter::filter_fn, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use tasklane_api::{
    app::{build_router, run_maintenance, AppState, MAINTENANCE_INTERVAL},
    audit::SECURITY_TARGET,
    config::Config,
};
use tasklane_shared::{
    db::{migrations::run_migrations, pool::create_pool},
    events::RealtimeHub,
    notifications::Notifier,
};
use tasklane_worker::ReminderWorker;

/// Application log on stdout; security events as JSON lines on stderr
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},tower_http=info,{}=warn",
            config.logging.level, SECURITY_TARGET
        ))
    });

    let app_log = tracing_subscriber::fmt::layer()
        .with_filter(filter_fn(|meta| meta.target() != SECURITY_TARGET));

    let security_log = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(|meta| meta.target() == SECURITY_TARGET));

    tracing_subscriber::registry()
        .with(filter)
        .with(app_log)
        .with(security_log)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.api.environment,
        "Tasklane API starting"
    );

    let pool = create_pool(config.database.pool_config()).await?;
    run_migrations(&pool).await?;

    let notifier = Notifier::new(pool.clone(), Arc::new(RealtimeHub::new()));
    let worker = ReminderWorker::start(pool.clone(), notifier.clone()).await?;

    let bind_address = config.bind_address();
    let state = AppState::new(pool.clone(), config, notifier, worker.scheduler());

    let maintenance_shutdown = CancellationToken::new();
    let maintenance = tokio::spawn(run_maintenance(
        state.clone(),
        MAINTENANCE_INTERVAL,
        maintenance_shutdown.clone(),
    ));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    maintenance_shutdown.cancel();
    if let Err(e) = maintenance.await {
        tracing::warn!(error = %e, "Maintenance task ended abnormally");
    }
    worker.shutdown().await;
    pool.close().await;

    tracing::info!("Tasklane API stopped");
    Ok(())
}
