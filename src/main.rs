use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ticket_planner::api::{build_router, AppState};
use ticket_planner::config::LoggingConfig;
use ticket_planner::{Config, Credentials};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    info!("Starting ticket-planner v{}", env!("CARGO_PKG_VERSION"));

    let credentials = Credentials::from_env();
    let bind_address = config.server.bind_address();
    let state = AppState::from_config(config, &credentials).context("failed to initialise services")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shut down");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.is_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
