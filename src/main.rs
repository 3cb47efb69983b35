use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pesa_core::config::{Config, SharedMpesaConfig};
use pesa_core::mpesa::MpesaClient;
use pesa_core::startup;
use pesa_core::store::InMemoryStore;
use pesa_core::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let report = startup::validate_environment(&config).await;
    report.print();
    if !report.environment {
        anyhow::bail!("startup validation failed");
    }
    if !report.gateway {
        // The gateway may come back; initiation will fail (or fall back to
        // simulation) until it does.
        tracing::warn!("payment gateway is not reachable at startup");
    }

    let state = AppState {
        store: Arc::new(InMemoryStore::new()),
        mpesa: MpesaClient::new(),
        mpesa_config: SharedMpesaConfig::new(config.mpesa.clone()),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
