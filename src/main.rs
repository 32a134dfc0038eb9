// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relational_multisig_server::{
    api::router,
    blockchain::{BlockchainGateway, HttpGateway},
    config::{GovernanceConfig, LogFormat},
    state::AppState,
    storage::GovernanceStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GovernanceConfig::from_env()?;
    init_tracing(config.log_format);

    info!(data_dir = %config.data_dir, "Starting Relational multisig governance server");

    let db_path = config.storage_paths().governance_db();
    let store = Arc::new(GovernanceStore::open(&db_path)?);
    info!(path = %db_path.display(), "Governance database opened");

    let gateway = build_gateway(&config)?;
    if config.service_signer_keys.is_empty() {
        warn!("No service signer keys configured; accounts will only have their owner as member");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(store, gateway, config);

    let shutdown = CancellationToken::new();
    let sweeper = state.governance.sweeper(&state.config);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening (docs at /docs)");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        warn!(error = %e, "Sweeper task ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn build_gateway(
    config: &GovernanceConfig,
) -> Result<Arc<dyn BlockchainGateway>, Box<dyn std::error::Error>> {
    if let Some(url) = &config.gateway_url {
        info!(%url, "Using HTTP blockchain gateway");
        return Ok(Arc::new(HttpGateway::new(url, config.gateway_timeout)?));
    }

    fallback_gateway()
}

#[cfg(feature = "dev")]
fn fallback_gateway() -> Result<Arc<dyn BlockchainGateway>, Box<dyn std::error::Error>> {
    warn!("BLOCKCHAIN_GATEWAY_URL unset; using in-process mock gateway (dev only)");
    Ok(Arc::new(
        relational_multisig_server::blockchain::MockGateway::new(),
    ))
}

#[cfg(not(feature = "dev"))]
fn fallback_gateway() -> Result<Arc<dyn BlockchainGateway>, Box<dyn std::error::Error>> {
    Err("BLOCKCHAIN_GATEWAY_URL must be set".into())
}
