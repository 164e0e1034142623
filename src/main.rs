use std::net::SocketAddr;

use graphiql_explorer::{config, router, AppState};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    let config = config::Config::from_env()?;
    let bind_addr = config.bind_addr.clone();
    info!(
        upstream = %config.upstream_url,
        page_enabled = config.page_enabled,
        subscriptions = config
            .endpoints
            .as_ref()
            .is_some_and(|e| !e.subscriptions_endpoint.is_empty()),
        "starting explorer"
    );
    let state = AppState::initialize(config)?;

    let addr: SocketAddr = bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "server failed");
            e
        })?;

    Ok(())
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
