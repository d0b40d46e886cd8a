mod handlers;
mod metrics;
mod server;
mod state;

use std::sync::Arc;

use reqwest::Client;
use sync_core::prelude::*;
use tokio::sync::watch;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;
    metrics::init();

    tracing::info!(mode = ?config.backend.mode, "starting reconciler");

    let pool = sync_core::store::create_pool_with_retries(&config.database).await?;
    let store = Arc::new(StoreGateway::new(pool));

    let http_client = Client::builder()
        .trust_env(false)
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let config = Arc::new(config);

    match config.backend.mode {
        BackendMode::Aggregator => {
            let backend = AggregatorClient::new(http_client, config.backend.aggregator.clone());
            run(config, store, backend, shutdown_tx, shutdown_rx).await
        }
        BackendMode::Direct => {
            let backend = DirectIncidentClient::new(http_client, config.backend.direct.clone());
            run(config, store, backend, shutdown_tx, shutdown_rx).await
        }
    }
}

async fn run<B: BackendClient + 'static>(
    config: Arc<Config>,
    store: Arc<StoreGateway>,
    backend: B,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::new(store, backend, config.sync.clone()));

    let app_state = AppState::new(config.clone(), engine.clone(), shutdown_tx.clone());
    let app = server::build_router(app_state);

    let reconciler = tokio::spawn(engine.clone().run_background_loop(shutdown_rx));

    let server_host = config.service.host.clone();
    let server_port = config.service.port;
    let http_server = tokio::spawn(server::serve(server_host, server_port, app, shutdown_tx.subscribe()));

    server::shutdown_signal().await;
    tracing::info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    let _ = reconciler.await;
    if let Err(err) = http_server.await? {
        tracing::error!(error = %err, "HTTP server exited with error");
    }

    Ok(())
}
