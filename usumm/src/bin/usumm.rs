use clap::Parser;
use eyre::Context;
use std::sync::Arc;
use usumm::config::ServerConfig;
use usumm::web::{self, AppState};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // a missing .env is fine; the environment may already be set up
    let _ = dotenv::dotenv();
    let config = ServerConfig::parse();
    usumm::init_tracing(config.log_level);

    let state = Arc::new(AppState::from_config(&config)?);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("bind to {}", config.bind))?;
    tracing::info!(
        addr = %listener.local_addr().context("get local address")?,
        "usumm listening"
    );

    web::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}
