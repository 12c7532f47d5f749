//! Host daemon entry point.

use anyhow::Context;
use chord_cli::DaemonConfig;
use chord_net::{server, Handler, ServiceReply, ServiceRequest, TcpTransport};
use chord_node::RingRegistry;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::parse();
    chord_cli::logging::init(&config.log_level)?;

    let transport = TcpTransport::new(config.bind_host(), config.advertise.clone());
    let registry = Arc::new(RingRegistry::new(Arc::new(transport)));

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("cannot listen on {}", config.listen))?;
    info!(listen = %config.listen, advertise = %config.advertise, "chordd started");

    let shutdown = CancellationToken::new();
    let handler: Arc<dyn Handler<ServiceRequest, ServiceReply>> = registry.clone();
    let service = tokio::spawn(server::serve(listener, handler, shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("cannot wait for ctrl-c")?;
    info!("shutting down");

    shutdown.cancel();
    registry.shutdown().await;
    service.await.context("service task failed")?;
    Ok(())
}
