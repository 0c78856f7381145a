mod cli;
mod conn;
mod notifier;
mod report;
mod shared;
mod tick;
mod transport;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use common::logger::init_logger;
use customer::model::CustomerId;

use crate::cli::Cli;
use crate::shared::Shared;
use crate::transport::Transport;

/// Accept customers forever, one connection task each. Customer ids are
/// handed out in accept order and never reused.
async fn run_accept_loop(transport: Arc<dyn Transport>, shared: Arc<Shared>) {
    let mut next_id: CustomerId = 1;
    loop {
        match transport.accept().await {
            Ok((stream, peer)) => {
                let id = next_id;
                next_id += 1;
                info!(customer = id, peer = %peer, "accepted connection");
                tokio::spawn(conn::handle_connection(shared.clone(), stream, id));
            }
            Err(err) => warn!(%err, "accept failed"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("toolshare");

    let cli = Cli::parse();
    let cfg = cli.scheduler_config();

    let transport = transport::bind(&cli.listen).await?;
    info!(
        listen = %cli.listen,
        tools = cfg.tool_count,
        min_slice_ms = cfg.min_slice_ms,
        max_slice_ms = cfg.max_slice_ms,
        "server listening"
    );

    let shared = Arc::new(Shared::new(cfg.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    for tool_id in 0..cfg.tool_count {
        tokio::spawn(tick::run(shared.clone(), tool_id, shutdown_rx.clone()));
    }

    tokio::spawn(run_accept_loop(transport.clone(), shared.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // Tool tasks drain their current iteration and exit; the socket file
    // (if any) goes away with us.
    shutdown_tx.send(true).ok();
    transport.cleanup();

    Ok(())
}
