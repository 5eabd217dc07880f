//! qbit-natpmp daemon entry point.
//!
//! Keeps qBittorrent's announce IP and port in line with the NAT-PMP
//! mapping handed out by a Wireguard gateway.

use std::time::Duration;

use clap::Parser;
use log::info;
use tokio_util::sync::CancellationToken;

mod config;
mod error;
mod mapper;
mod parser;
mod preferences;
mod reconciler;
mod scheduler;
#[cfg(test)]
mod testing;
mod types;

use config::{CliArgs, Config};
use mapper::NatpmpcMapper;
use preferences::QbittorrentClient;
use reconciler::Reconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load configuration
    let cli = CliArgs::parse();
    let cfg = Config::load(&cli)?;
    info!("Starting qbit-natpmp with config: {:?}", cfg);

    let prefs = QbittorrentClient::new(&cfg)?;
    let mapper = NatpmpcMapper::new(cfg.natpmpc_path.clone());
    let reconciler = Reconciler::new(&cfg, prefs, mapper);

    // Graceful Shutdown
    let cancel = CancellationToken::new();
    let signal_handle = scheduler::spawn_shutdown_watcher(cancel.clone());

    info!("Waiting for signal...");
    scheduler::run(&reconciler, Duration::from_secs(cfg.sleep_time), &cancel).await;

    signal_handle.abort();
    info!("Shutdown complete");
    Ok(())
}
