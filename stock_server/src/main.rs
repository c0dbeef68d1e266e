//! Stock feed server.
//!
//! Wires the library together:
//!
//! - `BroadcastScheduler` fetches quotes for the configured symbols on a timer,
//!   fills gaps with mock data and publishes every batch through the
//!   `SubscriberRegistry`.
//! - `CommandReceiver` accepts JSON commands over TCP and hands them, with the
//!   client's UDP address, to the `FeedServer` loop.
//! - `UdpPingListener` and the timeout checker keep subscribers alive or drop
//!   them once they stop pinging.
//!
//! Ctrl+C stops the scheduler, tells every subscriber the feed is ending and
//! exits.
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;

use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info, warn};
use stock_common::net::{COMMAND_PORT, DATA_PORT};
use stock_common::{Command, FeedError, Result};
use stock_server::config::ServerArgs;
use stock_server::model::ping_monitor::PingMonitor;
use stock_server::model::price_store::PriceStore;
use stock_server::providers::rotation::ProviderRotation;
use stock_server::receiver::CommandReceiver;
use stock_server::registry::SubscriberRegistry;
use stock_server::scheduler::BroadcastScheduler;
use stock_server::server::{FeedServer, spawn_timeout_checker};
use stock_server::udp_listener::UdpPingListener;

fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }
    init_logger();
    let config = ServerArgs::parse().into_config()?;

    let store = Arc::new(PriceStore::new());
    if let Some(file) = &config.snapshot {
        match file.load_tracked(&config.symbols).and_then(|quotes| store.seed(quotes)) {
            Ok(count) => info!("Restored {} quote(s) from {}", count, file.path().display()),
            Err(e) => warn!("Ignoring snapshot {}: {}", file.path().display(), e),
        }
    }
    let registry = Arc::new(SubscriberRegistry::new());

    let rotation = ProviderRotation::from_settings(&config.providers)?;
    if rotation.is_empty() {
        warn!("No stock data providers configured, broadcasting mock data only");
    }
    let mut scheduler = BroadcastScheduler::new(rotation, Arc::clone(&store), Arc::clone(&registry));
    if let Some(file) = config.snapshot.clone() {
        scheduler = scheduler.with_snapshot_file(file);
    }
    if let Some(interval) = config.sync_interval {
        scheduler = scheduler.with_sync_interval(interval);
    }

    let udp_socket = Arc::new(UdpSocket::bind(format!("0.0.0.0:{}", DATA_PORT))?);
    info!("UDP socket created on: {}", udp_socket.local_addr()?);
    let ping_monitor = Arc::new(Mutex::new(PingMonitor::new(config.ping_timeout)));
    UdpPingListener::start(Arc::clone(&udp_socket), Arc::clone(&ping_monitor))?;
    let (timeout_tx, timeout_rx) = unbounded::<SocketAddr>();
    spawn_timeout_checker(Arc::clone(&ping_monitor), timeout_tx)?;

    let (cmd_tx, cmd_rx) = unbounded::<(Command, SocketAddr)>();
    let tcp_receiver = CommandReceiver::new(&format!("0.0.0.0:{}", COMMAND_PORT))?;
    thread::spawn(move || {
        if let Err(e) = tcp_receiver.receive_loop_with_channel(cmd_tx) {
            error!("Receiver loop failed: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down server...");
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| FeedError::Format(format!("Failed to set Ctrl+C handler: {}", e)))?;

    scheduler.start(&config.symbols, config.interval)?;
    FeedServer::new(Arc::clone(&store), Arc::clone(&registry), udp_socket, ping_monitor)
        .run(cmd_rx, timeout_rx, shutdown_rx);

    scheduler.stop()?;
    registry.shutdown()?;
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
