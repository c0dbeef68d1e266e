//! Command dispatch of the feed server.
//!
//! [`FeedServer`] owns the map from UDP data addresses to registry
//! subscribers. The binary feeds it commands from the TCP receiver and
//! expired addresses from the keep-alive checker; every command from one
//! client is handled on its own, so a bad one never affects other clients.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select, tick};
use log::{debug, error, info, warn};
use stock_common::{Command, CommandKind, Result};

use crate::model::ping_monitor::PingMonitor;
use crate::model::price_store::PriceStore;
use crate::registry::{SubscriberId, SubscriberRegistry};
use crate::stream::{handle_client_stream, send_request_reply};

/// How often the keep-alive checker looks for silent subscribers.
const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Command loop state: open streams keyed by client data address.
pub struct FeedServer {
    store: Arc<PriceStore>,
    registry: Arc<SubscriberRegistry>,
    socket: Arc<UdpSocket>,
    ping_monitor: Arc<Mutex<PingMonitor>>,
    streams: HashMap<SocketAddr, SubscriberId>,
}

impl FeedServer {
    /// Server with no open streams.
    pub fn new(
        store: Arc<PriceStore>,
        registry: Arc<SubscriberRegistry>,
        socket: Arc<UdpSocket>,
        ping_monitor: Arc<Mutex<PingMonitor>>,
    ) -> Self {
        Self {
            store,
            registry,
            socket,
            ping_monitor,
            streams: HashMap::new(),
        }
    }

    /// Number of open subscriber streams.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Apply one client command. `target` is the client's UDP data address.
    pub fn handle_command(&mut self, command: Command, target: SocketAddr) -> Result<()> {
        match command.kind {
            CommandKind::Subscribe => self.subscribe(&command, target),
            CommandKind::Unsubscribe => self.unsubscribe(&command, target),
            CommandKind::Request => self.request(&command, target),
            CommandKind::Ping => {
                self.ping_monitor.lock()?.update_ping(target);
                Ok(())
            }
        }
    }

    fn subscribe(&mut self, command: &Command, target: SocketAddr) -> Result<()> {
        if let Some(id) = self.streams.get(&target).copied() {
            if self.registry.subscribe(id, &command.symbols)? {
                self.ping_monitor.lock()?.track(target);
                debug!("Added {} topic(s) for {}", command.symbols.len(), target);
                return Ok(());
            }
            // The stream thread died and the registry already dropped it.
            warn!("Stream {} for {} is gone, reopening", id, target);
            self.streams.remove(&target);
        }

        let (id, events) = self.registry.connect(&self.store)?;
        self.registry.subscribe(id, &command.symbols)?;
        self.ping_monitor.lock()?.track(target);

        let socket = Arc::clone(&self.socket);
        thread::Builder::new()
            .name(format!("stream-{}", target))
            .spawn(move || {
                if let Err(e) = handle_client_stream(socket, target, events) {
                    error!("Client stream error: {}", e);
                }
            })?;
        self.streams.insert(target, id);
        info!("A stream has been created for the client on UDP address {}", target);
        Ok(())
    }

    fn unsubscribe(&mut self, command: &Command, target: SocketAddr) -> Result<()> {
        let Some(id) = self.streams.get(&target).copied() else {
            warn!("UNSUBSCRIBE from {} without an open stream", target);
            return Ok(());
        };
        if command.symbols.is_empty() {
            self.close(target)?;
            info!("Stream for {} closed by the client", target);
        } else {
            self.registry.unsubscribe(id, &command.symbols)?;
        }
        Ok(())
    }

    fn request(&self, command: &Command, target: SocketAddr) -> Result<()> {
        let Some(symbol) = command.symbols.first() else {
            warn!("REQUEST from {} without a symbol", target);
            return Ok(());
        };
        send_request_reply(&self.socket, target, symbol, self.store.get(symbol))
    }

    fn close(&mut self, target: SocketAddr) -> Result<bool> {
        self.ping_monitor.lock()?.forget(&target);
        match self.streams.remove(&target) {
            Some(id) => self.registry.disconnect(id),
            None => Ok(false),
        }
    }

    /// Drop the stream of a subscriber whose keep-alive expired.
    pub fn handle_timeout(&mut self, addr: SocketAddr) -> Result<()> {
        if self.close(addr)? {
            info!("Stream for {} closed: ping timeout", addr);
        } else {
            debug!("Ping timeout for {} without an open stream", addr);
        }
        Ok(())
    }

    /// Serve until `shutdown` fires or the command channel closes.
    pub fn run(
        mut self,
        commands: Receiver<(Command, SocketAddr)>,
        timeouts: Receiver<SocketAddr>,
        shutdown: Receiver<()>,
    ) {
        loop {
            select! {
                recv(commands) -> msg => match msg {
                    Ok((command, target)) => {
                        let kind = command.kind;
                        if let Err(e) = self.handle_command(command, target) {
                            error!("Failed to handle {} from {}: {}", kind, target, e);
                        }
                    }
                    Err(_) => {
                        error!("Command channel closed");
                        break;
                    }
                },
                recv(timeouts) -> msg => match msg {
                    Ok(addr) => {
                        if let Err(e) = self.handle_timeout(addr) {
                            error!("Failed to close stream for {}: {}", addr, e);
                        }
                    }
                    Err(_) => {
                        error!("Keep-alive checker stopped");
                        break;
                    }
                },
                recv(shutdown) -> _ => break,
            }
        }
        info!("Command loop stopped with {} open stream(s)", self.streams.len());
    }
}

/// Spawn the thread that reports expired keep-alives on `timeout_tx`.
///
/// It stops once the receiving side is gone.
pub fn spawn_timeout_checker(
    ping_monitor: Arc<Mutex<PingMonitor>>,
    timeout_tx: Sender<SocketAddr>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("ping-timeout-checker".to_string())
        .spawn(move || {
            let ticker = tick(CHECK_INTERVAL);
            while ticker.recv().is_ok() {
                let timed_out = match ping_monitor.lock() {
                    Ok(mut monitor) => monitor.check_timeouts(),
                    Err(e) => {
                        error!("Ping monitor lock poisoned, stopping checker: {}", e);
                        return;
                    }
                };
                for addr in timed_out {
                    if timeout_tx.send(addr).is_err() {
                        return;
                    }
                }
            }
        })
}
