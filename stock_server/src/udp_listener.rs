//! Keep-alive listener on the UDP data socket.

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error};
use stock_common::net::PING_PAYLOAD;

use crate::model::ping_monitor::PingMonitor;

/// Receives `PING` datagrams on the data socket and refreshes the sender's
/// keep-alive in the shared [`PingMonitor`].
pub struct UdpPingListener;

impl UdpPingListener {
    /// Spawn the listener thread on `socket`.
    pub fn start(socket: Arc<UdpSocket>, ping_monitor: Arc<Mutex<PingMonitor>>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("udp-ping-listener".to_string())
            .spawn(move || {
                let mut buf = [0u8; 128];
                loop {
                    let (size, addr) = match socket.recv_from(&mut buf) {
                        Ok(received) => received,
                        // Windows reports ICMP port-unreachable from earlier sends here.
                        Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                        Err(e) => {
                            error!("UDP receive error: {}", e);
                            continue;
                        }
                    };
                    if !buf[..size].starts_with(PING_PAYLOAD) {
                        continue;
                    }
                    let refreshed = match ping_monitor.lock() {
                        Ok(mut monitor) => monitor.update_ping(addr),
                        Err(e) => {
                            error!("Ping monitor lock poisoned, stopping listener: {}", e);
                            break;
                        }
                    };
                    if refreshed {
                        debug!("Received ping from {}", addr);
                    } else {
                        debug!("Ignoring ping from unknown address {}", addr);
                    }
                }
            })
    }
}
