//! Sending commands to the feed server.
//!
//! Commands go over TCP as one JSON line per connection. Keep-alive `PING`s go
//! over UDP from the socket updates are received on, which is how the server
//! matches them to the stream.
use std::io::{ErrorKind, Write};
use std::net::{TcpStream, UdpSocket};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};
use stock_common::net::PING_PAYLOAD;
use stock_common::{Command, FeedError};

/// PING interval in milliseconds used by the background thread.
const INTERVAL_MS: u64 = 2000;

/// Helper type for sending commands to the server.
pub struct CommandSender;

impl CommandSender {
    /// Open a connection to `server` and send `command` on it.
    pub fn send_command(server: &str, command: &Command) -> Result<(), FeedError> {
        let mut stream = TcpStream::connect(server)
            .map_err(|e| FeedError::Format(format!("Failed to connect to server {}: {}", server, e)))?;
        let mut payload = command.to_json_bytes()?;
        payload.push(b'\n');

        info!(
            "Sending {} udp://{}:{} {}",
            command.kind,
            command.address,
            command.port,
            command
                .symbols
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );
        stream.write_all(&payload)?;
        stream.flush()?;
        Ok(())
    }

    /// Send `PING` from `socket` to `target_addr` every two seconds until `shutdown`.
    pub fn start_ping_thread(socket: Arc<UdpSocket>, target_addr: String, shutdown: Arc<AtomicBool>) {
        info!("Ping thread started. Target: {}", target_addr);
        thread::spawn(move || {
            let interval = Duration::from_millis(INTERVAL_MS);
            while !shutdown.load(Ordering::Relaxed) {
                match socket.send_to(PING_PAYLOAD, &target_addr) {
                    Ok(_) => debug!("PING sent to {}", target_addr),
                    Err(ref e) if e.kind() == ErrorKind::ConnectionReset => {}
                    Err(e) => error!("Failed to send PING: {}", e),
                }
                thread::sleep(interval);
            }
            info!("Ping thread stopping...");
        });
    }
}
