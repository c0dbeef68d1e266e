//! TCP command channel of the feed server.

use std::io::{BufRead, BufReader, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use stock_common::{Command, FeedError, Result};

/// Largest command accepted on one connection.
pub const MAX_COMMAND_BYTES: u64 = 64 * 1024;
/// How long a connection may take to deliver its command.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP command receiver.
///
/// Every connection carries one newline-terminated JSON [`Command`]. The
/// decoded command is forwarded together with the subscriber's UDP address:
/// the peer's IP and the port named in the command.
pub struct CommandReceiver {
    socket: TcpListener,
}

impl CommandReceiver {
    /// Bind to `bind_addr` (e.g. `0.0.0.0:8080`).
    pub fn new(bind_addr: &str) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr)?;
        Ok(Self { socket })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Read one command from an accepted connection.
    pub fn read_command(stream: TcpStream) -> Result<(Command, SocketAddr)> {
        let peer = stream.peer_addr()?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut line = Vec::new();
        BufReader::new(stream.take(MAX_COMMAND_BYTES)).read_until(b'\n', &mut line)?;
        if line.iter().all(u8::is_ascii_whitespace) {
            return Err(FeedError::Format(format!("empty command from {}", peer)));
        }

        let command = Command::from_json_slice(&line)?;
        let target = SocketAddr::new(peer.ip(), command.udp_port()?);
        Ok((command, target))
    }

    /// Accept connections forever, forwarding each decoded command to `tx`.
    ///
    /// A bad connection is logged and skipped. The loop only ends when the
    /// consumer of `tx` is gone.
    pub fn receive_loop_with_channel(self, tx: Sender<(Command, SocketAddr)>) -> Result<()> {
        info!("Command TCP server is started on {}", self.socket.local_addr()?);

        for stream in self.socket.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("TCP connection error: {}", e);
                    continue;
                }
            };
            match Self::read_command(stream) {
                Ok((command, target)) => {
                    debug!("Received {} from {}", command.kind, target);
                    tx.send((command, target))
                        .map_err(|e| FeedError::ChannelSend(e.to_string()))?;
                }
                Err(e) => warn!("Dropping bad command: {}", e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Write;
    use std::thread;
    use stock_common::{CommandKind, Symbol};

    fn send_raw(addr: SocketAddr, payload: &[u8]) {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(payload).unwrap();
    }

    #[test]
    fn bad_commands_do_not_stop_the_loop() {
        let receiver = CommandReceiver::new("127.0.0.1:0").unwrap();
        let addr = receiver.local_addr().unwrap();
        let (tx, rx) = unbounded();
        thread::spawn(move || receiver.receive_loop_with_channel(tx));

        send_raw(addr, b"not json\n");
        send_raw(addr, b"\n");
        let command = Command::new("0.0.0.0", "45678", Symbol::parse_list("AAPL").unwrap());
        let mut payload = command.to_json_bytes().unwrap();
        payload.push(b'\n');
        send_raw(addr, &payload);

        let (received, target) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received.kind, CommandKind::Subscribe);
        assert_eq!(target, SocketAddr::from(([127, 0, 0, 1], 45678)));
    }
}
