//! Stock Feed Client: subscribes to a list of symbols on the feed server and
//! prints every update it receives. It reads the symbols from a text file,
//! sends a `SUBSCRIBE` command over TCP, keeps the stream alive with periodic
//! `PING`s and listens for JSON datagrams until Ctrl+C.
//!
//! Usage example (CLI):
//! ```bash
//! stock_client --server-ip 192.168.0.10 --listen-port 55555 --path ./symbols.txt
//! ```
//!
//! The symbol file may separate symbols by commas, spaces or new lines.
#![warn(missing_docs)]
mod args;
mod sender;

use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info, warn};
use stock_common::net::{COMMAND_PORT, DATA_PORT, MAX_DATAGRAM, addr};
use stock_common::tickers::SymbolParser;
use stock_common::{Command, CommandKind, FeedError, FeedMessage, Quote, Result, Symbol};

use crate::args::Args;
use crate::sender::CommandSender;

fn format_quote(quote: &Quote) -> String {
    format!(
        "{} {:.2} ({:+.2}, {:+.2}%) Volume={} Time={}",
        quote.symbol, quote.price, quote.change, quote.change_percent, quote.volume, quote.last_updated
    )
}

/// One printable line per quote (or error) in `message`.
fn describe(message: &FeedMessage) -> Vec<String> {
    match message {
        FeedMessage::PriceUpdate(quotes) => quotes
            .iter()
            .map(|q| format!("UPDATE: {}", format_quote(q)))
            .collect(),
        FeedMessage::StockUpdated(quote) => vec![format!("CHANGED: {}", format_quote(quote))],
        FeedMessage::StockData(quote) => vec![format!("DATA: {}", format_quote(quote))],
        FeedMessage::StockError(payload) => {
            vec![format!("ERROR: {} {}", payload.symbol, payload.message)]
        }
    }
}

/// Runs a blocking loop that receives feed messages from the given UDP `socket`
/// and prints them until `shutdown` is set.
fn start_receiver_loop(socket: Arc<UdpSocket>, shutdown: Arc<AtomicBool>) -> Result<()> {
    info!("Feed receiver running on: {}", socket.local_addr()?);
    let mut buf = vec![0u8; MAX_DATAGRAM];

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv(&mut buf) {
            Ok(size) => match FeedMessage::from_json_slice(&buf[..size]) {
                Ok(message) => {
                    for line in describe(&message) {
                        info!("{}", line);
                    }
                }
                Err(_) => debug!("Received non-feed message: {}", String::from_utf8_lossy(&buf[..size])),
            },
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::ConnectionReset) => {
                continue;
            }
            Err(e) => {
                error!("Receive data error: {}", e);
                return Err(e.into());
            }
        }
    }
    info!("Receiver loop stopping...");
    Ok(())
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| FeedError::Format(format!("Failed to set Ctrl+C handler: {}", e)))?;
    }

    let server_ip = args.server_ip.trim().replace('"', "");
    let server_command_address = addr(&server_ip, COMMAND_PORT);
    let server_udp_address = addr(&server_ip, DATA_PORT);
    let mut listen_port = args.listen_port;
    if listen_port == DATA_PORT {
        warn!(
            "--listen-port={} matches the server DATA_PORT. A free local port will be selected.",
            listen_port
        );
        listen_port = 0;
    }

    let file_path = normalize_path(&args.path);
    let file = File::open(&file_path)?;
    let symbols = Symbol::parse_from_file(BufReader::new(file))?;
    if symbols.is_empty() {
        return Err(FeedError::ParseSymbolsFile(format!(
            "no symbols in {}",
            file_path.display()
        )));
    }
    info!("Symbols: {:?}", symbols.iter().map(Symbol::as_str).collect::<Vec<_>>());

    let client_udp_socket = Arc::new(UdpSocket::bind(addr("0.0.0.0", listen_port))?);
    client_udp_socket.set_read_timeout(Some(Duration::from_secs(5)))?;
    let client_local_addr = client_udp_socket.local_addr()?;
    info!("UDP client listening on: {}", client_local_addr);

    let local_ip = client_local_addr.ip().to_string();
    let local_port = client_local_addr.port().to_string();
    CommandSender::send_command(
        &server_command_address,
        &Command::new(&local_ip, &local_port, symbols),
    )?;
    info!("Subscription sent to server {}.", server_command_address);

    if let Some(raw) = args.request.as_deref() {
        let symbol = Symbol::parse(raw)?;
        let request = Command::with_kind(CommandKind::Request, &local_ip, &local_port, vec![symbol]);
        CommandSender::send_command(&server_command_address, &request)?;
    }

    CommandSender::start_ping_thread(client_udp_socket.clone(), server_udp_address, shutdown.clone());

    info!("Client is running. Press Ctrl+C to exit.");
    start_receiver_loop(client_udp_socket, shutdown)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stock_common::message::StockErrorPayload;

    #[test]
    fn batch_prints_one_line_per_quote() {
        let quotes = vec![
            Quote::new(Symbol::parse("AAPL").unwrap(), 102.0, 100.0).unwrap(),
            Quote::new(Symbol::parse("MSFT").unwrap(), 99.0, 100.0).unwrap(),
        ];
        let lines = describe(&FeedMessage::PriceUpdate(quotes));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("UPDATE: AAPL 102.00 (+2.00, +2.00%)"));
        assert!(lines[1].contains("(-1.00, -1.00%)"));
    }

    #[test]
    fn errors_name_the_symbol() {
        let lines = describe(&FeedMessage::StockError(StockErrorPayload {
            symbol: Symbol::parse("ZZZ").unwrap(),
            message: "Symbol not found: ZZZ".to_string(),
        }));
        assert_eq!(lines, vec!["ERROR: ZZZ Symbol not found: ZZZ".to_string()]);
    }

    #[test]
    fn quoted_paths_are_unwrapped() {
        assert_eq!(normalize_path(" \"./symbols.txt\" "), PathBuf::from("./symbols.txt"));
    }
}
