//! Shared protocol command type used by client and server.
//!
//! A `Command` is sent by the client over the TCP command channel as JSON. It
//! either opens a stream (`SUBSCRIBE`), edits the advisory topic list of an
//! open stream (`SUBSCRIBE` again or `UNSUBSCRIBE`), asks for one symbol's
//! current quote (`REQUEST`) or is a keep-alive `PING`.
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::FeedError;
use crate::tickers::Symbol;

/// Transport kind (currently UDP).
/// Keep the lowercase to match the existing client value.
pub const CONNECTION: &str = "udp";

/// What the client asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum CommandKind {
    /// Open a stream to the UDP address, or add topics to an open one.
    Subscribe,
    /// Remove topics from an open stream.
    Unsubscribe,
    /// One-off request for the current quote of the first listed symbol.
    Request,
    /// Keep-alive.
    Ping,
}

/// Command payload sent between client and server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command kind.
    pub kind: CommandKind,
    /// Transport protocol name (e.g., `udp`).
    pub connection: String,
    /// IP address the client listens on.
    pub address: String,
    /// UDP port as a string.
    pub port: String,
    /// Symbols the command refers to (empty for `PING`).
    pub symbols: Vec<Symbol>,
}

impl Command {
    /// Creates a new subscription command.
    pub fn new(address: &str, port: &str, symbols: Vec<Symbol>) -> Self {
        Self::with_kind(CommandKind::Subscribe, address, port, symbols)
    }

    /// Creates a new keep-alive `PING` command.
    pub fn new_ping(address: &str, port: &str) -> Self {
        Self::with_kind(CommandKind::Ping, address, port, Vec::new())
    }

    /// Creates a command of any kind.
    pub fn with_kind(kind: CommandKind, address: &str, port: &str, symbols: Vec<Symbol>) -> Self {
        Command {
            kind,
            connection: String::from(CONNECTION),
            address: String::from(address),
            port: String::from(port),
            symbols,
        }
    }

    /// Build UDP socket address from the fields.
    pub fn get_udp_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.address, self.port).parse()
    }

    /// Parse the UDP port field.
    pub fn udp_port(&self) -> Result<u16, FeedError> {
        self.port
            .trim()
            .parse()
            .map_err(|e| FeedError::Format(format!("Invalid UDP port in command: {}", e)))
    }

    /// Encode the command to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, FeedError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a command from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, FeedError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
