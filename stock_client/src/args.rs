//! Command-line arguments for the stock feed client.
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server IP address (IPv4 or IPv6) where the feed server is running.
    #[arg(long, default_value = "127.0.0.1")]
    pub server_ip: String,

    /// Local UDP port to receive updates on and send pings from (0 picks a free one).
    #[arg(long, default_value_t = 0)]
    pub listen_port: u16,

    /// Path to a text file with symbols to subscribe to.
    /// Symbols may be separated by commas, spaces or new lines; `#` starts a comment.
    #[arg(long)]
    pub path: String,

    /// Ask once for the current quote of this symbol before streaming.
    #[arg(long)]
    pub request: Option<String>,
}
