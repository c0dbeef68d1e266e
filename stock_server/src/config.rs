//! Command-line and environment configuration of the stock feed server.
//!
//! Every option can come from a flag or from the environment (a `.env` file is
//! loaded by the binary before parsing). A missing or blank API key disables
//! that provider; it is never an error.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use stock_common::{FeedError, Result, Symbol};
use strum::IntoEnumIterator;

use crate::model::ping_monitor::DEFAULT_PING_TIMEOUT;
use crate::persistence::SnapshotFile;
use crate::providers::alpha_vantage::DEFAULT_PACE;
use crate::providers::{ProviderKind, ProviderSettings};

/// Parsed command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Periodic multi-source stock price broadcaster", long_about = None)]
pub struct ServerArgs {
    /// Symbols to broadcast, separated by commas or spaces.
    #[arg(long, env = "STOCK_SYMBOLS", default_value = "AAPL,TSLA,MSFT,GOOG")]
    pub symbols: String,

    /// Milliseconds between broadcast cycles.
    #[arg(long, env = "FETCH_INTERVAL_MS", default_value_t = 5000)]
    pub interval_ms: u64,

    /// Seconds between full-snapshot re-broadcasts (off when unset).
    #[arg(long, env = "SYNC_INTERVAL_SECS")]
    pub sync_interval_secs: Option<u64>,

    /// Alpha Vantage API key.
    #[arg(long, env = "ALPHA_VANTAGE_API_KEY", hide_env_values = true)]
    pub alpha_vantage_key: Option<String>,

    /// Finnhub API key.
    #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true)]
    pub finnhub_key: Option<String>,

    /// IEX Cloud API key.
    #[arg(long, env = "IEX_CLOUD_API_KEY", hide_env_values = true)]
    pub iex_cloud_key: Option<String>,

    /// Length of every provider's rate-limit window, in seconds.
    #[arg(long, env = "RATE_WINDOW_SECS", default_value_t = 60)]
    pub rate_window_secs: u64,

    /// Alpha Vantage requests per window.
    #[arg(long, default_value_t = ProviderKind::AlphaVantage.default_ceiling())]
    pub alpha_vantage_ceiling: u32,

    /// Finnhub requests per window.
    #[arg(long, default_value_t = ProviderKind::Finnhub.default_ceiling())]
    pub finnhub_ceiling: u32,

    /// IEX Cloud requests per window.
    #[arg(long, default_value_t = ProviderKind::IexCloud.default_ceiling())]
    pub iex_cloud_ceiling: u32,

    /// Pause between sequential Alpha Vantage calls, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_PACE.as_millis() as u64)]
    pub alpha_vantage_pace_ms: u64,

    /// File the last-known quotes are saved to and restored from.
    #[arg(long, env = "PRICE_SNAPSHOT_PATH")]
    pub snapshot_path: Option<PathBuf>,

    /// Seconds without a PING before a subscriber is dropped.
    #[arg(long, default_value_t = DEFAULT_PING_TIMEOUT.as_secs())]
    pub ping_timeout_secs: u64,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Tracked symbols, deduplicated in order.
    pub symbols: Vec<Symbol>,
    /// Time between broadcast cycles.
    pub interval: Duration,
    /// Time between full-store re-broadcasts, if enabled.
    pub sync_interval: Option<Duration>,
    /// Provider slots in rotation order.
    pub providers: Vec<ProviderSettings>,
    /// Where last-known quotes persist across restarts.
    pub snapshot: Option<SnapshotFile>,
    /// Silence after which a subscriber is dropped.
    pub ping_timeout: Duration,
}

impl ServerArgs {
    /// Validate the arguments and build the provider slots.
    pub fn into_config(self) -> Result<FeedConfig> {
        let symbols = Symbol::parse_list(&self.symbols)?;
        if symbols.is_empty() {
            return Err(FeedError::Format("no symbols configured".to_string()));
        }
        if self.interval_ms == 0 {
            return Err(FeedError::InvalidInterval);
        }

        let window = Duration::from_secs(self.rate_window_secs.max(1));
        let providers = ProviderKind::iter()
            .map(|kind| {
                let (api_key, ceiling) = match kind {
                    ProviderKind::AlphaVantage => (self.alpha_vantage_key.clone(), self.alpha_vantage_ceiling),
                    ProviderKind::Finnhub => (self.finnhub_key.clone(), self.finnhub_ceiling),
                    ProviderKind::IexCloud => (self.iex_cloud_key.clone(), self.iex_cloud_ceiling),
                };
                let mut settings = ProviderSettings {
                    ceiling,
                    window,
                    ..ProviderSettings::new(kind, api_key)
                };
                if kind == ProviderKind::AlphaVantage {
                    settings.pace = Duration::from_millis(self.alpha_vantage_pace_ms);
                }
                settings
            })
            .collect();

        Ok(FeedConfig {
            symbols,
            interval: Duration::from_millis(self.interval_ms),
            sync_interval: self
                .sync_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            providers,
            snapshot: self.snapshot_path.map(SnapshotFile::new),
            ping_timeout: Duration::from_secs(self.ping_timeout_secs.max(1)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerArgs {
        ServerArgs::try_parse_from(std::iter::once("stock_server").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn explicit_flags_build_the_config() {
        let config = parse(&[
            "--symbols",
            "nvda, amd,NVDA",
            "--interval-ms",
            "1000",
            "--sync-interval-secs",
            "30",
            "--finnhub-key",
            "abc",
            "--finnhub-ceiling",
            "1",
            "--rate-window-secs",
            "10",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.symbols, Symbol::parse_list("NVDA,AMD").unwrap());
        assert_eq!(config.interval, Duration::from_millis(1000));
        assert_eq!(config.sync_interval, Some(Duration::from_secs(30)));

        let finnhub = &config.providers[1];
        assert_eq!(finnhub.kind, ProviderKind::Finnhub);
        assert_eq!(finnhub.credential(), Some("abc"));
        assert_eq!(finnhub.ceiling, 1);
        assert_eq!(finnhub.window, Duration::from_secs(10));
        assert_eq!(config.providers[0].pace, Duration::from_secs(12));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = parse(&["--symbols", "AAPL", "--interval-ms", "0"]).into_config().unwrap_err();
        assert!(matches!(err, FeedError::InvalidInterval));
    }

    #[test]
    fn bad_symbols_are_rejected() {
        assert!(parse(&["--symbols", "AAPL,$$$"]).into_config().is_err());
        assert!(parse(&["--symbols", " , "]).into_config().is_err());
    }
}
