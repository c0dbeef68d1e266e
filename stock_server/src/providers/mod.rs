//! Upstream quote providers.
//!
//! Every upstream API is wrapped in a struct implementing [`QuoteProvider`],
//! which normalizes the provider's response into a [`Quote`] right at the
//! boundary. All failures of a single call collapse into one [`ProviderError`];
//! there are no retries here. Retry and fallback belong to
//! [`rotation::ProviderRotation`], which cycles through the configured
//! providers under a per-provider [`budget::ProviderBudget`].
//!
//! - `alpha_vantage`: `GLOBAL_QUOTE`, per-symbol only, strict budget, paced.
//! - `finnhub`: quote + company profile, per-symbol calls fanned out.
//! - `iex_cloud`: single quote and a native batch endpoint.

pub mod alpha_vantage;
pub mod budget;
pub mod finnhub;
mod http;
pub mod iex_cloud;
pub mod rotation;
#[cfg(test)]
pub(crate) mod test_server;

use std::time::Duration;

use log::warn;
use stock_common::{ProviderError, Quote, Symbol};
use strum_macros::{Display, EnumIter, EnumString};

/// Default budget window shared by every provider.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Source of quotes for one upstream API.
pub trait QuoteProvider: Send + Sync {
    /// Display name used in logs and errors.
    fn name(&self) -> &str;

    /// Fetch one quote.
    fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError>;

    /// Fetch several quotes. Symbols that fail are left out of the result;
    /// an error means nothing at all could be fetched.
    ///
    /// The default makes one sequential [`Self::fetch_quote`] call per symbol.
    fn fetch_multiple(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, ProviderError> {
        let results = symbols
            .iter()
            .map(|symbol| (symbol.clone(), self.fetch_quote(symbol)))
            .collect();
        collect_partial(self.name(), results)
    }

    /// Upstream requests one [`Self::fetch_multiple`] over `count` symbols costs
    /// against the provider's budget.
    fn request_cost(&self, count: usize) -> u32 {
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Keep the successes of a per-symbol fan-out and log the failures.
pub(crate) fn collect_partial(
    provider: &str,
    results: Vec<(Symbol, Result<Quote, ProviderError>)>,
) -> Result<Vec<Quote>, ProviderError> {
    let requested = results.len();
    let mut quotes = Vec::with_capacity(requested);
    let mut last_error = None;
    for (symbol, result) in results {
        match result {
            Ok(quote) => quotes.push(quote),
            Err(e) => {
                warn!("Failed to fetch {} from {}: {}", symbol, provider, e.cause);
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) if quotes.is_empty() && requested > 0 => Err(e),
        _ => Ok(quotes),
    }
}

/// Supported upstream APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum ProviderKind {
    /// alphavantage.co
    #[strum(serialize = "Alpha Vantage")]
    AlphaVantage,
    /// finnhub.io
    #[strum(serialize = "Finnhub")]
    Finnhub,
    /// iexapis.com
    #[strum(serialize = "IEX Cloud")]
    IexCloud,
}

impl ProviderKind {
    /// Free-tier requests per minute.
    pub fn default_ceiling(self) -> u32 {
        match self {
            ProviderKind::AlphaVantage => 5,
            ProviderKind::Finnhub => 60,
            ProviderKind::IexCloud => 100,
        }
    }
}

/// Configuration of one provider slot.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Which API.
    pub kind: ProviderKind,
    /// API key; missing or blank disables the provider.
    pub api_key: Option<String>,
    /// Requests allowed per window.
    pub ceiling: u32,
    /// Budget window length.
    pub window: Duration,
    /// Pause between sequential per-symbol calls (only Alpha Vantage paces).
    pub pace: Duration,
}

impl ProviderSettings {
    /// Settings with the provider's default ceiling and window, no pacing.
    pub fn new(kind: ProviderKind, api_key: Option<String>) -> Self {
        Self {
            kind,
            api_key,
            ceiling: kind.default_ceiling(),
            window: DEFAULT_WINDOW,
            pace: Duration::ZERO,
        }
    }

    /// The trimmed key, if one is set.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Build the adapter for `settings`, or `None` when it has no credential.
pub fn build_provider(
    settings: &ProviderSettings,
    client: &reqwest::blocking::Client,
) -> Option<Box<dyn QuoteProvider>> {
    let key = settings.credential()?.to_string();
    let provider: Box<dyn QuoteProvider> = match settings.kind {
        ProviderKind::AlphaVantage => Box::new(
            alpha_vantage::AlphaVantageProvider::new(client.clone(), key).with_pace(settings.pace),
        ),
        ProviderKind::Finnhub => Box::new(finnhub::FinnhubProvider::new(client.clone(), key)),
        ProviderKind::IexCloud => Box::new(iex_cloud::IexCloudProvider::new(client.clone(), key)),
    };
    Some(provider)
}
