//! Finnhub adapter.
//!
//! A quote is assembled from two endpoints fetched side by side: `/quote` for
//! prices and `/stock/profile2` for the company name, market cap and listing.
//! The profile is optional; a failed profile call still yields a quote.
//! `fetch_multiple` fans per-symbol calls out over scoped threads.

use std::thread;

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use stock_common::{ProviderError, Quote, QuoteMetadata, Symbol};

use super::http::{get_json, url};
use super::{QuoteProvider, collect_partial};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const NAME: &str = "Finnhub";
/// Most per-symbol calls in flight at once.
const MAX_IN_FLIGHT: usize = 8;
/// Finnhub reports market capitalization in millions.
const MARKET_CAP_UNIT: f64 = 1_000_000.0;

/// Finnhub REST client.
pub struct FinnhubProvider {
    client: Client,
    token: String,
    base_url: String,
}

impl FinnhubProvider {
    /// Adapter authenticating with `token`.
    pub fn new(client: Client, token: String) -> Self {
        FinnhubProvider {
            client,
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point at another host, e.g. a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, path: &str, symbol: &Symbol) -> Result<T, ProviderError> {
        let url = url(
            NAME,
            &self.base_url,
            path,
            &[("symbol", symbol.as_str()), ("token", self.token.as_str())],
        )?;
        get_json(&self.client, NAME, url)
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    /// Current price.
    c: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    /// Previous close.
    pc: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinnhubProfile {
    name: Option<String>,
    market_capitalization: Option<f64>,
    exchange: Option<String>,
    finnhub_industry: Option<String>,
}

fn parse_quote(symbol: &Symbol, quote: FinnhubQuote, profile: Option<FinnhubProfile>) -> Result<Quote, ProviderError> {
    // An unknown symbol comes back as all zeros.
    let price = quote
        .c
        .filter(|c| *c != 0.0)
        .ok_or_else(|| ProviderError::new(NAME, format!("No data found for symbol {}", symbol)))?;
    let previous_close = quote
        .pc
        .ok_or_else(|| ProviderError::new(NAME, "Missing previous close"))?;

    let mut normalized = Quote::new(symbol.clone(), price, previous_close)
        .map_err(|e| ProviderError::new(NAME, e))?
        .with_day_range(quote.h.unwrap_or(price), quote.l.unwrap_or(price));

    if let Some(profile) = profile {
        normalized = normalized
            .with_name(profile.name.unwrap_or_default())
            .with_market_cap(profile.market_capitalization.map(|cap| cap * MARKET_CAP_UNIT))
            .with_metadata(QuoteMetadata {
                exchange: profile.exchange,
                sector: profile.finnhub_industry.clone(),
                industry: profile.finnhub_industry,
            });
    }
    Ok(normalized)
}

impl QuoteProvider for FinnhubProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        let (quote, profile) = thread::scope(|s| {
            let profile = s.spawn(|| self.get::<FinnhubProfile>("/stock/profile2", symbol));
            let quote = self.get::<FinnhubQuote>("/quote", symbol);
            let profile = match profile.join() {
                Ok(Ok(profile)) => Some(profile),
                Ok(Err(e)) => {
                    debug!("Profile lookup for {} failed: {}", symbol, e.cause);
                    None
                }
                Err(_) => None,
            };
            (quote, profile)
        });
        parse_quote(symbol, quote?, profile)
    }

    fn fetch_multiple(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, ProviderError> {
        let mut results = Vec::with_capacity(symbols.len());
        for chunk in symbols.chunks(MAX_IN_FLIGHT) {
            thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|symbol| (symbol, s.spawn(move || self.fetch_quote(symbol))))
                    .collect();
                for (symbol, handle) in handles {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err(ProviderError::new(NAME, "fetch thread panicked")));
                    results.push((symbol.clone(), result));
                }
            });
        }
        collect_partial(NAME, results)
    }
}
