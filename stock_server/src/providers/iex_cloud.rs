//! IEX Cloud adapter: a single-quote endpoint and the native batch endpoint.

use std::collections::HashMap;

use reqwest::blocking::Client;
use serde::Deserialize;
use stock_common::{ProviderError, Quote, QuoteMetadata, Symbol};

use super::QuoteProvider;
use super::http::{get_json, url};

const BASE_URL: &str = "https://cloud.iexapis.com/stable";
const NAME: &str = "IEX Cloud";

/// IEX Cloud REST client.
pub struct IexCloudProvider {
    client: Client,
    token: String,
    base_url: String,
}

impl IexCloudProvider {
    /// Adapter authenticating with `token`.
    pub fn new(client: Client, token: String) -> Self {
        IexCloudProvider {
            client,
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point at another deployment, e.g. the sandbox.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IexQuote {
    symbol: Option<String>,
    company_name: Option<String>,
    latest_price: Option<f64>,
    previous_close: Option<f64>,
    latest_volume: Option<u64>,
    high: Option<f64>,
    low: Option<f64>,
    market_cap: Option<f64>,
    primary_exchange: Option<String>,
    sector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IexBatchEntry {
    quote: Option<IexQuote>,
}

// IEX sends `changePercent` as a fraction; it is ignored here because the
// quote derives its own percentage from the two prices.
fn parse_quote(requested: &Symbol, quote: IexQuote) -> Result<Quote, ProviderError> {
    let symbol = quote
        .symbol
        .as_deref()
        .and_then(|s| Symbol::parse(s).ok())
        .unwrap_or_else(|| requested.clone());
    let price = quote
        .latest_price
        .ok_or_else(|| ProviderError::new(NAME, format!("No price for symbol {}", symbol)))?;
    let previous_close = quote
        .previous_close
        .ok_or_else(|| ProviderError::new(NAME, format!("No previous close for symbol {}", symbol)))?;

    Ok(Quote::new(symbol, price, previous_close)
        .map_err(|e| ProviderError::new(NAME, e))?
        .with_name(quote.company_name.unwrap_or_default())
        .with_volume(quote.latest_volume.unwrap_or(0))
        .with_day_range(quote.high.unwrap_or(price), quote.low.unwrap_or(price))
        .with_market_cap(quote.market_cap)
        .with_metadata(QuoteMetadata {
            exchange: quote.primary_exchange,
            sector: quote.sector,
            industry: None,
        }))
}

fn parse_batch(symbols: &[Symbol], mut body: HashMap<String, IexBatchEntry>) -> Vec<Quote> {
    symbols
        .iter()
        .filter_map(|symbol| {
            let entry = body.remove(symbol.as_str())?;
            parse_quote(symbol, entry.quote?).ok()
        })
        .collect()
}

impl QuoteProvider for IexCloudProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        let path = format!("/stock/{}/quote", symbol);
        let url = url(NAME, &self.base_url, &path, &[("token", self.token.as_str())])?;
        let body: IexQuote = get_json(&self.client, NAME, url)?;
        parse_quote(symbol, body)
    }

    fn fetch_multiple(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, ProviderError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let joined = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let url = url(
            NAME,
            &self.base_url,
            "/stock/market/batch",
            &[("symbols", joined.as_str()), ("types", "quote"), ("token", self.token.as_str())],
        )?;
        let body: HashMap<String, IexBatchEntry> = get_json(&self.client, NAME, url)?;
        Ok(parse_batch(symbols, body))
    }

    /// One native batch request regardless of size.
    fn request_cost(&self, _count: usize) -> u32 {
        1
    }
}
