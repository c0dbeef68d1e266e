//! Alpha Vantage adapter.
//!
//! `GLOBAL_QUOTE` is per-symbol only and reports every number as a string.
//! Rate-limit notices come back as HTTP 200 with a `Note` or `Information`
//! field instead of a quote.

use std::thread;
use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use stock_common::{ProviderError, Quote, Symbol};

use super::http::{get_json, parse_number, url};
use super::{QuoteProvider, collect_partial};

const BASE_URL: &str = "https://www.alphavantage.co";
const NAME: &str = "Alpha Vantage";

/// Free tier allows 5 requests per minute.
pub const DEFAULT_PACE: Duration = Duration::from_secs(12);

/// Alpha Vantage REST client.
pub struct AlphaVantageProvider {
    client: Client,
    token: String,
    base_url: String,
    pace: Duration,
}

impl AlphaVantageProvider {
    /// Adapter authenticating with `token`, unpaced.
    pub fn new(client: Client, token: String) -> Self {
        AlphaVantageProvider {
            client,
            token,
            base_url: BASE_URL.to_string(),
            pace: Duration::ZERO,
        }
    }

    /// Pause between the sequential calls of [`QuoteProvider::fetch_multiple`].
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Point at another host, e.g. a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

fn parse_global_quote(requested: &Symbol, body: GlobalQuoteResponse) -> Result<Quote, ProviderError> {
    if let Some(message) = body.error_message.or(body.note).or(body.information) {
        return Err(ProviderError::new(NAME, message));
    }
    let quote = body
        .global_quote
        .filter(|q| q.price.is_some())
        .ok_or_else(|| ProviderError::new(NAME, format!("No data found for symbol {}", requested)))?;

    // The echoed symbol wins when it parses, so `brk.b` comes back canonical.
    let symbol = quote
        .symbol
        .as_deref()
        .and_then(|s| Symbol::parse(s).ok())
        .unwrap_or_else(|| requested.clone());

    let price = parse_number(NAME, "price", quote.price.as_deref())?;
    let previous_close = parse_number(NAME, "previous close", quote.previous_close.as_deref())?;
    let high = parse_number(NAME, "high", quote.high.as_deref()).unwrap_or(price);
    let low = parse_number(NAME, "low", quote.low.as_deref()).unwrap_or(price);
    let volume = quote
        .volume
        .as_deref()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(Quote::new(symbol, price, previous_close)
        .map_err(|e| ProviderError::new(NAME, e))?
        .with_day_range(high, low)
        .with_volume(volume))
}

impl QuoteProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        let url = url(
            NAME,
            &self.base_url,
            "/query",
            &[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol.as_str()),
                ("apikey", self.token.as_str()),
            ],
        )?;
        let body: GlobalQuoteResponse = get_json(&self.client, NAME, url)?;
        parse_global_quote(symbol, body)
    }

    fn fetch_multiple(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, ProviderError> {
        let mut results = Vec::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 && !self.pace.is_zero() {
                debug!("{} pacing {:?} before {}", NAME, self.pace, symbol);
                thread::sleep(self.pace);
            }
            results.push((symbol.clone(), self.fetch_quote(symbol)));
        }
        collect_partial(NAME, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_server::{
        API_KEY, assert_provider_failure, client, not_json, refused_base_url, serve, server_error,
    };

    fn decode(raw: &str) -> GlobalQuoteResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn normalizes_global_quote_strings() {
        let body = decode(
            r#"{"Global Quote": {
                "01. symbol": "IBM", "02. open": "180.00", "03. high": "185.50",
                "04. low": "179.25", "05. price": "184.00", "06. volume": "3456789",
                "07. latest trading day": "2024-05-01", "08. previous close": "180.00",
                "09. change": "4.0000", "10. change percent": "2.2222%"
            }}"#,
        );
        let quote = parse_global_quote(&Symbol::parse("IBM").unwrap(), body).unwrap();
        assert_eq!(quote.symbol.as_str(), "IBM");
        assert_eq!(quote.name, "IBM");
        assert_eq!(quote.price, 184.0);
        assert_eq!(quote.previous_close, 180.0);
        assert_eq!(quote.day_high, 185.5);
        assert_eq!(quote.day_low, 179.25);
        assert_eq!(quote.volume, 3_456_789);
        assert!((quote.change_percent - 2.2222).abs() < 1e-3);
        assert!(quote.invariants_hold());
    }

    #[test]
    fn empty_global_quote_is_not_found() {
        let err = parse_global_quote(&Symbol::parse("NOPE").unwrap(), decode(r#"{"Global Quote": {}}"#))
            .unwrap_err();
        assert_eq!(err.provider, NAME);
        assert!(err.cause.contains("NOPE"));
    }

    #[test]
    fn rate_limit_note_is_an_error() {
        let err = parse_global_quote(
            &Symbol::parse("IBM").unwrap(),
            decode(r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"}"#),
        )
        .unwrap_err();
        assert!(err.cause.contains("5 calls per minute"));
    }

    #[test]
    fn zero_previous_close_is_malformed() {
        let body = decode(r#"{"Global Quote": {"05. price": "1.0", "08. previous close": "0"}}"#);
        assert!(parse_global_quote(&Symbol::parse("X").unwrap(), body).is_err());
    }


    fn provider(base_url: &str) -> AlphaVantageProvider {
        AlphaVantageProvider::new(client(), API_KEY.to_string()).with_base_url(base_url)
    }

    fn ibm_only(path: &str) -> (u16, String) {
        if path.contains("symbol=IBM") {
            let body = r#"{"Global Quote": {"01. symbol": "IBM", "05. price": "184.00",
                "06. volume": "10", "08. previous close": "180.00"}}"#;
            (200, body.to_string())
        } else {
            (200, r#"{"Global Quote": {}}"#.to_string())
        }
    }

    #[test]
    fn batch_keeps_the_symbols_that_resolved() {
        let server = serve(ibm_only);
        let symbols = Symbol::parse_list("IBM,NOPE").unwrap();
        let quotes = provider(&server.base_url).fetch_multiple(&symbols).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol.as_str(), "IBM");
        assert_eq!(quotes[0].price, 184.0);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("/query?function=GLOBAL_QUOTE"));
    }

    #[test]
    fn server_error_is_a_provider_error() {
        let server = serve(server_error);
        let err = provider(&server.base_url)
            .fetch_quote(&Symbol::parse("IBM").unwrap())
            .unwrap_err();
        assert_provider_failure(&err, NAME, "500");
    }

    #[test]
    fn non_json_body_is_a_provider_error() {
        let server = serve(not_json);
        let err = provider(&server.base_url)
            .fetch_quote(&Symbol::parse("IBM").unwrap())
            .unwrap_err();
        assert_provider_failure(&err, NAME, "Malformed response");
    }

    #[test]
    fn refused_connection_is_a_provider_error() {
        let err = provider(&refused_base_url())
            .fetch_quote(&Symbol::parse("IBM").unwrap())
            .unwrap_err();
        assert_provider_failure(&err, NAME, "request");
    }
}
