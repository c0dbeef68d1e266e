//! Normalized quote record shared by server and client.
//!
//! Every upstream provider, the mock generator and the wire format all meet at
//! this one struct. `change` and `change_percent` are derived from `price` and
//! `previous_close` by [`Quote::new`], which keeps
//! `change == price - previous_close` and
//! `change_percent == change / previous_close * 100` for every quote built here.
//! `change_percent` is a percentage: `2.5` means 2.5 %.

use bincode::{Decode, Encode};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::tickers::Symbol;

/// Tolerance used when checking the derived fields.
pub const INVARIANT_TOLERANCE: f64 = 1e-6;

/// Optional listing metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub struct QuoteMetadata {
    /// Listing exchange, e.g. `NASDAQ`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Sector name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    /// Industry name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

/// Market quote for a single symbol.
///
/// Build it with [`Quote::new`] and the `with_*` helpers; the public fields are
/// for reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Canonical uppercase symbol.
    pub symbol: Symbol,
    /// Company name, the symbol itself when the provider has none.
    pub name: String,
    /// Last traded price.
    pub price: f64,
    /// Previous session close.
    pub previous_close: f64,
    /// `price - previous_close`.
    pub change: f64,
    /// `change / previous_close * 100`.
    pub change_percent: f64,
    /// Session volume.
    pub volume: u64,
    /// Session high.
    pub day_high: f64,
    /// Session low.
    pub day_low: f64,
    /// Market capitalization, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    /// Exchange/sector metadata, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<QuoteMetadata>,
    /// UTC timestamp in milliseconds since Unix epoch.
    pub last_updated: u64,
}

impl Quote {
    /// Build a quote from its two independent prices.
    ///
    /// Fails when `previous_close` is not a positive finite number or `price`
    /// is negative or not finite. Day high/low start at `price`, volume at 0,
    /// and `last_updated` at the current time.
    pub fn new(symbol: Symbol, price: f64, previous_close: f64) -> Result<Quote, FeedError> {
        if !previous_close.is_finite() || previous_close <= 0.0 {
            return Err(FeedError::InvalidQuote {
                symbol: symbol.to_string(),
                reason: format!("previous close must be positive, got {previous_close}"),
            });
        }
        if !price.is_finite() || price < 0.0 {
            return Err(FeedError::InvalidQuote {
                symbol: symbol.to_string(),
                reason: format!("price must be non-negative, got {price}"),
            });
        }

        let change = price - previous_close;
        Ok(Quote {
            name: symbol.to_string(),
            symbol,
            price,
            previous_close,
            change,
            change_percent: change / previous_close * 100.0,
            volume: 0,
            day_high: price,
            day_low: price,
            market_cap: None,
            metadata: None,
            last_updated: now_millis(),
        })
    }

    /// Set the display name; blank names keep the symbol.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.name = name;
        }
        self
    }

    /// Set the session volume.
    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = volume;
        self
    }

    /// Set the session high and low. Non-finite values are ignored.
    pub fn with_day_range(mut self, high: f64, low: f64) -> Self {
        if high.is_finite() {
            self.day_high = high;
        }
        if low.is_finite() {
            self.day_low = low;
        }
        self
    }

    /// Set the market capitalization. Non-positive values count as unknown.
    pub fn with_market_cap(mut self, market_cap: Option<f64>) -> Self {
        self.market_cap = market_cap.filter(|cap| cap.is_finite() && *cap > 0.0);
        self
    }

    /// Attach metadata; an all-empty record counts as none.
    pub fn with_metadata(mut self, metadata: QuoteMetadata) -> Self {
        self.metadata = if metadata == QuoteMetadata::default() {
            None
        } else {
            Some(metadata)
        };
        self
    }

    /// Override the timestamp.
    pub fn updated_at(mut self, timestamp_ms: u64) -> Self {
        self.last_updated = timestamp_ms;
        self
    }

    /// Whether `change` and `change_percent` agree with the two prices.
    pub fn invariants_hold(&self) -> bool {
        let change = self.price - self.previous_close;
        (self.change - change).abs() <= INVARIANT_TOLERANCE
            && (self.change_percent - change / self.previous_close * 100.0).abs()
                <= INVARIANT_TOLERANCE
    }
}

/// Current UTC time in milliseconds since Unix epoch.
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
