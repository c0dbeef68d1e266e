//! Outbound feed messages (server -> client datagrams).
//!
//! Each datagram carries one JSON object tagged with the event name:
//! `{"event": "priceUpdate", "data": [..quotes..]}`.

use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::quote::Quote;
use crate::tickers::Symbol;

/// Reply to a `REQUEST` for a symbol the server does not track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockErrorPayload {
    /// Symbol that was asked for.
    pub symbol: Symbol,
    /// Why there is no data.
    pub message: String,
}

/// One message on the data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum FeedMessage {
    /// A full batch: one scheduler cycle, or the snapshot sent on join.
    #[serde(rename = "priceUpdate")]
    PriceUpdate(Vec<Quote>),
    /// A single out-of-band update.
    #[serde(rename = "stockUpdated")]
    StockUpdated(Quote),
    /// Reply to a `REQUEST`.
    #[serde(rename = "stockData")]
    StockData(Quote),
    /// Reply to a `REQUEST` that could not be served.
    #[serde(rename = "stockError")]
    StockError(StockErrorPayload),
}

impl FeedMessage {
    /// Encode the message to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, FeedError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a message from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, FeedError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_is_tagged_price_update() {
        let quote = Quote::new(Symbol::parse("AAPL").unwrap(), 1.0, 1.0).unwrap();
        let bytes = FeedMessage::PriceUpdate(vec![quote.clone()]).to_json_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["event"], "priceUpdate");
        assert_eq!(json["data"][0]["symbol"], "AAPL");

        let decoded = FeedMessage::from_json_slice(&bytes).unwrap();
        assert_eq!(decoded, FeedMessage::PriceUpdate(vec![quote]));
    }

    #[test]
    fn stock_error_shape() {
        let msg = FeedMessage::StockError(StockErrorPayload {
            symbol: Symbol::parse("ZZZ").unwrap(),
            message: "Stock not found".to_string(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "stockError");
        assert_eq!(json["data"]["message"], "Stock not found");
    }
}
