//! Last-known quote per symbol plus a bounded price history.
//!
//! The store is the single piece of shared market state. The scheduler is its
//! only regular writer; subscriber fan-out and late-join snapshots read it.
//! Entries are replaced whole under a `RwLock`, so readers never observe a
//! half-written quote. A symbol is never removed once tracked.

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use stock_common::{FeedError, Quote, Result, Symbol};

/// Default number of history points kept per symbol.
pub const HISTORY_CAPACITY: usize = 100;

/// One history point used for charting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Price at that time.
    pub price: f64,
    /// UTC milliseconds.
    pub timestamp: u64,
}

struct Entry {
    quote: Quote,
    history: VecDeque<PricePoint>,
}

/// Thread-safe price store.
pub struct PriceStore {
    entries: RwLock<BTreeMap<Symbol, Entry>>,
    history_capacity: usize,
}

impl Default for PriceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceStore {
    /// Create an empty store with the default history capacity.
    pub fn new() -> Self {
        Self::with_history_capacity(HISTORY_CAPACITY)
    }

    /// Create an empty store keeping at most `capacity` points per symbol
    /// (at least one).
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            history_capacity: capacity.max(1),
        }
    }

    /// Replace the current quote for `quote.symbol` and append to its history.
    pub fn upsert(&self, quote: Quote) -> Result<()> {
        let point = PricePoint {
            price: quote.price,
            timestamp: quote.last_updated,
        };
        let mut entries = self.entries.write()?;
        match entries.get_mut(&quote.symbol) {
            Some(entry) => {
                entry.quote = quote;
                entry.history.push_back(point);
                while entry.history.len() > self.history_capacity {
                    entry.history.pop_front();
                }
            }
            None => {
                let mut history = VecDeque::with_capacity(self.history_capacity);
                history.push_back(point);
                entries.insert(quote.symbol.clone(), Entry { quote, history });
            }
        }
        Ok(())
    }

    /// Upsert every quote in order, e.g. when seeding from a persisted snapshot.
    pub fn seed(&self, quotes: impl IntoIterator<Item = Quote>) -> Result<usize> {
        let mut count = 0;
        for quote in quotes {
            self.upsert(quote)?;
            count += 1;
        }
        Ok(count)
    }

    /// Latest quote for `symbol`.
    pub fn get(&self, symbol: &Symbol) -> Result<Quote> {
        self.entries
            .read()?
            .get(symbol)
            .map(|entry| entry.quote.clone())
            .ok_or_else(|| FeedError::SymbolNotFound(symbol.to_string()))
    }

    /// Chronological history for `symbol`, oldest first.
    pub fn history(&self, symbol: &Symbol) -> Result<Vec<PricePoint>> {
        self.entries
            .read()?
            .get(symbol)
            .map(|entry| entry.history.iter().copied().collect())
            .ok_or_else(|| FeedError::SymbolNotFound(symbol.to_string()))
    }

    /// All tracked quotes, symbol-ascending.
    pub fn snapshot(&self) -> Result<Vec<Quote>> {
        Ok(self
            .entries
            .read()?
            .values()
            .map(|entry| entry.quote.clone())
            .collect())
    }

    /// Number of tracked symbols.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether no symbol is tracked yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
