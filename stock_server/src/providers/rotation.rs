//! Round-robin rotation over the configured providers.
//!
//! The rotation owns the provider list, one [`ProviderBudget`] per provider
//! and a cursor pointing at the provider to try first. A provider whose budget
//! is exhausted for the current window is skipped without being called. A
//! failed call still consumes its budget. The cursor stays on a provider that
//! succeeds and moves past one that is skipped or fails.
//!
//! The budget table sits behind one mutex and the cursor is an atomic, so
//! per-symbol fetches can run through the rotation from several threads.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use log::{debug, info, warn};
use stock_common::{FeedError, Quote, Result, Symbol};

use super::budget::ProviderBudget;
use super::{ProviderSettings, QuoteProvider, build_provider, http};

/// Most per-symbol fallback fetches in flight at once.
const MAX_IN_FLIGHT: usize = 8;

/// Providers, their budgets and the round-robin cursor.
pub struct ProviderRotation {
    providers: Vec<Box<dyn QuoteProvider>>,
    budgets: Mutex<Vec<ProviderBudget>>,
    cursor: AtomicUsize,
}

impl ProviderRotation {
    /// Rotation over already-built providers, each with its own budget.
    pub fn new(slots: Vec<(Box<dyn QuoteProvider>, ProviderBudget)>) -> Self {
        let (providers, budgets): (Vec<_>, Vec<_>) = slots.into_iter().unzip();
        Self {
            providers,
            budgets: Mutex::new(budgets),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Rotation with no providers; every fetch reports exhaustion.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Build every provider that has a credential, in the given order.
    pub fn from_settings(settings: &[ProviderSettings]) -> Result<Self> {
        let client = http::build_client()
            .map_err(|e| FeedError::Format(format!("Failed to build HTTP client: {}", e)))?;
        let slots: Vec<_> = settings
            .iter()
            .filter_map(|s| {
                let provider = build_provider(s, &client);
                if provider.is_none() {
                    debug!("{} has no API key, provider disabled", s.kind);
                }
                provider.map(|p| (p, ProviderBudget::new(s.ceiling, s.window)))
            })
            .collect();
        let rotation = Self::new(slots);
        info!(
            "Initialized {} stock data provider(s): {}",
            rotation.len(),
            rotation.names().join(", ")
        );
        Ok(rotation)
    }

    /// Number of configured providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is configured.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in rotation order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Index of the provider that will be tried first.
    pub fn cursor(&self) -> usize {
        match self.providers.len() {
            0 => 0,
            n => self.cursor.load(Ordering::Acquire) % n,
        }
    }

    fn try_consume(&self, index: usize, cost: u32) -> Result<bool> {
        let mut budgets = self.budgets.lock()?;
        Ok(budgets
            .get_mut(index)
            .is_some_and(|budget| budget.try_consume(cost)))
    }

    /// Move the cursor past `from`, unless another thread already moved it.
    fn advance(&self, from: usize) {
        let n = self.providers.len();
        if n == 0 {
            return;
        }
        let _ = self
            .cursor
            .compare_exchange(from, (from + 1) % n, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Fetch one quote from the first provider that has budget and succeeds.
    pub fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote> {
        for _ in 0..self.providers.len() {
            let index = self.cursor();
            let provider = &self.providers[index];

            if !self.try_consume(index, 1)? {
                debug!("Rate limit exceeded for {}, trying next provider", provider.name());
                self.advance(index);
                continue;
            }

            match provider.fetch_quote(symbol) {
                Ok(quote) => {
                    debug!("Fetched {} from {}: {:.2}", symbol, provider.name(), quote.price);
                    return Ok(quote);
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", provider.name(), symbol, e.cause);
                    self.advance(index);
                }
            }
        }
        Err(FeedError::AllProvidersExhausted(symbol.to_string()))
    }

    /// Fetch as many of `symbols` as possible.
    ///
    /// Providers are tried in rotation order with their own batch call, which
    /// costs [`QuoteProvider::request_cost`] units. The first non-empty result
    /// is returned, partial or not. When no provider yields a batch, the
    /// symbols are fetched one by one through [`Self::fetch_quote`]. An error is
    /// returned only when not a single quote could be fetched.
    pub fn fetch_multiple(&self, symbols: &[Symbol]) -> Result<Vec<Quote>> {
        let label = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        if self.providers.is_empty() {
            return Err(FeedError::AllProvidersExhausted(label));
        }

        for _ in 0..self.providers.len() {
            let index = self.cursor();
            let provider = &self.providers[index];
            let cost = provider.request_cost(symbols.len());

            if !self.try_consume(index, cost)? {
                debug!(
                    "{} cannot afford a batch of {} request(s), trying next provider",
                    provider.name(),
                    cost
                );
                self.advance(index);
                continue;
            }

            match provider.fetch_multiple(symbols) {
                Ok(quotes) if !quotes.is_empty() => {
                    info!(
                        "Fetched {}/{} quotes from {}",
                        quotes.len(),
                        symbols.len(),
                        provider.name()
                    );
                    return Ok(quotes);
                }
                Ok(_) => {
                    warn!("{} returned no quotes for batch fetch", provider.name());
                    self.advance(index);
                }
                Err(e) => {
                    warn!("{} failed for batch fetch: {}", provider.name(), e.cause);
                    self.advance(index);
                }
            }
        }

        let quotes = self.fetch_individually(symbols);
        if quotes.is_empty() {
            Err(FeedError::AllProvidersExhausted(label))
        } else {
            Ok(quotes)
        }
    }

    fn fetch_individually(&self, symbols: &[Symbol]) -> Vec<Quote> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for chunk in symbols.chunks(MAX_IN_FLIGHT) {
            thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|symbol| (symbol, s.spawn(move || self.fetch_quote(symbol))))
                    .collect();
                for (symbol, handle) in handles {
                    match handle.join() {
                        Ok(Ok(quote)) => quotes.push(quote),
                        Ok(Err(e)) => debug!("Failed to fetch individual quote for {}: {}", symbol, e),
                        Err(_) => warn!("Fetch thread for {} panicked", symbol),
                    }
                }
            });
        }
        quotes
    }
}
