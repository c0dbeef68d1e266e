//! Synthetic quotes for when no provider can serve a symbol.
//!
//! Two entry points:
//! - [`generate_mock_quote`] builds a fresh quote with a price in
//!   `[MIN_BASE_PRICE, MAX_BASE_PRICE]` and an absolute change within
//!   `±MAX_ABS_CHANGE`.
//! - [`next_mock_quote`] takes a small bounded random walk from a previously
//!   published quote so a mocked feed keeps moving smoothly.
//!
//! Both only touch the thread-local RNG, so they are safe to call from any
//! thread without synchronization. Prices are rounded to cents before the
//! change fields are derived, which keeps every output inside the quote
//! invariants.

use rand::Rng;
use stock_common::quote::now_millis;
use stock_common::{Quote, QuoteMetadata, Symbol};

/// Lowest fresh base price.
pub const MIN_BASE_PRICE: f64 = 50.0;
/// Highest fresh base price.
pub const MAX_BASE_PRICE: f64 = 1050.0;
/// Largest absolute change from the previous close for fresh quotes.
pub const MAX_ABS_CHANGE: f64 = 10.0;
/// Largest relative step of the random walk (1%).
pub const MAX_WALK_STEP: f64 = 0.01;
/// Floor for walked prices.
pub const MIN_PRICE: f64 = 0.01;
/// Ceiling for walked prices.
pub const MAX_PRICE: f64 = 100_000.0;

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Calculate the next synthetic price using a small random walk around `current_price`.
///
/// The change is sampled uniformly from `[-1%, +1%]` and the result is clamped
/// into `[MIN_PRICE, MAX_PRICE]`.
pub fn next_price(current_price: f64) -> f64 {
    let mut rng = rand::rng();
    let change: f64 = rng.random_range(-MAX_WALK_STEP..=MAX_WALK_STEP);
    round_cents(current_price * (1.0 + change)).clamp(MIN_PRICE, MAX_PRICE)
}

/// Build a fresh synthetic quote for `symbol`.
pub fn generate_mock_quote(symbol: &Symbol) -> Quote {
    let mut rng = rand::rng();
    let price = round_cents(rng.random_range(MIN_BASE_PRICE..=MAX_BASE_PRICE));
    let change = rng.random_range(-MAX_ABS_CHANGE..=MAX_ABS_CHANGE);
    let previous_close = round_cents(price - change).max(MIN_PRICE);

    let day_high = round_cents(price + rng.random_range(0.0..10.0));
    let day_low = round_cents((price - rng.random_range(0.0..10.0)).max(MIN_PRICE));
    let volume = rng.random_range(100_000..10_100_000u64);
    let market_cap = rng.random_range(1.0e9..1.0e12_f64).floor();

    decorate(symbol, price, previous_close)
        .with_day_range(day_high, day_low)
        .with_volume(volume)
        .with_market_cap(Some(market_cap))
}

/// Take one random-walk step from `previous`.
///
/// The previous price becomes the new previous close. Name, market cap and
/// metadata carry over; the day range widens to include the new price.
pub fn next_mock_quote(previous: &Quote) -> Quote {
    let mut rng = rand::rng();
    let previous_close = round_cents(previous.price).clamp(MIN_PRICE, MAX_PRICE);
    let price = next_price(previous_close);
    let volume_step = rng.random_range(1_000..50_000u64);

    let mut quote = decorate(&previous.symbol, price, previous_close)
        .with_name(previous.name.clone())
        .with_day_range(
            previous.day_high.max(price),
            previous.day_low.min(price).max(MIN_PRICE),
        )
        .with_volume(previous.volume.saturating_add(volume_step))
        .with_market_cap(previous.market_cap);
    if let Some(metadata) = &previous.metadata {
        quote = quote.with_metadata(metadata.clone());
    }
    quote
}

fn decorate(symbol: &Symbol, price: f64, previous_close: f64) -> Quote {
    // Both prices are clamped positive above, so construction cannot fail; the
    // fallback keeps the signature infallible without panicking.
    match Quote::new(symbol.clone(), price, previous_close) {
        Ok(quote) => quote
            .with_name(format!("{} Inc.", symbol))
            .with_metadata(QuoteMetadata {
                exchange: Some("NASDAQ".to_string()),
                sector: Some("Technology".to_string()),
                industry: None,
            }),
        Err(_) => fallback_quote(symbol),
    }
}

fn fallback_quote(symbol: &Symbol) -> Quote {
    Quote {
        symbol: symbol.clone(),
        name: symbol.to_string(),
        price: MIN_BASE_PRICE,
        previous_close: MIN_BASE_PRICE,
        change: 0.0,
        change_percent: 0.0,
        volume: 0,
        day_high: MIN_BASE_PRICE,
        day_low: MIN_BASE_PRICE,
        market_cap: None,
        metadata: None,
        last_updated: now_millis(),
    }
}
