use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use approx::assert_abs_diff_eq;
use crossbeam_channel::Receiver;
use stock_common::{FeedError, ProviderError, Quote, Symbol};
use stock_server::model::price_store::{HISTORY_CAPACITY, PriceStore};
use stock_server::persistence::SnapshotFile;
use stock_server::providers::QuoteProvider;
use stock_server::providers::budget::ProviderBudget;
use stock_server::providers::rotation::ProviderRotation;
use stock_server::registry::{FeedEvent, SubscriberRegistry};
use stock_server::scheduler::{BroadcastScheduler, SchedulerState};

const WAIT: Duration = Duration::from_secs(5);
const LONG_INTERVAL: Duration = Duration::from_secs(60);

/// Provider that knows a fixed set of symbols and counts upstream calls.
struct FixedProvider {
    known: HashSet<Symbol>,
    calls: Arc<AtomicU32>,
}

impl QuoteProvider for FixedProvider {
    fn name(&self) -> &str {
        "Fixed"
    }

    fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.known.contains(symbol) {
            Ok(Quote::new(symbol.clone(), 42.0, 40.0).unwrap().with_name("From provider"))
        } else {
            Err(ProviderError::new("Fixed", format!("unknown symbol {}", symbol)))
        }
    }
}

fn symbols(raw: &str) -> Vec<Symbol> {
    Symbol::parse_list(raw).unwrap()
}

fn fixed_rotation(known: &str, ceiling: u32) -> (ProviderRotation, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let provider = FixedProvider {
        known: symbols(known).into_iter().collect(),
        calls: Arc::clone(&calls),
    };
    let rotation = ProviderRotation::new(vec![(
        Box::new(provider) as Box<dyn QuoteProvider>,
        ProviderBudget::new(ceiling, Duration::from_secs(60)),
    )]);
    (rotation, calls)
}

fn scheduler_with(rotation: ProviderRotation) -> BroadcastScheduler {
    BroadcastScheduler::new(
        rotation,
        Arc::new(PriceStore::new()),
        Arc::new(SubscriberRegistry::new()),
    )
}

/// Connect a subscriber and discard its join snapshot.
fn subscribe(scheduler: &BroadcastScheduler) -> Receiver<FeedEvent> {
    let (_, rx) = scheduler.registry().connect(scheduler.store()).unwrap();
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), FeedEvent::Batch(_)));
    rx
}

fn next_batch(rx: &Receiver<FeedEvent>) -> Vec<Quote> {
    match rx.recv_timeout(WAIT).unwrap() {
        FeedEvent::Batch(batch) => batch,
        other => panic!("expected a batch, got {:?}", other),
    }
}

fn names(batch: &[Quote]) -> Vec<&str> {
    batch.iter().map(|q| q.symbol.as_str()).collect()
}

#[test]
fn first_batch_without_providers_is_all_mock() {
    let scheduler = scheduler_with(ProviderRotation::empty());
    let rx = subscribe(&scheduler);

    scheduler
        .start(&symbols("AAPL,MSFT"), Duration::from_millis(1000))
        .unwrap();
    let batch = next_batch(&rx);
    scheduler.stop().unwrap();

    assert_eq!(names(&batch), vec!["AAPL", "MSFT"]);
    for quote in &batch {
        assert!(quote.price > 0.0);
        assert!(quote.previous_close > 0.0);
        assert_abs_diff_eq!(quote.change, quote.price - quote.previous_close, epsilon = 1e-6);
        assert_abs_diff_eq!(
            quote.change_percent,
            quote.change / quote.previous_close * 100.0,
            epsilon = 1e-6
        );
    }
}

#[test]
fn batch_has_one_quote_per_tracked_symbol() {
    let scheduler = scheduler_with(ProviderRotation::empty());
    let tracked = symbols("TSLA,AAPL,GOOG,AAPL,MSFT");

    let batch = scheduler.run_cycle(&symbols("AAPL,GOOG,MSFT,TSLA"));
    assert_eq!(names(&batch), vec!["AAPL", "GOOG", "MSFT", "TSLA"]);

    let rx = subscribe(&scheduler);
    scheduler.start(&tracked, LONG_INTERVAL).unwrap();
    let batch = next_batch(&rx);
    scheduler.stop().unwrap();
    assert_eq!(names(&batch), vec!["AAPL", "GOOG", "MSFT", "TSLA"]);
}

#[test]
fn provider_subset_is_used_and_the_rest_is_mocked() {
    let (rotation, _) = fixed_rotation("AAPL", 100);
    let scheduler = scheduler_with(rotation);

    let batch = scheduler.run_cycle(&symbols("AAPL,MSFT,GOOG"));
    assert_eq!(names(&batch), vec!["AAPL", "GOOG", "MSFT"]);
    assert_eq!(batch[0].name, "From provider");
    assert_eq!(batch[0].price, 42.0);
    assert_ne!(batch[1].name, "From provider");
    assert_ne!(batch[2].name, "From provider");
    assert!(batch.iter().all(Quote::invariants_hold));
}

#[test]
fn untracked_provider_quotes_are_dropped() {
    struct Chatty;
    impl QuoteProvider for Chatty {
        fn name(&self) -> &str {
            "Chatty"
        }
        fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ProviderError> {
            Ok(Quote::new(symbol.clone(), 1.0, 1.0).unwrap())
        }
        fn fetch_multiple(&self, _: &[Symbol]) -> Result<Vec<Quote>, ProviderError> {
            Ok(vec![Quote::new(Symbol::parse("ZZZ").unwrap(), 1.0, 1.0).unwrap()])
        }
    }
    let rotation = ProviderRotation::new(vec![(
        Box::new(Chatty) as Box<dyn QuoteProvider>,
        ProviderBudget::new(100, Duration::from_secs(60)),
    )]);
    let scheduler = scheduler_with(rotation);

    let batch = scheduler.run_cycle(&symbols("AAPL"));
    assert_eq!(names(&batch), vec!["AAPL"]);
    assert!(scheduler.store().get(&Symbol::parse("ZZZ").unwrap()).is_err());
}

#[test]
fn exhausted_budget_skips_the_provider_on_the_next_cycle() {
    let (rotation, calls) = fixed_rotation("AAPL", 1);
    let scheduler = scheduler_with(rotation);
    let tracked = symbols("AAPL");

    let first = scheduler.run_cycle(&tracked);
    let second = scheduler.run_cycle(&tracked);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first[0].name, "From provider");
    // Mocked by walking from the provider quote.
    assert_eq!(second[0].previous_close, first[0].price);
}

#[test]
fn double_start_runs_one_worker() {
    let (rotation, calls) = fixed_rotation("AAPL", 100);
    let scheduler = scheduler_with(rotation);
    let rx = subscribe(&scheduler);
    let tracked = symbols("AAPL");

    scheduler.start(&tracked, LONG_INTERVAL).unwrap();
    scheduler.start(&tracked, LONG_INTERVAL).unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Running);

    next_batch(&rx);
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    scheduler.stop().unwrap();
}

#[test]
fn restart_publishes_immediately() {
    let scheduler = scheduler_with(ProviderRotation::empty());
    let rx = subscribe(&scheduler);
    let tracked = symbols("AAPL");

    scheduler.start(&tracked, LONG_INTERVAL).unwrap();
    next_batch(&rx);
    scheduler.stop().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    scheduler.start(&tracked, LONG_INTERVAL).unwrap();
    let batch = next_batch(&rx);
    scheduler.stop().unwrap();
    assert_eq!(names(&batch), vec!["AAPL"]);
}

#[test]
fn zero_interval_is_rejected() {
    let scheduler = scheduler_with(ProviderRotation::empty());
    let err = scheduler.start(&symbols("AAPL"), Duration::ZERO).unwrap_err();
    assert!(matches!(err, FeedError::InvalidInterval));
    assert!(!scheduler.is_running());
}

#[test]
fn late_subscriber_gets_full_snapshot_first() {
    let scheduler = scheduler_with(ProviderRotation::empty());
    let early = subscribe(&scheduler);
    let tracked = symbols("AAPL,MSFT,TSLA");

    scheduler.start(&tracked, Duration::from_millis(20)).unwrap();
    next_batch(&early);

    let (_, late) = scheduler.registry().connect(scheduler.store()).unwrap();
    let snapshot = next_batch(&late);
    assert_eq!(names(&snapshot), vec!["AAPL", "MSFT", "TSLA"]);

    // Every later batch reflects prices at least as new as the snapshot.
    let later = next_batch(&late);
    scheduler.stop().unwrap();
    for (before, after) in snapshot.iter().zip(&later) {
        assert_eq!(before.symbol, after.symbol);
        assert!(after.last_updated >= before.last_updated);
    }
}

#[test]
fn sync_interval_republishes_the_store() {
    let scheduler = scheduler_with(ProviderRotation::empty()).with_sync_interval(Duration::from_millis(50));
    let rx = subscribe(&scheduler);

    scheduler.start(&symbols("AAPL,MSFT"), LONG_INTERVAL).unwrap();
    let cycle = next_batch(&rx);
    let synced = next_batch(&rx);
    scheduler.stop().unwrap();
    assert_eq!(synced, cycle);
}

#[test]
fn history_keeps_the_last_hundred_points() {
    let scheduler = scheduler_with(ProviderRotation::empty());
    let tracked = symbols("AAPL");
    let mut prices = Vec::new();
    for _ in 0..150 {
        prices.push(scheduler.run_cycle(&tracked)[0].price);
    }

    let history = scheduler.store().history(&tracked[0]).unwrap();
    assert_eq!(history.len(), HISTORY_CAPACITY);
    let kept: Vec<f64> = history.iter().map(|p| p.price).collect();
    assert_eq!(kept, prices[50..]);
}

#[test]
fn ingest_sends_a_single_update() {
    let scheduler = scheduler_with(ProviderRotation::empty());
    let rx = subscribe(&scheduler);
    let quote = Quote::new(Symbol::parse("NVDA").unwrap(), 130.0, 125.0).unwrap();

    scheduler.ingest(quote.clone()).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), FeedEvent::Single(quote.clone()));
    assert_eq!(scheduler.store().get(&quote.symbol).unwrap(), quote);
}

#[test]
fn snapshot_file_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("prices.bin"));
    let tracked = symbols("AAPL,MSFT");

    let first = scheduler_with(ProviderRotation::empty()).with_snapshot_file(file.clone());
    let batch = first.run_cycle(&tracked);

    let store = Arc::new(PriceStore::new());
    assert_eq!(store.seed(file.load().unwrap()).unwrap(), 2);
    let second = BroadcastScheduler::new(ProviderRotation::empty(), Arc::clone(&store), Arc::new(SubscriberRegistry::new()));
    let resumed = second.run_cycle(&tracked);
    for (before, after) in batch.iter().zip(&resumed) {
        assert_eq!(after.previous_close, before.price);
    }
}
