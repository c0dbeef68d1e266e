//! Periodic fetch-and-publish loop.
//!
//! A running scheduler owns one worker thread. The worker runs a cycle right
//! away, then one per tick of a `crossbeam_channel::tick` timer, until the stop
//! channel fires. Ticks that arrive while a cycle is still running are
//! coalesced by the timer channel, so cycles of one run never overlap.
//!
//! A cycle asks the provider rotation for every tracked symbol, fills the gaps
//! with mock quotes, writes the batch to the store (and the snapshot file, if
//! any), then publishes it. Provider failures never reach the caller; they only
//! turn into mock data.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, never, select, tick};
use log::{debug, error, info, warn};
use stock_common::{FeedError, Quote, Result, Symbol};
use strum_macros::Display;

use crate::model::mock_generator::{generate_mock_quote, next_mock_quote};
use crate::model::price_store::PriceStore;
use crate::persistence::SnapshotFile;
use crate::providers::rotation::ProviderRotation;
use crate::registry::SubscriberRegistry;

/// Lifecycle of a [`BroadcastScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SchedulerState {
    /// No worker thread.
    Idle,
    /// A worker is cycling.
    Running,
}

/// Everything a cycle touches, shared with the worker thread.
#[derive(Clone)]
struct CycleContext {
    rotation: Arc<ProviderRotation>,
    store: Arc<PriceStore>,
    registry: Arc<SubscriberRegistry>,
    snapshot: Option<SnapshotFile>,
}

struct RunningTask {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Timer-driven fetch, store and publish loop.
pub struct BroadcastScheduler {
    ctx: CycleContext,
    sync_interval: Option<Duration>,
    running: Mutex<Option<RunningTask>>,
}

impl BroadcastScheduler {
    /// Idle scheduler with no snapshot file and no sync timer.
    pub fn new(
        rotation: ProviderRotation,
        store: Arc<PriceStore>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            ctx: CycleContext {
                rotation: Arc::new(rotation),
                store,
                registry,
                snapshot: None,
            },
            sync_interval: None,
            running: Mutex::new(None),
        }
    }

    /// Rewrite `file` with the whole store after every cycle.
    pub fn with_snapshot_file(mut self, file: SnapshotFile) -> Self {
        self.ctx.snapshot = Some(file);
        self
    }

    /// Also re-publish the full store snapshot every `interval`.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval).filter(|i| !i.is_zero());
        self
    }

    /// Store every cycle writes to.
    pub fn store(&self) -> &Arc<PriceStore> {
        &self.ctx.store
    }

    /// Registry every cycle publishes to.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.ctx.registry
    }

    /// Start broadcasting `symbols` every `interval`.
    ///
    /// Does nothing when already running. Duplicate symbols are tracked once.
    pub fn start(&self, symbols: &[Symbol], interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(FeedError::InvalidInterval);
        }
        let mut running = self.running.lock()?;
        if running.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            info!("Broadcast scheduler is already running");
            return Ok(());
        }

        let tracked: Vec<Symbol> = symbols.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let (stop_tx, stop_rx) = bounded(1);
        let ctx = self.ctx.clone();
        let sync_interval = self.sync_interval;

        info!(
            "Starting broadcast of {} symbol(s) every {} ms",
            tracked.len(),
            interval.as_millis()
        );
        let handle = thread::Builder::new()
            .name("broadcast-scheduler".to_string())
            .spawn(move || ctx.run(tracked, interval, sync_interval, stop_rx))?;
        *running = Some(RunningTask { stop_tx, handle });
        Ok(())
    }

    /// Signal the worker to stop. Returns without waiting for a cycle in flight.
    pub fn stop(&self) -> Result<()> {
        if let Some(task) = self.running.lock()?.take() {
            let _ = task.stop_tx.try_send(());
            info!("Broadcast scheduler stopped");
        }
        Ok(())
    }

    /// Whether a worker is currently alive.
    pub fn state(&self) -> SchedulerState {
        match self.running.lock() {
            Ok(running) if running.as_ref().is_some_and(|task| !task.handle.is_finished()) => {
                SchedulerState::Running
            }
            _ => SchedulerState::Idle,
        }
    }

    /// Shorthand for `state() == SchedulerState::Running`.
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Run one cycle on the calling thread and return the published batch.
    pub fn run_cycle(&self, symbols: &[Symbol]) -> Vec<Quote> {
        self.ctx.run_cycle(symbols)
    }

    /// Store and publish a single out-of-band update.
    pub fn ingest(&self, quote: Quote) -> Result<()> {
        self.ctx.store.upsert(quote.clone())?;
        let delivered = self.ctx.registry.publish_single(quote)?;
        debug!("Single update delivered to {} subscriber(s)", delivered);
        Ok(())
    }
}

impl Drop for BroadcastScheduler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

impl CycleContext {
    fn run(
        self,
        symbols: Vec<Symbol>,
        interval: Duration,
        sync_interval: Option<Duration>,
        stop_rx: Receiver<()>,
    ) {
        self.run_cycle(&symbols);
        let ticker = tick(interval);
        let sync = sync_interval.map(tick).unwrap_or_else(never);

        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    if stop_requested(&stop_rx) {
                        break;
                    }
                    self.run_cycle(&symbols);
                },
                recv(sync) -> _ => self.sync(),
            }
        }
        debug!("Broadcast worker exiting");
    }

    fn mock_for(&self, symbol: &Symbol) -> Quote {
        match self.store.get(symbol) {
            Ok(previous) => next_mock_quote(&previous),
            Err(_) => generate_mock_quote(symbol),
        }
    }

    fn run_cycle(&self, symbols: &[Symbol]) -> Vec<Quote> {
        let fetched = match self.rotation.fetch_multiple(symbols) {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!("Provider fetch failed, using mock data: {}", e);
                Vec::new()
            }
        };

        let tracked: HashSet<&Symbol> = symbols.iter().collect();
        let mut by_symbol: BTreeMap<Symbol, Quote> = fetched
            .into_iter()
            .filter(|quote| tracked.contains(&quote.symbol))
            .map(|quote| (quote.symbol.clone(), quote))
            .collect();
        let from_providers = by_symbol.len();
        for symbol in symbols {
            if !by_symbol.contains_key(symbol) {
                by_symbol.insert(symbol.clone(), self.mock_for(symbol));
            }
        }
        let batch: Vec<Quote> = by_symbol.into_values().collect();

        for quote in &batch {
            if let Err(e) = self.store.upsert(quote.clone()) {
                error!("Failed to store {}: {}", quote.symbol, e);
            }
        }
        self.persist();

        match self.registry.publish_batch(batch.clone()) {
            Ok(subscribers) => info!(
                "Broadcast {} quote(s) ({} live, {} mock) to {} subscriber(s)",
                batch.len(),
                from_providers,
                batch.len() - from_providers,
                subscribers
            ),
            Err(e) => error!("Failed to publish batch: {}", e),
        }
        batch
    }

    fn persist(&self) {
        let Some(file) = &self.snapshot else {
            return;
        };
        let result = self.store.snapshot().and_then(|quotes| file.save(&quotes));
        if let Err(e) = result {
            error!("Failed to save snapshot to {}: {}", file.path().display(), e);
        }
    }

    fn sync(&self) {
        match self.store.snapshot() {
            Ok(quotes) if quotes.is_empty() => {}
            Ok(quotes) => {
                let count = quotes.len();
                match self.registry.publish_batch(quotes) {
                    Ok(subscribers) => debug!("Synced {} quote(s) to {} subscriber(s)", count, subscribers),
                    Err(e) => error!("Failed to publish sync batch: {}", e),
                }
            }
            Err(e) => error!("Failed to read store for sync: {}", e),
        }
    }
}
