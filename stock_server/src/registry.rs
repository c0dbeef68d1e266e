//! Live subscribers and fan-out of feed events.
//!
//! Every subscriber owns the receiving end of an unbounded crossbeam channel.
//! Publishing clones the event into each sender; a sender whose receiver has
//! gone away is dropped from the registry on the spot.
//!
//! A subscriber joining mid-run gets the whole store as its first batch. The
//! snapshot is taken and sent while the registry lock is held, and publishing
//! takes the same lock, so no later batch can reach the newcomer first.
//!
//! Topic sets are advisory: they are recorded for each subscriber but every
//! event still goes to everybody.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info};
use stock_common::{Quote, Result, Symbol};

use crate::model::price_store::PriceStore;

/// Opaque subscriber handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Event delivered to one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A full batch, symbol-ascending.
    Batch(Vec<Quote>),
    /// One out-of-band update.
    Single(Quote),
    /// The server is going away.
    Shutdown,
}

struct Subscriber {
    tx: Sender<FeedEvent>,
    topics: HashSet<Symbol>,
}

/// Connected subscribers, keyed by [`SubscriberId`].
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Registry with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber and hand it the current snapshot as its first event.
    pub fn connect(&self, store: &PriceStore) -> Result<(SubscriberId, Receiver<FeedEvent>)> {
        let (tx, rx) = unbounded();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut subscribers = self.subscribers.lock()?;
        let snapshot = store.snapshot()?;
        debug!("Sending snapshot of {} quote(s) to subscriber {}", snapshot.len(), id);
        // The receiver is still in hand, so this send cannot fail.
        let _ = tx.send(FeedEvent::Batch(snapshot));
        subscribers.insert(
            id,
            Subscriber {
                tx,
                topics: HashSet::new(),
            },
        );
        info!("Subscriber {} connected ({} total)", id, subscribers.len());
        Ok((id, rx))
    }

    /// Deliver a batch to every subscriber. Returns how many received it.
    pub fn publish_batch(&self, batch: Vec<Quote>) -> Result<usize> {
        self.publish(FeedEvent::Batch(batch))
    }

    /// Deliver one quote to every subscriber. Returns how many received it.
    pub fn publish_single(&self, quote: Quote) -> Result<usize> {
        self.publish(FeedEvent::Single(quote))
    }

    fn publish(&self, event: FeedEvent) -> Result<usize> {
        let mut subscribers = self.subscribers.lock()?;
        subscribers.retain(|id, subscriber| match subscriber.tx.send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!("Subscriber {} is gone, dropping it", id);
                false
            }
        });
        Ok(subscribers.len())
    }

    /// Add symbols to the subscriber's topic set. Returns `false` for unknown ids.
    pub fn subscribe(&self, id: SubscriberId, symbols: &[Symbol]) -> Result<bool> {
        let mut subscribers = self.subscribers.lock()?;
        Ok(match subscribers.get_mut(&id) {
            Some(subscriber) => {
                subscriber.topics.extend(symbols.iter().cloned());
                true
            }
            None => false,
        })
    }

    /// Remove symbols from the subscriber's topic set. Returns `false` for unknown ids.
    pub fn unsubscribe(&self, id: SubscriberId, symbols: &[Symbol]) -> Result<bool> {
        let mut subscribers = self.subscribers.lock()?;
        Ok(match subscribers.get_mut(&id) {
            Some(subscriber) => {
                for symbol in symbols {
                    subscriber.topics.remove(symbol);
                }
                true
            }
            None => false,
        })
    }

    /// Sorted topic set of a subscriber, `None` for unknown ids.
    pub fn topics(&self, id: SubscriberId) -> Result<Option<Vec<Symbol>>> {
        let subscribers = self.subscribers.lock()?;
        Ok(subscribers.get(&id).map(|subscriber| {
            let mut topics: Vec<Symbol> = subscriber.topics.iter().cloned().collect();
            topics.sort();
            topics
        }))
    }

    /// Deregister a subscriber. Its receiver sees the channel close.
    pub fn disconnect(&self, id: SubscriberId) -> Result<bool> {
        let mut subscribers = self.subscribers.lock()?;
        let removed = subscribers.remove(&id).is_some();
        if removed {
            info!("Subscriber {} disconnected ({} left)", id, subscribers.len());
        }
        Ok(removed)
    }

    /// Tell every subscriber the feed is ending and forget them all.
    pub fn shutdown(&self) -> Result<()> {
        let mut subscribers = self.subscribers.lock()?;
        for subscriber in subscribers.values() {
            let _ = subscriber.tx.send(FeedEvent::Shutdown);
        }
        info!("Closed {} subscriber stream(s)", subscribers.len());
        subscribers.clear();
        Ok(())
    }

    /// Number of connected subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
