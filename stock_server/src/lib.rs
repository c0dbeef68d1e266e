//! Periodic multi-source stock price broadcaster.
//!
//! Building blocks, bottom-up:
//! - `providers`: upstream quote APIs behind [`providers::QuoteProvider`],
//!   and the budgeted round-robin [`providers::rotation::ProviderRotation`].
//! - `model`: the mock quote generator, the price store and the keep-alive
//!   monitor.
//! - `registry`: live subscribers and event fan-out.
//! - `scheduler`: the timer-driven fetch, store and publish loop.
//! - `persistence`: the on-disk snapshot of last-known quotes.
//! - `receiver`, `udp_listener`, `stream`, `server`: the TCP command and UDP
//!   data channels of the binary.
//! - `config`: command-line and environment configuration.
#![warn(missing_docs)]
pub mod config;
pub mod model;
pub mod persistence;
pub mod providers;
pub mod receiver;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod stream;
pub mod udp_listener;
