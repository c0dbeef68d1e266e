//!
//! Common types and utilities shared by the stock feed server and client.
//!
//! This crate aggregates:
//! - `error`: unified error type `FeedError` and the per-call `ProviderError`.
//! - `result`: handy `Result<T, FeedError>` alias.
//! - `tickers`: the canonical `Symbol` type and symbol-file parsing.
//! - `quote`: the normalized `Quote` record and its invariants.
//! - `command`: TCP command payloads sent by clients.
//! - `message`: data-channel messages sent by the server.
//! - `net`: networking constants and small helpers.
#![warn(missing_docs)]
pub mod command;
pub mod error;
pub mod message;
pub mod net;
pub mod quote;
pub mod result;
pub mod tickers;

pub use command::{Command, CommandKind};
pub use error::{FeedError, ProviderError};
pub use message::FeedMessage;
pub use quote::{Quote, QuoteMetadata};
pub use result::Result;
pub use tickers::Symbol;
