//! Error types shared between client and server.
//!
//! The `FeedError` enum unifies common failure cases for I/O, serialization,
//! channel communication, quote validation and the provider layer, allowing the
//! crates to propagate a single error type. A single upstream call failing is a
//! [`ProviderError`]; the rotation reports [`FeedError::AllProvidersExhausted`]
//! when no provider could serve a request.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Failure of one quote provider call.
///
/// Network errors, non-success statuses, malformed bodies and unknown symbols
/// all collapse into this one shape: the provider name plus a readable cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider} failed: {cause}")]
pub struct ProviderError {
    /// Display name of the provider that failed.
    pub provider: String,
    /// Human-readable cause.
    pub cause: String,
}

impl ProviderError {
    /// Build a provider error from anything printable.
    pub fn new(provider: impl Into<String>, cause: impl ToString) -> Self {
        Self {
            provider: provider.into(),
            cause: cause.to_string(),
        }
    }
}

/// Unified error type shared by client and server.
#[derive(Error, Debug)]
pub enum FeedError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Error while parsing the symbols file.
    #[error("Parse symbols file error: {0}")]
    ParseSymbolsFile(String),

    /// A ticker string that is empty or contains unsupported characters.
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// The requested symbol is not tracked by the price store.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Quote values that would break the price/change invariants.
    #[error("Invalid quote for {symbol}: {reason}")]
    InvalidQuote {
        /// Symbol the quote was built for.
        symbol: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The scheduler was started with a zero interval.
    #[error("Invalid interval: must be greater than zero")]
    InvalidInterval,

    /// No configured provider could serve the request in this window.
    #[error("All providers exhausted for {0}")]
    AllProvidersExhausted(String),

    /// Failure while decoding with `bincode` (invalid or truncated payloads, etc.).
    #[error("Bincode serialization/deserialization error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// Failure while encoding with `bincode` (I/O or serialization issues).
    #[error("Bincode serialization/deserialization error: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Crossbeam/channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for FeedError {
    fn from(err: PoisonError<T>) -> Self {
        FeedError::MutexLock(err.to_string())
    }
}
