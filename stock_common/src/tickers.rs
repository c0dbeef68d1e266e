//! Ticker symbols and helpers shared between client and server.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use crate::error::FeedError;

/// Longest ticker accepted, exchange suffix included (e.g. `BRK.B`, `RDS-A`).
pub const MAX_SYMBOL_LEN: usize = 12;

/// Canonical uppercase ticker symbol.
///
/// Construction always goes through [`Symbol::parse`], so a `Symbol` is never
/// empty, never longer than [`MAX_SYMBOL_LEN`] and only contains ASCII
/// letters, digits, `.` and `-`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Trim, uppercase and validate a raw ticker.
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        let canonical = raw.trim().to_ascii_uppercase();
        if canonical.is_empty() || canonical.len() > MAX_SYMBOL_LEN {
            return Err(FeedError::InvalidSymbol(raw.to_string()));
        }
        let valid = canonical
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !valid {
            return Err(FeedError::InvalidSymbol(raw.to_string()));
        }
        Ok(Symbol(canonical))
    }

    /// Borrow the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a comma/whitespace separated list, dropping duplicates but keeping
    /// first-seen order.
    pub fn parse_list(raw: &str) -> Result<Vec<Symbol>, FeedError> {
        let mut seen = HashSet::new();
        let mut symbols = Vec::new();
        for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.trim().is_empty() {
                continue;
            }
            let symbol = Symbol::parse(token)?;
            if seen.insert(symbol.clone()) {
                symbols.push(symbol);
            }
        }
        Ok(symbols)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trait providing file parsing for symbols.
pub trait SymbolParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Symbols may be separated by commas, spaces or new lines; lines starting
    /// with `#` are comments. Duplicates are dropped. Returns an error if any
    /// token is not a valid symbol.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Symbol>, FeedError>;
}

impl SymbolParser for Symbol {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, FeedError> {
        let mut seen = HashSet::new();
        let mut symbols = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(FeedError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            let parsed = Symbol::parse_list(trimmed_line)
                .map_err(|e| FeedError::ParseSymbolsFile(e.to_string()))?;
            for symbol in parsed {
                if seen.insert(symbol.clone()) {
                    symbols.push(symbol);
                }
            }
        }
        Ok(symbols)
    }
}
