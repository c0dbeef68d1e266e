//! Last-known quotes on disk.
//!
//! The snapshot is the store's quote list encoded with `bincode`. It is read
//! once at startup to seed the store and rewritten after every cycle, so a
//! restarted server resumes its random walks and serves late joiners real
//! values right away. Writes go to a sibling temp file which is then renamed
//! over the snapshot.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};
use stock_common::{Quote, Result, Symbol};

/// Location of the bincode snapshot of last-known quotes.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Snapshot at `path`; nothing is read until [`Self::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File the snapshot is read from and written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Quotes saved by the last run. A missing file is an empty snapshot.
    pub fn load(&self) -> Result<Vec<Quote>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let (quotes, _): (Vec<Quote>, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(quotes)
    }

    /// Saved quotes for `symbols` only. Symbols dropped from the
    /// configuration since the last run are discarded.
    pub fn load_tracked(&self, symbols: &[Symbol]) -> Result<Vec<Quote>> {
        let mut quotes = self.load()?;
        let saved = quotes.len();
        quotes.retain(|quote| symbols.contains(&quote.symbol));
        if quotes.len() < saved {
            info!(
                "Discarded {} snapshot quote(s) for untracked symbols",
                saved - quotes.len()
            );
        }
        Ok(quotes)
    }

    /// Replace the snapshot with `quotes`.
    pub fn save(&self, quotes: &[Quote]) -> Result<()> {
        let bytes = bincode::encode_to_vec(quotes, bincode::config::standard())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved {} quote(s) to {}", quotes.len(), self.path.display());
        Ok(())
    }
}
