//! Durable swap records, written through to a JSON file on every change.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::token_swap::SwapStatus;
use super::token_swap::TokenSwap;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("swap store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("swap store {path} is corrupt: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no swap record with id {0}")]
    UnknownSwap(u64),
}

/// Outcome of a status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,

    /// the record had already left `Pending`; its current status is kept
    AlreadyTerminal(SwapStatus),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    swaps: Vec<TokenSwap>,
}

#[derive(Debug, Default)]
pub struct SwapStore {
    path: Option<PathBuf>,
    swaps: BTreeMap<u64, TokenSwap>,
    next_id: u64,
}

impl SwapStore {
    /// Store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice::<StoreFile>(&bytes).map_err(|source| {
                StoreError::Json {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoreFile::default(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let next_id = file
            .swaps
            .iter()
            .map(|s| s.id)
            .max()
            .unwrap_or(0)
            .max(file.next_id);
        debug!(path = %path.display(), records = file.swaps.len(), "opened swap store");
        Ok(Self {
            path: Some(path.to_path_buf()),
            swaps: file.swaps.into_iter().map(|s| (s.id, s)).collect(),
            next_id,
        })
    }

    /// Persist `record` under a fresh id and return that id.
    ///
    /// If the write fails the store is left as it was.
    pub fn insert(&mut self, mut record: TokenSwap) -> Result<u64, StoreError> {
        let id = self.next_id + 1;
        record.id = id;
        let summary = record.to_string();
        self.swaps.insert(id, record);
        self.next_id = id;
        if let Err(e) = self.persist() {
            self.swaps.remove(&id);
            self.next_id = id - 1;
            return Err(e);
        }
        info!(swap = %summary, "swap recorded");
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Option<&TokenSwap> {
        self.swaps.get(&id)
    }

    /// records with `status`, or all records, oldest first
    pub fn list(&self, status: Option<SwapStatus>) -> Vec<TokenSwap> {
        self.swaps
            .values()
            .filter(|s| status.map_or(true, |st| s.status == st))
            .cloned()
            .collect()
    }

    /// Move a pending record to `status`.
    ///
    /// A record that already left `Pending` is left untouched, so racing
    /// callers observe exactly one terminal status.
    pub fn transition(&mut self, id: u64, status: SwapStatus) -> Result<Transition, StoreError> {
        let record = self.swaps.get_mut(&id).ok_or(StoreError::UnknownSwap(id))?;
        if record.status.is_terminal() {
            return Ok(Transition::AlreadyTerminal(record.status));
        }
        if status.is_pending() {
            return Ok(Transition::Applied);
        }
        let from = std::mem::replace(&mut record.status, status);
        if let Err(e) = self.persist() {
            if let Some(record) = self.swaps.get_mut(&id) {
                record.status = from;
            }
            return Err(e);
        }
        info!(swap = id, %from, to = %status, "swap status changed");
        Ok(Transition::Applied)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let file = StoreFile {
            next_id: self.next_id,
            swaps: self.swaps.values().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }
}
