// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resumable progress ledger.
//!
//! Maps opaque item keys (one per downloadable unit, chosen by processors) to
//! completion flags. Every mutation is persisted synchronously through a temp
//! sibling plus atomic rename, so a crash right after marking an item can
//! never lose the fact that it succeeded, and a crash mid-write can never
//! truncate the ledger.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{error, info};

use crate::error::LedgerError;
use crate::fsio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStats {
    /// Items tracked, regardless of state
    pub total: usize,
    /// Items with a true completion flag
    pub completed: usize,
}

#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    entries: BTreeMap<String, bool>,
}

impl ProgressLedger {
    /// Load the ledger from `path`; a missing or unreadable file starts empty.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, bool>>(&raw) {
                Ok(entries) => {
                    info!("progress loaded ({} items)", entries.len());
                    entries
                }
                Err(e) => {
                    error!("corrupt progress file {}: {e}", path.display());
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    /// Absent keys default to not completed.
    pub fn is_completed(&self, key: &str) -> bool {
        self.entries.get(key).copied().unwrap_or(false)
    }

    /// Mark an item complete and persist immediately. Idempotent.
    pub fn mark_completed(&mut self, key: &str) -> Result<(), LedgerError> {
        self.entries.insert(key.to_string(), true);
        self.persist()
    }

    /// Drop every entry and persist the empty ledger.
    pub fn clear(&mut self) -> Result<(), LedgerError> {
        self.entries.clear();
        self.persist()?;
        info!("progress cleared");
        Ok(())
    }

    /// Counts for reporting only; never drives control flow.
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            total: self.entries.len(),
            completed: self.entries.values().filter(|v| **v).count(),
        }
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        fsio::write_atomic(&self.path, json.as_bytes()).map_err(|e| LedgerError::PersistFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Handle lent to processors for the duration of a run.
///
/// There is only one writer at a time in the single-driver model; the mutex
/// exists for the trait-object plumbing, not for contention.
#[derive(Clone)]
pub struct SharedLedger(Arc<Mutex<ProgressLedger>>);

impl SharedLedger {
    pub fn new(ledger: ProgressLedger) -> Self {
        Self(Arc::new(Mutex::new(ledger)))
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.lock().is_completed(key)
    }

    pub fn mark_completed(&self, key: &str) -> Result<(), LedgerError> {
        self.lock().mark_completed(key)
    }

    pub fn clear(&self) -> Result<(), LedgerError> {
        self.lock().clear()
    }

    pub fn stats(&self) -> LedgerStats {
        self.lock().stats()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressLedger> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_key_is_not_completed() {
        let dir = tempdir().unwrap();
        let ledger = ProgressLedger::load(&dir.path().join("progress.json"));
        assert!(!ledger.is_completed("course|file.pdf"));
    }

    #[test]
    fn mark_completed_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut ledger = ProgressLedger::load(&path);
        ledger.mark_completed("course|file.pdf").unwrap();

        let reloaded = ProgressLedger::load(&path);
        assert!(reloaded.is_completed("course|file.pdf"));
    }

    #[test]
    fn mark_completed_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut ledger = ProgressLedger::load(&path);
        ledger.mark_completed("k").unwrap();
        ledger.mark_completed("k").unwrap();

        assert_eq!(ledger.stats(), LedgerStats { total: 1, completed: 1 });
    }

    #[test]
    fn persist_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut ledger = ProgressLedger::load(&path);
        ledger.mark_completed("k").unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("progress.json.tmp").exists());
    }

    #[test]
    fn clear_empties_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut ledger = ProgressLedger::load(&path);
        ledger.mark_completed("a").unwrap();
        ledger.mark_completed("b").unwrap();
        ledger.clear().unwrap();

        let reloaded = ProgressLedger::load(&path);
        assert!(!reloaded.is_completed("a"));
        assert_eq!(reloaded.stats(), LedgerStats { total: 0, completed: 0 });
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "[1, 2, 3").unwrap();

        let ledger = ProgressLedger::load(&path);
        assert_eq!(ledger.stats(), LedgerStats { total: 0, completed: 0 });
    }

    #[test]
    fn shared_handle_mutates_the_same_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let shared = SharedLedger::new(ProgressLedger::load(&path));
        let other = shared.clone();

        other.mark_completed("k").unwrap();
        assert!(shared.is_completed("k"));
    }
}
