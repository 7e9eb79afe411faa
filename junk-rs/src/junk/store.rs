//! Word store
//!
//! Maps every trained token to its ham and spam counts, together with the
//! number of ham and spam messages trained. Lives in memory; persisted as a
//! checked snapshot with words sorted by token, so the same state always
//! produces the same bytes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::persist::{payload_digest, read_snapshot, write_snapshot, SnapshotDigest};
use super::types::WordCounts;
use crate::error::{JunkError, Result};

const STORE_MAGIC: &[u8; 8] = b"JUNKWDB\0";
const STORE_VERSION: u32 = 1;

/// In-memory word statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordStore {
    words: HashMap<String, WordCounts>,
    hams: u32,
    spams: u32,
    ngram_sizes: Vec<usize>,
}

/// On-disk form of the store
#[derive(Serialize, Deserialize)]
struct Snapshot {
    hams: u32,
    spams: u32,
    ngram_sizes: Vec<usize>,
    words: Vec<(String, WordCounts)>,
}

impl WordStore {
    /// Create an empty store for features of the given n-gram sizes
    pub fn new(ngram_sizes: Vec<usize>) -> Self {
        Self {
            ngram_sizes,
            ..Default::default()
        }
    }

    /// Add one occurrence of `token` to its ham or spam count
    pub fn increment(&mut self, token: &str, is_ham: bool) {
        if let Some(counts) = self.words.get_mut(token) {
            counts.add(is_ham);
        } else {
            let mut counts = WordCounts::default();
            counts.add(is_ham);
            self.words.insert(token.to_string(), counts);
        }
    }

    /// Remove one occurrence of `token` from its ham or spam count, dropping
    /// the record once both counts reach zero. Returns whether a count was
    /// decremented.
    pub fn remove(&mut self, token: &str, is_ham: bool) -> bool {
        let Some(counts) = self.words.get_mut(token) else {
            return false;
        };
        let before = counts.total();
        counts.sub(is_ham);
        let removed = counts.total() < before;
        if counts.is_empty() {
            self.words.remove(token);
        }
        removed
    }

    /// Counts for `token`, zero for unknown tokens
    pub fn lookup(&self, token: &str) -> WordCounts {
        self.words.get(token).copied().unwrap_or_default()
    }

    /// Count one more trained message
    pub fn add_message(&mut self, is_ham: bool) {
        if is_ham {
            self.hams = self.hams.saturating_add(1);
        } else {
            self.spams = self.spams.saturating_add(1);
        }
    }

    /// Count one trained message less
    pub fn remove_message(&mut self, is_ham: bool) -> Result<()> {
        let total = if is_ham { &mut self.hams } else { &mut self.spams };
        if *total == 0 {
            return Err(JunkError::Untrain(format!(
                "no {} messages trained",
                if is_ham { "ham" } else { "spam" }
            )));
        }
        *total -= 1;
        Ok(())
    }

    /// Number of ham messages trained
    pub fn hams(&self) -> u32 {
        self.hams
    }

    /// Number of spam messages trained
    pub fn spams(&self) -> u32 {
        self.spams
    }

    /// N-gram sizes the store was trained with
    pub fn ngram_sizes(&self) -> &[usize] {
        &self.ngram_sizes
    }

    /// Number of distinct tokens
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// All tokens with their counts, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, WordCounts)> {
        self.words.iter().map(|(w, c)| (w.as_str(), *c))
    }

    /// Read a store from `path`
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_digest(path).map(|(store, _)| store)
    }

    /// Read a store from `path`, together with the digest of its contents.
    /// The digest is the same one [`WordStore::save`] returned when writing it.
    pub fn load_with_digest(path: &Path) -> Result<(Self, SnapshotDigest)> {
        let payload = read_snapshot(path, STORE_MAGIC, STORE_VERSION)?;
        let digest = payload_digest(&payload);
        let snapshot: Snapshot = bincode::deserialize(&payload).map_err(|e| JunkError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut words = HashMap::with_capacity(snapshot.words.len());
        for (word, counts) in snapshot.words {
            if counts.is_empty() || words.insert(word, counts).is_some() {
                return Err(JunkError::Corrupt {
                    path: path.to_path_buf(),
                    reason: "empty or duplicate word record".to_string(),
                });
            }
        }

        let store = Self {
            words,
            hams: snapshot.hams,
            spams: snapshot.spams,
            ngram_sizes: snapshot.ngram_sizes,
        };
        Ok((store, digest))
    }

    /// Write the store to `path` atomically. Returns the digest of the written
    /// contents; equal stores always produce equal digests.
    pub fn save(&self, path: &Path) -> Result<SnapshotDigest> {
        let mut words: Vec<(String, WordCounts)> =
            self.words.iter().map(|(w, c)| (w.clone(), *c)).collect();
        words.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let snapshot = Snapshot {
            hams: self.hams,
            spams: self.spams,
            ngram_sizes: self.ngram_sizes.clone(),
            words,
        };
        let payload = bincode::serialize(&snapshot)?;
        write_snapshot(path, STORE_MAGIC, STORE_VERSION, &payload)
    }
}
