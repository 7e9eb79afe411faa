//! Rarity filter
//!
//! A counting Bloom filter answering "has this token been trained at least n
//! times?" without touching the word store. Answers may be too optimistic
//! (a rare token reported as common, costing one store lookup) but never too
//! pessimistic: every slot holds at least the number of times any token
//! mapped to it was recorded, up to saturation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use super::persist::{read_snapshot, write_snapshot, SnapshotDigest};
use crate::error::{JunkError, Result};

const BLOOM_MAGIC: &[u8; 8] = b"JUNKBLM\0";
const BLOOM_VERSION: u32 = 1;

/// Default number of counters, 4 MiB.
pub const DEFAULT_BLOOM_SLOTS: usize = 1 << 22;

/// Slots touched per token.
const HASHES: u32 = 4;

const SEED_A: u64 = 0x51_7c_c1_b7_27_22_0a_95;
const SEED_B: u64 = 0x9e_37_79_b9_7f_4a_7c_15;

/// Approximate "seen at least n times" oracle
pub trait RarityOracle {
    /// Record one more training occurrence of `token`
    fn record(&mut self, token: &str);

    /// Remove one training occurrence of a previously recorded `token`
    fn forget(&mut self, token: &str);

    /// Whether `token` may have been recorded at least `n` times. Must never
    /// return false for a token that was.
    fn at_least(&self, token: &str, n: u32) -> bool;
}

/// Oracle used when no rarity filter is loaded: everything may be common,
/// so every check falls through to the word store.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCommon;

impl RarityOracle for AlwaysCommon {
    fn record(&mut self, _token: &str) {}

    fn forget(&mut self, _token: &str) {}

    fn at_least(&self, _token: &str, _n: u32) -> bool {
        true
    }
}

/// Counting Bloom filter with saturating 8-bit counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountingBloom {
    counters: Vec<u8>,
}

impl CountingBloom {
    /// Create an empty filter with `slots` counters
    pub fn new(slots: usize) -> Self {
        Self {
            counters: vec![0; slots.max(1)],
        }
    }

    /// Number of counters
    pub fn slots(&self) -> usize {
        self.counters.len()
    }

    /// Record `token` `count` times at once, e.g. when rebuilding from stored
    /// counts.
    pub fn record_n(&mut self, token: &str, count: u64) {
        let add = count.min(u8::MAX as u64) as u8;
        for idx in self.indexes(token) {
            self.counters[idx] = self.counters[idx].saturating_add(add);
        }
    }

    /// Read a filter from `path`, together with the stamp it was saved with
    pub fn load(path: &Path) -> Result<(Self, SnapshotDigest)> {
        let payload = read_snapshot(path, BLOOM_MAGIC, BLOOM_VERSION)?;
        let (stamp, bloom): (SnapshotDigest, CountingBloom) =
            bincode::deserialize(&payload).map_err(|e| JunkError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if bloom.counters.is_empty() {
            return Err(JunkError::Corrupt {
                path: path.to_path_buf(),
                reason: "bloom filter without counters".to_string(),
            });
        }
        Ok((bloom, stamp))
    }

    /// Write the filter to `path` atomically. The `stamp` is the digest of the
    /// word store contents the filter matches, so a stale filter can be
    /// detected.
    pub fn save(&self, path: &Path, stamp: &SnapshotDigest) -> Result<()> {
        let payload = bincode::serialize(&(stamp, self))?;
        write_snapshot(path, BLOOM_MAGIC, BLOOM_VERSION, &payload)?;
        Ok(())
    }

    fn indexes(&self, token: &str) -> impl Iterator<Item = usize> {
        // Kirsch-Mitzenmacher double hashing
        let h1 = xxh3_64_with_seed(token.as_bytes(), SEED_A);
        let h2 = xxh3_64_with_seed(token.as_bytes(), SEED_B) | 1;
        let slots = self.counters.len() as u64;
        (0..HASHES as u64).map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % slots) as usize)
    }
}

impl RarityOracle for CountingBloom {
    fn record(&mut self, token: &str) {
        self.record_n(token, 1);
    }

    fn forget(&mut self, token: &str) {
        for idx in self.indexes(token) {
            let counter = &mut self.counters[idx];
            // A saturated counter no longer knows its true value.
            if *counter != u8::MAX && *counter > 0 {
                *counter -= 1;
            }
        }
    }

    fn at_least(&self, token: &str, n: u32) -> bool {
        if n > u8::MAX as u32 {
            return true;
        }
        self.indexes(token)
            .map(|idx| self.counters[idx])
            .min()
            .map_or(true, |c| c as u32 >= n)
    }
}
