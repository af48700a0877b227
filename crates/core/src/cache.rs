//! Memoization of extraction results by input fingerprint.
//!
//! The cache is owned by whoever handles requests (a CLI run, a WASM
//! session) and passed where it is needed. Nothing here is global.
//!
//! By default only the latest upload is kept: a new fingerprint evicts the
//! previous entry once its extraction succeeds.

use crate::{Extraction, Result};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// Number of uploads an [`ExtractionCache`] keeps unless configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 1;

/// SHA-256 of the input bytes and the sheet name, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an upload read from `sheet_name`.
    pub fn of(bytes: &[u8], sheet_name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.update([0u8]);
        hasher.update(sheet_name.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parsed extractions keyed by input fingerprint.
#[derive(Debug)]
pub struct ExtractionCache {
    entries: HashMap<Fingerprint, Extraction>,
    /// Insertion order, oldest first.
    order: VecDeque<Fingerprint>,
    capacity: usize,
    hits: usize,
    misses: usize,
}

impl Default for ExtractionCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ExtractionCache {
    /// A cache holding only the latest upload.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding up to `capacity` uploads (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached extraction for `key`, running `extract` on a miss.
    ///
    /// A failed extraction is not cached and evicts nothing. A successful
    /// one evicts the oldest entries beyond the capacity.
    pub fn get_or_try_insert_with<F>(&mut self, key: Fingerprint, extract: F) -> Result<&Extraction>
    where
        F: FnOnce() -> Result<Extraction>,
    {
        if self.entries.contains_key(&key) {
            self.hits += 1;
            log::debug!("Extraction cache hit for {}", key.as_str());
        } else {
            self.misses += 1;
            log::debug!("Extraction cache miss for {}", key.as_str());
            let extraction = extract()?;
            self.make_room();
            self.order.push_back(key.clone());
            self.entries.insert(key.clone(), extraction);
        }

        Ok(&self.entries[&key])
    }

    fn make_room(&mut self) {
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                log::debug!("Evicting extraction {}", oldest.as_str());
            }
        }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<&Extraction> {
        self.entries.get(key)
    }

    /// Drop one entry, returning it if present.
    pub fn invalidate(&mut self, key: &Fingerprint) -> Option<Extraction> {
        self.order.retain(|k| k != key);
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}
