//! Concurrent result store with mutation-aware invalidation

use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{CacheConfig, CacheKey, CacheStats};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    size_bytes: usize,
}

impl CacheEntry {
    fn new(value: Value) -> Self {
        let size_bytes = estimate_json_size(&value);
        Self { value, size_bytes }
    }

    fn replace_matching(&mut self, key_attr: &str, key: &Value, item: &Value) -> usize {
        let replaced = match &mut self.value {
            Value::Array(items) => {
                let mut count = 0;
                for element in items.iter_mut() {
                    if element.get(key_attr) == Some(key) {
                        *element = item.clone();
                        count += 1;
                    }
                }
                count
            }
            single @ Value::Object(_) if single.get(key_attr) == Some(key) => {
                *single = item.clone();
                1
            }
            _ => 0,
        };

        if replaced > 0 {
            self.size_bytes = estimate_json_size(&self.value);
        }
        replaced
    }
}

/// Result cache shared by every repository of a process
///
/// Values are stored as JSON: a single object for `Get` results, an array for
/// `List` results.
#[derive(Debug)]
pub struct ResultCache {
    entries: DashMap<CacheKey, CacheEntry>,
    config: CacheConfig,
    stats: Mutex<CacheStats>,
    /// Running sum of `size_bytes` over every entry
    memory_bytes: AtomicUsize,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: Mutex::new(CacheStats::default()),
            memory_bytes: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached result. Single-element collections come back as the
    /// element itself.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let found = self.entries.get(key).map(|entry| entry.value.clone());

        let mut stats = self.stats.lock();
        match found {
            Some(Value::Array(mut items)) if items.len() == 1 => {
                stats.hits += 1;
                items.pop()
            }
            Some(value) => {
                stats.hits += 1;
                Some(value)
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a result under `key` unless the key is already cached.
    ///
    /// When the estimated footprint is over the configured ceiling the whole
    /// cache is dropped first. A single object is also written through to every
    /// cached collection of the same type holding an element with the same
    /// `key_attr` value. Returns whether a new entry was created.
    pub fn put(&self, key: CacheKey, value: Value, key_attr: Option<&str>) -> bool {
        if !*self.config.get_enabled() {
            return false;
        }

        if let Some(max_memory) = *self.config.get_max_memory() {
            let usage = self.memory_usage();
            if usage >= max_memory {
                warn!(usage, max_memory, "Result cache over memory ceiling, flushing");
                self.entries.clear();
                self.memory_bytes.store(0, Ordering::Relaxed);
                self.stats.lock().flushes += 1;
            }
        }

        let bucket = key.bucket();
        let inserted = match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let entry = CacheEntry::new(value.clone());
                self.memory_bytes.fetch_add(entry.size_bytes, Ordering::Relaxed);
                slot.insert(entry);
                true
            }
        };

        if let (Value::Object(_), Some(key_attr)) = (&value, key_attr) {
            self.refresh(bucket, key_attr, &value);
        }

        let mut stats = self.stats.lock();
        if inserted {
            stats.puts += 1;
        }
        stats.total_keys = self.entries.len() as u64;
        stats.memory_usage = self.memory_usage() as u64;

        inserted
    }

    /// Replace, in place, every cached element of type `bucket` whose
    /// `key_attr` equals the one carried by `item`. Returns the number of
    /// replaced elements.
    pub fn refresh(&self, bucket: TypeId, key_attr: &str, item: &Value) -> usize {
        let key = match item.get(key_attr) {
            Some(key) if !key.is_null() => key,
            _ => return 0,
        };

        let mut replaced = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.key().bucket() == bucket {
                let before = entry.size_bytes;
                replaced += entry.value_mut().replace_matching(key_attr, key, item);
                let after = entry.size_bytes;
                if after >= before {
                    self.memory_bytes.fetch_add(after - before, Ordering::Relaxed);
                } else {
                    self.release(before - after);
                }
            }
        }
        if replaced > 0 {
            self.stats.lock().memory_usage = self.memory_usage() as u64;
        }

        if replaced > 0 {
            debug!(key_attr, replaced, "Refreshed cached elements");
        }
        replaced
    }

    /// Remove the entry stored under `key`, or every entry of its type when
    /// `delete_all` is set. Returns the number of removed entries.
    pub fn del(&self, key: &CacheKey, delete_all: bool) -> usize {
        let (removed, freed) = if delete_all {
            let mut removed = 0;
            let mut freed = 0;
            self.entries.retain(|cached, entry| {
                if cached.bucket() == key.bucket() {
                    removed += 1;
                    freed += entry.size_bytes;
                    false
                } else {
                    true
                }
            });
            (removed, freed)
        } else {
            match self.entries.remove(key) {
                Some((_, entry)) => (1, entry.size_bytes),
                None => (0, 0),
            }
        };
        self.release(freed);

        let mut stats = self.stats.lock();
        stats.total_keys = self.entries.len() as u64;
        stats.memory_usage = self.memory_usage() as u64;

        removed
    }

    /// Drop every entry of one type
    pub fn purge(&self, bucket: TypeId) -> usize {
        self.del(&CacheKey::new(bucket, String::new()), true)
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.memory_bytes.store(0, Ordering::Relaxed);
        let mut stats = self.stats.lock();
        stats.total_keys = 0;
        stats.memory_usage = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimated footprint of every cached value in bytes
    pub fn memory_usage(&self) -> usize {
        self.memory_bytes.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    fn release(&self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        let _ = self
            .memory_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn estimate_json_size(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) => 4,
        Value::Number(_) => 8,
        Value::String(s) => s.len() + 24,
        Value::Array(items) => 24 + items.iter().map(estimate_json_size).sum::<usize>(),
        Value::Object(fields) => {
            48 + fields
                .iter()
                .map(|(k, v)| k.len() + estimate_json_size(v))
                .sum::<usize>()
        }
    }
}
