use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use toolgate_protocol::{CacheConfig, ExecutionContext};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    tool_name: String,
    result: Value,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

/// Memoized tool results keyed by (tool, input, context).
///
/// Eviction is insertion-order FIFO: once over `max_size` the oldest
/// *written* key goes first, no matter how recently it was read.
/// Rewriting an existing key keeps its original position.
#[derive(Debug)]
pub struct ExecutionCache {
    entries: Mutex<IndexMap<String, CacheEntry>>,
    counters: Mutex<Counters>,
    max_size: usize,
    ttl: Duration,
}

impl ExecutionCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.max_size, config.ttl())
    }

    pub fn with_limits(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            counters: Mutex::new(Counters::default()),
            max_size,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Deterministic key over tool name, input and context.
    pub fn key(tool_name: &str, input: &Value, context: Option<&ExecutionContext>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tool_name.as_bytes());
        hasher.update([0]);
        hasher.update(serde_json::to_vec(input).unwrap_or_default());
        hasher.update([0]);
        hasher.update(serde_json::to_vec(&context).unwrap_or_default());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        let mut entries = self.entries.lock();
        let mut counters = self.counters.lock();

        let Some(entry) = entries.get(key) else {
            counters.misses += 1;
            return None;
        };

        if now.saturating_duration_since(entry.inserted_at) >= self.ttl {
            debug!(tool = %entry.tool_name, "cache entry expired");
            entries.shift_remove(key);
            counters.expirations += 1;
            counters.misses += 1;
            return None;
        }

        counters.hits += 1;
        Some(entry.result.clone())
    }

    pub fn insert(&self, key: String, tool_name: &str, result: Value) {
        self.insert_at(key, tool_name, result, Instant::now());
    }

    pub fn insert_at(&self, key: String, tool_name: &str, result: Value, now: Instant) {
        if self.max_size == 0 {
            return;
        }

        let mut entries = self.entries.lock();
        let entry = CacheEntry {
            tool_name: tool_name.to_owned(),
            result,
            inserted_at: now,
        };
        // IndexMap::insert on an existing key keeps its slot.
        entries.insert(key, entry);

        let mut evicted = 0_u64;
        while entries.len() > self.max_size {
            if let Some((_, oldest)) = entries.shift_remove_index(0) {
                debug!(tool = %oldest.tool_name, "cache entry evicted");
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.counters.lock().evictions += evicted;
        }
    }

    /// Drop every entry produced by `tool_name`. Returns how many were removed.
    pub fn invalidate_tool(&self, tool_name: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.tool_name != tool_name);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Keys in eviction order, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().len();
        let counters = self.counters.lock();
        CacheStats {
            entries,
            max_size: self.max_size,
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expirations: counters.expirations,
        }
    }
}
