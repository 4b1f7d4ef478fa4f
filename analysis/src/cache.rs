//! Process-local result cache: bounded LRU with optional time-to-live.

use engine::{AnalysisRequest, AnalysisResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Exact-match identity of a request. The time limit is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fen: String,
    pub depth: u32,
    pub multi_pv: u32,
}

impl From<&AnalysisRequest> for CacheKey {
    fn from(request: &AnalysisRequest) -> Self {
        Self {
            fen: request.fen().to_string(),
            depth: request.depth(),
            multi_pv: request.multi_pv(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries; 0 disables caching.
    pub capacity: usize,
    /// Entries older than this are treated as absent. `None` keeps them until evicted.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Some(Duration::from_secs(60 * 60)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct CacheEntry {
    result: AnalysisResult,
    inserted_at: Instant,
    last_used: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    // last_used tick -> key, oldest first
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.last_used);
        }
    }
}

pub struct AnalysisCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl AnalysisCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Exact lookup on `(fen, depth, multi_pv)`. Expired entries are removed here.
    pub fn get(&self, request: &AnalysisRequest) -> Option<AnalysisResult> {
        self.get_at(request, Instant::now())
    }

    fn get_at(&self, request: &AnalysisRequest, now: Instant) -> Option<AnalysisResult> {
        let key = CacheKey::from(request);
        let mut inner = self.lock();

        let expired = match inner.entries.get(&key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => self
                .config
                .ttl
                .is_some_and(|ttl| now.saturating_duration_since(entry.inserted_at) >= ttl),
        };
        if expired {
            tracing::trace!(fen = %key.fen, depth = key.depth, "Cache entry expired");
            inner.remove(&key);
            inner.misses += 1;
            return None;
        }

        let tick = inner.next_tick();
        inner.hits += 1;
        let CacheInner {
            entries, recency, ..
        } = &mut *inner;
        let entry = entries.get_mut(&key)?;
        recency.remove(&entry.last_used);
        recency.insert(tick, key);
        entry.last_used = tick;
        Some(entry.result.clone())
    }

    /// Insert or overwrite, evicting least-recently-used entries past capacity.
    pub fn put(&self, request: &AnalysisRequest, result: AnalysisResult) {
        self.put_at(request, result, Instant::now());
    }

    fn put_at(&self, request: &AnalysisRequest, result: AnalysisResult, now: Instant) {
        if self.config.capacity == 0 {
            return;
        }
        let key = CacheKey::from(request);
        let mut inner = self.lock();

        inner.remove(&key);
        let tick = inner.next_tick();
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: now,
                last_used: tick,
            },
        );

        while inner.entries.len() > self.config.capacity {
            let Some((_, oldest)) = inner.recency.pop_first() else {
                break;
            };
            tracing::trace!(fen = %oldest.fen, depth = oldest.depth, "Evicting cache entry");
            inner.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // The map stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
