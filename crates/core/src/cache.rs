//! Two-tier cache for resolved focus specs.
//!
//! The durable tier maps a template content hash to its [`FocusSpec`] and is
//! the only tier that holds values. The fast tier maps `(model, preset)` to the
//! content hash that pair last resolved to. A fast hint is honoured only when
//! it names the current template hash and the durable tier still holds that
//! hash; otherwise it is dropped and lookup falls through to the durable tier.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::focus::FocusSpec;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FastKey {
    pub model: String,
    pub preset: String,
}

impl FastKey {
    pub fn new(model: impl Into<String>, preset: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            preset: preset.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: FocusSpec,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachePolicy {
    #[default]
    Unbounded,
    Lru { capacity: NonZeroUsize },
}

impl CachePolicy {
    /// `None` or zero means unbounded.
    pub fn from_capacity(capacity: Option<usize>) -> Self {
        match capacity.and_then(NonZeroUsize::new) {
            Some(capacity) => CachePolicy::Lru { capacity },
            None => CachePolicy::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Fast,
    Durable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub fast_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    pub inserts: u64,
    /// Inserts that found the hash already stored and kept the earlier spec.
    pub duplicate_inserts: u64,
    pub evictions: u64,
    pub stale_hints: u64,
    pub len: usize,
}

enum DurableStore {
    Unbounded(HashMap<String, CacheEntry>),
    Lru(LruCache<String, CacheEntry>),
}

impl DurableStore {
    fn new(policy: CachePolicy) -> Self {
        match policy {
            CachePolicy::Unbounded => DurableStore::Unbounded(HashMap::new()),
            CachePolicy::Lru { capacity } => DurableStore::Lru(LruCache::new(capacity)),
        }
    }

    fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        match self {
            DurableStore::Unbounded(map) => map.get(key),
            DurableStore::Lru(lru) => lru.get(key),
        }
    }

    /// Returns true when another entry was evicted to make room.
    fn insert(&mut self, entry: CacheEntry) -> bool {
        match self {
            DurableStore::Unbounded(map) => {
                map.insert(entry.key.clone(), entry);
                false
            }
            DurableStore::Lru(lru) => {
                let key = entry.key.clone();
                matches!(lru.push(key.clone(), entry), Some((old, _)) if old != key)
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            DurableStore::Unbounded(map) => map.len(),
            DurableStore::Lru(lru) => lru.len(),
        }
    }

    fn snapshot(&self) -> BTreeMap<String, CacheEntry> {
        match self {
            DurableStore::Unbounded(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            DurableStore::Lru(lru) => lru
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

pub struct FocusCache {
    policy: CachePolicy,
    durable: Mutex<DurableStore>,
    fast: Mutex<HashMap<FastKey, String>>,
    stats: Mutex<CacheStats>,
    path: Option<PathBuf>,
    dirty: AtomicBool,
}

impl Default for FocusCache {
    fn default() -> Self {
        Self::new(CachePolicy::Unbounded)
    }
}

impl FocusCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            durable: Mutex::new(DurableStore::new(policy)),
            fast: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
            path: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Opens a cache backed by a JSON file of durable entries. A missing file starts empty.
    pub fn load(path: &Path, policy: CachePolicy) -> Result<Self> {
        let mut cache = Self::new(policy);
        cache.path = Some(path.to_path_buf());
        if path.exists() {
            let data = fs::read_to_string(path)?;
            let entries: HashMap<String, CacheEntry> = serde_json::from_str(&data)?;
            let mut ordered: Vec<CacheEntry> = entries.into_values().collect();
            ordered.sort_by_key(|entry| entry.inserted_at);
            let mut durable = cache.durable.lock();
            for entry in ordered {
                durable.insert(entry);
            }
            debug!(path = %path.display(), entries = durable.len(), "loaded focus cache");
        }
        Ok(cache)
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Looks up the focus for a template, consulting the fast hint first.
    pub fn lookup(&self, fast_key: &FastKey, content_hash: &str) -> Option<(FocusSpec, CacheTier)> {
        let hinted = self.fast.lock().get(fast_key).cloned();
        match hinted {
            Some(hash) if hash == content_hash => {
                let found = self
                    .durable
                    .lock()
                    .get(content_hash)
                    .map(|entry| entry.value.clone());
                if let Some(spec) = found {
                    self.stats.lock().fast_hits += 1;
                    return Some((spec, CacheTier::Fast));
                }
                self.drop_hint(fast_key);
            }
            Some(hash) => {
                debug!(
                    model = %fast_key.model,
                    preset = %fast_key.preset,
                    previous = %hash,
                    current = %content_hash,
                    "template content changed since last resolution"
                );
                self.drop_hint(fast_key);
            }
            None => {}
        }
        let found = self
            .durable
            .lock()
            .get(content_hash)
            .map(|entry| entry.value.clone());
        match found {
            Some(spec) => {
                self.fast
                    .lock()
                    .insert(fast_key.clone(), content_hash.to_string());
                self.stats.lock().durable_hits += 1;
                Some((spec, CacheTier::Durable))
            }
            None => {
                self.stats.lock().misses += 1;
                None
            }
        }
    }

    /// Durable-tier lookup by content hash alone.
    pub fn get(&self, content_hash: &str) -> Option<FocusSpec> {
        self.durable
            .lock()
            .get(content_hash)
            .map(|entry| entry.value.clone())
    }

    /// Stores a spec under its content hash and records the fast hint.
    ///
    /// The first spec stored for a hash wins: when the hash is already present
    /// the stored spec is kept and returned instead of `spec`.
    pub fn insert(&self, fast_key: FastKey, spec: FocusSpec) -> FocusSpec {
        let key = spec.source_hash.clone();
        let (stored, evicted) = {
            let mut durable = self.durable.lock();
            if let Some(existing) = durable.get(&key).map(|entry| entry.value.clone()) {
                (existing, None)
            } else {
                let evicted = durable.insert(CacheEntry {
                    key: key.clone(),
                    value: spec.clone(),
                    inserted_at: Utc::now(),
                });
                (spec, Some(evicted))
            }
        };
        self.fast.lock().insert(fast_key, key);
        let mut stats = self.stats.lock();
        match evicted {
            Some(evicted) => {
                stats.inserts += 1;
                if evicted {
                    stats.evictions += 1;
                }
                if self.path.is_some() {
                    self.dirty.store(true, Ordering::Relaxed);
                }
            }
            None => stats.duplicate_inserts += 1,
        }
        stored
    }

    pub fn len(&self) -> usize {
        self.durable.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = *self.stats.lock();
        stats.len = self.len();
        stats
    }

    /// Writes durable entries back to the backing file, if any changed.
    pub fn flush(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let snapshot = self.durable.lock().snapshot();
            let mut file = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut file, &snapshot)?;
            file.flush()?;
            debug!(path = %path.display(), entries = snapshot.len(), "flushed focus cache");
        }
        Ok(())
    }

    fn drop_hint(&self, fast_key: &FastKey) {
        self.fast.lock().remove(fast_key);
        self.stats.lock().stale_hints += 1;
    }
}
