//! Cache Node
//!
//! A cache wraps a source node and stores the source's results by the
//! source's key, not by node identity.
//!
//! # How Caches Work
//!
//! 1. When the graph is built, the cache computes the source's current key.
//!
//! 2. If the key is already stored, the cache reports no dependencies. The
//!    graph builder never walks into the source, so nothing upstream runs.
//!
//! 3. Otherwise the cache reports the source as its only dependency. The
//!    evaluator computes the source subgraph and hands the result to the
//!    cache, which stores it under the key.
//!
//! Changing a `Variable` upstream changes the source's key, so the next pass
//! recomputes once for that new state. Returning to an earlier state is a hit.
//!
//! # Keys
//!
//! By default the cache key is the source's structural key. A custom key
//! function can cache on a coarser signal, e.g. only the frame number of a
//! reader and not the rest of its settings.
//!
//! Keying the source walks its whole upstream subgraph. The key found while
//! the graph is built is kept for the compute step of the same pass, so each
//! pass keys the source once. Inputs must not change between the two.
//!
//! # Storage
//!
//! Entries are kept for the node's lifetime unless the cache is built with
//! [`CachePolicy::Lru`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::{Args, Dependencies, KeyMemo, Operator};
use crate::config::CachePolicy;
use crate::error::{ComputeError, FlowError};
use crate::graph::{Input, Inputs, Node};
use crate::value::{Key, Value};

/// Custom cache key derived from the source node.
pub type KeyFn = Arc<dyn Fn(&Node) -> Key + Send + Sync>;

enum Store {
    Unbounded(HashMap<Key, Value>),
    Lru(LruCache<Key, Value>),
}

impl Store {
    fn new(policy: CachePolicy) -> Self {
        match policy {
            CachePolicy::Unbounded => Store::Unbounded(HashMap::new()),
            CachePolicy::Lru { capacity } => Store::Lru(LruCache::new(capacity)),
        }
    }

    fn contains(&self, key: &Key) -> bool {
        match self {
            Store::Unbounded(map) => map.contains_key(key),
            Store::Lru(lru) => lru.contains(key),
        }
    }

    fn get(&mut self, key: &Key) -> Option<Value> {
        match self {
            Store::Unbounded(map) => map.get(key).cloned(),
            Store::Lru(lru) => lru.get(key).cloned(),
        }
    }

    /// Insert, returning true if another entry was evicted to make room.
    fn put(&mut self, key: Key, value: Value) -> bool {
        match self {
            Store::Unbounded(map) => {
                map.insert(key, value);
                false
            }
            Store::Lru(lru) => matches!(lru.push(key, value), Some((old, _)) if !lru.contains(&old)),
        }
    }

    fn len(&self) -> usize {
        match self {
            Store::Unbounded(map) => map.len(),
            Store::Lru(lru) => lru.len(),
        }
    }

    fn keys(&self) -> Vec<Key> {
        match self {
            Store::Unbounded(map) => map.keys().cloned().collect(),
            Store::Lru(lru) => lru.iter().map(|(key, _)| key.clone()).collect(),
        }
    }

    fn clear(&mut self) {
        match self {
            Store::Unbounded(map) => map.clear(),
            Store::Lru(lru) => lru.clear(),
        }
    }
}

struct CacheState {
    store: Mutex<Store>,
    key_fn: Option<KeyFn>,
    // Key found by the last dependency query, consumed by the next compute.
    pending: Mutex<Option<Key>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheState {
    fn source_key(&self, source: &Node, keys: &mut KeyMemo) -> Key {
        match &self.key_fn {
            Some(key_fn) => key_fn(source),
            None => keys.of(source),
        }
    }
}

struct CacheOp {
    state: Arc<CacheState>,
}

fn source_of(inputs: &Inputs) -> Option<&Node> {
    inputs.positional().first()
}

impl Operator for CacheOp {
    fn class_name(&self) -> &str {
        "Cache"
    }

    fn dependencies(&self, inputs: &Inputs) -> Dependencies {
        let mut deps = Dependencies::new();
        if let Some(source) = source_of(inputs) {
            let key = self.state.source_key(source, &mut KeyMemo::new());
            if !self.state.store.lock().contains(&key) {
                deps.push(source.clone());
            }
            *self.state.pending.lock() = Some(key);
        }
        deps
    }

    fn compute(&self, inputs: &Inputs, args: Args) -> Result<Value, ComputeError> {
        let source = source_of(inputs).ok_or_else(|| FlowError::Invariant("cache has no source".into()))?;
        let pending = self.state.pending.lock().take();
        let key = match pending {
            Some(key) => key,
            None => self.state.source_key(source, &mut KeyMemo::new()),
        };
        let mut store = self.state.store.lock();

        match args.into_iter().next() {
            Some(value) => {
                self.state.misses.fetch_add(1, Ordering::Relaxed);
                if store.put(key, value.clone()) {
                    self.state.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!(source = %source, "cache evicted least recently used entry");
                }
                debug!(source = %source, entries = store.len(), "cache miss");
                Ok(value)
            }
            None => {
                let value = store.get(&key).ok_or_else(|| FlowError::MissingCacheEntry {
                    source_node: source.name().to_owned(),
                })?;
                self.state.hits.fetch_add(1, Ordering::Relaxed);
                debug!(source = %source, "cache hit");
                Ok(value)
            }
        }
    }

    fn key(&self, _node: &Node, inputs: &Inputs, keys: &mut KeyMemo) -> Key {
        match source_of(inputs) {
            Some(source) => self.state.source_key(source, keys),
            None => keys.structural(self.class_name(), inputs),
        }
    }
}

/// Counters describing how a cache has been used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Passes served from storage.
    pub hits: u64,
    /// Passes that evaluated the source.
    pub misses: u64,
    /// Entries dropped by the LRU policy.
    pub evictions: u64,
    /// Entries currently stored.
    pub entries: usize,
}

/// Handle to a cache node and its storage.
#[derive(Clone)]
pub struct Cache {
    node: Node,
    state: Arc<CacheState>,
}

impl Cache {
    /// Unbounded cache keyed by the source's structural key.
    pub fn new(source: &Node) -> Self {
        Self::builder(source).build()
    }

    pub fn builder(source: &Node) -> CacheBuilder {
        CacheBuilder {
            source: source.clone(),
            policy: CachePolicy::default(),
            key_fn: None,
            name: None,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The wrapped node, if the cache has not been rewired to nothing.
    pub fn source(&self) -> Option<Node> {
        source_of(&self.node.inputs()).cloned()
    }

    /// Whether the next pass would be served from storage.
    pub fn is_current(&self) -> bool {
        match self.source() {
            Some(source) => {
                let key = self.state.source_key(&source, &mut KeyMemo::new());
                self.state.store.lock().contains(&key)
            }
            None => false,
        }
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.state.store.lock().contains(key)
    }

    pub fn cached_keys(&self) -> Vec<Key> {
        self.state.store.lock().keys()
    }

    pub fn len(&self) -> usize {
        self.state.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.state.hits.load(Ordering::Relaxed),
            misses: self.state.misses.load(Ordering::Relaxed),
            evictions: self.state.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Drop every stored entry. Counters are kept.
    pub fn clear(&self) {
        self.state.store.lock().clear();
    }
}

impl AsRef<Node> for Cache {
    fn as_ref(&self) -> &Node {
        &self.node
    }
}

impl From<&Cache> for Input {
    fn from(cache: &Cache) -> Self {
        Input::Node(cache.node.clone())
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("node", &self.node)
            .field("stats", &self.stats())
            .finish()
    }
}

pub struct CacheBuilder {
    source: Node,
    policy: CachePolicy,
    key_fn: Option<KeyFn>,
    name: Option<String>,
}

impl CacheBuilder {
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cache on `key_fn(source)` instead of the source's structural key.
    pub fn key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Node) -> Key + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> Cache {
        let state = Arc::new(CacheState {
            store: Mutex::new(Store::new(self.policy)),
            key_fn: self.key_fn,
            pending: Mutex::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        });
        let operator = CacheOp {
            state: Arc::clone(&state),
        };
        let inputs = Inputs::from_positional([self.source]);
        let node = match self.name.as_deref() {
            Some(name) => Node::with_name(operator, inputs, name),
            None => Node::new(operator, inputs),
        };
        Cache { node, state }
    }
}
