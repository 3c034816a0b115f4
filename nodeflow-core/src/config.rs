//! Configuration
//!
//! Both types deserialize from JSON so a host application can keep them in
//! its own settings file.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Options for a single evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Log every node's arguments and result at debug level.
    pub log_values: bool,

    /// Check the computed order against every dependency edge before running
    /// any node.
    pub verify_order: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            log_values: false,
            verify_order: cfg!(debug_assertions),
        }
    }
}

impl EvalConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// How a cache node bounds its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachePolicy {
    /// Keep every entry for the lifetime of the node.
    #[default]
    Unbounded,

    /// Keep at most `capacity` entries, evicting the least recently used.
    Lru { capacity: NonZeroUsize },
}

impl CachePolicy {
    pub fn lru(capacity: NonZeroUsize) -> Self {
        CachePolicy::Lru { capacity }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
