//! # Feature Flag Store
//!
//! In-memory read-mostly implementation of [`FeatureFlagStore`], backed by
//! `dashmap`. Reads are lock-free against the map's sharded snapshot; writes
//! serialize per shard.

use dashmap::DashMap;

use crate::external::FeatureFlagStore;

pub struct InMemoryFeatureFlagStore {
    flags: DashMap<String, bool>,
}

impl InMemoryFeatureFlagStore {
    pub fn new() -> Self {
        Self { flags: DashMap::new() }
    }

    pub fn with_defaults(defaults: impl IntoIterator<Item = (String, bool)>) -> Self {
        let flags = DashMap::new();
        for (name, value) in defaults {
            flags.insert(name, value);
        }
        Self { flags }
    }
}

impl Default for InMemoryFeatureFlagStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureFlagStore for InMemoryFeatureFlagStore {
    fn get(&self, name: &str) -> bool {
        self.flags.get(name).map(|v| *v).unwrap_or(true)
    }

    fn set(&self, name: &str, value: bool) {
        self.flags.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_flag_defaults_to_enabled() {
        let store = InMemoryFeatureFlagStore::new();
        assert!(store.get("unknown_flag"));
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = InMemoryFeatureFlagStore::new();
        store.set("direct_path", false);
        assert!(!store.get("direct_path"));
    }

    #[test]
    fn defaults_are_applied_at_construction() {
        let store = InMemoryFeatureFlagStore::with_defaults([("mediated_path".to_string(), false)]);
        assert!(!store.get("mediated_path"));
        assert!(store.get("direct_path"));
    }
}
