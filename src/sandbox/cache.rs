//! Compiled-component cache, keyed by unit identity.
//!
//! At most one entry per identity; a recompile replaces. There is no
//! automatic eviction — the identity space is bounded by the number of
//! user-authored units, and `clear()` is only ever invoked by the host.

use std::collections::HashMap;

use uuid::Uuid;

use super::executor::CompiledComponent;

#[derive(Default)]
pub struct ComponentCache {
    entries: HashMap<Uuid, CompiledComponent>,
}

impl ComponentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: Uuid) -> Option<CompiledComponent> {
        self.entries.get(&identity).cloned()
    }

    /// Inserts, replacing any previous component for this identity.
    pub fn put(&mut self, identity: Uuid, component: CompiledComponent) {
        self.entries.insert(identity, component);
    }

    pub fn evict(&mut self, identity: Uuid) -> Option<CompiledComponent> {
        self.entries.remove(&identity)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, identity: Uuid) -> bool {
        self.entries.contains_key(&identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
