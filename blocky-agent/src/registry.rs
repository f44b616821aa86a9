//! Registry of configured Blocky instances
//!
//! Maps an entry id (`host:port`) to its shared coordinator. Owned by `main`
//! and passed explicitly to whatever builds entities.

use blocky_coordinator::Coordinator;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct CoordinatorRegistry {
    entries: HashMap<String, Arc<Coordinator>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coordinator under its entry id, returning the one it replaced.
    pub fn insert(&mut self, coordinator: Arc<Coordinator>) -> Option<Arc<Coordinator>> {
        let entry_id = coordinator.config().entry_id();
        info!("Registered Blocky entry {}", entry_id);
        self.entries.insert(entry_id, coordinator)
    }

    pub fn get(&self, entry_id: &str) -> Option<Arc<Coordinator>> {
        self.entries.get(entry_id).cloned()
    }

    /// Unload an entry.
    pub fn remove(&mut self, entry_id: &str) -> Option<Arc<Coordinator>> {
        let removed = self.entries.remove(entry_id);
        if removed.is_some() {
            info!("Unloaded Blocky entry {}", entry_id);
        }
        removed
    }

    pub fn entry_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
