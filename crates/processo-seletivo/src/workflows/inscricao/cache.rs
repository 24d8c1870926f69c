use std::collections::HashMap;
use std::sync::RwLock;

use super::domain::{Inscription, PositionId, ProcessId};

/// Cache key of a draft: one inscription per process and position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub process_id: ProcessId,
    pub position_id: PositionId,
}

impl DraftKey {
    pub fn new(process_id: ProcessId, position_id: PositionId) -> Self {
        Self {
            process_id,
            position_id,
        }
    }
}

/// Drafts already fetched from the backend, shared by the form sessions of
/// one user.
#[derive(Debug, Default)]
pub struct DraftCache {
    entries: RwLock<HashMap<DraftKey, Inscription>>,
}

impl DraftCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &DraftKey) -> Option<Inscription> {
        self.entries
            .read()
            .expect("draft cache poisoned")
            .get(key)
            .cloned()
    }

    pub fn store(&self, key: DraftKey, draft: Inscription) {
        self.entries
            .write()
            .expect("draft cache poisoned")
            .insert(key, draft);
    }

    pub fn invalidate(&self, key: &DraftKey) -> Option<Inscription> {
        self.entries
            .write()
            .expect("draft cache poisoned")
            .remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("draft cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
