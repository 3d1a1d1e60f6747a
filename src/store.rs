use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{Creation, CreationSummary};

/// Session-scoped catalog of completed creations.
///
/// Append-only: entries are inserted once fully formed and never mutated, so
/// readers cannot observe a partially-constructed record. Insertion order is
/// the authoritative order; newest-first is a display choice.
#[derive(Default)]
pub struct CreationStore {
    entries: RwLock<Vec<Creation>>,
}

impl CreationStore {
    pub fn append(&self, creation: Creation) {
        self.entries.write().push(creation);
    }

    /// Pure read; no effect on store order.
    pub fn select(&self, id: Uuid) -> Option<Creation> {
        self.entries.read().iter().find(|c| c.id == id).cloned()
    }

    pub fn newest_first(&self) -> Vec<CreationSummary> {
        let mut summaries: Vec<CreationSummary> =
            self.entries.read().iter().map(CreationSummary::from).collect();
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        summaries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
