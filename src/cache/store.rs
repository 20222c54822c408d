use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::selector::Item;

/// Immutable set of items published by one reload.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    items: Vec<Item>,
    generation: u64,
    published_at: DateTime<Utc>,
}

impl Snapshot {
    fn new(items: Vec<Item>, generation: u64) -> Self {
        Self {
            items,
            generation,
            published_at: Utc::now(),
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 0 for the initial empty snapshot, then +1 per publish.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Holder of the current snapshot.
///
/// Readers get the current `Arc<Snapshot>` with a single atomic load and never
/// wait on the writer. `replace` builds the new snapshot completely before the
/// pointer swap, so a reader sees either the old set or the new one.
/// Clones share the same underlying slot.
#[derive(Clone)]
pub struct SnapshotStore {
    current: Arc<ArcSwap<Snapshot>>,
    generation: Arc<AtomicU64>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Snapshot::new(Vec::new(), 0))),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn read(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Publish `items` as the new current snapshot. Items are stored as given.
    pub fn replace(&self, items: Vec<Item>) -> Arc<Snapshot> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(Snapshot::new(items, generation));
        self.current.store(snapshot.clone());
        snapshot
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("SnapshotStore")
            .field("generation", &snapshot.generation)
            .field("items", &snapshot.len())
            .finish()
    }
}
