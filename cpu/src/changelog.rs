//! Accumulates the identities of things which changed (for example
//! which alarms fired or were masked) so that a front-end can fetch
//! them all at once instead of polling everything.
use std::collections::BTreeSet;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct ChangeIndex<K: Ord + Serialize> {
    changes: BTreeSet<K>,
}

// Deriving Default would needlessly require K: Default.
impl<K: Ord + Serialize> Default for ChangeIndex<K> {
    fn default() -> Self {
        Self {
            changes: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Serialize> ChangeIndex<K> {
    pub(crate) fn add(&mut self, k: K) {
        self.changes.insert(k);
    }

    /// Return everything recorded since the previous call, leaving
    /// the index empty.
    pub(crate) fn drain(&mut self) -> BTreeSet<K> {
        std::mem::take(&mut self.changes)
    }
}

#[test]
fn test_drain_empties_index() {
    let mut index: ChangeIndex<u8> = ChangeIndex::default();
    index.add(3);
    index.add(1);
    index.add(3);
    assert_eq!(index.drain().into_iter().collect::<Vec<_>>(), vec![1, 3]);
    assert!(index.drain().is_empty());
}
