//! An earliest-first priority queue whose entries are identified by
//! a key.  Each key appears at most once; pushing an existing key
//! replaces its priority.  This is what the simulator uses to keep
//! track of the next time at which each event source needs attention.
use std::cmp::Reverse;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;

use keyed_priority_queue::KeyedPriorityQueue;

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownKeyError {}

pub struct EarliestFirstQueue<K: Hash + Eq, P: Ord> {
    items: KeyedPriorityQueue<K, Reverse<P>>,
}

impl<K, P> EarliestFirstQueue<K, P>
where
    K: Hash + Eq,
    P: Ord,
{
    pub fn new() -> EarliestFirstQueue<K, P> {
        EarliestFirstQueue {
            items: KeyedPriorityQueue::new(),
        }
    }

    /// Returns the entry with the lowest priority value without
    /// removing it.
    pub fn peek(&self) -> Option<(&K, &P)> {
        self.items.peek().map(|(k, p)| (k, &p.0))
    }

    pub fn pop(&mut self) -> Option<(K, P)> {
        self.items.pop().map(|(k, p)| (k, p.0))
    }

    /// Insert `key` with the given priority.  If the key was already
    /// present, its previous priority is returned.
    pub fn push(&mut self, key: K, priority: P) -> Option<P> {
        self.items.push(key, Reverse(priority)).map(|p| p.0)
    }

    /// Remove `key` from the queue, returning its priority if it was
    /// present.
    pub fn remove(&mut self, key: &K) -> Option<P> {
        self.items.remove(key).map(|p| p.0)
    }

    /// Update the priority of an existing entry.
    ///
    /// # Errors
    ///
    /// `UnknownKeyError` is returned when the indicated key is not
    /// present.
    pub fn set_priority(&mut self, key: &K, priority: P) -> Result<P, UnknownKeyError> {
        self.items
            .set_priority(key, Reverse(priority))
            .map(|p| p.0)
            .map_err(|_| UnknownKeyError {})
    }

    pub fn contains(&self, key: &K) -> bool {
        self.items.get_priority(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K, P> Default for EarliestFirstQueue<K, P>
where
    K: Hash + Eq,
    P: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> Debug for EarliestFirstQueue<K, P>
where
    K: Hash + Eq + Debug,
    P: Ord + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EarliestFirstQueue")
            .field("items", &self.items)
            .finish()
    }
}

#[test]
fn test_empty() {
    let mut q: EarliestFirstQueue<usize, u64> = EarliestFirstQueue::default();
    assert!(q.is_empty());
    assert_eq!(q.len(), 0);
    assert_eq!(q.peek(), None);
    assert_eq!(q.pop(), None);
    assert_eq!(q.remove(&3), None);
}

#[test]
fn test_earliest_pops_first() {
    let mut q: EarliestFirstQueue<&'static str, u64> = EarliestFirstQueue::new();
    assert_eq!(q.push("paper tape", 900), None);
    assert_eq!(q.push("clock", 16_667), None);
    assert_eq!(q.push("teletype", 100), None);
    assert_eq!(q.peek(), Some((&"teletype", &100)));
    assert_eq!(q.pop(), Some(("teletype", 100)));
    assert_eq!(q.pop(), Some(("paper tape", 900)));
    assert_eq!(q.pop(), Some(("clock", 16_667)));
    assert!(q.is_empty());
}

#[test]
fn test_repeat_push_replaces() {
    let mut q: EarliestFirstQueue<usize, u64> = EarliestFirstQueue::new();
    assert_eq!(q.push(0, 20), None);
    assert_eq!(q.push(0, 40), Some(20));
    assert_eq!(q.len(), 1);
    assert_eq!(q.pop(), Some((0, 40)));
}

#[test]
fn test_remove() {
    let mut q: EarliestFirstQueue<usize, u64> = EarliestFirstQueue::new();
    q.push(1, 10);
    q.push(2, 5);
    assert!(q.contains(&2));
    assert_eq!(q.remove(&2), Some(5));
    assert!(!q.contains(&2));
    assert_eq!(q.pop(), Some((1, 10)));
}

#[test]
fn test_set_priority() {
    let mut q: EarliestFirstQueue<usize, u64> = EarliestFirstQueue::new();
    q.push(1, 10);
    q.push(2, 20);
    assert_eq!(q.set_priority(&2, 1), Ok(20));
    assert_eq!(q.set_priority(&7, 1), Err(UnknownKeyError {}));
    assert_eq!(q.pop(), Some((2, 1)));
}
