//! Mutation hooks for layers that track entry order (LRU or insertion order)
//! on top of the table without the table depending on them.

/// Callbacks fired after the table has finished the corresponding change.
/// The table is consistent whenever a hook runs.
pub trait EntryObserver<K, V> {
    /// An existing mapping was updated in place.
    fn after_access(&mut self, _key: &K, _value: &V) {}

    /// A fresh mapping was committed.
    fn after_insertion(&mut self, _key: &K, _value: &V) {}

    /// A mapping was removed; `key` and `value` are about to be returned or dropped.
    fn after_removal(&mut self, _key: &K, _value: &V) {}
}

/// Observer that ignores every event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NoopObserver;

impl<K, V> EntryObserver<K, V> for NoopObserver {}
