//! Fail-fast traversal that can remove the entry it last returned.
//!
//! A [`Cursor`] does not borrow the table. It remembers the modification
//! count observed when it was created and checks it on every step, so a
//! structural change made through any other path surfaces as
//! [`TableError::ConcurrentStructuralChange`] instead of a skipped or
//! repeated entry. Removing through the cursor itself keeps it in sync.

use crate::error::TableError;
use crate::iter::advance;
use crate::node::NodeKey;
use crate::observer::EntryObserver;
use crate::table::HashTable;
use crate::tie_break::TieBreak;
use core::hash::{BuildHasher, Hash};

#[derive(Clone, Debug)]
pub struct Cursor {
    expected_mod_count: u64,
    next: Option<(usize, NodeKey)>,
    current: Option<NodeKey>,
}

impl<K, V, S, O, C> HashTable<K, V, S, O, C> {
    /// Start a cursor before the first entry.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            expected_mod_count: self.mod_count,
            next: self.buckets.next_occupied(0),
            current: None,
        }
    }
}

impl Cursor {
    fn stale(&self, actual: u64) -> TableError {
        TableError::ConcurrentStructuralChange {
            expected: self.expected_mod_count,
            actual,
        }
    }

    /// Step to the next entry. `Ok(None)` once exhausted.
    pub fn next<'a, K, V, S, O, C>(
        &mut self,
        table: &'a HashTable<K, V, S, O, C>,
    ) -> Result<Option<(&'a K, &'a V)>, TableError> {
        table.check_mod_count(self.expected_mod_count)?;
        let Some((index, k)) = self.next else {
            return Ok(None);
        };
        let node = table
            .nodes
            .get(k)
            .ok_or_else(|| self.stale(table.mod_count))?;
        self.next = advance(&table.nodes, &table.buckets, index, k);
        self.current = Some(k);
        Ok(Some((&node.key, &node.value)))
    }

    /// Remove the entry most recently returned by [`next`](Self::next).
    pub fn remove<K, V, S, O, C>(
        &mut self,
        table: &mut HashTable<K, V, S, O, C>,
    ) -> Result<(K, V), TableError>
    where
        K: Eq + Hash,
        S: BuildHasher,
        O: EntryObserver<K, V>,
        C: TieBreak<K>,
    {
        let k = self.current.ok_or(TableError::NoCurrentEntry)?;
        table.check_mod_count(self.expected_mod_count)?;
        if table.nodes.get(k).is_none() {
            return Err(self.stale(table.mod_count));
        }
        self.current = None;
        let entry = table.remove_known(k);
        self.expected_mod_count = table.mod_count;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::Colliding;

    #[test]
    fn visits_every_entry() {
        let t: HashTable<u32, u32> = (0..50).map(|k| (k, k * 10)).collect();
        let mut c = t.cursor();
        let mut n = 0;
        while let Some((k, v)) = c.next(&t).unwrap() {
            assert_eq!(*v, k * 10);
            n += 1;
        }
        assert_eq!(n, 50);
        assert_eq!(c.next(&t).unwrap(), None);
    }

    #[test]
    fn remove_without_next_is_rejected() {
        let mut t: HashTable<u32, u32> = (0..3).map(|k| (k, k)).collect();
        let mut c = t.cursor();
        assert_eq!(c.remove(&mut t), Err(TableError::NoCurrentEntry));
        c.next(&t).unwrap();
        assert!(c.remove(&mut t).is_ok());
        assert_eq!(c.remove(&mut t), Err(TableError::NoCurrentEntry));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn outside_insert_fails_fast() {
        let mut t: HashTable<u32, u32> = (0..3).map(|k| (k, k)).collect();
        let mut c = t.cursor();
        c.next(&t).unwrap();
        t.put(100, 100);
        assert!(matches!(
            c.next(&t),
            Err(TableError::ConcurrentStructuralChange { .. })
        ));
    }

    #[test]
    fn value_overwrite_does_not_invalidate() {
        let mut t: HashTable<u32, u32> = (0..3).map(|k| (k, k)).collect();
        let mut c = t.cursor();
        let (first, _) = c.next(&t).unwrap().map(|(k, v)| (*k, *v)).unwrap();
        t.put(first, 77);
        assert!(c.next(&t).is_ok());
    }

    #[test]
    fn drains_tree_bucket_through_untreeify() {
        let mut t: HashTable<Colliding, u32> = HashTable::with_capacity(64);
        for i in 0..12 {
            t.put(Colliding(i), i);
        }
        let mut c = t.cursor();
        let mut removed = Vec::new();
        while let Some((k, _)) = c.next(&t).unwrap() {
            let id = k.0;
            if id % 3 != 0 {
                c.remove(&mut t).unwrap();
                removed.push(id);
            }
        }
        assert_eq!(removed.len(), 8);
        assert_eq!(t.len(), 4);
        assert!(t.check_invariants().is_ok());
        for i in [0, 3, 6, 9] {
            assert_eq!(t.get(&Colliding(i)), Some(&i));
        }
    }
}
