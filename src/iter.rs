//! Borrowing iterators over a table.

use crate::bucket::BucketArray;
use crate::node::{Node, NodeArena, NodeKey};
use core::iter::FusedIterator;

/// Entries in bucket order, and in list order within a bucket.
pub struct Iter<'a, K, V> {
    nodes: &'a NodeArena<K, V>,
    buckets: &'a BucketArray,
    next: Option<(usize, NodeKey)>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(nodes: &'a NodeArena<K, V>, buckets: &'a BucketArray) -> Self {
        Self {
            nodes,
            buckets,
            next: buckets.next_occupied(0),
            remaining: nodes.len(),
        }
    }
}

/// Position following `k` at `index`: the node's list successor, or the
/// head of the next occupied bucket.
pub(crate) fn advance<K, V>(
    nodes: &NodeArena<K, V>,
    buckets: &BucketArray,
    index: usize,
    k: NodeKey,
) -> Option<(usize, NodeKey)> {
    match nodes.next(k) {
        Some(n) => Some((index, n)),
        None => buckets.next_occupied(index + 1),
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (index, k) = self.next?;
        self.next = advance(self.nodes, self.buckets, index, k);
        self.remaining -= 1;
        let node = self.nodes.node(k);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes,
            buckets: self.buckets,
            next: self.next,
            remaining: self.remaining,
        }
    }
}

/// Mutable access to every value, in arena order.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, NodeKey, Node<K, V>>,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(nodes: &'a mut NodeArena<K, V>) -> Self {
        Self { it: nodes.iter_mut() }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, n)| (&n.key, &mut n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use crate::HashTable;
    use std::collections::HashMap;

    #[test]
    fn iter_and_iter_mut_agree() {
        let mut t: HashTable<u32, u32> = (0..200).map(|k| (k, k)).collect();
        for (_, v) in t.iter_mut() {
            *v += 1;
        }
        let seen: HashMap<u32, u32> = t.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(seen.len(), 200);
        assert!(seen.iter().all(|(k, v)| *v == k + 1));
    }

    #[test]
    fn empty_table_yields_nothing() {
        let t: HashTable<u32, u32> = HashTable::new();
        assert_eq!(t.iter().next(), None);
        assert_eq!(t.iter().len(), 0);
    }

    #[test]
    fn size_hint_counts_down() {
        let t: HashTable<u32, u32> = (0..5).map(|k| (k, k)).collect();
        let mut it = t.iter();
        it.next();
        it.next();
        assert_eq!(it.size_hint(), (3, Some(3)));
        assert_eq!(it.count(), 3);
    }
}
