//! ChainNode / TreeNode storage: every entry lives in one arena slot.
//!
//! A node is a chain node while `tree` is `None` and a tree node otherwise.
//! Both forms use `next` as the forward list link of their bucket; tree
//! nodes add `prev` (the backward list link) and the red-black relation.
//! Links are arena keys, never references, so rotations and list surgery
//! are plain field writes.

use core::borrow::Borrow;
use core::cmp::Ordering;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generational index of a node inside its table's arena.
    pub(crate) struct NodeKey;
}

/// Optional total order on keys used to place equal-hash keys in a tree.
pub(crate) type KeyOrder<K> = Option<fn(&K, &K) -> Ordering>;

/// Identity first, then `Eq`.
#[inline]
pub(crate) fn key_matches<K, Q>(stored: &K, query: &Q) -> bool
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
{
    let stored: &Q = stored.borrow();
    core::ptr::eq(stored, query) || stored == query
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct TreeLinks {
    pub(crate) parent: Option<NodeKey>,
    pub(crate) left: Option<NodeKey>,
    pub(crate) right: Option<NodeKey>,
    pub(crate) prev: Option<NodeKey>,
    pub(crate) red: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Option<NodeKey>,
    /// Arena-unique insertion ordinal; the identity tie-break.
    pub(crate) seq: u64,
    pub(crate) tree: Option<TreeLinks>,
}

#[derive(Clone, Debug)]
pub(crate) struct NodeArena<K, V> {
    slots: SlotMap<NodeKey, Node<K, V>>,
    next_seq: u64,
}

impl<K, V> NodeArena<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Sequence number the next allocated node will receive.
    #[inline]
    pub(crate) fn peek_seq(&self) -> u64 {
        self.next_seq
    }

    /// Allocate a chain node.
    pub(crate) fn alloc(&mut self, hash: u32, key: K, value: V, next: Option<NodeKey>) -> NodeKey {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(Node {
            hash,
            key,
            value,
            next,
            seq,
            tree: None,
        })
    }

    pub(crate) fn free(&mut self, k: NodeKey) -> Node<K, V> {
        self.slots
            .remove(k)
            .expect("freed node must be live in the arena")
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    #[inline]
    pub(crate) fn get(&self, k: NodeKey) -> Option<&Node<K, V>> {
        self.slots.get(k)
    }

    #[inline]
    pub(crate) fn node(&self, k: NodeKey) -> &Node<K, V> {
        &self.slots[k]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, k: NodeKey) -> &mut Node<K, V> {
        &mut self.slots[k]
    }

    pub(crate) fn iter_mut(&mut self) -> slotmap::basic::IterMut<'_, NodeKey, Node<K, V>> {
        self.slots.iter_mut()
    }

    // ---- list relation ----

    #[inline]
    pub(crate) fn next(&self, k: NodeKey) -> Option<NodeKey> {
        self.slots[k].next
    }

    #[inline]
    pub(crate) fn set_next(&mut self, k: NodeKey, next: Option<NodeKey>) {
        self.slots[k].next = next;
    }

    #[inline]
    pub(crate) fn prev(&self, k: NodeKey) -> Option<NodeKey> {
        self.links(k).prev
    }

    #[inline]
    pub(crate) fn set_prev(&mut self, k: NodeKey, prev: Option<NodeKey>) {
        self.links_mut(k).prev = prev;
    }

    /// Walk a bucket list from `head` in list order.
    pub(crate) fn walk(&self, head: Option<NodeKey>) -> impl Iterator<Item = NodeKey> + '_ {
        core::iter::successors(head, move |&k| self.next(k))
    }

    // ---- tree relation ----

    #[inline]
    pub(crate) fn is_tree_node(&self, k: NodeKey) -> bool {
        self.slots[k].tree.is_some()
    }

    #[inline]
    pub(crate) fn links(&self, k: NodeKey) -> &TreeLinks {
        self.slots[k]
            .tree
            .as_ref()
            .expect("tree operation on a chain node")
    }

    #[inline]
    pub(crate) fn links_mut(&mut self, k: NodeKey) -> &mut TreeLinks {
        self.slots[k]
            .tree
            .as_mut()
            .expect("tree operation on a chain node")
    }

    /// Turn `k` into a tree node with only its list predecessor set.
    pub(crate) fn make_tree_node(&mut self, k: NodeKey, prev: Option<NodeKey>) {
        self.slots[k].tree = Some(TreeLinks {
            prev,
            ..TreeLinks::default()
        });
    }

    pub(crate) fn make_chain_node(&mut self, k: NodeKey) {
        self.slots[k].tree = None;
    }

    #[inline]
    pub(crate) fn parent(&self, k: NodeKey) -> Option<NodeKey> {
        self.links(k).parent
    }

    #[inline]
    pub(crate) fn left(&self, k: NodeKey) -> Option<NodeKey> {
        self.links(k).left
    }

    #[inline]
    pub(crate) fn right(&self, k: NodeKey) -> Option<NodeKey> {
        self.links(k).right
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, k: NodeKey, p: Option<NodeKey>) {
        self.links_mut(k).parent = p;
    }

    #[inline]
    pub(crate) fn set_left(&mut self, k: NodeKey, l: Option<NodeKey>) {
        self.links_mut(k).left = l;
    }

    #[inline]
    pub(crate) fn set_right(&mut self, k: NodeKey, r: Option<NodeKey>) {
        self.links_mut(k).right = r;
    }

    /// Missing children count as black.
    #[inline]
    pub(crate) fn is_red(&self, k: Option<NodeKey>) -> bool {
        k.map(|k| self.links(k).red).unwrap_or(false)
    }

    #[inline]
    pub(crate) fn set_red(&mut self, k: NodeKey, red: bool) {
        self.links_mut(k).red = red;
    }

    /// Placement order of node `a` relative to node `b` within one tree.
    /// Never `Equal` for distinct nodes.
    pub(crate) fn placement(&self, a: NodeKey, b: NodeKey, order: KeyOrder<K>) -> Ordering {
        let (na, nb) = (&self.slots[a], &self.slots[b]);
        na.hash
            .cmp(&nb.hash)
            .then_with(|| order.map_or(Ordering::Equal, |cmp| cmp(&na.key, &nb.key)))
            .then_with(|| na.seq.cmp(&nb.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_assigns_increasing_sequence() {
        let mut arena: NodeArena<&str, i32> = NodeArena::new();
        let a = arena.alloc(1, "a", 1, None);
        let b = arena.alloc(1, "b", 2, Some(a));
        assert!(arena.node(a).seq < arena.node(b).seq);
        assert_eq!(arena.next(b), Some(a));
        assert_eq!(arena.walk(Some(b)).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(arena.peek_seq(), 2);
    }

    #[test]
    fn placement_orders_by_hash_then_key_then_seq() {
        let mut arena: NodeArena<u32, ()> = NodeArena::new();
        let hi = arena.alloc(9, 0, (), None);
        let lo_b = arena.alloc(3, 2, (), None);
        let lo_a = arena.alloc(3, 1, (), None);
        assert_eq!(arena.placement(lo_a, hi, None), Ordering::Less);
        // Without a key order the later node sorts after.
        assert_eq!(arena.placement(lo_a, lo_b, None), Ordering::Greater);
        // With one, the keys decide.
        assert_eq!(arena.placement(lo_a, lo_b, Some(u32::cmp)), Ordering::Less);
    }

    #[test]
    fn missing_child_is_black() {
        let mut arena: NodeArena<u8, u8> = NodeArena::new();
        let k = arena.alloc(0, 0, 0, None);
        arena.make_tree_node(k, None);
        assert!(!arena.is_red(None));
        arena.set_red(k, true);
        assert!(arena.is_red(Some(k)));
        arena.make_chain_node(k);
        assert!(!arena.is_tree_node(k));
    }
}
