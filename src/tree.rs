//! Red-black tree buckets embedded in the node arena.
//!
//! A tree bucket keeps two independent relations over the same nodes: the
//! red-black relation (`parent/left/right/red`), used for lookup, and the
//! doubly linked list (`prev/next`), used for iteration and for splitting
//! during resize. Rebalancing only touches the first; list surgery only
//! touches the second.
//!
//! Placement order is hash, then the table's optional key order, then the
//! node sequence number. Lookups that cannot decide on a hash tie search
//! both subtrees.

use crate::bucket::{Bucket, UNTREEIFY_THRESHOLD};
use crate::node::{key_matches, KeyOrder, NodeArena, NodeKey};
use core::borrow::Borrow;
use core::cmp::Ordering;
use std::collections::BTreeSet;

/// Orders a node key relative to the query of the current operation.
pub(crate) type Probe<'a, K> = Option<&'a dyn Fn(&K) -> Ordering>;

/// Outcome of inserting into a tree bucket.
pub(crate) enum TreePut<V> {
    /// Key already present; the unused value is handed back.
    Existing(NodeKey, V),
    Inserted { node: NodeKey, root: NodeKey },
}

/// One half of a bucket being split, built in list order.
#[derive(Default)]
struct Half {
    head: Option<NodeKey>,
    tail: Option<NodeKey>,
    count: usize,
}

impl<K, V> NodeArena<K, V> {
    // ---- lookup ----

    pub(crate) fn tree_find<Q>(
        &self,
        start: Option<NodeKey>,
        hash: u32,
        key: &Q,
        probe: Probe<'_, K>,
    ) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut p = start;
        while let Some(n) = p {
            let node = self.node(n);
            let (pl, pr) = (self.left(n), self.right(n));
            if node.hash > hash {
                p = pl;
            } else if node.hash < hash {
                p = pr;
            } else if key_matches(&node.key, key) {
                return Some(n);
            } else if pl.is_none() {
                p = pr;
            } else if pr.is_none() {
                p = pl;
            } else {
                match probe.map_or(Ordering::Equal, |f| f(&node.key)) {
                    Ordering::Less => p = pl,
                    Ordering::Greater => p = pr,
                    Ordering::Equal => {
                        if let Some(q) = self.tree_find(pr, hash, key, probe) {
                            return Some(q);
                        }
                        p = pl;
                    }
                }
            }
        }
        None
    }

    // ---- insertion ----

    pub(crate) fn tree_put(
        &mut self,
        root: NodeKey,
        hash: u32,
        key: K,
        value: V,
        order: KeyOrder<K>,
    ) -> TreePut<V>
    where
        K: Eq,
    {
        let new_seq = self.peek_seq();
        let mut searched = false;
        let mut p = root;
        loop {
            let dir = {
                let node = self.node(p);
                if node.hash > hash {
                    Ordering::Less
                } else if node.hash < hash {
                    Ordering::Greater
                } else if key_matches(&node.key, &key) {
                    return TreePut::Existing(p, value);
                } else {
                    match order.map_or(Ordering::Equal, |cmp| cmp(&key, &node.key)) {
                        Ordering::Equal => {
                            if !searched {
                                searched = true;
                                let key_ref = &key;
                                let probe_fn = order.map(|cmp| move |pk: &K| cmp(key_ref, pk));
                                let probe = probe_fn.as_ref().map(|f| f as &dyn Fn(&K) -> Ordering);
                                let found = self
                                    .tree_find(self.left(p), hash, key_ref, probe)
                                    .or_else(|| self.tree_find(self.right(p), hash, key_ref, probe));
                                if let Some(q) = found {
                                    return TreePut::Existing(q, value);
                                }
                            }
                            new_seq.cmp(&node.seq)
                        }
                        dir => dir,
                    }
                }
            };

            let xp = p;
            let child = if dir == Ordering::Less {
                self.left(xp)
            } else {
                self.right(xp)
            };
            if let Some(c) = child {
                p = c;
                continue;
            }

            // Link after the tree parent in list order.
            let xpn = self.next(xp);
            let x = self.alloc(hash, key, value, xpn);
            self.make_tree_node(x, Some(xp));
            self.set_parent(x, Some(xp));
            if dir == Ordering::Less {
                self.set_left(xp, Some(x));
            } else {
                self.set_right(xp, Some(x));
            }
            self.set_next(xp, Some(x));
            if let Some(n) = xpn {
                self.set_prev(n, Some(x));
            }
            let root = self.balance_insertion(root, x);
            debug_assert_eq!(self.audit(root, Some(x), || self.list_head(root), order), Ok(()));
            return TreePut::Inserted { node: x, root };
        }
    }

    // ---- removal ----

    /// Unlink tree node `p` from its bucket and return the bucket's new shape.
    /// The node itself stays allocated; the caller frees it.
    pub(crate) fn tree_remove(
        &mut self,
        root: NodeKey,
        head: NodeKey,
        p: NodeKey,
        order: KeyOrder<K>,
    ) -> Bucket {
        let succ = self.next(p);
        let pred = self.prev(p);
        let first = match pred {
            None => succ,
            Some(pr) => {
                self.set_next(pr, succ);
                Some(head)
            }
        };
        if let Some(s) = succ {
            self.set_prev(s, pred);
        }
        let Some(first) = first else {
            return Bucket::Empty;
        };

        // Too small for a tree: right child or left-left grandchild missing.
        let too_small = self.right(root).is_none()
            || self.left(root).map_or(true, |rl| self.left(rl).is_none());
        if too_small {
            tracing::trace!("untreeify bucket on removal");
            self.untreeify(first);
            return Bucket::Chain(first);
        }

        let mut root = root;
        let (pl, pr) = (self.left(p), self.right(p));
        let replacement = match (pl, pr) {
            (Some(pl), Some(pr)) => {
                let mut s = pr;
                while let Some(sl) = self.left(s) {
                    s = sl;
                }
                let (s_red, p_red) = (self.links(s).red, self.links(p).red);
                self.set_red(s, p_red);
                self.set_red(p, s_red);
                let sr = self.right(s);
                let pp = self.parent(p);
                if s == pr {
                    self.set_parent(p, Some(s));
                    self.set_right(s, Some(p));
                } else {
                    let sp = self.parent(s);
                    self.set_parent(p, sp);
                    if let Some(sp) = sp {
                        if self.left(sp) == Some(s) {
                            self.set_left(sp, Some(p));
                        } else {
                            self.set_right(sp, Some(p));
                        }
                    }
                    self.set_right(s, Some(pr));
                    self.set_parent(pr, Some(s));
                }
                self.set_left(p, None);
                self.set_right(p, sr);
                if let Some(sr) = sr {
                    self.set_parent(sr, Some(p));
                }
                self.set_left(s, Some(pl));
                self.set_parent(pl, Some(s));
                self.set_parent(s, pp);
                match pp {
                    None => root = s,
                    Some(pp) => {
                        if self.left(pp) == Some(p) {
                            self.set_left(pp, Some(s));
                        } else {
                            self.set_right(pp, Some(s));
                        }
                    }
                }
                sr.unwrap_or(p)
            }
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => p,
        };

        if replacement != p {
            let pp = self.parent(p);
            self.set_parent(replacement, pp);
            match pp {
                None => {
                    root = replacement;
                    self.set_red(replacement, false);
                }
                Some(pp) => {
                    if self.left(pp) == Some(p) {
                        self.set_left(pp, Some(replacement));
                    } else {
                        self.set_right(pp, Some(replacement));
                    }
                }
            }
            self.set_left(p, None);
            self.set_right(p, None);
            self.set_parent(p, None);
        }

        let root = if self.links(p).red {
            root
        } else {
            self.balance_deletion(root, replacement)
        };

        if replacement == p {
            // Detach the leaf that stood in during fix-up.
            if let Some(pp) = self.parent(p) {
                if self.left(pp) == Some(p) {
                    self.set_left(pp, None);
                } else if self.right(pp) == Some(p) {
                    self.set_right(pp, None);
                }
            }
            self.set_parent(p, None);
        }

        debug_assert_eq!(self.audit(root, Some(replacement), || first, order), Ok(()));
        Bucket::Tree { root, head: first }
    }

    // ---- representation changes ----

    /// Convert the chain starting at `head` into a tree and return its root.
    pub(crate) fn chain_to_tree(&mut self, head: NodeKey, order: KeyOrder<K>) -> NodeKey {
        let mut prev = None;
        let mut cur = Some(head);
        while let Some(k) = cur {
            self.make_tree_node(k, prev);
            prev = Some(k);
            cur = self.next(k);
        }
        self.treeify(head, order)
    }

    /// Build the red-black relation over a list of tree nodes whose
    /// `prev/next` links are already in place.
    pub(crate) fn treeify(&mut self, head: NodeKey, order: KeyOrder<K>) -> NodeKey {
        let mut root = head;
        {
            let l = self.links_mut(head);
            l.parent = None;
            l.left = None;
            l.right = None;
            l.red = false;
        }
        let mut cur = self.next(head);
        while let Some(x) = cur {
            cur = self.next(x);
            self.set_left(x, None);
            self.set_right(x, None);
            let mut p = root;
            loop {
                let dir = self.placement(x, p, order);
                let child = if dir == Ordering::Less {
                    self.left(p)
                } else {
                    self.right(p)
                };
                match child {
                    Some(c) => p = c,
                    None => {
                        self.set_parent(x, Some(p));
                        if dir == Ordering::Less {
                            self.set_left(p, Some(x));
                        } else {
                            self.set_right(p, Some(x));
                        }
                        root = self.balance_insertion(root, x);
                        break;
                    }
                }
            }
        }
        debug_assert_eq!(self.audit(root, None, || head, order), Ok(()));
        root
    }

    /// Drop the tree relation from every node of the list at `head`.
    pub(crate) fn untreeify(&mut self, head: NodeKey) {
        let mut cur = Some(head);
        while let Some(k) = cur {
            cur = self.next(k);
            self.make_chain_node(k);
        }
    }

    /// Partition a tree bucket by `hash & bit`, keeping list order in both
    /// halves. Returns the low and high buckets.
    pub(crate) fn tree_split(
        &mut self,
        root: NodeKey,
        head: NodeKey,
        bit: usize,
        order: KeyOrder<K>,
    ) -> (Bucket, Bucket) {
        let mut lo = Half::default();
        let mut hi = Half::default();
        let mut cur = Some(head);
        while let Some(e) = cur {
            cur = self.next(e);
            self.set_next(e, None);
            let half = if self.node(e).hash as usize & bit == 0 {
                &mut lo
            } else {
                &mut hi
            };
            self.set_prev(e, half.tail);
            match half.tail {
                None => half.head = Some(e),
                Some(t) => self.set_next(t, Some(e)),
            }
            half.tail = Some(e);
            half.count += 1;
        }

        let lo_bucket = self.settle_half(&lo, hi.head.is_some(), root, order);
        let hi_bucket = self.settle_half(&hi, lo.head.is_some(), root, order);
        tracing::trace!(lo = lo.count, hi = hi.count, "split tree bucket");
        (lo_bucket, hi_bucket)
    }

    fn settle_half(
        &mut self,
        half: &Half,
        other_occupied: bool,
        old_root: NodeKey,
        order: KeyOrder<K>,
    ) -> Bucket {
        let Some(head) = half.head else {
            return Bucket::Empty;
        };
        if half.count <= UNTREEIFY_THRESHOLD {
            self.untreeify(head);
            Bucket::Chain(head)
        } else if other_occupied {
            let root = self.treeify(head, order);
            Bucket::Tree { root, head }
        } else {
            // Every node landed here; the old tree is still intact.
            Bucket::Tree {
                root: old_root,
                head,
            }
        }
    }

    // ---- balancing ----

    fn rotate_left(&mut self, mut root: NodeKey, p: NodeKey) -> NodeKey {
        let Some(r) = self.right(p) else {
            return root;
        };
        let rl = self.left(r);
        self.set_right(p, rl);
        if let Some(rl) = rl {
            self.set_parent(rl, Some(p));
        }
        let pp = self.parent(p);
        self.set_parent(r, pp);
        match pp {
            None => {
                root = r;
                self.set_red(r, false);
            }
            Some(pp) => {
                if self.left(pp) == Some(p) {
                    self.set_left(pp, Some(r));
                } else {
                    self.set_right(pp, Some(r));
                }
            }
        }
        self.set_left(r, Some(p));
        self.set_parent(p, Some(r));
        root
    }

    fn rotate_right(&mut self, mut root: NodeKey, p: NodeKey) -> NodeKey {
        let Some(l) = self.left(p) else {
            return root;
        };
        let lr = self.right(l);
        self.set_left(p, lr);
        if let Some(lr) = lr {
            self.set_parent(lr, Some(p));
        }
        let pp = self.parent(p);
        self.set_parent(l, pp);
        match pp {
            None => {
                root = l;
                self.set_red(l, false);
            }
            Some(pp) => {
                if self.right(pp) == Some(p) {
                    self.set_right(pp, Some(l));
                } else {
                    self.set_left(pp, Some(l));
                }
            }
        }
        self.set_right(l, Some(p));
        self.set_parent(p, Some(l));
        root
    }

    fn balance_insertion(&mut self, mut root: NodeKey, mut x: NodeKey) -> NodeKey {
        self.set_red(x, true);
        loop {
            let Some(xp) = self.parent(x) else {
                self.set_red(x, false);
                return x;
            };
            if !self.is_red(Some(xp)) {
                return root;
            }
            let Some(xpp) = self.parent(xp) else {
                return root;
            };
            if self.left(xpp) == Some(xp) {
                if let Some(uncle) = self.right(xpp).filter(|&u| self.links(u).red) {
                    self.set_red(uncle, false);
                    self.set_red(xp, false);
                    self.set_red(xpp, true);
                    x = xpp;
                } else {
                    let (mut p, mut pp) = (Some(xp), Some(xpp));
                    if self.right(xp) == Some(x) {
                        x = xp;
                        root = self.rotate_left(root, x);
                        p = self.parent(x);
                        pp = p.and_then(|p| self.parent(p));
                    }
                    if let Some(p) = p {
                        self.set_red(p, false);
                        if let Some(pp) = pp {
                            self.set_red(pp, true);
                            root = self.rotate_right(root, pp);
                        }
                    }
                }
            } else if let Some(uncle) = self.left(xpp).filter(|&u| self.links(u).red) {
                self.set_red(uncle, false);
                self.set_red(xp, false);
                self.set_red(xpp, true);
                x = xpp;
            } else {
                let (mut p, mut pp) = (Some(xp), Some(xpp));
                if self.left(xp) == Some(x) {
                    x = xp;
                    root = self.rotate_right(root, x);
                    p = self.parent(x);
                    pp = p.and_then(|p| self.parent(p));
                }
                if let Some(p) = p {
                    self.set_red(p, false);
                    if let Some(pp) = pp {
                        self.set_red(pp, true);
                        root = self.rotate_left(root, pp);
                    }
                }
            }
        }
    }

    fn balance_deletion(&mut self, mut root: NodeKey, mut x: NodeKey) -> NodeKey {
        loop {
            if x == root {
                return root;
            }
            let Some(mut xp) = self.parent(x) else {
                self.set_red(x, false);
                return x;
            };
            if self.is_red(Some(x)) {
                self.set_red(x, false);
                return root;
            }
            if self.left(xp) == Some(x) {
                let mut xpr = self.right(xp);
                if let Some(s) = xpr.filter(|&s| self.links(s).red) {
                    self.set_red(s, false);
                    self.set_red(xp, true);
                    root = self.rotate_left(root, xp);
                    if let Some(p) = self.parent(x) {
                        xp = p;
                    }
                    xpr = self.right(xp);
                }
                let Some(s) = xpr else {
                    x = xp;
                    continue;
                };
                let (sl, sr) = (self.left(s), self.right(s));
                if !self.is_red(sr) && !self.is_red(sl) {
                    self.set_red(s, true);
                    x = xp;
                    continue;
                }
                let mut sib = Some(s);
                if !self.is_red(sr) {
                    if let Some(sl) = sl {
                        self.set_red(sl, false);
                    }
                    self.set_red(s, true);
                    root = self.rotate_right(root, s);
                    if let Some(p) = self.parent(x) {
                        xp = p;
                    }
                    sib = self.right(xp);
                }
                if let Some(s) = sib {
                    let parent_red = self.links(xp).red;
                    self.set_red(s, parent_red);
                    if let Some(sr) = self.right(s) {
                        self.set_red(sr, false);
                    }
                }
                self.set_red(xp, false);
                root = self.rotate_left(root, xp);
                x = root;
            } else {
                let mut xpl = self.left(xp);
                if let Some(s) = xpl.filter(|&s| self.links(s).red) {
                    self.set_red(s, false);
                    self.set_red(xp, true);
                    root = self.rotate_right(root, xp);
                    if let Some(p) = self.parent(x) {
                        xp = p;
                    }
                    xpl = self.left(xp);
                }
                let Some(s) = xpl else {
                    x = xp;
                    continue;
                };
                let (sl, sr) = (self.left(s), self.right(s));
                if !self.is_red(sl) && !self.is_red(sr) {
                    self.set_red(s, true);
                    x = xp;
                    continue;
                }
                let mut sib = Some(s);
                if !self.is_red(sl) {
                    if let Some(sr) = sr {
                        self.set_red(sr, false);
                    }
                    self.set_red(s, true);
                    root = self.rotate_left(root, s);
                    if let Some(p) = self.parent(x) {
                        xp = p;
                    }
                    sib = self.left(xp);
                }
                if let Some(s) = sib {
                    let parent_red = self.links(xp).red;
                    self.set_red(s, parent_red);
                    if let Some(sl) = self.left(s) {
                        self.set_red(sl, false);
                    }
                }
                self.set_red(xp, false);
                root = self.rotate_right(root, xp);
                x = root;
            }
        }
    }

    // ---- verification ----

    /// First node in list order of the tree containing `k`.
    fn list_head(&self, k: NodeKey) -> NodeKey {
        let mut h = k;
        while let Some(p) = self.prev(h) {
            h = p;
        }
        h
    }

    /// Check run after each tree mutation in debug builds. Walks the whole
    /// bucket with the `tree-audit` feature; otherwise looks only at the
    /// root and at the node the mutation touched.
    fn audit(
        &self,
        root: NodeKey,
        touched: Option<NodeKey>,
        head: impl FnOnce() -> NodeKey,
        order: KeyOrder<K>,
    ) -> Result<(), String> {
        if cfg!(feature = "tree-audit") {
            return self.check_tree(root, head(), order).map(drop);
        }
        if !self.is_tree_node(root) || self.parent(root).is_some() || self.links(root).red {
            return Err("tree root is not a black parentless tree node".into());
        }
        let Some(x) = touched.filter(|&x| self.is_tree_node(x)) else {
            return Ok(());
        };
        if let Some(xp) = self.parent(x) {
            if self.left(xp) != Some(x) && self.right(xp) != Some(x) {
                return Err("touched node is not a child of its parent".into());
            }
            if self.links(x).red && self.links(xp).red {
                return Err("touched node and its parent are both red".into());
            }
        }
        Ok(())
    }

    /// Verify the red-black and list relations of one tree bucket.
    /// Returns the node count.
    pub(crate) fn check_tree(
        &self,
        root: NodeKey,
        head: NodeKey,
        order: KeyOrder<K>,
    ) -> Result<usize, String> {
        if !self.is_tree_node(root) {
            return Err("tree root is a chain node".into());
        }
        if self.parent(root).is_some() {
            return Err("tree root has a parent".into());
        }
        if self.links(root).red {
            return Err("tree root is red".into());
        }

        let mut in_tree = BTreeSet::new();
        let mut last = None;
        self.check_subtree(Some(root), None, order, &mut last, &mut in_tree)?;

        if self.prev(head).is_some() {
            return Err("list head has a predecessor".into());
        }
        let mut in_list = BTreeSet::new();
        let mut prev = None;
        let mut cur = Some(head);
        while let Some(k) = cur {
            if !self.is_tree_node(k) {
                return Err("chain node threaded into a tree bucket".into());
            }
            if self.prev(k) != prev {
                return Err("list prev link does not mirror next".into());
            }
            if !in_list.insert(k) {
                return Err("list contains a cycle".into());
            }
            prev = Some(k);
            cur = self.next(k);
        }
        if in_list != in_tree {
            return Err(format!(
                "list holds {} nodes but tree holds {}",
                in_list.len(),
                in_tree.len()
            ));
        }
        Ok(in_tree.len())
    }

    /// Returns the black height of the subtree at `t`.
    fn check_subtree(
        &self,
        t: Option<NodeKey>,
        parent: Option<NodeKey>,
        order: KeyOrder<K>,
        last: &mut Option<NodeKey>,
        seen: &mut BTreeSet<NodeKey>,
    ) -> Result<usize, String> {
        let Some(t) = t else {
            return Ok(1);
        };
        if !self.is_tree_node(t) {
            return Err("chain node linked into tree".into());
        }
        if self.parent(t) != parent {
            return Err("child does not point back to its parent".into());
        }
        if !seen.insert(t) {
            return Err("node reachable twice in tree".into());
        }
        let red = self.links(t).red;
        if red && (self.is_red(self.left(t)) || self.is_red(self.right(t))) {
            return Err("red node has a red child".into());
        }
        let lh = self.check_subtree(self.left(t), Some(t), order, last, seen)?;
        if let Some(prev) = *last {
            if self.placement(prev, t, order) != Ordering::Less {
                return Err("in-order traversal is not sorted".into());
            }
        }
        *last = Some(t);
        let rh = self.check_subtree(self.right(t), Some(t), order, last, seen)?;
        if lh != rh {
            return Err("unequal black heights".into());
        }
        Ok(lh + usize::from(!red))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Chain with key == value == position, allocated in list order.
    fn chain(arena: &mut NodeArena<u32, u32>, hashes: &[u32]) -> NodeKey {
        let keys: Vec<NodeKey> = hashes
            .iter()
            .enumerate()
            .map(|(i, &h)| arena.alloc(h, i as u32, i as u32, None))
            .collect();
        for w in keys.windows(2) {
            arena.set_next(w[0], Some(w[1]));
        }
        keys[0]
    }

    fn list_keys(arena: &NodeArena<u32, u32>, head: Option<NodeKey>) -> Vec<u32> {
        arena.walk(head).map(|k| arena.node(k).key).collect()
    }

    #[test]
    fn treeify_builds_valid_tree_and_keeps_list_order() {
        let mut arena = NodeArena::new();
        let hashes: Vec<u32> = (0..12).map(|i| (i * 7919) % 64).collect();
        let head = chain(&mut arena, &hashes);
        let root = arena.chain_to_tree(head, None);
        assert_eq!(arena.check_tree(root, head, None), Ok(12));
        assert_eq!(list_keys(&arena, Some(head)), (0..12).collect::<Vec<_>>());

        for i in 0..12u32 {
            let found = arena.tree_find(Some(root), hashes[i as usize], &i, None);
            assert_eq!(found.map(|k| arena.node(k).value), Some(i));
        }
        assert_eq!(arena.tree_find(Some(root), 3, &99, None), None);
    }

    #[test]
    fn colliding_hashes_fall_back_to_sequence_order() {
        let mut arena = NodeArena::new();
        let head = chain(&mut arena, &[5; 10]);
        let root = arena.chain_to_tree(head, None);
        assert_eq!(arena.check_tree(root, head, None), Ok(10));
        for i in 0..10u32 {
            assert!(arena.tree_find(Some(root), 5, &i, None).is_some());
        }
    }

    #[test]
    fn tree_put_appends_after_parent_and_rebalances() {
        let mut arena = NodeArena::new();
        let head = chain(&mut arena, &[1; 9]);
        let mut root = arena.chain_to_tree(head, None);
        for k in 9..40u32 {
            match arena.tree_put(root, 1, k, k * 10, None) {
                TreePut::Inserted { root: r, .. } => root = r,
                TreePut::Existing(..) => panic!("fresh key reported as existing"),
            }
        }
        assert_eq!(arena.check_tree(root, head, None), Ok(40));
        // All hashes tie and there is no key order, so list order stays insertion order.
        assert_eq!(list_keys(&arena, Some(head)), (0..40).collect::<Vec<_>>());

        match arena.tree_put(root, 1, 17, 0, None) {
            TreePut::Existing(k, v) => {
                assert_eq!(arena.node(k).key, 17);
                assert_eq!(v, 0);
            }
            TreePut::Inserted { .. } => panic!("duplicate key inserted"),
        }
    }

    #[test]
    fn key_order_is_used_for_equal_hashes() {
        let mut arena = NodeArena::new();
        let order: KeyOrder<u32> = Some(u32::cmp);
        let head = chain(&mut arena, &[2; 9]);
        let mut root = arena.chain_to_tree(head, order);
        for k in (100..120u32).rev() {
            if let TreePut::Inserted { root: r, .. } = arena.tree_put(root, 2, k, k, order) {
                root = r;
            }
        }
        assert_eq!(arena.check_tree(root, head, order), Ok(29));
        let probe = |pk: &u32| 105u32.cmp(pk);
        let found = arena.tree_find(Some(root), 2, &105u32, Some(&probe));
        assert_eq!(found.map(|k| arena.node(k).key), Some(105));
    }

    #[test]
    fn remove_keeps_invariants_then_untreeifies_when_small() {
        let mut arena = NodeArena::new();
        let hashes: Vec<u32> = (0..16).map(|i| i % 3).collect();
        let head = chain(&mut arena, &hashes);
        let root = arena.chain_to_tree(head, None);
        let mut bucket = Bucket::Tree { root, head };

        let mut remaining: Vec<u32> = (0..16).collect();
        for victim in [7u32, 0, 15, 3, 8, 1, 12, 4, 9, 14, 2, 5, 11, 6] {
            let Bucket::Tree { root, head } = bucket else {
                break;
            };
            let node = arena
                .walk(Some(head))
                .find(|&k| arena.node(k).key == victim)
                .expect("victim present");
            bucket = arena.tree_remove(root, head, node, None);
            arena.free(node);
            remaining.retain(|&k| k != victim);
            if let Bucket::Tree { root, head } = bucket {
                assert_eq!(arena.check_tree(root, head, None), Ok(remaining.len()));
            }
            assert_eq!(list_keys(&arena, bucket.head()), remaining);
        }
        match bucket {
            Bucket::Chain(head) => {
                assert!(arena.walk(Some(head)).all(|k| !arena.is_tree_node(k)));
            }
            other => panic!("expected chain after shrinking, got {:?}", other),
        }
    }

    #[test]
    fn split_partitions_by_bit_and_preserves_order() {
        let mut arena = NodeArena::new();
        // 10 low (bit 16 clear) and 4 high, interleaved.
        let hashes: Vec<u32> = (0..14).map(|i| if i % 3 == 0 && i < 12 { 16 + i } else { i }).collect();
        let head = chain(&mut arena, &hashes);
        let root = arena.chain_to_tree(head, None);
        let (lo, hi) = arena.tree_split(root, head, 16, None);

        let lo_keys = list_keys(&arena, lo.head());
        let hi_keys = list_keys(&arena, hi.head());
        assert_eq!(lo_keys, vec![1, 2, 4, 5, 7, 8, 10, 11, 12, 13]);
        assert_eq!(hi_keys, vec![0, 3, 6, 9]);
        match lo {
            Bucket::Tree { root, head } => assert_eq!(arena.check_tree(root, head, None), Ok(10)),
            other => panic!("low half should stay a tree, got {:?}", other),
        }
        assert!(matches!(hi, Bucket::Chain(_)));
    }

    #[test]
    fn mutation_audit_rejects_broken_root_and_red_pairs() {
        let mut arena = NodeArena::new();
        let head = chain(&mut arena, &[4; 20]);
        let root = arena.chain_to_tree(head, None);
        assert_eq!(arena.audit(root, None, || head, None), Ok(()));

        let leaf = arena
            .walk(Some(head))
            .find(|&k| arena.left(k).is_none() && arena.right(k).is_none())
            .expect("tree has a leaf");
        let parent = arena.parent(leaf).expect("leaf below root");
        let was = (arena.links(leaf).red, arena.links(parent).red);
        arena.set_red(leaf, true);
        arena.set_red(parent, true);
        assert!(arena.audit(root, Some(leaf), || head, None).is_err());
        arena.set_red(leaf, was.0);
        arena.set_red(parent, was.1);
        assert_eq!(arena.audit(root, Some(leaf), || head, None), Ok(()));

        arena.set_red(root, true);
        assert!(arena.audit(root, None, || head, None).is_err());
    }

    #[test]
    fn split_with_one_side_empty_keeps_the_tree() {
        let mut arena = NodeArena::new();
        let head = chain(&mut arena, &[3; 9]);
        let root = arena.chain_to_tree(head, None);
        let (lo, hi) = arena.tree_split(root, head, 8, None);
        assert_eq!(lo, Bucket::Tree { root, head });
        assert_eq!(hi, Bucket::Empty);
    }
}
