//! HashTable: get/put/remove and the compute family over chained and
//! treeified buckets.

use crate::bucket::{
    Bucket, BucketArray, DEFAULT_INITIAL_CAPACITY, MAXIMUM_CAPACITY, MIN_TREEIFY_CAPACITY,
    TREEIFY_THRESHOLD,
};
use crate::config::{TableBuilder, TableConfig};
use crate::error::TableError;
use crate::iter::{Iter, IterMut};
use crate::node::{key_matches, KeyOrder, NodeArena, NodeKey};
use crate::observer::{EntryObserver, NoopObserver};
use crate::resize;
use crate::spread::spread_key;
use crate::tie_break::{BySequence, QueryOrder, TieBreak};
use crate::tree::TreePut;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// Single-threaded hash map with chained buckets that escalate into
/// red-black trees when they overflow.
///
/// `C` decides how hash-tied keys are ordered inside a tree bucket; see
/// [`TableBuilder::ordered_keys`].
#[derive(Clone)]
pub struct HashTable<K, V, S = DefaultHashBuilder, O = NoopObserver, C = BySequence> {
    pub(crate) hash_builder: S,
    pub(crate) nodes: NodeArena<K, V>,
    pub(crate) buckets: BucketArray,
    /// Next size at which to grow; the requested capacity before allocation.
    pub(crate) threshold: usize,
    pub(crate) load_factor: f32,
    pub(crate) mod_count: u64,
    /// Placement order derived from `tie_break`, cached for the tree code.
    pub(crate) key_order: KeyOrder<K>,
    pub(crate) tie_break: C,
    pub(crate) observer: O,
}

impl<K, V> HashTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }

    pub fn with_capacity_and_load_factor(
        capacity: usize,
        load_factor: f32,
    ) -> Result<Self, TableError> {
        Self::builder()
            .initial_capacity(capacity)
            .load_factor(load_factor)
            .build()
    }

    pub fn builder() -> TableBuilder<K, V> {
        TableBuilder::new()
    }
}

impl<K, V> Default for HashTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_parts(TableConfig::default(), hasher, NoopObserver, BySequence)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::from_parts(
            TableConfig::with_initial_capacity(capacity),
            hasher,
            NoopObserver,
            BySequence,
        )
    }
}

impl<K, V, S, O, C> HashTable<K, V, S, O, C>
where
    C: TieBreak<K>,
{
    pub(crate) fn from_parts(
        config: TableConfig,
        hash_builder: S,
        observer: O,
        tie_break: C,
    ) -> Self {
        Self {
            hash_builder,
            nodes: NodeArena::new(),
            buckets: BucketArray::new(),
            threshold: config.initial_threshold(),
            load_factor: config.load_factor,
            mod_count: 0,
            key_order: tie_break.key_order(),
            tie_break,
            observer,
        }
    }
}

// Accessors that need no trait bounds.
impl<K, V, S, O, C> HashTable<K, V, S, O, C> {

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Bucket count; before the first insertion, the count that will be allocated.
    pub fn capacity(&self) -> usize {
        if self.buckets.is_allocated() {
            self.buckets.capacity()
        } else if self.threshold > 0 {
            self.threshold
        } else {
            DEFAULT_INITIAL_CAPACITY
        }
    }

    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    /// Count of structural modifications so far.
    pub fn modification_count(&self) -> u64 {
        self.mod_count
    }

    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.nodes, &self.buckets)
    }

    /// Mutable iteration in unspecified order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.nodes)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.iter().any(|(_, v)| v == value)
    }

    pub(crate) fn check_mod_count(&self, expected: u64) -> Result<(), TableError> {
        if self.mod_count == expected {
            Ok(())
        } else {
            Err(TableError::ConcurrentStructuralChange {
                expected,
                actual: self.mod_count,
            })
        }
    }

    /// Verify addressing, counts and every tree bucket's red-black shape.
    pub fn check_invariants(&self) -> Result<(), TableError> {
        let fail = |msg: String| Err(TableError::InvariantViolation(msg));
        let capacity = self.buckets.capacity();
        if !self.buckets.is_allocated() {
            return if self.nodes.len() == 0 {
                Ok(())
            } else {
                fail("entries stored without a bucket array".into())
            };
        }
        if !capacity.is_power_of_two() || capacity > MAXIMUM_CAPACITY {
            return fail(format!("capacity {capacity} is not a power of two in range"));
        }
        let mut total = 0;
        for (index, bucket) in self.buckets.iter().enumerate() {
            for k in self.nodes.walk(bucket.head()) {
                let node = self.nodes.node(k);
                if self.buckets.index_of(node.hash) != index {
                    return fail(format!("entry with hash {:#x} stored in bucket {index}", node.hash));
                }
                if node.tree.is_some() != bucket.is_tree() {
                    return fail(format!("bucket {index} mixes chain and tree nodes"));
                }
                total += 1;
            }
            if let Bucket::Tree { root, head } = bucket {
                self.nodes
                    .check_tree(root, head, self.key_order)
                    .map_err(|e| TableError::InvariantViolation(format!("bucket {index}: {e}")))?;
            }
        }
        if total != self.nodes.len() {
            return fail(format!(
                "buckets reach {total} entries but {} are stored",
                self.nodes.len()
            ));
        }
        Ok(())
    }
}

impl<K, V, S, O, C> HashTable<K, V, S, O, C>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: EntryObserver<K, V>,
    C: TieBreak<K>,
{
    // ---- lookup ----

    fn hash_of<Q>(&self, key: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        spread_key(&self.hash_builder, key)
    }

    /// Locate the node for `key`. On a hash tie inside a tree bucket the
    /// table's key order, if any, picks the side to descend.
    fn find_node<Q>(&self, hash: u32, key: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        C: QueryOrder<K, Q>,
    {
        match self.buckets.bucket_for(hash) {
            Bucket::Empty => None,
            Bucket::Tree { root, .. } => {
                let by_order = |pk: &K| self.tie_break.compare(key, pk);
                let probe = self
                    .key_order
                    .is_some()
                    .then_some(&by_order as &dyn Fn(&K) -> Ordering);
                self.nodes.tree_find(Some(root), hash, key, probe)
            }
            Bucket::Chain(head) => self.nodes.walk(Some(head)).find(|&k| {
                let n = self.nodes.node(k);
                n.hash == hash && key_matches(&n.key, key)
            }),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
    {
        let k = self.find_node(self.hash_of(key), key)?;
        Some(&self.nodes.node(k).value)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
    {
        let k = self.find_node(self.hash_of(key), key)?;
        let n = self.nodes.node(k);
        Some((&n.key, &n.value))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
    {
        let k = self.find_node(self.hash_of(key), key)?;
        Some(&mut self.nodes.node_mut(k).value)
    }

    /// The mapped value, or `default` when absent.
    pub fn get_or_default<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
    {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
    {
        self.find_node(self.hash_of(key), key).is_some()
    }

    // ---- insertion ----

    /// Insert a fresh node, or hand `value` back with the node already
    /// holding `key`.
    fn insert_node(&mut self, hash: u32, key: K, value: V) -> Result<NodeKey, (NodeKey, V)> {
        if !self.buckets.is_allocated() {
            self.resize();
        }
        let index = self.buckets.index_of(hash);
        let inserted = match self.buckets.get(index) {
            Bucket::Empty => {
                let k = self.nodes.alloc(hash, key, value, None);
                self.buckets.set(index, Bucket::Chain(k));
                k
            }
            Bucket::Tree { root, head } => {
                match self.nodes.tree_put(root, hash, key, value, self.key_order) {
                    TreePut::Existing(k, value) => return Err((k, value)),
                    TreePut::Inserted { node, root } => {
                        self.buckets.set(index, Bucket::Tree { root, head });
                        node
                    }
                }
            }
            Bucket::Chain(head) => {
                let mut tail = head;
                let mut bin_count = 0;
                loop {
                    let n = self.nodes.node(tail);
                    if n.hash == hash && key_matches(&n.key, &key) {
                        return Err((tail, value));
                    }
                    match n.next {
                        Some(next) => {
                            tail = next;
                            bin_count += 1;
                        }
                        None => break,
                    }
                }
                let k = self.nodes.alloc(hash, key, value, None);
                self.nodes.set_next(tail, Some(k));
                if bin_count >= TREEIFY_THRESHOLD - 1 {
                    self.treeify_bin(hash);
                }
                k
            }
        };

        self.mod_count += 1;
        if self.nodes.len() > self.threshold {
            self.resize();
        }
        let n = self.nodes.node(inserted);
        self.observer.after_insertion(&n.key, &n.value);
        Ok(inserted)
    }

    /// Overfull chain at `hash`: grow a small table, otherwise build a tree.
    fn treeify_bin(&mut self, hash: u32) {
        if self.buckets.capacity() < MIN_TREEIFY_CAPACITY {
            self.resize();
            return;
        }
        let index = self.buckets.index_of(hash);
        if let Bucket::Chain(head) = self.buckets.get(index) {
            let root = self.nodes.chain_to_tree(head, self.key_order);
            self.buckets.set(index, Bucket::Tree { root, head });
            tracing::trace!(index, "treeified bucket");
        }
    }

    fn resize(&mut self) {
        let grew = resize::resize(
            &mut self.buckets,
            &mut self.nodes,
            &mut self.threshold,
            self.load_factor,
            self.key_order,
        );
        if grew {
            self.mod_count += 1;
        }
    }

    fn overwrite(&mut self, k: NodeKey, value: V) -> V {
        let n = self.nodes.node_mut(k);
        let old = core::mem::replace(&mut n.value, value);
        self.observer.after_access(&n.key, &n.value);
        old
    }

    /// Map `key` to `value`, returning the previous value.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_of(&key);
        match self.insert_node(hash, key, value) {
            Ok(_) => None,
            Err((k, value)) => Some(self.overwrite(k, value)),
        }
    }

    /// Alias of [`put`](Self::put).
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.put(key, value)
    }

    /// Insert only when `key` is absent. Returns the value already mapped
    /// (leaving it unchanged) or `None` after inserting.
    pub fn put_if_absent(&mut self, key: K, value: V) -> Option<&mut V> {
        let hash = self.hash_of(&key);
        match self.insert_node(hash, key, value) {
            Ok(_) => None,
            Err((k, _)) => {
                let n = self.nodes.node_mut(k);
                self.observer.after_access(&n.key, &n.value);
                Some(&mut n.value)
            }
        }
    }

    /// Replace the value of an existing mapping.
    pub fn replace<Q>(&mut self, key: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
    {
        let k = self.find_node(self.hash_of(key), key)?;
        Some(self.overwrite(k, value))
    }

    /// Replace only when `key` is currently mapped to `expected`.
    pub fn replace_if<Q>(&mut self, key: &Q, expected: &V, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
        V: PartialEq,
    {
        match self.find_node(self.hash_of(key), key) {
            Some(k) if self.nodes.node(k).value == *expected => {
                self.overwrite(k, value);
                true
            }
            _ => false,
        }
    }

    // ---- removal ----

    /// Unlink and free a live node.
    pub(crate) fn remove_known(&mut self, k: NodeKey) -> (K, V) {
        let index = self.buckets.index_of(self.nodes.node(k).hash);
        match self.buckets.get(index) {
            Bucket::Tree { root, head } => {
                let shape = self.nodes.tree_remove(root, head, k, self.key_order);
                self.buckets.set(index, shape);
            }
            Bucket::Chain(head) => {
                let next = self.nodes.next(k);
                if head == k {
                    self.buckets
                        .set(index, next.map_or(Bucket::Empty, Bucket::Chain));
                } else {
                    let pred = self
                        .nodes
                        .walk(Some(head))
                        .find(|&p| self.nodes.next(p) == Some(k))
                        .expect("chain node must be reachable from its bucket head");
                    self.nodes.set_next(pred, next);
                }
            }
            Bucket::Empty => unreachable!("live node addressed to an empty bucket"),
        }
        self.mod_count += 1;
        let node = self.nodes.free(k);
        self.observer.after_removal(&node.key, &node.value);
        (node.key, node.value)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
    {
        let k = self.find_node(self.hash_of(key), key)?;
        Some(self.remove_known(k))
    }

    /// Remove only when `key` is currently mapped to `expected`.
    pub fn remove_if<Q>(&mut self, key: &Q, expected: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
        V: PartialEq,
    {
        match self.find_node(self.hash_of(key), key) {
            Some(k) if self.nodes.node(k).value == *expected => {
                self.remove_known(k);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.mod_count += 1;
        self.nodes.clear();
        self.buckets.clear();
    }

    /// Keep only the entries for which `keep` returns `true`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let doomed: Vec<NodeKey> = self
            .nodes
            .iter_mut()
            .filter_map(|(k, n)| (!keep(&n.key, &mut n.value)).then_some(k))
            .collect();
        for k in doomed {
            self.remove_known(k);
        }
    }

    // ---- compute family ----

    /// Return the mapped value, or insert `f(&key)` when absent. `None`
    /// from `f` leaves the table unchanged.
    pub fn compute_if_absent<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K) -> Option<V>,
        C: QueryOrder<K, K>,
    {
        let hash = self.hash_of(&key);
        let k = match self.find_node(hash, &key) {
            Some(k) => {
                let n = self.nodes.node(k);
                self.observer.after_access(&n.key, &n.value);
                k
            }
            None => {
                let value = f(&key)?;
                match self.insert_node(hash, key, value) {
                    Ok(k) | Err((k, _)) => k,
                }
            }
        };
        Some(&mut self.nodes.node_mut(k).value)
    }

    /// Remap an existing value; `None` from `f` removes the mapping.
    pub fn compute_if_present<Q, F>(&mut self, key: &Q, f: F) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        C: QueryOrder<K, Q>,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let k = self.find_node(self.hash_of(key), key)?;
        let remapped = {
            let n = self.nodes.node(k);
            f(&n.key, &n.value)
        };
        self.commit(k, remapped)
    }

    /// Remap the value for `key`, present or not. `None` from `f` removes
    /// an existing mapping and is a no-op for an absent one.
    pub fn compute<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
        C: QueryOrder<K, K>,
    {
        let hash = self.hash_of(&key);
        match self.find_node(hash, &key) {
            Some(k) => {
                let remapped = {
                    let n = self.nodes.node(k);
                    f(&n.key, Some(&n.value))
                };
                self.commit(k, remapped)
            }
            None => {
                let value = f(&key, None)?;
                let k = match self.insert_node(hash, key, value) {
                    Ok(k) | Err((k, _)) => k,
                };
                Some(&mut self.nodes.node_mut(k).value)
            }
        }
    }

    /// Store `value` when `key` is absent, otherwise replace the mapping
    /// with `f(old, value)`; `None` from `f` removes it.
    pub fn merge<F>(&mut self, key: K, value: V, f: F) -> Option<&mut V>
    where
        F: FnOnce(&V, V) -> Option<V>,
        C: QueryOrder<K, K>,
    {
        let hash = self.hash_of(&key);
        match self.find_node(hash, &key) {
            Some(k) => {
                let merged = f(&self.nodes.node(k).value, value);
                self.commit(k, merged)
            }
            None => {
                let k = match self.insert_node(hash, key, value) {
                    Ok(k) | Err((k, _)) => k,
                };
                Some(&mut self.nodes.node_mut(k).value)
            }
        }
    }

    /// Store a remapped value, or remove the node for `None`.
    fn commit(&mut self, k: NodeKey, remapped: Option<V>) -> Option<&mut V> {
        match remapped {
            Some(v) => {
                self.overwrite(k, v);
                Some(&mut self.nodes.node_mut(k).value)
            }
            None => {
                self.remove_known(k);
                None
            }
        }
    }

    // ---- traversal ----

    /// Visit every entry in bucket order, failing fast if the structure
    /// changes underneath the traversal.
    pub fn for_each<F>(&self, mut f: F) -> Result<(), TableError>
    where
        F: FnMut(&K, &V),
    {
        let mut cursor = self.cursor();
        while let Some((k, v)) = cursor.next(self)? {
            f(k, v);
        }
        Ok(())
    }

    /// Rewrite every value in place.
    pub fn replace_all<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V),
    {
        for (k, v) in self.iter_mut() {
            f(k, v);
        }
    }

    /// Pre-size for `additional` entries the way bulk copies do: before the
    /// first allocation, raise the deferred capacity; afterwards, grow once
    /// if `additional` alone exceeds the threshold.
    fn reserve_for_bulk(&mut self, additional: usize) {
        if additional == 0 {
            return;
        }
        if !self.buckets.is_allocated() {
            let ft = additional as f32 / self.load_factor + 1.0;
            let t = if ft < MAXIMUM_CAPACITY as f32 {
                ft as usize
            } else {
                MAXIMUM_CAPACITY
            };
            if t > self.threshold {
                self.threshold = crate::bucket::table_size_for(t);
            }
        } else if additional > self.threshold {
            self.resize();
        }
    }
}

impl<K, V, S, O, C> Extend<(K, V)> for HashTable<K, V, S, O, C>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: EntryObserver<K, V>,
    C: TieBreak<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve_for_bulk(iter.size_hint().0);
        for (k, v) in iter {
            self.put(k, v);
        }
    }
}

impl<K, V, S, O, C> FromIterator<(K, V)> for HashTable<K, V, S, O, C>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    O: EntryObserver<K, V> + Default,
    C: TieBreak<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = HashTable::from_parts(
            TableConfig::default(),
            S::default(),
            O::default(),
            C::default(),
        );
        table.extend(iter);
        table
    }
}

impl<K, V, S, O, C> PartialEq for HashTable<K, V, S, O, C>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
    O: EntryObserver<K, V>,
    C: QueryOrder<K, K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S, O, C> Eq for HashTable<K, V, S, O, C>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
    O: EntryObserver<K, V>,
    C: QueryOrder<K, K>,
{
}

impl<K, V, S, O, C> fmt::Debug for HashTable<K, V, S, O, C>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, S, O, C> IntoIterator for &'a HashTable<K, V, S, O, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
