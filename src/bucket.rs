//! BucketArray: power-of-two array of bucket heads and its addressing rules.

use crate::node::NodeKey;

/// Capacity used when none was requested.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1 << 4;
/// Largest bucket count the table grows to.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;
/// Chain length (counted past the head) at which a bucket becomes a tree.
pub const TREEIFY_THRESHOLD: usize = 8;
/// Split halves at or below this size revert to chains.
pub const UNTREEIFY_THRESHOLD: usize = 6;
/// Below this capacity an overfull chain grows the table instead.
pub const MIN_TREEIFY_CAPACITY: usize = 64;

/// Head of one bucket.
///
/// Both non-empty forms thread their entries through `Node::next`, so a
/// bucket can always be walked as a list from `head`. A tree bucket
/// additionally records its red-black root, which may be any node of the
/// list.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum Bucket {
    #[default]
    Empty,
    Chain(NodeKey),
    Tree { root: NodeKey, head: NodeKey },
}

impl Bucket {
    /// First node in list order, if any.
    #[inline]
    pub(crate) fn head(self) -> Option<NodeKey> {
        match self {
            Bucket::Empty => None,
            Bucket::Chain(head) => Some(head),
            Bucket::Tree { head, .. } => Some(head),
        }
    }

    #[inline]
    pub(crate) fn is_tree(self) -> bool {
        matches!(self, Bucket::Tree { .. })
    }
}

/// Round a requested capacity up to a power of two in `[1, MAXIMUM_CAPACITY]`.
pub fn table_size_for(requested: usize) -> usize {
    if requested >= MAXIMUM_CAPACITY {
        MAXIMUM_CAPACITY
    } else {
        requested.max(1).next_power_of_two()
    }
}

#[inline]
pub(crate) fn index_of(hash: u32, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    hash as usize & (capacity - 1)
}

/// Bucket heads; length is zero until the first insertion, a power of two after.
#[derive(Clone, Debug, Default)]
pub(crate) struct BucketArray {
    slots: Vec<Bucket>,
}

impl BucketArray {
    pub(crate) const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        !self.slots.is_empty()
    }

    #[inline]
    pub(crate) fn index_of(&self, hash: u32) -> usize {
        index_of(hash, self.capacity())
    }

    /// Bucket that `hash` addresses, `Empty` when unallocated.
    #[inline]
    pub(crate) fn bucket_for(&self, hash: u32) -> Bucket {
        if self.is_allocated() {
            self.slots[self.index_of(hash)]
        } else {
            Bucket::Empty
        }
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Bucket {
        self.slots[index]
    }

    #[inline]
    pub(crate) fn set(&mut self, index: usize, bucket: Bucket) {
        self.slots[index] = bucket;
    }

    #[inline]
    pub(crate) fn take(&mut self, index: usize) -> Bucket {
        core::mem::take(&mut self.slots[index])
    }

    /// Extend to `new_capacity` empty-padded slots, keeping existing heads in place.
    pub(crate) fn grow_to(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity.is_power_of_two() && new_capacity >= self.capacity());
        self.slots.resize(new_capacity, Bucket::Empty);
    }

    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(|b| *b = Bucket::Empty);
    }

    /// Index of the first non-empty bucket at or after `from`.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<(usize, NodeKey)> {
        self.slots
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, b)| b.head().map(|h| (i, h)))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Bucket> + '_ {
        self.slots.iter().copied()
    }
}
