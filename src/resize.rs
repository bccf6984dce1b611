//! ResizeEngine: doubles the bucket array and splits every bucket in place.
//!
//! With power-of-two capacities an entry at old index `j` can only move to
//! `j` or `j + old_capacity`, decided by the single hash bit
//! `hash & old_capacity`. Each old bucket is therefore split in one forward
//! pass into a low and a high half, keeping relative order, without ever
//! recomputing a hash.

use crate::bucket::{
    Bucket, BucketArray, DEFAULT_INITIAL_CAPACITY, MAXIMUM_CAPACITY,
};
use crate::node::{KeyOrder, NodeArena, NodeKey};

/// What the next resize should do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Plan {
    /// Already at `MAXIMUM_CAPACITY`; only the threshold is lifted.
    Saturated,
    Grow { capacity: usize, threshold: usize },
}

/// Compute the next capacity and threshold.
///
/// Before the first allocation `threshold` carries the requested initial
/// capacity (zero for "use the default").
pub(crate) fn plan(old_capacity: usize, old_threshold: usize, load_factor: f32) -> Plan {
    let mut new_threshold = 0;
    let new_capacity = if old_capacity > 0 {
        if old_capacity >= MAXIMUM_CAPACITY {
            return Plan::Saturated;
        }
        let doubled = old_capacity << 1;
        if doubled < MAXIMUM_CAPACITY && old_capacity >= DEFAULT_INITIAL_CAPACITY {
            new_threshold = old_threshold.saturating_mul(2);
        }
        doubled
    } else if old_threshold > 0 {
        old_threshold
    } else {
        DEFAULT_INITIAL_CAPACITY
    };

    if new_threshold == 0 {
        let ft = new_capacity as f32 * load_factor;
        new_threshold = if new_capacity < MAXIMUM_CAPACITY && ft < MAXIMUM_CAPACITY as f32 {
            ft as usize
        } else {
            usize::MAX
        };
    }
    Plan::Grow {
        capacity: new_capacity,
        threshold: new_threshold,
    }
}

/// Grow `buckets` per `plan`, redistributing every node.
/// Returns `true` when the capacity changed.
pub(crate) fn resize<K, V>(
    buckets: &mut BucketArray,
    nodes: &mut NodeArena<K, V>,
    threshold: &mut usize,
    load_factor: f32,
    order: KeyOrder<K>,
) -> bool {
    let old_capacity = buckets.capacity();
    match plan(old_capacity, *threshold, load_factor) {
        Plan::Saturated => {
            *threshold = usize::MAX;
            tracing::debug!(capacity = old_capacity, "bucket array at maximum capacity");
            false
        }
        Plan::Grow {
            capacity,
            threshold: new_threshold,
        } => {
            *threshold = new_threshold;
            buckets.grow_to(capacity);
            if old_capacity > 0 {
                split_all(buckets, nodes, old_capacity, order);
            }
            tracing::debug!(
                old_capacity,
                new_capacity = capacity,
                threshold = new_threshold,
                len = nodes.len(),
                "resized bucket array"
            );
            true
        }
    }
}

fn split_all<K, V>(
    buckets: &mut BucketArray,
    nodes: &mut NodeArena<K, V>,
    old_capacity: usize,
    order: KeyOrder<K>,
) {
    for j in 0..old_capacity {
        let (lo, hi) = match buckets.take(j) {
            Bucket::Empty => continue,
            Bucket::Chain(head) => split_chain(nodes, head, old_capacity),
            Bucket::Tree { root, head } => nodes.tree_split(root, head, old_capacity, order),
        };
        buckets.set(j, lo);
        buckets.set(j + old_capacity, hi);
    }
}

/// Partition a chain by `hash & bit`, preserving order within each half.
pub(crate) fn split_chain<K, V>(
    nodes: &mut NodeArena<K, V>,
    head: NodeKey,
    bit: usize,
) -> (Bucket, Bucket) {
    let (mut lo_head, mut lo_tail): (Option<NodeKey>, Option<NodeKey>) = (None, None);
    let (mut hi_head, mut hi_tail): (Option<NodeKey>, Option<NodeKey>) = (None, None);
    let mut cur = Some(head);
    while let Some(e) = cur {
        cur = nodes.next(e);
        let (h, t) = if nodes.node(e).hash as usize & bit == 0 {
            (&mut lo_head, &mut lo_tail)
        } else {
            (&mut hi_head, &mut hi_tail)
        };
        match *t {
            None => *h = Some(e),
            Some(tail) => nodes.set_next(tail, Some(e)),
        }
        *t = Some(e);
    }
    if let Some(t) = lo_tail {
        nodes.set_next(t, None);
    }
    if let Some(t) = hi_tail {
        nodes.set_next(t, None);
    }
    (
        lo_head.map_or(Bucket::Empty, Bucket::Chain),
        hi_head.map_or(Bucket::Empty, Bucket::Chain),
    )
}
