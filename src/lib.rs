//! treebin-hashmap: a single-threaded chained hash map whose overfull
//! buckets turn into red-black trees, so lookups stay logarithmic even
//! when many keys share a hash.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: predictable worst-case lookups under heavy collisions without
//!   paying for trees in the common case.
//! - Components:
//!   - HashSpreader (`spread`): folds the high half of the 64-bit hash into
//!     the low 32 bits, which are cached per entry and used for addressing.
//!   - BucketArray: power-of-two array of bucket heads, allocated lazily on
//!     the first insertion. Index is `hash & (capacity - 1)`.
//!   - Nodes: every entry lives in one slot of a generational arena
//!     (`slotmap`). Chains and trees link through arena keys.
//!   - TreeBin: a bucket that grew past 8 entries in a table of at least
//!     64 buckets becomes a red-black tree. The entries stay threaded on a
//!     doubly linked list in their original order.
//!   - ResizeEngine: doubles the capacity and splits each bucket into a
//!     low and a high half by one hash bit; trees that get small revert to
//!     chains.
//!   - HashTable: the public map, including the compute family and merge.
//!
//! Constraints
//! - Single-threaded; all mutation goes through `&mut self`.
//! - `K: Hash` is called once per operation. Cached hashes drive resizes
//!   and tree placement afterwards.
//! - Capacity never shrinks; `clear` keeps the bucket array.
//! - Keys and values cannot be "null"; a compute or merge function returns
//!   `None` to request removal.
//!
//! Tree ordering
//! - Tree nodes are ordered by cached hash, then by `K: Ord` when the table
//!   was built with `TableBuilder::ordered_keys`, then by insertion
//!   sequence. The sequence makes the order total, so any key type works.
//! - The tie-break is a type parameter (`BySequence` or `ByKeyOrd`). With
//!   `ByKeyOrd`, lookups through any `&Q` where `Q: Ord` descend a single
//!   path on a full hash tie. With `BySequence` they search both subtrees.
//!
//! Iteration order
//! - Bucket index order, then list order inside a bucket. Treeify,
//!   untreeify, removal and resize never rearrange a bucket's list. Chain
//!   insertions append at the tail; tree insertions link the new node
//!   right after its tree parent. The order across buckets is unspecified
//!   and changes on resize.
//!
//! Fail-fast traversal
//! - Every insertion, removal, clear and capacity change bumps a
//!   modification counter. `Cursor` checks it on each step and reports
//!   `TableError::ConcurrentStructuralChange` on a mismatch.
//!   Overwriting a value is not structural.
//!
//! Notes and non-goals
//! - No concurrent access, no serialization, no shrinking.
//! - No insertion-order or access-order layer; `EntryObserver` gives such
//!   a layer the hooks it needs.

mod bucket;
mod config;
mod cursor;
mod error;
mod iter;
mod node;
mod observer;
mod resize;
mod spread;
mod table;
mod table_proptest;
mod tie_break;
mod tree;

// Public surface
pub use bucket::{
    table_size_for, DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY,
    MIN_TREEIFY_CAPACITY, TREEIFY_THRESHOLD, UNTREEIFY_THRESHOLD,
};
pub use config::{TableBuilder, TableConfig};
pub use cursor::Cursor;
pub use error::TableError;
pub use iter::{Iter, IterMut};
pub use observer::{EntryObserver, NoopObserver};
pub use spread::spread;
pub use table::HashTable;
pub use tie_break::{ByKeyOrd, BySequence, QueryOrder, TieBreak};
