//! How tree buckets tell apart keys whose cached hashes are equal.
//!
//! A table is generic over its tie-break. [`BySequence`] orders hash-tied
//! keys by insertion sequence, which works for any key type but gives a
//! lookup no way to choose a side, so it searches both subtrees.
//! [`ByKeyOrd`] orders them by `K: Ord`, and lookups through any borrowed
//! form `Q: Ord` descend a single path.

use core::borrow::Borrow;
use core::cmp::Ordering;

/// Placement order for hash-tied keys in a tree bucket.
pub trait TieBreak<K> {
    /// Total order over stored keys, or `None` to fall back to insertion
    /// sequence alone.
    fn key_order(&self) -> Option<fn(&K, &K) -> Ordering>;
}

/// Lookup side of a [`TieBreak`] for queries of type `Q`.
///
/// Must agree with [`TieBreak::key_order`]. `Ordering::Equal` means the
/// query cannot be placed relative to `stored`.
pub trait QueryOrder<K, Q: ?Sized>: TieBreak<K> {
    fn compare(&self, query: &Q, stored: &K) -> Ordering;
}

/// Hash-tied keys stay in insertion sequence. The default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BySequence;

impl<K> TieBreak<K> for BySequence {
    fn key_order(&self) -> Option<fn(&K, &K) -> Ordering> {
        None
    }
}

impl<K, Q: ?Sized> QueryOrder<K, Q> for BySequence {
    fn compare(&self, _query: &Q, _stored: &K) -> Ordering {
        Ordering::Equal
    }
}

/// Hash-tied keys are ordered by `K: Ord`. Selected with
/// [`TableBuilder::ordered_keys`](crate::TableBuilder::ordered_keys).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ByKeyOrd;

impl<K: Ord> TieBreak<K> for ByKeyOrd {
    fn key_order(&self) -> Option<fn(&K, &K) -> Ordering> {
        let cmp: fn(&K, &K) -> Ordering = K::cmp;
        Some(cmp)
    }
}

// `K: Borrow<Q>` requires `Q`'s order to match `K`'s.
impl<K, Q> QueryOrder<K, Q> for ByKeyOrd
where
    K: Ord + Borrow<Q>,
    Q: ?Sized + Ord,
{
    fn compare(&self, query: &Q, stored: &K) -> Ordering {
        query.cmp(stored.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_never_decides() {
        assert!(TieBreak::<u32>::key_order(&BySequence).is_none());
        assert_eq!(QueryOrder::<u32, u32>::compare(&BySequence, &1, &2), Ordering::Equal);
    }

    #[test]
    fn key_ord_agrees_between_owned_and_borrowed_forms() {
        let cmp = TieBreak::<String>::key_order(&ByKeyOrd).unwrap();
        let (a, b) = ("apple".to_string(), "pear".to_string());
        assert_eq!(cmp(&a, &b), Ordering::Less);
        assert_eq!(QueryOrder::<String, str>::compare(&ByKeyOrd, "pear", &a), Ordering::Greater);
        assert_eq!(QueryOrder::<String, str>::compare(&ByKeyOrd, "pear", &b), Ordering::Equal);
    }
}
