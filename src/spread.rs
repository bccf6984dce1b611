//! HashSpreader: folds high hash bits into the low bits used for addressing.

use core::hash::{BuildHasher, Hash};

/// Fold the upper half of a 64-bit hash into its lower half.
///
/// Bucket addressing only looks at the low bits (`hash & (capacity - 1)`),
/// so variation confined to the high bits would otherwise never separate
/// keys. Already well-mixed hashes are not made worse by the xor.
#[inline]
pub fn spread(raw: u64) -> u32 {
    (raw ^ (raw >> 32)) as u32
}

/// Hash `key` with `builder` and spread the result.
#[inline]
pub(crate) fn spread_key<S, Q>(builder: &S, key: &Q) -> u32
where
    S: BuildHasher,
    Q: ?Sized + Hash,
{
    spread(builder.hash_one(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_bits_reach_low_half() {
        let a = spread(0x0000_0001_0000_0000);
        let b = spread(0x0000_0002_0000_0000);
        assert_ne!(a & 0xF, b & 0xF);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn low_only_hashes_pass_through() {
        for h in [0u64, 1, 7, 0xFFFF_FFFF] {
            assert_eq!(spread(h), h as u32);
        }
    }

    #[test]
    fn equal_halves_cancel() {
        assert_eq!(spread(0xDEAD_BEEF_DEAD_BEEF), 0);
    }
}
