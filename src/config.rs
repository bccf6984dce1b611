//! Construction parameters and the table builder.

use crate::bucket::{table_size_for, DEFAULT_LOAD_FACTOR};
use crate::error::TableError;
use crate::observer::{EntryObserver, NoopObserver};
use crate::table::HashTable;
use crate::tie_break::{ByKeyOrd, BySequence, TieBreak};
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use hashbrown::hash_map::DefaultHashBuilder;

/// Sizing parameters for a new table.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TableConfig {
    /// Requested bucket count, rounded up to a power of two and capped at
    /// `MAXIMUM_CAPACITY`. `None` defers to the default of 16.
    pub initial_capacity: Option<usize>,
    /// Fraction of capacity that may fill before the table doubles.
    pub load_factor: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: None,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

impl TableConfig {
    pub fn with_initial_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity: Some(initial_capacity),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TableError> {
        // Also rejects NaN.
        if !(self.load_factor > 0.0) {
            return Err(TableError::InvalidArgument(format!(
                "illegal load factor: {}",
                self.load_factor
            )));
        }
        Ok(())
    }

    /// Threshold to store until the first allocation: the rounded
    /// requested capacity, or zero for the default.
    pub(crate) fn initial_threshold(&self) -> usize {
        self.initial_capacity.map_or(0, table_size_for)
    }
}

/// Builder combining a [`TableConfig`] with a hasher, an observer and the
/// tie-break used inside tree buckets.
pub struct TableBuilder<K, V, S = DefaultHashBuilder, O = NoopObserver, C = BySequence> {
    config: TableConfig,
    hasher: S,
    observer: O,
    tie_break: C,
    _pd: PhantomData<fn() -> (K, V)>,
}

impl<K, V> TableBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            config: TableConfig::default(),
            hasher: DefaultHashBuilder::default(),
            observer: NoopObserver,
            tie_break: BySequence,
            _pd: PhantomData,
        }
    }
}

impl<K, V> Default for TableBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, O, C> TableBuilder<K, V, S, O, C> {
    pub fn config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = Some(capacity);
        self
    }

    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.config.load_factor = load_factor;
        self
    }

    pub fn hasher<S2>(self, hasher: S2) -> TableBuilder<K, V, S2, O, C> {
        TableBuilder {
            config: self.config,
            hasher,
            observer: self.observer,
            tie_break: self.tie_break,
            _pd: PhantomData,
        }
    }

    pub fn observer<O2>(self, observer: O2) -> TableBuilder<K, V, S, O2, C> {
        TableBuilder {
            config: self.config,
            hasher: self.hasher,
            observer,
            tie_break: self.tie_break,
            _pd: PhantomData,
        }
    }

    /// Order equal-hash keys in tree buckets by `K: Ord` instead of by
    /// insertion sequence alone. Hash-tied lookups by any `&Q` with
    /// `Q: Ord` then descend one path instead of scanning the subtree.
    pub fn ordered_keys(self) -> TableBuilder<K, V, S, O, ByKeyOrd>
    where
        K: Ord,
    {
        self.tie_break(ByKeyOrd)
    }

    pub fn tie_break<C2>(self, tie_break: C2) -> TableBuilder<K, V, S, O, C2>
    where
        C2: TieBreak<K>,
    {
        TableBuilder {
            config: self.config,
            hasher: self.hasher,
            observer: self.observer,
            tie_break,
            _pd: PhantomData,
        }
    }

    pub fn build(self) -> Result<HashTable<K, V, S, O, C>, TableError>
    where
        K: Eq + Hash,
        S: BuildHasher,
        O: EntryObserver<K, V>,
        C: TieBreak<K>,
    {
        if let Err(e) = self.config.validate() {
            tracing::warn!(
                load_factor = self.config.load_factor,
                initial_capacity = ?self.config.initial_capacity,
                "rejected table configuration"
            );
            return Err(e);
        }
        Ok(HashTable::from_parts(
            self.config,
            self.hasher,
            self.observer,
            self.tie_break,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = TableConfig::default();
        assert_eq!(c.load_factor, 0.75);
        assert_eq!(c.initial_threshold(), 0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn bad_load_factors_rejected() {
        for lf in [0.0f32, -1.0, f32::NAN] {
            let c = TableConfig {
                initial_capacity: None,
                load_factor: lf,
            };
            assert!(matches!(c.validate(), Err(TableError::InvalidArgument(_))));
        }
    }

    #[test]
    fn requested_capacity_is_rounded() {
        assert_eq!(TableConfig::with_initial_capacity(0).initial_threshold(), 1);
        assert_eq!(TableConfig::with_initial_capacity(20).initial_threshold(), 32);
        assert_eq!(
            TableConfig::with_initial_capacity(usize::MAX).initial_threshold(),
            1 << 30
        );
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let r = TableBuilder::<u32, u32>::new().load_factor(f32::NAN).build();
        assert!(matches!(r, Err(TableError::InvalidArgument(_))));
    }

    #[test]
    fn builder_applies_capacity() {
        let t = TableBuilder::<u32, u32>::new()
            .initial_capacity(100)
            .load_factor(0.5)
            .build()
            .unwrap();
        assert_eq!(t.capacity(), 128);
        assert_eq!(t.load_factor(), 0.5);
    }
}
