// HashTable property tests (public API).
//
// Property 1: bucket order is never rearranged.
//  - Keys hash by `group` only, so keys of one group always share a bucket.
//  - Invariant: after any put or remove (and whatever resize, treeify or
//    untreeify it caused), the surviving keys of each group appear in the
//    same relative order as before.
//
// Property 2: clone and bulk construction are content-equal.
//  - Invariant: a clone equals the original, a table rebuilt from the
//    original's iterator equals it too, and mutating the clone leaves the
//    original untouched.
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use treebin_hashmap::HashTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Grouped {
    group: u8,
    id: u32,
}
impl Hash for Grouped {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group.hash(state);
    }
}

// Property 1: per-hash relative order is never rearranged.
fn orders_by_group(t: &HashTable<Grouped, ()>) -> BTreeMap<u8, Vec<u32>> {
    let mut out: BTreeMap<u8, Vec<u32>> = BTreeMap::new();
    for (k, _) in t {
        out.entry(k.group).or_default().push(k.id);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_same_hash_keys_keep_relative_order(
        groups in 1u8..4,
        ops in proptest::collection::vec((any::<bool>(), 0u32..80), 1..250),
    ) {
        let mut t: HashTable<Grouped, ()> = HashTable::with_capacity(1);
        let mut live: BTreeSet<u32> = BTreeSet::new();
        let mut last = orders_by_group(&t);
        for (insert, id) in ops {
            let k = Grouped { group: (id % u32::from(groups)) as u8, id };
            if insert {
                prop_assert_eq!(t.put(k, ()).is_none(), live.insert(id));
            } else {
                prop_assert_eq!(t.remove(&k).is_some(), live.remove(&id));
            }
            let now = orders_by_group(&t);
            for (group, before) in &last {
                let after = now.get(group).cloned().unwrap_or_default();
                let kept_before: Vec<u32> =
                    before.iter().copied().filter(|x| after.contains(x)).collect();
                let kept_after: Vec<u32> =
                    after.iter().copied().filter(|x| before.contains(x)).collect();
                prop_assert_eq!(kept_before, kept_after);
            }
            last = now;
        }
        prop_assert!(t.check_invariants().is_ok(), "{:?}", t.check_invariants());
        let seen: BTreeSet<u32> = t.iter().map(|(k, _)| k.id).collect();
        prop_assert_eq!(seen, live);
    }
}

// Property 2: clone, collect and equality agree.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_clone_and_collect_are_equal(
        entries in proptest::collection::vec((0u16..500, any::<i64>()), 0..300),
        extra in 500u16..1000,
    ) {
        let mut original: HashTable<u16, i64> = HashTable::new();
        original.extend(entries.iter().copied());
        let mut copy = original.clone();
        let rebuilt: HashTable<u16, i64> = original.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(&copy, &original);
        prop_assert_eq!(&rebuilt, &original);

        copy.put(extra, 0);
        prop_assert_ne!(&copy, &original);
        prop_assert_eq!(original.get(&extra), None);
        prop_assert_eq!(copy.len(), original.len() + 1);
    }
}
