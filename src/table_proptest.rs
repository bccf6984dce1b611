#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can reach the
// bucket layout and the invariant checker.

use crate::bucket::MIN_TREEIFY_CAPACITY;
use crate::observer::NoopObserver;
use crate::table::tests::Colliding;
use crate::tie_break::QueryOrder;
use crate::HashTable;
use hashbrown::hash_map::DefaultHashBuilder;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hasher};

/// Keeps two bits of the key so a few dozen keys pile into four hash
/// values and force tree buckets.
#[derive(Clone, Default)]
struct NarrowBuildHasher;
struct NarrowHasher(u64);
impl BuildHasher for NarrowBuildHasher {
    type Hasher = NarrowHasher;
    fn build_hasher(&self) -> Self::Hasher {
        NarrowHasher(0)
    }
}
impl Hasher for NarrowHasher {
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = self.0.wrapping_mul(31).wrapping_add(u64::from(*b));
        }
    }
    fn finish(&self) -> u64 {
        (self.0 & 0b11) << 3
    }
}

#[derive(Clone, Debug)]
enum Op {
    Put(u32, i32),
    PutIfAbsent(u32, i32),
    Remove(u32),
    RemoveIf(u32, i32),
    Replace(u32, i32),
    ComputeIfAbsent(u32, Option<i32>),
    ComputeIfPresent(u32, Option<i32>),
    Compute(u32, Option<i32>),
    Merge(u32, i32),
    Get(u32),
    Retain(i32),
    CursorDrainOdd,
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let key = 0u32..48;
    let val = -20i32..20;
    let maybe = proptest::option::weighted(0.8, val.clone());
    let op = prop_oneof![
        6 => (key.clone(), val.clone()).prop_map(|(k, v)| Op::Put(k, v)),
        2 => (key.clone(), val.clone()).prop_map(|(k, v)| Op::PutIfAbsent(k, v)),
        3 => key.clone().prop_map(Op::Remove),
        1 => (key.clone(), val.clone()).prop_map(|(k, v)| Op::RemoveIf(k, v)),
        1 => (key.clone(), val.clone()).prop_map(|(k, v)| Op::Replace(k, v)),
        2 => (key.clone(), maybe.clone()).prop_map(|(k, v)| Op::ComputeIfAbsent(k, v)),
        2 => (key.clone(), maybe.clone()).prop_map(|(k, v)| Op::ComputeIfPresent(k, v)),
        2 => (key.clone(), maybe).prop_map(|(k, v)| Op::Compute(k, v)),
        2 => (key.clone(), val.clone()).prop_map(|(k, v)| Op::Merge(k, v)),
        2 => key.prop_map(Op::Get),
        1 => Just(Op::CursorDrainOdd),
        1 => val.prop_map(Op::Retain),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..200)
}

fn run_against_model<S: BuildHasher, C: QueryOrder<u32, u32>>(
    mut sut: HashTable<u32, i32, S, NoopObserver, C>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<u32, i32> = HashMap::new();
    for op in ops {
        match op {
            Op::Put(k, v) => {
                prop_assert_eq!(sut.put(k, v), model.insert(k, v));
            }
            Op::PutIfAbsent(k, v) => {
                let prior = sut.put_if_absent(k, v).map(|x| *x);
                prop_assert_eq!(prior, model.get(&k).copied());
                model.entry(k).or_insert(v);
            }
            Op::Remove(k) => {
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
            }
            Op::RemoveIf(k, v) => {
                let hit = model.get(&k) == Some(&v);
                prop_assert_eq!(sut.remove_if(&k, &v), hit);
                if hit {
                    model.remove(&k);
                }
            }
            Op::Replace(k, v) => {
                let expected = model.get_mut(&k).map(|slot| std::mem::replace(slot, v));
                prop_assert_eq!(sut.replace(&k, v), expected);
            }
            Op::ComputeIfAbsent(k, v) => {
                let got = sut.compute_if_absent(k, |_| v).map(|x| *x);
                if !model.contains_key(&k) {
                    if let Some(v) = v {
                        model.insert(k, v);
                    }
                }
                prop_assert_eq!(got, model.get(&k).copied());
            }
            Op::ComputeIfPresent(k, v) => {
                let got = sut.compute_if_present(&k, |_, _| v).map(|x| *x);
                if model.contains_key(&k) {
                    match v {
                        Some(v) => {
                            model.insert(k, v);
                        }
                        None => {
                            model.remove(&k);
                        }
                    }
                }
                prop_assert_eq!(got, model.get(&k).copied());
            }
            Op::Compute(k, v) => {
                let got = sut
                    .compute(k, |_, old| v.map(|v| old.map_or(v, |o| o.wrapping_add(v))))
                    .map(|x| *x);
                match v {
                    Some(v) => {
                        let slot = model.entry(k).or_insert(0);
                        *slot = slot.wrapping_add(v);
                    }
                    None => {
                        model.remove(&k);
                    }
                }
                prop_assert_eq!(got, model.get(&k).copied());
            }
            Op::Merge(k, v) => {
                // Merging to zero removes.
                let got = sut
                    .merge(k, v, |a, b| Some(a.wrapping_add(b)).filter(|s| *s != 0))
                    .map(|x| *x);
                match model.get(&k).copied() {
                    None => {
                        model.insert(k, v);
                    }
                    Some(old) => {
                        let s = old.wrapping_add(v);
                        if s == 0 {
                            model.remove(&k);
                        } else {
                            model.insert(k, s);
                        }
                    }
                }
                prop_assert_eq!(got, model.get(&k).copied());
            }
            Op::Get(k) => {
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            Op::Retain(floor) => {
                sut.retain(|_, v| *v >= floor);
                model.retain(|_, v| *v >= floor);
            }
            Op::CursorDrainOdd => {
                let mut cursor = sut.cursor();
                let mut doomed = Vec::new();
                loop {
                    let odd = match cursor.next(&sut) {
                        Ok(Some((k, _))) => k % 2 == 1,
                        Ok(None) => break,
                        Err(e) => return Err(TestCaseError::fail(e.to_string())),
                    };
                    if odd {
                        let (k, _) = cursor
                            .remove(&mut sut)
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        doomed.push(k);
                    }
                }
                for k in doomed {
                    prop_assert!(model.remove(&k).is_some());
                }
                prop_assert!(model.keys().all(|k| k % 2 == 0));
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert!(sut.check_invariants().is_ok(), "{:?}", sut.check_invariants());
    }

    let seen: BTreeMap<u32, i32> = sut.iter().map(|(k, v)| (*k, *v)).collect();
    let expected: BTreeMap<u32, i32> = model.into_iter().collect();
    prop_assert_eq!(seen, expected);
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Every operation returns what the model predicts.
// - `len` parity and structural invariants hold after each step.
// - Iteration yields exactly the model's entries.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_default_hasher(ops in arb_ops()) {
        run_against_model(HashTable::<u32, i32>::with_capacity(1), ops)?;
    }

    // Four distinct hashes: buckets treeify, split and untreeify constantly.
    #[test]
    fn prop_state_machine_narrow_hasher(ops in arb_ops()) {
        run_against_model(HashTable::with_hasher(NarrowBuildHasher), ops)?;
    }

    // Same, with hash ties inside trees resolved by key order.
    #[test]
    fn prop_state_machine_narrow_hasher_ordered(ops in arb_ops()) {
        let sut = HashTable::<u32, i32>::builder()
            .hasher(NarrowBuildHasher)
            .ordered_keys()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        run_against_model(sut, ops)?;
    }
}

fn drive_colliding_bucket<C: QueryOrder<Colliding, Colliding>>(
    mut sut: HashTable<Colliding, u32, DefaultHashBuilder, NoopObserver, C>,
    ops: Vec<(bool, u32)>,
) -> Result<(), TestCaseError> {
    let mut model = BTreeMap::new();
    for (insert, id) in ops {
        if insert {
            prop_assert_eq!(sut.put(Colliding(id), id), model.insert(id, id));
        } else {
            prop_assert_eq!(sut.remove(&Colliding(id)), model.remove(&id));
        }
        prop_assert!(sut.check_invariants().is_ok(), "{:?}", sut.check_invariants());
        prop_assert_eq!(sut.len(), model.len());
    }
    for id in 0..64 {
        prop_assert_eq!(sut.get(&Colliding(id)), model.get(&id));
    }
    Ok(())
}

// Property: one fully colliding bucket stays a valid red-black tree (or a
// short chain) through arbitrary insert/delete interleavings, with and
// without key ordering.
proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]
    #[test]
    fn prop_colliding_bucket_stays_balanced(
        ops in proptest::collection::vec((any::<bool>(), 0u32..64), 1..300),
        ordered in any::<bool>(),
    ) {
        let builder = HashTable::<Colliding, u32>::builder().initial_capacity(MIN_TREEIFY_CAPACITY);
        let fail = |e: crate::TableError| TestCaseError::fail(e.to_string());
        if ordered {
            drive_colliding_bucket(builder.ordered_keys().build().map_err(fail)?, ops)?;
        } else {
            drive_colliding_bucket(builder.build().map_err(fail)?, ops)?;
        }
    }
}
