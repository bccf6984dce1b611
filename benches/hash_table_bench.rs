use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::hash::{BuildHasher, Hasher};
use std::time::Duration;
use treebin_hashmap::HashTable;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

// Every key lands in one bucket; exercises the tree path.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        7
    }
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("hash_table_insert_10k", |b| {
        b.iter_batched(
            HashTable::<String, u64>::new,
            |mut t| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    t.put(key(x), i as u64);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("hash_table_get_hit", |b| {
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        let t: HashTable<String, u64> = keys
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, k)| (k, i as u64))
            .collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(t.get(k.as_str()));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("hash_table_get_miss", |b| {
        let t: HashTable<String, u64> = lcg(11)
            .take(10_000)
            .enumerate()
            .map(|(i, x)| (key(x), i as u64))
            .collect();
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(t.get(&k));
        })
    });
}

fn bench_remove_reinsert(c: &mut Criterion) {
    c.bench_function("hash_table_remove_reinsert", |b| {
        let keys: Vec<_> = lcg(13).take(10_000).map(key).collect();
        let mut t: HashTable<String, u64> =
            keys.iter().cloned().map(|k| (k, 0)).collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            let v = t.remove(k.as_str()).unwrap();
            t.put(k.clone(), v + 1);
        })
    });
}

fn bench_colliding_get(c: &mut Criterion) {
    c.bench_function("hash_table_colliding_get_1k", |b| {
        let mut t = HashTable::with_hasher(ConstBuildHasher);
        for x in lcg(17).take(1_000) {
            t.put(x, x);
        }
        let keys: Vec<u64> = lcg(17).take(1_000).collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(t.get(k));
        })
    });
}

fn bench_merge_counts(c: &mut Criterion) {
    c.bench_function("hash_table_merge_counts", |b| {
        let words: Vec<_> = lcg(19).take(50_000).map(|x| key(x % 2_000)).collect();
        b.iter_batched(
            HashTable::<String, u64>::new,
            |mut t| {
                for w in &words {
                    t.merge(w.clone(), 1, |a, b| Some(a + b));
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_remove_reinsert,
        bench_colliding_get, bench_merge_counts
}
criterion_main!(benches);
