//! Benchmarks for the hoard cache and vector store
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hoard::distance::{cosine_distance, ip_distance, l2_distance};
use hoard::{
    Cache, CacheConfig, HnswConfig, HnswIndex, IndexType, Metric, ShardedCache, VectorIndex,
    VectorStore, VectorStoreConfig,
};
use rand::Rng;

fn random_vector(dim: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dim).map(|_| rng.gen::<f32>()).collect()
}

fn random_vectors(n: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..n).map(|_| random_vector(dim)).collect()
}

// ============================================================================
// Distance Kernels
// ============================================================================

fn bench_distance_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_kernels");
    for &dim in &[16, 128, 768] {
        let a = random_vector(dim);
        let b = random_vector(dim);
        group.throughput(Throughput::Elements(dim as u64));
        group.bench_with_input(BenchmarkId::new("l2", dim), &dim, |bench, _| {
            bench.iter(|| l2_distance(black_box(&a), black_box(&b)))
        });
        group.bench_with_input(BenchmarkId::new("cosine", dim), &dim, |bench, _| {
            bench.iter(|| cosine_distance(black_box(&a), black_box(&b)))
        });
        group.bench_with_input(BenchmarkId::new("ip", dim), &dim, |bench, _| {
            bench.iter(|| ip_distance(black_box(&a), black_box(&b)))
        });
    }
    group.finish();
}

// ============================================================================
// Cache Throughput
// ============================================================================

fn bench_cache_set_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");

    group.bench_function("set", |bench| {
        let cache: Cache<u64> = Cache::new(CacheConfig::default());
        let mut i = 0u64;
        bench.iter(|| {
            i += 1;
            cache.set(format!("k{}", i), i, 1)
        });
        cache.close();
    });

    group.bench_function("get_hit", |bench| {
        let cache: Cache<u64> = Cache::new(CacheConfig::default());
        for i in 0..10_000u64 {
            cache.set(format!("k{}", i), i, 1);
        }
        cache.wait();
        let mut i = 0u64;
        bench.iter(|| {
            i = (i + 1) % 10_000;
            cache.get(&format!("k{}", i))
        });
        cache.close();
    });

    group.bench_function("sharded_get_hit", |bench| {
        let cache: ShardedCache<u64> = ShardedCache::new(16, CacheConfig::default());
        for i in 0..10_000u64 {
            cache.set(format!("k{}", i), i, 1);
        }
        cache.wait();
        let mut i = 0u64;
        bench.iter(|| {
            i = (i + 1) % 10_000;
            cache.get(&format!("k{}", i))
        });
        cache.close();
    });

    group.finish();
}

// ============================================================================
// Index Search Latency
// ============================================================================

fn bench_index_search(c: &mut Criterion) {
    let dim = 64;
    let mut group = c.benchmark_group("index_search");
    group.sample_size(50);

    for &n in &[1_000, 10_000] {
        let vectors = random_vectors(n, dim);

        let hnsw = HnswIndex::new(HnswConfig::default(), Metric::L2);
        for (i, v) in vectors.iter().enumerate() {
            hnsw.add(&format!("v{}", i), v.clone(), None).unwrap();
        }
        let query = random_vector(dim);
        group.bench_with_input(BenchmarkId::new("hnsw_top10", n), &n, |bench, _| {
            bench.iter(|| hnsw.search(black_box(&query), 10).unwrap())
        });

        let flat = VectorStore::new(VectorStoreConfig::default());
        for (i, v) in vectors.iter().enumerate() {
            flat.add(format!("v{}", i), v.clone(), None).unwrap();
        }
        flat.wait();
        group.bench_with_input(BenchmarkId::new("flat_top10", n), &n, |bench, _| {
            bench.iter(|| flat.search(black_box(&query), 10).unwrap())
        });
        flat.close();
    }
    group.finish();
}

fn bench_sharded_store_search(c: &mut Criterion) {
    let dim = 64;
    let n = 10_000;
    let vectors = random_vectors(n, dim);
    let mut group = c.benchmark_group("sharded_store_search");
    group.sample_size(50);

    for &shards in &[1usize, 4] {
        let store = VectorStore::new(
            VectorStoreConfig::default()
                .with_index_type(IndexType::Hnsw)
                .with_shard_count(shards),
        );
        for (i, v) in vectors.iter().enumerate() {
            store.add(format!("v{}", i), v.clone(), None).unwrap();
        }
        store.wait();

        let query = random_vector(dim);
        group.bench_with_input(
            BenchmarkId::new("hnsw_top10", shards),
            &shards,
            |bench, _| bench.iter(|| store.search(black_box(&query), 10).unwrap()),
        );
        store.close();
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_distance_kernels,
    bench_cache_set_get,
    bench_index_search,
    bench_sharded_store_search
);
criterion_main!(benches);
