//! End-to-end scenarios across the cache and vector store surfaces.

use hoard::{
    Cache, CacheConfig, HnswConfig, IndexType, Metric, ShardedCache, VectorStore,
    VectorStoreConfig,
};
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

fn random_vector(dim: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dim).map(|_| rng.gen::<f32>()).collect()
}

#[test]
fn basic_set_get_del() {
    let cache: Cache<String> = Cache::new(CacheConfig::default());
    assert!(cache.set("k", "v".to_string(), 1));
    cache.wait();
    assert_eq!(cache.get("k").as_deref(), Some("v"));

    cache.del("k");
    assert_eq!(cache.get("k"), None);

    let metrics = cache.metrics();
    assert_eq!(metrics.hits(), 1);
    assert_eq!(metrics.misses(), 1);
    cache.close();
}

#[test]
fn ttl_expiry() {
    let cache: Cache<String> = Cache::new(CacheConfig::default());
    cache.set_with_ttl("k", "v".to_string(), 1, Duration::from_millis(100));
    cache.wait();

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(cache.get("k").as_deref(), Some("v"));

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(cache.get("k"), None);
    cache.close();
}

#[test]
fn eviction_under_pressure() {
    let cache: Cache<String> = Cache::new(
        CacheConfig::default().with_max_cost(3).with_num_counters(100),
    );
    for key in ["a", "b", "c", "d"] {
        cache.set(key, key.to_string(), 1);
    }
    cache.wait();

    let live = ["a", "b", "c", "d"]
        .iter()
        .filter(|k| cache.exists(k))
        .count();
    assert_eq!(live, 3);
    assert!(cache.metrics().keys_evicted() >= 1);
    assert!(cache.cost() <= 3);
    cache.close();
}

#[test]
fn lru_recency_governs_eviction() {
    let cache: Cache<String> = Cache::new(
        CacheConfig::default().with_max_cost(5).with_num_counters(100),
    );
    for key in ["a", "b", "c", "d", "e"] {
        cache.set(key, key.to_string(), 1);
        cache.wait();
    }

    // Touch "a" so "b" becomes the tail; the next admission evicts "b".
    assert!(cache.get("a").is_some());
    cache.set("f", "f".to_string(), 1);
    cache.wait();

    assert!(cache.exists("a"));
    assert!(!cache.exists("b"));
    assert!(cache.exists("f"));
    cache.close();
}

#[test]
fn cas_semantics() {
    let cache: Cache<String> = Cache::new(CacheConfig::default());
    cache.set("k", "v1".to_string(), 1);
    cache.wait();

    assert!(!cache.cas("k", &"vX".to_string(), "v2".to_string(), 1));
    assert!(cache.cas("k", &"v1".to_string(), "v2".to_string(), 1));
    cache.wait();
    assert_eq!(cache.get("k").as_deref(), Some("v2"));
    cache.close();
}

#[test]
fn rejected_item_never_appears() {
    let cache: Cache<String> = Cache::new(CacheConfig::default().with_max_cost(10));
    assert!(!cache.set("huge", "v".to_string(), 100));
    cache.wait();
    assert!(!cache.exists("huge"));
    assert_eq!(cache.metrics().sets_rejected(), 1);
    cache.close();
}

#[test]
fn sharded_cache_round_trip() {
    let cache: ShardedCache<i64> = ShardedCache::new(
        8,
        CacheConfig::default().with_max_cost(80_000).with_num_counters(80_000),
    );
    for i in 0..1000i64 {
        cache.set(format!("n{}", i), i, 1);
    }
    cache.wait();
    for i in 0..1000i64 {
        assert_eq!(cache.get(&format!("n{}", i)), Some(i));
    }
    assert_eq!(cache.len(), 1000);
    cache.close();
}

#[test]
fn flat_search_exactness() {
    let store = VectorStore::new(VectorStoreConfig::default());
    let vectors: Vec<Vec<f32>> = (0..100).map(|_| random_vector(8)).collect();
    for (i, v) in vectors.iter().enumerate() {
        store.add(format!("v{}", i), v.clone(), None).unwrap();
    }
    store.wait();

    for (i, v) in vectors.iter().enumerate() {
        let results = store.search(v, 1).unwrap();
        assert_eq!(results[0].id, format!("v{}", i));
        assert!(results[0].score.abs() < 1e-5);
    }
    store.close();
}

#[test]
fn hnsw_flat_agreement() {
    let dim = 16;
    let k = 10;
    let vectors: Vec<Vec<f32>> = (0..1000).map(|_| random_vector(dim)).collect();

    let flat = VectorStore::new(VectorStoreConfig::default());
    let hnsw = VectorStore::new(
        VectorStoreConfig::default()
            .with_index_type(IndexType::Hnsw)
            .with_hnsw(HnswConfig::default().with_m(16).with_ef_search(100)),
    );
    for (i, v) in vectors.iter().enumerate() {
        flat.add(format!("v{}", i), v.clone(), None).unwrap();
        hnsw.add(format!("v{}", i), v.clone(), None).unwrap();
    }
    flat.wait();
    hnsw.wait();

    let num_queries = 50;
    let mut good = 0;
    for q in 0..num_queries {
        let query = &vectors[q * 19];
        let exact: HashSet<String> = flat
            .search(query, k)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        let approx: HashSet<String> = hnsw
            .search(query, k)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        let overlap = exact.intersection(&approx).count() as f64 / k as f64;
        if overlap >= 0.9 {
            good += 1;
        }
    }
    // Leave a little slack below the nominal 95% for the randomized graph.
    assert!(
        good as f64 >= num_queries as f64 * 0.9,
        "only {}/{} queries reached 0.9 overlap",
        good,
        num_queries
    );

    flat.close();
    hnsw.close();
}

#[test]
fn sharded_fanout_matches_single_shard() {
    let dim = 8;
    let k = 5;
    let vectors: Vec<Vec<f32>> = (0..200).map(|_| random_vector(dim)).collect();

    let single = VectorStore::new(VectorStoreConfig::default());
    let sharded = VectorStore::new(VectorStoreConfig::default().with_shard_count(4));
    for (i, v) in vectors.iter().enumerate() {
        single.add(format!("v{}", i), v.clone(), None).unwrap();
        sharded.add(format!("v{}", i), v.clone(), None).unwrap();
    }
    single.wait();
    sharded.wait();

    for _ in 0..10 {
        let query = random_vector(dim);
        let expected: HashSet<String> = single
            .search(&query, k)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        let actual: HashSet<String> = sharded
            .search(&query, k)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(expected, actual);
    }

    single.close();
    sharded.close();
}

#[test]
fn ip_results_descend_by_inner_product() {
    for index_type in [IndexType::Flat, IndexType::Hnsw] {
        let store = VectorStore::new(
            VectorStoreConfig::default()
                .with_index_type(index_type)
                .with_metric(Metric::Ip),
        );
        for i in 1..=20 {
            store.add(format!("v{}", i), vec![i as f32, 0.0], None).unwrap();
        }
        store.wait();

        let results = store.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(results[0].id, "v20");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        // Surfaced scores are true inner products.
        assert!((results[0].score - 20.0).abs() < 1e-4);
        store.close();
    }
}

#[test]
fn export_import_preserves_items_and_results() {
    let source = VectorStore::new(
        VectorStoreConfig::default().with_index_type(IndexType::Hnsw),
    );
    let vectors: Vec<Vec<f32>> = (0..100).map(|_| random_vector(12)).collect();
    for (i, v) in vectors.iter().enumerate() {
        source
            .add(
                format!("v{}", i),
                v.clone(),
                Some(serde_json::json!({"ord": i})),
            )
            .unwrap();
    }
    source.wait();

    let bytes = source.export_to_bytes().unwrap();
    let target = VectorStore::new(
        VectorStoreConfig::default().with_index_type(IndexType::Hnsw),
    );
    target.import_from_bytes(&bytes).unwrap();

    // Same id/vector/metadata set.
    let mut source_ids: Vec<String> =
        source.export().into_iter().map(|i| i.id).collect();
    let mut target_ids: Vec<String> =
        target.export().into_iter().map(|i| i.id).collect();
    source_ids.sort();
    target_ids.sort();
    assert_eq!(source_ids, target_ids);

    let restored = target.get("v7").unwrap();
    assert_eq!(restored.vector, vectors[7]);
    assert_eq!(restored.metadata.unwrap()["ord"], 7);

    // Exact-match queries resolve identically.
    let hit = target.search(&vectors[3], 1).unwrap();
    assert_eq!(hit[0].id, "v3");

    source.close();
    target.close();
}

#[test]
fn vector_ttl_sweeps_index() {
    let store = VectorStore::new(
        VectorStoreConfig::default().with_ttl(Duration::from_millis(60)),
    );
    store.add("a", vec![1.0, 2.0], None).unwrap();
    store.wait();
    assert_eq!(store.len(), 1);

    // The vector entry itself has no per-entry TTL; only budget pressure or
    // explicit deletes remove it. The sweeper must not erase it.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(store.len(), 1);
    store.close();
}

#[test]
fn dimension_mismatch_ranks_last() {
    let store = VectorStore::new(VectorStoreConfig::default());
    store.add("match", vec![1.0, 1.0], None).unwrap();
    store.add("mismatch", vec![1.0, 1.0, 1.0], None).unwrap();
    store.wait();

    let results = store.search(&[1.0, 1.0], 2).unwrap();
    assert_eq!(results[0].id, "match");
    assert_eq!(results[1].id, "mismatch");
    assert!(results[1].score >= 1e37);
    store.close();
}
