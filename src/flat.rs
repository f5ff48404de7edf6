//! Brute-Force Flat Index
//!
//! Linear scan over an id -> item map, serving the same search contract as
//! the HNSW index. Exact results, O(n) per query; the fallback when graph
//! search is not warranted.

use crate::distance::Metric;
use crate::error::Result;
use crate::vector::{MetadataFilter, SearchResult, VectorIndex, VectorItem};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Exact nearest-neighbor index scanning every stored vector
pub struct FlatIndex {
    metric: Metric,
    items: RwLock<HashMap<String, VectorItem>>,
}

impl FlatIndex {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            items: RwLock::new(HashMap::new()),
        }
    }

    /// The configured distance metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn scan(&self, query: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Vec<SearchResult> {
        let items = self.items.read();
        if items.is_empty() || k == 0 {
            return Vec::new();
        }

        // Raw kernel distance sorts ascending for every metric; the sign is
        // flipped for IP at emission so surfaced scores are inner products.
        let mut scored: Vec<(&VectorItem, f32)> = items
            .values()
            .filter(|item| match filter {
                Some(f) => f(item.metadata.as_ref()),
                None => true,
            })
            .map(|item| (item, self.metric.compute(query, &item.vector)))
            .collect();

        scored.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(item, dist)| SearchResult {
                id: item.id.clone(),
                vector: item.vector.clone(),
                score: if self.metric == Metric::Ip { -dist } else { dist },
                metadata: item.metadata.clone(),
            })
            .collect()
    }
}

impl VectorIndex for FlatIndex {
    fn add(&self, id: &str, vector: Vec<f32>, metadata: Option<serde_json::Value>) -> Result<()> {
        let item = VectorItem::new(id, vector, metadata);
        self.items.write().insert(id.to_string(), item);
        Ok(())
    }

    fn get(&self, id: &str) -> Option<VectorItem> {
        self.items.read().get(id).cloned()
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.items.write().remove(id).is_some())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        Ok(self.scan(query, k, None))
    }

    fn search_with_filter(
        &self,
        query: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.scan(query, k, Some(filter)))
    }

    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn clear(&self) {
        self.items.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index_with(metric: Metric, vectors: &[(&str, Vec<f32>)]) -> FlatIndex {
        let index = FlatIndex::new(metric);
        for (id, v) in vectors {
            index.add(id, v.clone(), None).unwrap();
        }
        index
    }

    #[test]
    fn test_search_exact_ordering() {
        let index = index_with(
            Metric::L2,
            &[
                ("far", vec![10.0, 10.0]),
                ("near", vec![1.0, 1.0]),
                ("mid", vec![3.0, 3.0]),
            ],
        );

        let results = index.search(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_self_query_scores_zero() {
        let index = index_with(Metric::L2, &[("a", vec![0.5, 0.25, -1.0])]);
        let results = index.search(&[0.5, 0.25, -1.0], 1).unwrap();
        assert_eq!(results[0].id, "a");
        assert!(results[0].score.abs() < 1e-6);
    }

    #[test]
    fn test_ip_scores_descend_by_inner_product() {
        let index = index_with(
            Metric::Ip,
            &[
                ("low", vec![1.0, 0.0]),
                ("high", vec![10.0, 0.0]),
                ("mid", vec![5.0, 0.0]),
            ],
        );

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
        // Surfaced scores are true inner products, descending.
        assert!(results[0].score > results[1].score);
        assert!((results[0].score - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_filtered_search() {
        let index = FlatIndex::new(Metric::L2);
        for i in 0..10 {
            let parity = if i % 2 == 0 { "even" } else { "odd" };
            index
                .add(&format!("v{}", i), vec![i as f32], Some(json!({"parity": parity})))
                .unwrap();
        }

        let results = index
            .search_with_filter(&[0.0], 3, &|meta| {
                meta.map(|m| m["parity"] == "odd").unwrap_or(false)
            })
            .unwrap();

        assert_eq!(results.len(), 3);
        for r in &results {
            assert_eq!(r.metadata.as_ref().unwrap()["parity"], "odd");
        }
        assert_eq!(results[0].id, "v1");
    }

    #[test]
    fn test_delete_and_overwrite() {
        let index = FlatIndex::new(Metric::L2);
        index.add("a", vec![1.0], None).unwrap();
        index.add("a", vec![2.0], None).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").unwrap().vector, vec![2.0]);

        assert!(index.delete("a").unwrap());
        assert!(!index.delete("a").unwrap());
        assert!(index.get("a").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_empty_and_k_zero() {
        let index = FlatIndex::new(Metric::Cosine);
        assert!(index.search(&[1.0], 5).unwrap().is_empty());
        index.add("a", vec![1.0], None).unwrap();
        assert!(index.search(&[1.0], 0).unwrap().is_empty());
    }
}
