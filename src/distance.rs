//! Distance Functions for Vector Similarity
//!
//! This module provides the distance metrics used by the flat and HNSW
//! indexes. All kernels are pure, reentrant, and allocation-free.
//!
//! # Supported Metrics
//!
//! - **L2**: Euclidean distance. Good general-purpose metric for image and
//!   sensor embeddings.
//! - **Cosine**: `1 - cosine similarity`, range `[0, 2]`. Best for text
//!   embeddings and other non-normalized directional vectors.
//! - **Ip**: Negated inner product, so that smaller is always better and all
//!   metrics sort the same way internally. Callers that surface scores flip
//!   the sign for this metric at result-emission time.
//!
//! # Dimension Mismatch
//!
//! Comparing vectors of different lengths never panics; the kernels return
//! the [`MAX_DISTANCE`] sentinel instead, which pushes the pair to the end of
//! any ascending-sorted result set.
//!
//! # Example
//!
//! ```
//! use hoard::distance::{Metric, l2_distance};
//!
//! let a = vec![0.0, 0.0, 0.0];
//! let b = vec![1.0, 2.0, 2.0];
//!
//! assert!((l2_distance(&a, &b) - 3.0).abs() < 1e-6);
//! assert_eq!(Metric::L2.compute(&a, &b), l2_distance(&a, &b));
//! ```

use serde::{Deserialize, Serialize};

/// Sentinel distance returned when vector dimensions do not match.
pub const MAX_DISTANCE: f32 = 1e38;

/// Distance metric types for vector similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Euclidean (L2) distance
    #[default]
    L2,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
    /// Inner product (negated, so smaller = more similar)
    Ip,
}

impl Metric {
    /// Compute the distance between two vectors under this metric
    #[inline]
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => l2_distance(a, b),
            Self::Cosine => cosine_distance(a, b),
            Self::Ip => ip_distance(a, b),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L2 => write!(f, "l2"),
            Self::Cosine => write!(f, "cosine"),
            Self::Ip => write!(f, "ip"),
        }
    }
}

/// Compute the Euclidean (L2) distance between two vectors.
///
/// Accumulates in f64 to limit rounding drift on long vectors. Returns
/// [`MAX_DISTANCE`] if the vectors have different lengths.
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return MAX_DISTANCE;
    }
    let mut sum = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = f64::from(*x) - f64::from(*y);
        sum += diff * diff;
    }
    sum.sqrt() as f32
}

/// Compute the cosine distance (`1 - cosine similarity`) between two vectors.
///
/// Returns 1.0 when either vector has zero norm and [`MAX_DISTANCE`] if the
/// vectors have different lengths.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return MAX_DISTANCE;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Compute the cosine similarity between two vectors, in `[-1, 1]`.
///
/// Returns 0.0 for zero-norm vectors or mismatched lengths.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Compute the negated inner product between two vectors.
///
/// The result is negated so that larger inner products sort first under the
/// ascending ordering shared by all metrics. Returns [`MAX_DISTANCE`] if the
/// vectors have different lengths.
#[inline]
pub fn ip_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return MAX_DISTANCE;
    }
    let mut sum = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += f64::from(*x) * f64::from(*y);
    }
    (-sum) as f32
}
