//! In-memory vector index over logo embeddings.
//!
//! An [`IndexSnapshot`] is an immutable, fully built index. The
//! [`LiveIndex`] holds the currently installed snapshot and swaps in a new
//! one atomically when a rebuild completes, so readers never observe a
//! partially built index.
//!
//! Vectors are L2-normalized on insertion and queries are normalized before
//! search, which makes inner product equal to cosine similarity.

// Allow cast precision loss for vector norm calculations.
#![allow(clippy::cast_precision_loss)]

#[cfg(feature = "usearch-hnsw")]
mod hnsw;
mod live;
mod snapshot;

pub use live::LiveIndex;
pub use snapshot::IndexSnapshot;

use crate::models::TrademarkId;
use serde::Serialize;
use std::cmp::Ordering;

/// A search hit: record id and cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredId {
    /// Record id.
    pub id: TrademarkId,
    /// Similarity in `[-1, 1]`, higher is closer.
    pub score: f32,
}

/// Orders hits by descending score, breaking ties by ascending id.
pub(crate) fn rank_order(a: &ScoredId, b: &ScoredId) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Returns the Euclidean norm of `vector`.
#[must_use]
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Returns a unit-length copy of `vector`.
///
/// Returns `None` for zero-norm vectors and vectors containing NaN or
/// infinite components, neither of which has a direction.
#[must_use]
pub fn normalize(vector: &[f32]) -> Option<Vec<f32>> {
    if vector.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let norm = l2_norm(vector);
    if norm <= 0.0 || !norm.is_finite() {
        return None;
    }
    Some(vector.iter().map(|v| v / norm).collect())
}

/// Inner product of two equal-length vectors.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_rejects_degenerate() {
        assert!(normalize(&[0.0, 0.0, 0.0]).is_none());
        assert!(normalize(&[]).is_none());
        assert!(normalize(&[f32::NAN, 1.0]).is_none());
        assert!(normalize(&[f32::INFINITY, 1.0]).is_none());
    }

    #[test]
    fn test_dot() {
        assert!((dot(&[1.0, 2.0], &[3.0, 4.0]) - 11.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rank_order_ties_by_id() {
        let mut hits = vec![
            ScoredId {
                id: TrademarkId::new(9),
                score: 0.5,
            },
            ScoredId {
                id: TrademarkId::new(2),
                score: 0.5,
            },
            ScoredId {
                id: TrademarkId::new(4),
                score: 0.9,
            },
        ];
        hits.sort_by(rank_order);
        let ids: Vec<i64> = hits.iter().map(|h| h.id.get()).collect();
        assert_eq!(ids, vec![4, 2, 9]);
    }
}
