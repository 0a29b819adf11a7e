//! Immutable index snapshots.

use super::{ScoredId, dot, normalize, rank_order};
use crate::models::TrademarkId;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// An immutable, fully built vector index.
///
/// Holds only normalized vectors of the configured dimensionality. Search
/// is exact inner product by default; with the `usearch-hnsw` feature an
/// HNSW graph is built alongside the entries and used for lookups.
pub struct IndexSnapshot {
    dimensions: usize,
    /// Sorted by id.
    ids: Vec<TrademarkId>,
    /// Row-major, `ids.len() * dimensions` values.
    vectors: Vec<f32>,
    excluded: usize,
    built_at: Option<DateTime<Utc>>,
    #[cfg(feature = "usearch-hnsw")]
    graph: Option<super::hnsw::HnswGraph>,
}

impl std::fmt::Debug for IndexSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSnapshot")
            .field("dimensions", &self.dimensions)
            .field("entries", &self.ids.len())
            .field("excluded", &self.excluded)
            .field("built_at", &self.built_at)
            .finish_non_exhaustive()
    }
}

impl IndexSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub const fn empty(dimensions: usize) -> Self {
        Self {
            dimensions,
            ids: Vec::new(),
            vectors: Vec::new(),
            excluded: 0,
            built_at: None,
            #[cfg(feature = "usearch-hnsw")]
            graph: None,
        }
    }

    /// Builds a snapshot from `(id, embedding)` pairs.
    ///
    /// Missing embeddings and zero-norm or non-finite vectors are skipped and
    /// counted as excluded. If an id appears more than once the last
    /// occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if any present embedding has the
    /// wrong length. A mismatch means the store and the embedder disagree,
    /// so the whole build is refused rather than silently shrinking.
    pub fn build<I>(dimensions: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (TrademarkId, Option<Vec<f32>>)>,
    {
        if dimensions == 0 {
            return Err(Error::InvalidInput(
                "index dimensions must be non-zero".to_string(),
            ));
        }

        let mut accepted: BTreeMap<TrademarkId, Vec<f32>> = BTreeMap::new();
        let mut excluded = 0usize;

        for (id, embedding) in rows {
            let Some(embedding) = embedding else {
                excluded += 1;
                continue;
            };
            if embedding.len() != dimensions {
                return Err(Error::DimensionMismatch {
                    expected: dimensions,
                    actual: embedding.len(),
                });
            }
            match normalize(&embedding) {
                Some(unit) => {
                    if accepted.insert(id, unit).is_some() {
                        tracing::warn!(id = %id, "Duplicate id in index build input, keeping last");
                    }
                },
                None => {
                    tracing::debug!(id = %id, "Skipping zero-norm or non-finite embedding");
                    excluded += 1;
                },
            }
        }

        let mut ids = Vec::with_capacity(accepted.len());
        let mut vectors = Vec::with_capacity(accepted.len() * dimensions);
        for (id, unit) in accepted {
            ids.push(id);
            vectors.extend_from_slice(&unit);
        }

        #[cfg(feature = "usearch-hnsw")]
        let graph = if ids.is_empty() {
            None
        } else {
            Some(super::hnsw::HnswGraph::build(dimensions, &ids, &vectors)?)
        };

        Ok(Self {
            dimensions,
            ids,
            vectors,
            excluded,
            built_at: Some(Utc::now()),
            #[cfg(feature = "usearch-hnsw")]
            graph,
        })
    }

    /// Vector dimensionality.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of searchable entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing is searchable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rows skipped during the build.
    #[must_use]
    pub const fn excluded(&self) -> usize {
        self.excluded
    }

    /// Build time, `None` for the initial empty snapshot.
    #[must_use]
    pub const fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    /// Returns true if `id` is searchable.
    #[must_use]
    pub fn contains(&self, id: TrademarkId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Returns the stored unit vector for `id`.
    #[must_use]
    pub fn vector(&self, id: TrademarkId) -> Option<&[f32]> {
        let row = self.ids.binary_search(&id).ok()?;
        self.row(row)
    }

    fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row * self.dimensions;
        self.vectors.get(start..start + self.dimensions)
    }

    /// Returns up to `k` nearest entries to `query` by cosine similarity.
    ///
    /// Results are in descending score order, ties broken by ascending id.
    /// An empty snapshot yields an empty result.
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionMismatch`] if the query has the wrong length
    /// - [`Error::InvalidInput`] if the query has zero norm or non-finite values
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        if query.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        let unit = normalize(query).ok_or_else(|| {
            Error::InvalidInput("query vector has zero norm or non-finite values".to_string())
        })?;

        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        #[cfg(feature = "usearch-hnsw")]
        if let Some(graph) = &self.graph {
            let mut hits = graph.search(&unit, k)?;
            hits.sort_by(rank_order);
            hits.truncate(k);
            return Ok(hits);
        }

        Ok(self.exact_search(&unit, k))
    }

    /// Exhaustive inner-product scan.
    fn exact_search(&self, unit: &[f32], k: usize) -> Vec<ScoredId> {
        let mut hits: Vec<ScoredId> = self
            .ids
            .iter()
            .zip(self.vectors.chunks_exact(self.dimensions))
            .map(|(&id, vector)| ScoredId {
                id,
                score: dot(unit, vector),
            })
            .collect();
        hits.sort_by(rank_order);
        hits.truncate(k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: i64) -> TrademarkId {
        TrademarkId::new(n)
    }

    fn rows() -> Vec<(TrademarkId, Option<Vec<f32>>)> {
        vec![
            (id(1), Some(vec![1.0, 0.0, 0.0])),
            (id(2), Some(vec![0.0, 2.0, 0.0])),
            (id(3), None),
            (id(4), Some(vec![0.0, 0.0, 0.0])),
            (id(5), Some(vec![1.0, 1.0, 0.0])),
        ]
    }

    #[test]
    fn test_build_skips_absent_and_zero_vectors() {
        let snapshot = IndexSnapshot::build(3, rows()).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.excluded(), 2);
        assert!(snapshot.contains(id(5)));
        assert!(!snapshot.contains(id(3)));
        assert!(!snapshot.contains(id(4)));
        assert!(snapshot.built_at().is_some());
    }

    #[test]
    fn test_build_stores_unit_vectors() {
        let snapshot = IndexSnapshot::build(3, rows()).unwrap();
        let v = snapshot.vector(id(2)).unwrap();
        assert!((v[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_build_rejects_wrong_dimensions() {
        let result = IndexSnapshot::build(3, vec![(id(1), Some(vec![1.0, 0.0]))]);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_build_rejects_zero_dimensions() {
        assert!(IndexSnapshot::build(0, Vec::new()).is_err());
    }

    #[test]
    fn test_duplicate_ids_keep_last() {
        let snapshot = IndexSnapshot::build(
            2,
            vec![(id(1), Some(vec![1.0, 0.0])), (id(1), Some(vec![0.0, 1.0]))],
        )
        .unwrap();
        assert_eq!(snapshot.len(), 1);
        let v = snapshot.vector(id(1)).unwrap();
        assert!((v[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let snapshot = IndexSnapshot::build(3, rows()).unwrap();
        let hits = snapshot.search(&[1.0, 0.1, 0.0], 10).unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id.get()).collect();
        assert_eq!(ids, vec![1, 5, 2]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_search_limits_to_k() {
        let snapshot = IndexSnapshot::build(3, rows()).unwrap();
        assert_eq!(snapshot.search(&[1.0, 0.0, 0.0], 1).unwrap().len(), 1);
        assert!(snapshot.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_self_is_top_hit() {
        let snapshot = IndexSnapshot::build(3, rows()).unwrap();
        let hits = snapshot.search(&[2.0, 2.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].id, id(5));
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_search_ties_break_by_ascending_id() {
        let snapshot = IndexSnapshot::build(
            2,
            vec![
                (id(8), Some(vec![1.0, 0.0])),
                (id(3), Some(vec![1.0, 0.0])),
                (id(5), Some(vec![1.0, 0.0])),
            ],
        )
        .unwrap();
        let hits = snapshot.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id.get()).collect();
        assert_eq!(ids, vec![3, 5, 8]);
    }

    #[test]
    fn test_search_empty_snapshot() {
        let snapshot = IndexSnapshot::empty(3);
        assert!(snapshot.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_bad_queries() {
        let snapshot = IndexSnapshot::build(3, rows()).unwrap();
        assert!(matches!(
            snapshot.search(&[1.0, 0.0], 5),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            snapshot.search(&[0.0, 0.0, 0.0], 5),
            Err(Error::InvalidInput(_))
        ));
    }
}
