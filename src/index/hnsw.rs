//! usearch HNSW graph for approximate nearest-neighbour lookups.

use super::ScoredId;
use crate::models::TrademarkId;
use crate::{Error, Result};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

/// HNSW connectivity parameter (M).
const HNSW_CONNECTIVITY: usize = 16;

/// HNSW expansion factor for construction (`ef_construction`).
const HNSW_EXPANSION_ADD: usize = 128;

/// HNSW expansion factor for search (`ef`).
const HNSW_EXPANSION_SEARCH: usize = 64;

/// HNSW graph keyed by record id.
///
/// Vectors are already unit length, so the inner-product metric yields
/// cosine distance.
pub struct HnswGraph {
    index: Index,
}

impl HnswGraph {
    /// Builds a graph from ids and their row-major unit vectors.
    pub fn build(dimensions: usize, ids: &[TrademarkId], vectors: &[f32]) -> Result<Self> {
        let options = IndexOptions {
            dimensions,
            metric: MetricKind::IP,
            quantization: ScalarKind::F32,
            connectivity: HNSW_CONNECTIVITY,
            expansion_add: HNSW_EXPANSION_ADD,
            expansion_search: HNSW_EXPANSION_SEARCH,
            multi: false,
        };

        let index = Index::new(&options).map_err(|e| Error::OperationFailed {
            operation: "create_usearch_index".to_string(),
            cause: e.to_string(),
        })?;

        index.reserve(ids.len()).map_err(|e| Error::OperationFailed {
            operation: "reserve_usearch_capacity".to_string(),
            cause: e.to_string(),
        })?;

        for (id, vector) in ids.iter().zip(vectors.chunks_exact(dimensions)) {
            let key = u64::try_from(id.get())
                .map_err(|_| Error::InvalidInput(format!("negative record id {id}")))?;
            index.add(key, vector).map_err(|e| Error::OperationFailed {
                operation: "usearch_add".to_string(),
                cause: e.to_string(),
            })?;
        }

        Ok(Self { index })
    }

    /// Returns up to `k` approximate nearest neighbours of a unit query.
    pub fn search(&self, unit_query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        let matches = self
            .index
            .search(unit_query, k)
            .map_err(|e| Error::OperationFailed {
                operation: "usearch_search".to_string(),
                cause: e.to_string(),
            })?;

        Ok(matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(&key, &distance)| {
                let id = i64::try_from(key).ok()?;
                // Inner-product distance is 1 - similarity
                Some(ScoredId {
                    id: TrademarkId::new(id),
                    score: 1.0 - distance,
                })
            })
            .collect())
    }
}
