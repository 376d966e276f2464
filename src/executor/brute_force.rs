//! Exhaustive plan executor
//!
//! Execution flow (strict order):
//! 1. Visibility mask at the query timestamp (timestamps, then deletes)
//! 2. Skip-index pruning of whole chunks
//! 3. Row-level predicate evaluation over surviving rows
//! 4. Search: score every candidate, keep the top-k per query
//!    Retrieve: collect ascending offsets (or count them), apply limit

use crate::errors::{SegcoreError, SegcoreResult};
use crate::mvcc::{Bitset, Timestamp};
use crate::plan::{Expr, MetricType, PlaceholderGroup, RetrievePlanNode, VectorPlanNode};
use crate::result::{DataArray, RetrieveResult, SearchResult};
use crate::schema::FieldId;
use crate::storage::FieldData;

use super::pruning::ChunkPruner;
use super::topk::TopK;
use super::{PlanExecutor, SegmentView};

/// Scans every candidate row; stands in for an ANN index
#[derive(Debug, Default, Clone, Copy)]
pub struct BruteForceExecutor;

impl BruteForceExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Rows surviving visibility, pruning and the predicate (`false` bits)
    fn candidate_bitset(
        &self,
        view: &dyn SegmentView,
        predicate: Option<&Expr>,
        ts: Timestamp,
    ) -> SegcoreResult<Bitset> {
        let mut bitset = view.visibility_bitset(ts);
        let Some(expr) = predicate else {
            return Ok(bitset);
        };

        let columns = view.columns();
        let window = bitset.len();
        let skip_mask = view
            .skip_index()
            .map(|index| ChunkPruner::chunk_mask(expr, index, columns.num_chunks()));
        let mut skipped = 0u64;

        for chunk_id in 0..columns.num_chunks() {
            let range = columns
                .chunk_range(chunk_id)
                .ok_or_else(|| SegcoreError::internal("chunk id without row range"))?;
            let end = range.end.min(window);
            if range.start >= end {
                continue;
            }

            if skip_mask.as_ref().map_or(false, |mask| mask[chunk_id]) {
                bitset[range.start..end].fill(true);
                skipped += 1;
                continue;
            }

            for row in range.start..end {
                if bitset[row] {
                    continue;
                }
                let local = row - range.start;
                let cell = |field_id: FieldId| {
                    columns
                        .chunk(field_id, chunk_id)
                        .and_then(FieldData::as_scalars)
                        .and_then(|s| s.value_at(local))
                };
                if !expr.evaluate(&cell) {
                    bitset.set(row, true);
                }
            }
        }

        if skipped > 0 {
            view.metrics().add_chunks_skipped(skipped);
        }
        Ok(bitset)
    }
}

impl PlanExecutor for BruteForceExecutor {
    fn execute_search(
        &self,
        view: &dyn SegmentView,
        node: &VectorPlanNode,
        metric: MetricType,
        placeholders: &PlaceholderGroup,
        ts: Timestamp,
    ) -> SegcoreResult<SearchResult> {
        let info = &node.search_info;
        let meta = view.schema().field(info.field_id)?;
        let dim = meta.dim.ok_or_else(|| {
            SegcoreError::invalid_plan(format!("field {} is not a vector field", info.field_id))
        })?;
        placeholders.validate(dim)?;

        let bitset = self.candidate_bitset(view, node.predicate.as_ref(), ts)?;
        let columns = view.columns();

        // resolve each candidate's vector once, shared by every query
        let mut candidates = Vec::with_capacity(bitset.count_zeros());
        for row in bitset.iter_zeros() {
            let offset = row as i64;
            let (chunk_id, local) = columns.locate(offset)?;
            let vectors = columns
                .chunk(info.field_id, chunk_id)
                .and_then(FieldData::as_vectors)
                .ok_or_else(|| {
                    SegcoreError::data_type_invalid(info.field_id, "vector chunk missing")
                })?;
            candidates.push((offset, vectors.row(local)));
        }

        let mut result = SearchResult {
            total_nq: placeholders.nq(),
            unity_topk: info.topk,
            metric_type: Some(metric),
            topk_per_nq_prefix_sum: vec![0],
            ..SearchResult::default()
        };

        for query in &placeholders.queries {
            let scored: Vec<(i64, f32)> = candidates
                .iter()
                .map(|(offset, vector)| (*offset, metric.distance(query, vector)))
                .collect();
            for (offset, distance) in TopK::select(scored, info.topk, metric) {
                result.seg_offsets.push(offset);
                result.distances.push(match info.round_decimal {
                    Some(decimals) => TopK::round(distance, decimals),
                    None => distance,
                });
            }
            result.topk_per_nq_prefix_sum.push(result.seg_offsets.len());
        }

        Ok(result)
    }

    fn execute_retrieve(
        &self,
        view: &dyn SegmentView,
        node: &RetrievePlanNode,
        ts: Timestamp,
    ) -> SegcoreResult<RetrieveResult> {
        let bitset = self.candidate_bitset(view, node.predicate.as_ref(), ts)?;

        if node.is_count {
            return Ok(RetrieveResult {
                field_data: vec![DataArray::count(bitset.count_zeros() as i64)],
                ..RetrieveResult::default()
            });
        }

        let limit = node.limit.unwrap_or(usize::MAX);
        let result_offsets = bitset.iter_zeros().take(limit).map(|row| row as i64).collect();
        Ok(RetrieveResult {
            result_offsets,
            ..RetrieveResult::default()
        })
    }
}
