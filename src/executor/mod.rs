//! Plan executor seam
//!
//! The segment owns locking, visibility data and materialization; the
//! executor owns matching and ranking. A segment hands the executor a
//! read-only `SegmentView` that lives exactly as long as its read lock.
//!
//! # Invariants
//!
//! - Rows written after the query timestamp are never returned
//! - Skip-index pruning never drops a matching row
//! - Equal scores rank by ascending row offset

mod brute_force;
mod pruning;
mod topk;

use std::fmt;

use crate::errors::SegcoreResult;
use crate::mvcc::{Bitset, Timestamp};
use crate::observability::MetricsRegistry;
use crate::plan::{MetricType, PlaceholderGroup, RetrievePlanNode, VectorPlanNode};
use crate::result::{RetrieveResult, SearchResult};
use crate::schema::Schema;
use crate::skip_index::SkipIndex;
use crate::storage::ColumnChunks;

pub use brute_force::BruteForceExecutor;
pub use pruning::ChunkPruner;
pub use topk::TopK;

/// Row-level access granted to an executor for one query
pub trait SegmentView {
    fn schema(&self) -> &Schema;

    fn columns(&self) -> &ColumnChunks;

    /// `None` when pruning is disabled for the segment
    fn skip_index(&self) -> Option<&SkipIndex>;

    /// Mask over every current row, `true` for rows hidden at `ts`
    fn visibility_bitset(&self, ts: Timestamp) -> Bitset;

    fn metrics(&self) -> &MetricsRegistry;
}

/// Matching and ranking strategy
pub trait PlanExecutor: Send + Sync + fmt::Debug {
    /// Filtered top-k per query vector under `metric`
    fn execute_search(
        &self,
        view: &dyn SegmentView,
        node: &VectorPlanNode,
        metric: MetricType,
        placeholders: &PlaceholderGroup,
        ts: Timestamp,
    ) -> SegcoreResult<SearchResult>;

    /// Matching row offsets, or a single count column for count plans
    fn execute_retrieve(
        &self,
        view: &dyn SegmentView,
        node: &RetrievePlanNode,
        ts: Timestamp,
    ) -> SegcoreResult<RetrieveResult>;
}
