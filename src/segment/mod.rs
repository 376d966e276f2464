//! Segment query core
//!
//! A `Segment` couples one storage strategy with the per-segment state that
//! queries need: skip index, field size estimator and delete record.
//!
//! # Locking
//!
//! All of that state sits behind a single reader/writer lock:
//! - query methods (`search`, `retrieve`, `fill_primary_keys`,
//!   `fill_target_entry`, `get_field_avg_size`, `skip_index`) take it shared
//! - writer methods (`insert`, `delete`, `seal`, `set_field_avg_size`,
//!   skip index loaders) take it exclusive
//!
//! Public methods acquire the lock exactly once; internal helpers receive
//! the already-locked state and never lock again.

mod ingest;
mod query;

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SegcoreConfig;
use crate::errors::{SegcoreError, SegcoreResult};
use crate::estimator::FieldSizeEstimator;
use crate::executor::{BruteForceExecutor, PlanExecutor, SegmentView};
use crate::mvcc::{new_bitset, Bitset, DeletedRecord, Timestamp, TimestampFilter};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::plan::IndexMeta;
use crate::result::DataArray;
use crate::schema::Schema;
use crate::skip_index::SkipIndex;
use crate::storage::{new_storage, ColumnChunks, FieldData, SegmentKind, SegmentStorage, ValueRef};

/// Opaque segment handle carried by results.
///
/// Identifies the producing segment for diagnostics only; it grants no
/// access to the segment and says nothing about whether it is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(Uuid);

impl SegmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State guarded by the segment lock
#[derive(Debug)]
struct SegmentInner {
    storage: Box<dyn SegmentStorage>,
    skip_index: SkipIndex,
    estimator: FieldSizeEstimator,
    deletes: DeletedRecord,
}

/// One queryable segment
#[derive(Debug)]
pub struct Segment {
    id: SegmentId,
    kind: SegmentKind,
    schema: Arc<Schema>,
    config: SegcoreConfig,
    index_meta: Option<IndexMeta>,
    executor: Arc<dyn PlanExecutor>,
    metrics: Arc<MetricsRegistry>,
    inner: RwLock<SegmentInner>,
}

impl Segment {
    /// Creates an empty segment on the storage strategy for `kind`
    pub fn new(kind: SegmentKind, schema: Schema, config: SegcoreConfig) -> Self {
        let storage = new_storage(kind, &schema, config.chunk_rows);
        let segment = Self {
            id: SegmentId::new(),
            kind,
            schema: Arc::new(schema),
            config,
            index_meta: None,
            executor: Arc::new(BruteForceExecutor::new()),
            metrics: Arc::new(MetricsRegistry::new()),
            inner: RwLock::new(SegmentInner {
                storage,
                skip_index: SkipIndex::new(),
                estimator: FieldSizeEstimator::new(),
                deletes: DeletedRecord::new(),
            }),
        };

        let id = segment.id.to_string();
        let fields = segment.schema.len().to_string();
        log_event_with_fields(
            Event::SegmentCreated,
            &[("segment", &id), ("kind", kind.as_str()), ("fields", &fields)],
        );
        segment
    }

    /// Index metadata consulted for metric resolution
    pub fn with_index_meta(mut self, index_meta: IndexMeta) -> Self {
        self.index_meta = Some(index_meta);
        self
    }

    /// Replaces the default brute-force executor
    pub fn with_executor(mut self, executor: Arc<dyn PlanExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Shares a metrics registry with other segments
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &SegcoreConfig {
        &self.config
    }

    pub fn index_meta(&self) -> Option<&IndexMeta> {
        self.index_meta.as_ref()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Physical row count, including rows not yet visible or deleted
    pub fn row_count(&self) -> usize {
        self.inner.read().storage.columns().row_count()
    }

    pub fn num_chunks(&self) -> usize {
        self.inner.read().storage.columns().num_chunks()
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.read().storage.is_sealed()
    }

    fn view<'a>(&'a self, inner: &'a SegmentInner) -> LockedView<'a> {
        LockedView {
            segment: self,
            inner,
        }
    }
}

/// Executor access to a segment for the lifetime of one read guard
struct LockedView<'a> {
    segment: &'a Segment,
    inner: &'a SegmentInner,
}

impl LockedView<'_> {
    /// Primary key and write timestamp of `row`
    fn row_key_at(&self, row: usize) -> Option<(ValueRef<'_>, Timestamp)> {
        let pk = self.segment.schema.primary_field_id()?;
        let columns = self.inner.storage.columns();
        let row_ts = *columns.timestamps().get(row)?;
        let (chunk_id, local) = columns.locate(row as i64).ok()?;
        let key = columns
            .chunk(pk, chunk_id)
            .and_then(FieldData::as_scalars)
            .and_then(|s| s.value_at(local))?;
        Some((key, row_ts))
    }
}

impl SegmentView for LockedView<'_> {
    fn schema(&self) -> &Schema {
        &self.segment.schema
    }

    fn columns(&self) -> &ColumnChunks {
        self.inner.storage.columns()
    }

    fn skip_index(&self) -> Option<&SkipIndex> {
        self.segment
            .config
            .skip_index_enabled
            .then_some(&self.inner.skip_index)
    }

    fn visibility_bitset(&self, ts: Timestamp) -> Bitset {
        let columns = self.inner.storage.columns();
        let mut bitset = new_bitset(columns.row_count());

        let hidden = TimestampFilter::apply(&mut bitset, columns.timestamps(), ts);
        if hidden > 0 {
            self.segment.metrics.add_rows_hidden(hidden as u64);
        }
        self.inner
            .deletes
            .mask_with_delete(&mut bitset, ts, |row| self.row_key_at(row));
        bitset
    }

    fn metrics(&self) -> &MetricsRegistry {
        &self.segment.metrics
    }
}

/// Unwraps the single INT64 cell of a count result
fn single_count(fields: &[DataArray]) -> SegcoreResult<i64> {
    match fields {
        [column] => match column.as_longs() {
            Some([count]) => Ok(*count),
            _ => Err(SegcoreError::internal(format!(
                "count column must hold one INT64 row, got {} rows of {}",
                column.len(),
                column.data_type
            ))),
        },
        _ => Err(SegcoreError::internal(format!(
            "count result must have exactly one column, got {}",
            fields.len()
        ))),
    }
}
