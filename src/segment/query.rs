//! Read path: search, retrieve, result filling and size estimation

use parking_lot::{MappedRwLockReadGuard, RwLockReadGuard};

use crate::errors::{SegcoreError, SegcoreResult};
use crate::mvcc::{Bitset, Timestamp, TimestampFilter, MAX_TIMESTAMP};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::plan::{IndexMeta, MetricType, PlaceholderGroup, RetrievePlan, SearchInfo, SearchPlan};
use crate::result::{DataArray, Ids, RetrieveResults, SearchResult};
use crate::schema::{FieldId, FieldMeta, SystemFieldType};
use crate::skip_index::SkipIndex;
use crate::storage::{ColumnChunks, FieldData, ScalarField};

use super::{single_count, Segment, SegmentInner};

/// Width reported for system pseudo-fields
const SYSTEM_FIELD_SIZE: i64 = 8;

impl Segment {
    /// Runs a filtered top-k search at `ts` under a shared lock.
    ///
    /// The effective metric is resolved against the segment's index
    /// metadata before any row is scanned.
    pub fn search(
        &self,
        plan: &SearchPlan,
        placeholders: &PlaceholderGroup,
        ts: Timestamp,
    ) -> SegcoreResult<SearchResult> {
        let segment = self.id.to_string();
        let scope = ObservationScope::with_fields("SEARCH", &[("segment", &segment)]);

        let inner = self.inner.read();
        match self.search_locked(&inner, plan, placeholders, ts) {
            Ok(result) => {
                self.metrics.increment_searches();
                let hits = result.len().to_string();
                let nq = result.total_nq.to_string();
                scope.complete_with_fields(&[("nq", &nq), ("hits", &hits)]);
                Ok(result)
            }
            Err(e) => {
                scope.fail(e.message());
                Err(e)
            }
        }
    }

    fn search_locked(
        &self,
        inner: &SegmentInner,
        plan: &SearchPlan,
        placeholders: &PlaceholderGroup,
        ts: Timestamp,
    ) -> SegcoreResult<SearchResult> {
        plan.validate(&self.schema, self.config.max_topk)?;
        let node = plan.node()?;
        let metric = self.resolve_metric(&node.search_info)?;

        let view = self.view(inner);
        let mut result = self
            .executor
            .execute_search(&view, node, metric, placeholders, ts)?;
        result.segment = Some(self.id);
        result.check_shape()?;
        Ok(result)
    }

    fn resolve_metric(&self, info: &SearchInfo) -> SegcoreResult<MetricType> {
        let resolved = match &self.index_meta {
            Some(meta) => meta
                .resolve_metric(info.field_id, info.metric_type)
                .map_err(|e| {
                    let field = info.field_id.to_string();
                    log_event_with_fields(
                        Event::MetricMismatch,
                        &[("field", &field), ("reason", e.message())],
                    );
                    e
                })?,
            None => info.metric_type,
        };
        resolved.ok_or_else(|| {
            SegcoreError::invalid_plan(format!(
                "search on field {} has no metric type and no index metadata",
                info.field_id
            ))
        })
    }

    /// Makes `plan` agree with the metric the index of its field was built
    /// with. An unset metric adopts the index metric; a different explicit
    /// one fails with a metric mismatch.
    pub fn check_metric_type(plan: &mut SearchPlan, index_meta: &IndexMeta) -> SegcoreResult<()> {
        let node = plan
            .plan_node
            .as_mut()
            .ok_or_else(|| SegcoreError::invalid_plan("search plan has no plan node"))?;
        let info = &mut node.search_info;
        info.metric_type = index_meta.resolve_metric(info.field_id, info.metric_type)?;
        Ok(())
    }

    /// Resolves the primary key of every hit, in `seg_offsets` order
    pub fn fill_primary_keys(&self, plan: &SearchPlan, result: &mut SearchResult) -> SegcoreResult<()> {
        plan.node()?;
        result.check_shape()?;
        if !result.primary_keys.is_empty() {
            return Err(SegcoreError::internal(
                "primary keys are already filled for this result",
            ));
        }

        let inner = self.inner.read();
        let pk_meta = self.primary_field_checked()?;
        let data = inner
            .storage
            .columns()
            .bulk_subscript(pk_meta, &result.seg_offsets)?;
        let ids = Ids::from_field_data(pk_meta.field_id, &data)?;

        result.pk_type = Some(ids.data_type());
        result.primary_keys = ids.into_keys();
        Ok(())
    }

    /// Materializes every output field of `plan` at the hit offsets.
    ///
    /// No byte budget applies; search results are already bounded by top-k.
    pub fn fill_target_entry(&self, plan: &SearchPlan, result: &mut SearchResult) -> SegcoreResult<()> {
        plan.node()?;
        let inner = self.inner.read();
        let columns = inner.storage.columns();
        for &field_id in &plan.target_entries {
            let meta = self.schema.field(field_id)?;
            let column = materialize(columns, meta, &result.seg_offsets)?;
            result.output_fields_data.insert(field_id, column);
        }
        Ok(())
    }

    /// Selects rows visible at `ts`, then materializes the plan's output
    /// fields within a `limit_bytes` output budget.
    ///
    /// The budget is checked on the estimate `sum(avg_size) * rows` before
    /// any column is built; an over-budget call fails without a partial
    /// result. Count plans return a single INT64 count column.
    pub fn retrieve(
        &self,
        plan: &RetrievePlan,
        ts: Timestamp,
        limit_bytes: i64,
    ) -> SegcoreResult<RetrieveResults> {
        let segment = self.id.to_string();
        let scope = ObservationScope::with_fields("RETRIEVE", &[("segment", &segment)]);

        let inner = self.inner.read();
        match self.retrieve_locked(&inner, plan, ts, limit_bytes) {
            Ok(results) => {
                self.metrics.increment_retrieves();
                let rows = results.offsets.len().to_string();
                scope.complete_with_fields(&[("rows", &rows)]);
                Ok(results)
            }
            Err(e) if e.is_rejection() => {
                scope.reject(e.message());
                Err(e)
            }
            Err(e) => {
                scope.fail(e.message());
                Err(e)
            }
        }
    }

    fn retrieve_locked(
        &self,
        inner: &SegmentInner,
        plan: &RetrievePlan,
        ts: Timestamp,
        limit_bytes: i64,
    ) -> SegcoreResult<RetrieveResults> {
        plan.validate(&self.schema)?;
        let node = plan.node()?;

        let view = self.view(inner);
        let mut selection = self.executor.execute_retrieve(&view, node, ts)?;
        selection.segment = Some(self.id);

        let rows = selection.result_offsets.len() as i64;
        let mut estimated: i64 = 0;
        for &field_id in &plan.field_ids {
            let avg = self.field_avg_size_locked(inner, field_id)?;
            estimated = estimated.saturating_add(avg.saturating_mul(rows));
        }
        if estimated > limit_bytes {
            self.metrics.increment_retrieves_rejected();
            let (est, limit) = (estimated.to_string(), limit_bytes.to_string());
            log_event_with_fields(
                Event::RetrieveLimitExceeded,
                &[("estimated", &est), ("limit", &limit)],
            );
            return Err(SegcoreError::retrieve_limit(estimated, limit_bytes));
        }

        if node.is_count {
            return Ok(RetrieveResults {
                ids: None,
                offsets: Vec::new(),
                fields_data: selection.field_data,
            });
        }

        let columns = inner.storage.columns();
        let offsets = &selection.result_offsets;
        let mut ids = None;
        let mut fields_data = Vec::with_capacity(plan.field_ids.len());

        for &field_id in &plan.field_ids {
            if let Some(system) = SystemFieldType::of(field_id) {
                let values = columns.bulk_subscript_system(system, offsets)?;
                fields_data.push(DataArray::longs(field_id, values));
                continue;
            }

            let meta = self.schema.field(field_id)?;
            let column = materialize(columns, meta, offsets)?;
            if meta.is_primary_key {
                ids = Some(Ids::from_field_data(field_id, &column.field)?);
            }
            fields_data.push(column);
        }

        Ok(RetrieveResults {
            ids,
            offsets: selection.result_offsets,
            fields_data,
        })
    }

    /// Number of live rows across the whole timestamp range
    pub fn get_real_count(&self) -> SegcoreResult<i64> {
        self.get_real_count_at(MAX_TIMESTAMP)
    }

    /// Number of rows visible and not deleted at `ts`
    pub fn get_real_count_at(&self, ts: Timestamp) -> SegcoreResult<i64> {
        let results = self.retrieve(&RetrievePlan::count(), ts, i64::MAX)?;
        single_count(&results.fields_data)
    }

    /// Bytes per row of a field: fixed width, the running average for
    /// variable-length fields (0 while unknown), 8 for system fields
    pub fn get_field_avg_size(&self, field_id: FieldId) -> SegcoreResult<i64> {
        let inner = self.inner.read();
        self.field_avg_size_locked(&inner, field_id)
    }

    fn field_avg_size_locked(&self, inner: &SegmentInner, field_id: FieldId) -> SegcoreResult<i64> {
        if field_id.get() < 0 {
            return Err(SegcoreError::field_id_invalid(field_id, "negative field id"));
        }
        if field_id.is_system() {
            return match SystemFieldType::of(field_id) {
                Some(_) => Ok(SYSTEM_FIELD_SIZE),
                None => Err(SegcoreError::field_id_invalid(
                    field_id,
                    "unsupported system field id",
                )),
            };
        }
        let meta = self.schema.field(field_id)?;
        Ok(meta
            .size_of()
            .unwrap_or_else(|| inner.estimator.avg_size(field_id)))
    }

    /// Read-only view of the skip index, holding the shared lock
    pub fn skip_index(&self) -> MappedRwLockReadGuard<'_, SkipIndex> {
        RwLockReadGuard::map(self.inner.read(), |inner| &inner.skip_index)
    }

    /// Bulk visibility filter over the window `[0, bitset.len())`
    pub fn timestamp_filter(&self, bitset: &mut Bitset, ts: Timestamp) -> usize {
        let inner = self.inner.read();
        TimestampFilter::apply(bitset, inner.storage.columns().timestamps(), ts)
    }

    /// Point visibility filter over an explicit offset list
    pub fn timestamp_filter_offsets(&self, bitset: &mut Bitset, offsets: &[i64], ts: Timestamp) -> usize {
        let inner = self.inner.read();
        TimestampFilter::apply_offsets(bitset, inner.storage.columns().timestamps(), offsets, ts)
    }

    /// Primary key field, checked to be INT64 or VARCHAR
    pub(super) fn primary_field_checked(&self) -> SegcoreResult<&FieldMeta> {
        let result = match self.schema.primary_field() {
            None => Err(SegcoreError::schema_inconsistency(
                "schema defines no primary key field",
            )),
            Some(meta) if !meta.data_type.is_primary_key_type() => {
                Err(SegcoreError::schema_inconsistency(format!(
                    "primary key field {} is {}, expected INT64 or VARCHAR",
                    meta.field_id, meta.data_type
                )))
            }
            Some(meta) => Ok(meta),
        };
        if let Err(e) = &result {
            log_event_with_fields(Event::SchemaInconsistency, &[("reason", e.message())]);
        }
        result
    }
}

/// Builds the output column of `meta` at `offsets`. ARRAY columns carry
/// their declared element type.
fn materialize(columns: &ColumnChunks, meta: &FieldMeta, offsets: &[i64]) -> SegcoreResult<DataArray> {
    let mut data = columns.bulk_subscript(meta, offsets)?;
    if let FieldData::Scalars(ScalarField::Array { element_type, .. }) = &mut data {
        *element_type = meta.element_type;
    }
    Ok(DataArray::new(meta.field_id, meta.data_type, data))
}
