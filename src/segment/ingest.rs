//! Write path: inserts, deletes and load-time hooks
//!
//! Every method here holds the segment lock exclusively for its whole
//! duration.

use crate::errors::{SegcoreError, SegcoreResult};
use crate::mvcc::Timestamp;
use crate::observability::{log_event_with_fields, Event};
use crate::plan::{Expr, RetrievePlan, RetrievePlanNode};
use crate::result::PrimaryKey;
use crate::schema::{DataType, FieldId, Schema};
use crate::skip_index::SkipIndex;
use crate::storage::{ColumnChunks, FieldData, InsertBatch, ScalarValue};

use super::{Segment, SegmentInner};

impl Segment {
    /// Appends a batch of rows.
    ///
    /// The batch must carry one column per schema field and timestamps
    /// that do not go below the segment's last row. Skip index entries of
    /// every touched chunk are rebuilt and the size averages of
    /// variable-length fields are updated.
    pub fn insert(&self, batch: InsertBatch) -> SegcoreResult<()> {
        let mut inner = self.inner.write();
        let last_ts = inner.storage.columns().timestamps().last().copied();
        batch.validate(&self.schema, last_ts)?;

        let rows = batch.num_rows();
        let var_sizes: Vec<(FieldId, i64)> = self
            .schema
            .fields()
            .filter(|f| f.data_type.is_variable())
            .filter_map(|f| {
                batch
                    .columns
                    .get(&f.field_id)
                    .map(|data| (f.field_id, data.byte_size() as i64))
            })
            .collect();

        let touched = inner.storage.append(batch)?;

        let SegmentInner {
            storage,
            skip_index,
            estimator,
            ..
        } = &mut *inner;
        if self.config.skip_index_enabled {
            for &chunk_id in &touched {
                reload_skip_index(&self.schema, storage.columns(), skip_index, chunk_id)?;
            }
        }
        for (field_id, bytes) in var_sizes {
            estimator.update(field_id, rows as i64, bytes);
        }

        self.metrics.add_rows_inserted(rows as u64);
        self.metrics.add_chunks_appended(touched.len() as u64);
        let (rows, chunks) = (rows.to_string(), touched.len().to_string());
        log_event_with_fields(
            Event::ChunkAppended,
            &[("rows", &rows), ("chunks", &chunks)],
        );
        Ok(())
    }

    /// Marks `pks` deleted as of `ts`. Rows of those keys written before
    /// `ts` are hidden; rows written later are not. Returns how many keys
    /// had no delete recorded at `ts` yet.
    pub fn delete(&self, pks: &[PrimaryKey], ts: Timestamp) -> SegcoreResult<usize> {
        let pk_meta = self.primary_field_checked()?;
        if let Some(bad) = pks.iter().find(|pk| pk.data_type() != pk_meta.data_type) {
            return Err(SegcoreError::invalid_insert(format!(
                "delete key {:?} does not match primary key type {}",
                bad, pk_meta.data_type
            )));
        }

        let mut inner = self.inner.write();
        let applied = pks
            .iter()
            .filter(|pk| match pk {
                PrimaryKey::Int64(v) => inner.deletes.push_int(*v, ts),
                PrimaryKey::VarChar(v) => inner.deletes.push_str(v, ts),
            })
            .count();
        drop(inner);

        self.metrics.add_deletes(applied as u64);
        let (keys, applied_str, ts) = (pks.len().to_string(), applied.to_string(), ts.to_string());
        log_event_with_fields(
            Event::DeleteApplied,
            &[("keys", &keys), ("applied", &applied_str), ("ts", &ts)],
        );
        Ok(applied)
    }

    /// Deletes the rows matching `expr` as of `ts`.
    ///
    /// A plain term or equality on the primary key is applied directly;
    /// any other predicate is first resolved to keys by a retrieve at `ts`.
    pub fn delete_by_expr(&self, expr: &Expr, ts: Timestamp) -> SegcoreResult<usize> {
        let pk_field = self.primary_field_checked()?.field_id;

        let keys = match expr.primary_keys_for(pk_field) {
            Some(values) => values
                .into_iter()
                .map(primary_key_from_literal)
                .collect::<SegcoreResult<Vec<_>>>()?,
            None => {
                let plan = RetrievePlan::new(
                    RetrievePlanNode {
                        predicate: Some(expr.clone()),
                        ..RetrievePlanNode::default()
                    },
                    vec![pk_field],
                );
                self.retrieve(&plan, ts, i64::MAX)?
                    .ids
                    .map(|ids| ids.into_keys())
                    .unwrap_or_default()
            }
        };
        self.delete(&keys, ts)
    }

    /// Freezes a sealed-strategy segment against further inserts
    pub fn seal(&self) -> SegcoreResult<()> {
        self.inner.write().storage.seal()
    }

    /// Folds `rows_added` rows of `bytes_added` total into the running
    /// average of a variable-length field. Fixed-width fields are left
    /// alone.
    pub fn set_field_avg_size(&self, field_id: FieldId, rows_added: i64, bytes_added: i64) -> SegcoreResult<()> {
        let meta = self.schema.field(field_id)?;
        if !meta.data_type.is_variable() {
            return Ok(());
        }
        if rows_added <= 0 {
            return Err(SegcoreError::invalid_insert(format!(
                "rows added to field {} must be > 0, got {}",
                field_id, rows_added
            )));
        }
        self.inner
            .write()
            .estimator
            .update(field_id, rows_added, bytes_added);
        Ok(())
    }

    /// Summarizes a numeric or boolean chunk into the skip index
    pub fn load_primitive_skip_index(
        &self,
        field_id: FieldId,
        chunk_id: usize,
        data_type: DataType,
        data: &FieldData,
    ) -> SegcoreResult<()> {
        let loaded = self
            .inner
            .write()
            .skip_index
            .load_primitive(field_id, chunk_id, data_type, data)?;
        log_skip_index_loaded(field_id, chunk_id, loaded);
        Ok(())
    }

    /// Summarizes a VARCHAR chunk into the skip index
    pub fn load_string_skip_index(&self, field_id: FieldId, chunk_id: usize, data: &FieldData) -> SegcoreResult<()> {
        let loaded = self
            .inner
            .write()
            .skip_index
            .load_string(field_id, chunk_id, data)?;
        log_skip_index_loaded(field_id, chunk_id, loaded);
        Ok(())
    }
}

fn reload_skip_index(
    schema: &Schema,
    columns: &ColumnChunks,
    skip_index: &mut SkipIndex,
    chunk_id: usize,
) -> SegcoreResult<()> {
    for field in schema.fields() {
        let Some(data) = columns.chunk(field.field_id, chunk_id) else {
            continue;
        };
        let dt = field.data_type;
        let loaded = if dt == DataType::Bool || dt.is_integer() || dt.is_float() {
            skip_index.load_primitive(field.field_id, chunk_id, dt, data)?
        } else if dt == DataType::VarChar {
            skip_index.load_string(field.field_id, chunk_id, data)?
        } else {
            continue;
        };
        log_skip_index_loaded(field.field_id, chunk_id, loaded);
    }
    Ok(())
}

fn log_skip_index_loaded(field_id: FieldId, chunk_id: usize, loaded: bool) {
    let (field, chunk) = (field_id.to_string(), chunk_id.to_string());
    log_event_with_fields(
        Event::SkipIndexLoaded,
        &[
            ("field", &field),
            ("chunk", &chunk),
            ("metrics", if loaded { "minmax" } else { "none" }),
        ],
    );
}

fn primary_key_from_literal(value: ScalarValue) -> SegcoreResult<PrimaryKey> {
    match value {
        ScalarValue::Int(v) => Ok(PrimaryKey::Int64(v)),
        ScalarValue::String(v) => Ok(PrimaryKey::VarChar(v)),
        other => Err(SegcoreError::invalid_plan(format!(
            "{:?} cannot be a primary key",
            other
        ))),
    }
}
