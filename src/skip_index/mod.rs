//! Chunk skip index
//!
//! Per (field, chunk) min/max summaries built when a chunk lands and
//! read-only afterwards. The plan executor asks whether a chunk can be
//! skipped for a predicate leaf before evaluating its rows.
//!
//! Pruning must be conservative:
//! - False positives allowed (a kept chunk may hold no match)
//! - False negatives forbidden (a skipped chunk never holds a match)
//!
//! A chunk without metrics is never skipped.

mod metrics;

use std::collections::HashMap;

use crate::errors::{SegcoreError, SegcoreResult};
use crate::plan::OpType;
use crate::schema::{DataType, FieldId};
use crate::storage::{FieldData, ScalarValue};

pub use metrics::FieldChunkMetrics;

/// Min/max summaries keyed by field and chunk
#[derive(Debug, Clone, Default)]
pub struct SkipIndex {
    metrics: HashMap<(FieldId, usize), FieldChunkMetrics>,
}

impl SkipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarizes a numeric or boolean chunk, replacing any earlier entry.
    ///
    /// Returns whether metrics were recorded; chunks with no comparable
    /// values leave the entry absent.
    pub fn load_primitive(
        &mut self,
        field_id: FieldId,
        chunk_id: usize,
        data_type: DataType,
        data: &FieldData,
    ) -> SegcoreResult<bool> {
        if !(data_type == DataType::Bool || data_type.is_integer() || data_type.is_float()) {
            return Err(SegcoreError::data_type_invalid(
                field_id,
                format!("{} has no primitive skip index", data_type),
            ));
        }
        let scalars = data
            .as_scalars()
            .filter(|s| s.stores(data_type))
            .ok_or_else(|| {
                SegcoreError::data_type_invalid(
                    field_id,
                    format!("chunk payload does not hold {}", data_type),
                )
            })?;
        Ok(self.put(field_id, chunk_id, FieldChunkMetrics::from_scalars(scalars)))
    }

    /// Summarizes a VARCHAR chunk, replacing any earlier entry
    pub fn load_string(
        &mut self,
        field_id: FieldId,
        chunk_id: usize,
        data: &FieldData,
    ) -> SegcoreResult<bool> {
        let scalars = data
            .as_scalars()
            .filter(|s| s.stores(DataType::VarChar))
            .ok_or_else(|| {
                SegcoreError::data_type_invalid(field_id, "chunk payload does not hold VARCHAR")
            })?;
        Ok(self.put(field_id, chunk_id, FieldChunkMetrics::from_scalars(scalars)))
    }

    fn put(&mut self, field_id: FieldId, chunk_id: usize, metrics: Option<FieldChunkMetrics>) -> bool {
        match metrics {
            Some(m) => {
                self.metrics.insert((field_id, chunk_id), m);
                true
            }
            None => {
                self.metrics.remove(&(field_id, chunk_id));
                false
            }
        }
    }

    pub fn get(&self, field_id: FieldId, chunk_id: usize) -> Option<&FieldChunkMetrics> {
        self.metrics.get(&(field_id, chunk_id))
    }

    /// Number of (field, chunk) entries
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Whether no row of the chunk satisfies `field OP value`
    pub fn can_skip_unary_range(
        &self,
        field_id: FieldId,
        chunk_id: usize,
        op: OpType,
        value: &ScalarValue,
    ) -> bool {
        self.get(field_id, chunk_id)
            .map_or(false, |m| m.excludes_unary(op, value.as_value_ref()))
    }

    /// Whether no row of the chunk lies in the given range
    pub fn can_skip_binary_range(
        &self,
        field_id: FieldId,
        chunk_id: usize,
        lower: &ScalarValue,
        upper: &ScalarValue,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> bool {
        self.get(field_id, chunk_id).map_or(false, |m| {
            m.excludes_range(
                lower.as_value_ref(),
                upper.as_value_ref(),
                lower_inclusive,
                upper_inclusive,
            )
        })
    }

    /// Whether no row of the chunk equals any of `values`
    pub fn can_skip_term(&self, field_id: FieldId, chunk_id: usize, values: &[ScalarValue]) -> bool {
        self.get(field_id, chunk_id).map_or(false, |m| {
            values
                .iter()
                .all(|v| m.excludes_unary(OpType::Equal, v.as_value_ref()))
        })
    }

    /// Whether no string of the chunk starts with `prefix`
    pub fn can_skip_prefix(&self, field_id: FieldId, chunk_id: usize, prefix: &str) -> bool {
        self.can_skip_unary_range(
            field_id,
            chunk_id,
            OpType::PrefixMatch,
            &ScalarValue::String(prefix.to_string()),
        )
    }
}
