//! Insert batches handed to the writer-side ingestion path

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{SegcoreError, SegcoreResult};
use crate::mvcc::Timestamp;
use crate::schema::{FieldId, Schema};

use super::data::FieldData;

/// A set of rows with one payload per schema field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertBatch {
    pub row_ids: Vec<i64>,
    pub timestamps: Vec<Timestamp>,
    pub columns: BTreeMap<FieldId, FieldData>,
}

impl InsertBatch {
    pub fn new(row_ids: Vec<i64>, timestamps: Vec<Timestamp>) -> Self {
        Self {
            row_ids,
            timestamps,
            columns: BTreeMap::new(),
        }
    }

    /// Adds the payload of one field
    pub fn with_column(mut self, field_id: FieldId, data: FieldData) -> Self {
        self.columns.insert(field_id, data);
        self
    }

    pub fn num_rows(&self) -> usize {
        self.timestamps.len()
    }

    /// Checks the batch against the schema and the segment's current tail.
    ///
    /// Timestamps must be non-decreasing within the batch and must not go
    /// below `last_timestamp`; visibility filtering depends on it.
    pub fn validate(&self, schema: &Schema, last_timestamp: Option<Timestamp>) -> SegcoreResult<()> {
        let rows = self.num_rows();
        if rows == 0 {
            return Err(SegcoreError::invalid_insert("insert batch is empty"));
        }
        if self.row_ids.len() != rows {
            return Err(SegcoreError::invalid_insert(format!(
                "row id count {} does not match timestamp count {}",
                self.row_ids.len(),
                rows
            )));
        }

        if let (Some(last), Some(&first)) = (last_timestamp, self.timestamps.first()) {
            if first < last {
                return Err(SegcoreError::invalid_insert(format!(
                    "timestamp {} precedes segment tail {}",
                    first, last
                )));
            }
        }
        if self.timestamps.windows(2).any(|w| w[1] < w[0]) {
            return Err(SegcoreError::invalid_insert(
                "timestamps within a batch must be non-decreasing",
            ));
        }

        for field in schema.fields() {
            let data = self.columns.get(&field.field_id).ok_or_else(|| {
                SegcoreError::invalid_insert(format!("missing column for field {}", field.field_id))
            })?;
            if !data.conforms_to(field) {
                return Err(SegcoreError::invalid_insert(format!(
                    "column for field {} does not match declared type {}",
                    field.field_id, field.data_type
                )));
            }
            if data.len() != rows {
                return Err(SegcoreError::invalid_insert(format!(
                    "column for field {} has {} rows, expected {}",
                    field.field_id,
                    data.len(),
                    rows
                )));
            }
        }

        if let Some(extra) = self.columns.keys().find(|id| !schema.contains(**id)) {
            return Err(SegcoreError::invalid_insert(format!(
                "column for undeclared field {}",
                extra
            )));
        }

        Ok(())
    }
}
