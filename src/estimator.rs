//! Running-average size records for variable-length fields
//!
//! The retrieve byte budget is checked against `avg_size * rows` before
//! any column is materialized. Averages lag the true distribution after a
//! burst of unusually large rows; the estimate is a heuristic, not a
//! memory bound.

use std::collections::HashMap;

use crate::schema::FieldId;

/// Rows seen and their integer average payload size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeRecord {
    pub rows: i64,
    pub avg_size: i64,
}

/// Per-field running averages
#[derive(Debug, Clone, Default)]
pub struct FieldSizeEstimator {
    records: HashMap<FieldId, SizeRecord>,
}

impl FieldSizeEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded average, 0 when nothing has been loaded for the field
    pub fn avg_size(&self, field_id: FieldId) -> i64 {
        self.records.get(&field_id).map_or(0, |r| r.avg_size)
    }

    pub fn record(&self, field_id: FieldId) -> Option<SizeRecord> {
        self.records.get(&field_id).copied()
    }

    /// Folds `bytes_added` over `rows_added` new rows into the average:
    /// `(avg * rows + bytes_added) / (rows + rows_added)`.
    ///
    /// Returns the new average. Non-positive `rows_added` leaves the record
    /// untouched. Totals saturate at `i64::MAX`.
    pub fn update(&mut self, field_id: FieldId, rows_added: i64, bytes_added: i64) -> i64 {
        let record = self.records.entry(field_id).or_default();
        if rows_added <= 0 {
            return record.avg_size;
        }
        let total_rows = record.rows.saturating_add(rows_added);
        let total_bytes = record
            .avg_size
            .saturating_mul(record.rows)
            .saturating_add(bytes_added);
        record.rows = total_rows;
        record.avg_size = total_bytes / total_rows;
        record.avg_size
    }
}
