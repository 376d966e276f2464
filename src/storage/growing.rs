//! Growing storage: fixed-size chunks filled by arbitrary inserts

use crate::errors::{SegcoreError, SegcoreResult};
use crate::schema::Schema;

use super::batch::InsertBatch;
use super::columns::ColumnChunks;
use super::strategy::{SegmentKind, SegmentStorage};

#[derive(Debug)]
pub struct GrowingStorage {
    columns: ColumnChunks,
    chunk_rows: usize,
}

impl GrowingStorage {
    pub fn new(schema: &Schema, chunk_rows: usize) -> Self {
        Self {
            columns: ColumnChunks::new(schema),
            chunk_rows: chunk_rows.max(1),
        }
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }
}

impl SegmentStorage for GrowingStorage {
    fn kind(&self) -> SegmentKind {
        SegmentKind::Growing
    }

    fn columns(&self) -> &ColumnChunks {
        &self.columns
    }

    fn append(&mut self, batch: InsertBatch) -> SegcoreResult<Vec<usize>> {
        self.columns.push_rows(batch, self.chunk_rows)
    }

    fn seal(&mut self) -> SegcoreResult<()> {
        Err(SegcoreError::invalid_insert(
            "growing storage cannot be sealed in place",
        ))
    }

    fn is_sealed(&self) -> bool {
        false
    }
}
