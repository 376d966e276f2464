//! Sealed storage: one chunk per loaded batch, frozen after `seal`

use crate::errors::{SegcoreError, SegcoreResult};
use crate::schema::Schema;

use super::batch::InsertBatch;
use super::columns::ColumnChunks;
use super::strategy::{SegmentKind, SegmentStorage};

#[derive(Debug)]
pub struct SealedStorage {
    columns: ColumnChunks,
    sealed: bool,
}

impl SealedStorage {
    pub fn new(schema: &Schema) -> Self {
        Self {
            columns: ColumnChunks::new(schema),
            sealed: false,
        }
    }
}

impl SegmentStorage for SealedStorage {
    fn kind(&self) -> SegmentKind {
        SegmentKind::Sealed
    }

    fn columns(&self) -> &ColumnChunks {
        &self.columns
    }

    fn append(&mut self, batch: InsertBatch) -> SegcoreResult<Vec<usize>> {
        if self.sealed {
            return Err(SegcoreError::invalid_insert(
                "sealed segment does not accept new chunks",
            ));
        }
        Ok(vec![self.columns.push_chunk(batch)?])
    }

    fn seal(&mut self) -> SegcoreResult<()> {
        self.sealed = true;
        Ok(())
    }

    fn is_sealed(&self) -> bool {
        self.sealed
    }
}
