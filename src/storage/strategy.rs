//! Storage strategies
//!
//! A segment holds exactly one strategy, chosen at construction. The
//! strategy decides how appended rows are cut into chunks; everything on
//! the read side goes through the shared [`ColumnChunks`] layout.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SegcoreResult;
use crate::schema::Schema;

use super::batch::InsertBatch;
use super::columns::ColumnChunks;
use super::growing::GrowingStorage;
use super::sealed::SealedStorage;

/// Storage strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Accepts inserts of any size, cut into fixed-size chunks
    Growing,
    /// Loaded batch-per-chunk, immutable once sealed
    Sealed,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Growing => "growing",
            SegmentKind::Sealed => "sealed",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capability interface over a segment's columnar storage.
///
/// Implementations are only mutated under the segment's exclusive lock;
/// `append` receives batches already validated against the schema.
pub trait SegmentStorage: Send + Sync + fmt::Debug {
    fn kind(&self) -> SegmentKind;

    /// Read-side column layout
    fn columns(&self) -> &ColumnChunks;

    /// Appends validated rows. Returns the ids of every chunk that changed.
    fn append(&mut self, batch: InsertBatch) -> SegcoreResult<Vec<usize>>;

    /// Freezes the storage against further appends
    fn seal(&mut self) -> SegcoreResult<()>;

    fn is_sealed(&self) -> bool;
}

/// Builds the strategy for `kind`
pub fn new_storage(kind: SegmentKind, schema: &Schema, chunk_rows: usize) -> Box<dyn SegmentStorage> {
    match kind {
        SegmentKind::Growing => Box::new(GrowingStorage::new(schema, chunk_rows)),
        SegmentKind::Sealed => Box::new(SealedStorage::new(schema)),
    }
}
