//! Chunked column layout shared by all storage strategies
//!
//! Chunk boundaries are segment-wide: chunk `i` covers the same row range
//! in every field column. System columns (row ids, timestamps) are kept
//! contiguous since visibility filtering binary-searches them.

use std::collections::HashMap;
use std::ops::Range;

use crate::errors::{SegcoreError, SegcoreResult};
use crate::mvcc::Timestamp;
use crate::schema::{FieldId, FieldMeta, Schema, SystemFieldType};

use super::batch::InsertBatch;
use super::data::FieldData;

/// Read-side view of a segment's columnar data
#[derive(Debug, Clone)]
pub struct ColumnChunks {
    chunks: HashMap<FieldId, Vec<FieldData>>,
    bounds: Vec<Range<usize>>,
    timestamps: Vec<Timestamp>,
    row_ids: Vec<i64>,
}

impl ColumnChunks {
    pub fn new(schema: &Schema) -> Self {
        Self {
            chunks: schema.fields().map(|f| (f.field_id, Vec::new())).collect(),
            bounds: Vec::new(),
            timestamps: Vec::new(),
            row_ids: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Per-row timestamps, non-decreasing by offset
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn row_ids(&self) -> &[i64] {
        &self.row_ids
    }

    pub fn num_chunks(&self) -> usize {
        self.bounds.len()
    }

    /// Row range covered by a chunk
    pub fn chunk_range(&self, chunk_id: usize) -> Option<Range<usize>> {
        self.bounds.get(chunk_id).cloned()
    }

    pub fn chunk(&self, field_id: FieldId, chunk_id: usize) -> Option<&FieldData> {
        self.chunks.get(&field_id).and_then(|c| c.get(chunk_id))
    }

    /// Resolves a segment offset to `(chunk_id, row_in_chunk)`
    pub fn locate(&self, offset: i64) -> SegcoreResult<(usize, usize)> {
        let offset = usize::try_from(offset)
            .ok()
            .filter(|o| *o < self.row_count())
            .ok_or_else(|| {
                SegcoreError::internal(format!(
                    "row offset {} outside segment of {} rows",
                    offset,
                    self.row_count()
                ))
            })?;
        let chunk_id = self.bounds.partition_point(|r| r.end <= offset);
        Ok((chunk_id, offset - self.bounds[chunk_id].start))
    }

    /// Reads `meta`'s values at `offsets`, in offset-list order
    pub fn bulk_subscript(&self, meta: &FieldMeta, offsets: &[i64]) -> SegcoreResult<FieldData> {
        let mut out = FieldData::empty_for(meta);
        for &offset in offsets {
            let (chunk_id, row) = self.locate(offset)?;
            let chunk = self.chunk(meta.field_id, chunk_id).ok_or_else(|| {
                SegcoreError::field_id_invalid(meta.field_id, "field has no loaded data")
            })?;
            out.push_row(chunk, row)?;
        }
        Ok(out)
    }

    /// Reads a system pseudo-field at `offsets`
    pub fn bulk_subscript_system(
        &self,
        system: SystemFieldType,
        offsets: &[i64],
    ) -> SegcoreResult<Vec<i64>> {
        offsets
            .iter()
            .map(|&offset| {
                let (chunk_id, row) = self.locate(offset)?;
                let pos = self.bounds[chunk_id].start + row;
                Ok(match system {
                    SystemFieldType::RowId => self.row_ids[pos],
                    SystemFieldType::Timestamp => self.timestamps[pos] as i64,
                })
            })
            .collect()
    }

    /// Appends `batch` as a new chunk of exactly its rows
    pub(crate) fn push_chunk(&mut self, batch: InsertBatch) -> SegcoreResult<usize> {
        let start = self.row_count();
        let rows = batch.num_rows();
        for (field_id, data) in batch.columns {
            self.field_chunks_mut(field_id)?.push(data);
        }
        self.timestamps.extend(batch.timestamps);
        self.row_ids.extend(batch.row_ids);
        self.bounds.push(start..start + rows);
        Ok(self.bounds.len() - 1)
    }

    /// Appends `batch` into chunks of at most `chunk_rows` rows, topping up
    /// the last chunk first. Returns every chunk id that changed.
    pub(crate) fn push_rows(&mut self, batch: InsertBatch, chunk_rows: usize) -> SegcoreResult<Vec<usize>> {
        let rows = batch.num_rows();
        let mut touched = Vec::new();
        let mut pos = 0;

        while pos < rows {
            let open_chunk = self
                .bounds
                .last()
                .filter(|r| r.len() < chunk_rows)
                .map(|r| r.len());

            match open_chunk {
                Some(filled) => {
                    let take = (chunk_rows - filled).min(rows - pos);
                    let chunk_id = self.bounds.len() - 1;
                    for (field_id, data) in &batch.columns {
                        let last = self
                            .field_chunks_mut(*field_id)?
                            .last_mut()
                            .ok_or_else(|| SegcoreError::internal("chunk bounds without data"))?;
                        last.append(data.slice(pos, pos + take))?;
                    }
                    self.bounds[chunk_id].end += take;
                    touched.push(chunk_id);
                    pos += take;
                }
                None => {
                    let take = chunk_rows.min(rows - pos);
                    let start = self.bounds.last().map_or(0, |r| r.end);
                    for (field_id, data) in &batch.columns {
                        let slice = data.slice(pos, pos + take);
                        self.field_chunks_mut(*field_id)?.push(slice);
                    }
                    self.bounds.push(start..start + take);
                    touched.push(self.bounds.len() - 1);
                    pos += take;
                }
            }
        }

        self.timestamps.extend(batch.timestamps);
        self.row_ids.extend(batch.row_ids);
        Ok(touched)
    }

    fn field_chunks_mut(&mut self, field_id: FieldId) -> SegcoreResult<&mut Vec<FieldData>> {
        self.chunks
            .get_mut(&field_id)
            .ok_or_else(|| SegcoreError::field_id_invalid(field_id, "field not found in schema"))
    }
}
