//! Result types for search and retrieve
//!
//! Results are request-scoped. They tag the segment that produced them by
//! `SegmentId` only; the id is never used to reach back into the segment.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::errors::{SegcoreError, SegcoreResult};
use crate::plan::MetricType;
use crate::schema::{DataType, FieldId};
use crate::segment::SegmentId;
use crate::storage::{FieldData, ScalarField};

/// Primary key value of a single row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int64(i64),
    VarChar(String),
}

impl PrimaryKey {
    pub fn data_type(&self) -> DataType {
        match self {
            PrimaryKey::Int64(_) => DataType::Int64,
            PrimaryKey::VarChar(_) => DataType::VarChar,
        }
    }
}

/// Primary keys of a result set, one storage form per key type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ids {
    IntId(Vec<i64>),
    StrId(Vec<String>),
}

impl Ids {
    /// Parses a materialized primary-key column.
    ///
    /// Only INT64 and VARCHAR columns hold primary keys; any other
    /// payload is a broken schema invariant.
    pub fn from_field_data(field_id: FieldId, data: &FieldData) -> SegcoreResult<Self> {
        match data.as_scalars() {
            Some(ScalarField::Long(v)) => Ok(Ids::IntId(v.clone())),
            Some(ScalarField::String(v)) => Ok(Ids::StrId(v.clone())),
            _ => Err(SegcoreError::data_type_invalid(
                field_id,
                "primary key column is neither INT64 nor VARCHAR",
            )),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Ids::IntId(_) => DataType::Int64,
            Ids::StrId(_) => DataType::VarChar,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Ids::IntId(v) => v.len(),
            Ids::StrId(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<PrimaryKey> {
        match self {
            Ids::IntId(v) => v.get(i).map(|k| PrimaryKey::Int64(*k)),
            Ids::StrId(v) => v.get(i).map(|k| PrimaryKey::VarChar(k.clone())),
        }
    }

    pub fn into_keys(self) -> Vec<PrimaryKey> {
        match self {
            Ids::IntId(v) => v.into_iter().map(PrimaryKey::Int64).collect(),
            Ids::StrId(v) => v.into_iter().map(PrimaryKey::VarChar).collect(),
        }
    }
}

/// One materialized output column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArray {
    /// Unset for aggregate columns such as a count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<FieldId>,
    pub data_type: DataType,
    pub field: FieldData,
}

impl DataArray {
    pub fn new(field_id: FieldId, data_type: DataType, field: FieldData) -> Self {
        Self {
            field_id: Some(field_id),
            data_type,
            field,
        }
    }

    /// INT64 column built from system metadata
    pub fn longs(field_id: FieldId, values: Vec<i64>) -> Self {
        Self::new(
            field_id,
            DataType::Int64,
            FieldData::Scalars(ScalarField::Long(values)),
        )
    }

    /// Single-row count aggregate
    pub fn count(count: i64) -> Self {
        Self {
            field_id: None,
            data_type: DataType::Int64,
            field: FieldData::Scalars(ScalarField::Long(vec![count])),
        }
    }

    /// The column's values when it is an INT64 scalar column
    pub fn as_longs(&self) -> Option<&[i64]> {
        match self.field.as_scalars() {
            Some(ScalarField::Long(v)) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_empty()
    }
}

/// Hits of a vector search over one segment.
///
/// Hits are grouped per query; query `i` owns
/// `topk_per_nq_prefix_sum[i]..topk_per_nq_prefix_sum[i + 1]`.
/// `distances.len() == seg_offsets.len()` always holds; `primary_keys` is
/// empty until `fill_primary_keys` and then has the same length.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub segment: Option<SegmentId>,
    pub total_nq: usize,
    pub unity_topk: usize,
    pub metric_type: Option<MetricType>,
    pub seg_offsets: Vec<i64>,
    pub distances: Vec<f32>,
    pub topk_per_nq_prefix_sum: Vec<usize>,
    pub primary_keys: Vec<PrimaryKey>,
    pub pk_type: Option<DataType>,
    pub output_fields_data: HashMap<FieldId, DataArray>,
}

impl SearchResult {
    /// Number of hits across all queries
    pub fn len(&self) -> usize {
        self.seg_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seg_offsets.is_empty()
    }

    /// Hit range of query `nq`
    pub fn query_range(&self, nq: usize) -> Option<Range<usize>> {
        let start = *self.topk_per_nq_prefix_sum.get(nq)?;
        let end = *self.topk_per_nq_prefix_sum.get(nq + 1)?;
        Some(start..end)
    }

    /// Offsets and distances must pair up
    pub fn check_shape(&self) -> SegcoreResult<()> {
        if self.seg_offsets.len() != self.distances.len() {
            return Err(SegcoreError::internal(format!(
                "search result has {} offsets but {} distances",
                self.seg_offsets.len(),
                self.distances.len()
            )));
        }
        Ok(())
    }
}

/// Row selection produced by the plan executor for a retrieve
#[derive(Debug, Clone, Default)]
pub struct RetrieveResult {
    pub segment: Option<SegmentId>,
    /// Matching row offsets, ascending
    pub result_offsets: Vec<i64>,
    /// Aggregate columns; a count plan yields exactly one
    pub field_data: Vec<DataArray>,
}

/// Materialized output of a retrieve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieveResults {
    /// Primary keys, present when the key field was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Ids>,
    pub offsets: Vec<i64>,
    pub fields_data: Vec<DataArray>,
}

impl RetrieveResults {
    /// Column of `field_id`, if it was requested
    pub fn field(&self, field_id: FieldId) -> Option<&DataArray> {
        self.fields_data
            .iter()
            .find(|d| d.field_id == Some(field_id))
    }
}
