//! Index metadata of a segment's vector fields

use serde::{Deserialize, Serialize};

use crate::errors::{SegcoreError, SegcoreResult};
use crate::schema::FieldId;

use super::search::MetricType;

/// How one field's index was built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIndexMeta {
    pub field_id: FieldId,
    #[serde(default)]
    pub index_type: String,
    pub metric_type: MetricType,
}

/// Per-field index metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    #[serde(default)]
    pub fields: Vec<FieldIndexMeta>,
}

impl IndexMeta {
    pub fn new(fields: Vec<FieldIndexMeta>) -> Self {
        Self { fields }
    }

    /// Single-field metadata
    pub fn single(field_id: FieldId, index_type: impl Into<String>, metric_type: MetricType) -> Self {
        Self::new(vec![FieldIndexMeta {
            field_id,
            index_type: index_type.into(),
            metric_type,
        }])
    }

    pub fn field_index_meta(&self, field_id: FieldId) -> Option<&FieldIndexMeta> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    /// Resolves the metric a search on `field_id` runs under.
    ///
    /// An unset request metric adopts the index's metric; an explicit one
    /// must equal it. Fields without index metadata keep the request
    /// metric as given.
    pub fn resolve_metric(
        &self,
        field_id: FieldId,
        requested: Option<MetricType>,
    ) -> SegcoreResult<Option<MetricType>> {
        let Some(index) = self.field_index_meta(field_id) else {
            return Ok(requested);
        };
        match requested {
            None => Ok(Some(index.metric_type)),
            Some(metric) if metric == index.metric_type => Ok(Some(metric)),
            Some(metric) => Err(SegcoreError::metric_mismatch(index.metric_type, metric)),
        }
    }
}
