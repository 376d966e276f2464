//! Search plans and similarity metrics

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{SegcoreError, SegcoreResult};
use crate::schema::{FieldId, Schema};

use super::expr::Expr;

/// Most decimal places a distance can be rounded to
pub const MAX_ROUND_DECIMAL: u32 = 6;

/// Similarity metric of a vector search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MetricType {
    /// Squared Euclidean distance, smaller is closer
    L2,
    /// Inner product, larger is closer
    Ip,
    /// Cosine similarity, larger is closer
    Cosine,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
            MetricType::Cosine => "COSINE",
        }
    }

    /// Whether a larger score means a closer match
    pub fn positively_related(&self) -> bool {
        matches!(self, MetricType::Ip | MetricType::Cosine)
    }

    /// Scores `a` against `b`. Both slices have the field's dimension.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            MetricType::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            MetricType::Ip => dot(a, b),
            MetricType::Cosine => {
                let norm = (dot(a, a) * dot(b, b)).sqrt();
                if norm == 0.0 {
                    0.0
                } else {
                    dot(a, b) / norm
                }
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl FromStr for MetricType {
    type Err = SegcoreError;

    fn from_str(s: &str) -> SegcoreResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L2" => Ok(MetricType::L2),
            "IP" => Ok(MetricType::Ip),
            "COSINE" => Ok(MetricType::Cosine),
            other => Err(SegcoreError::invalid_plan(format!(
                "unknown metric type '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for MetricType {
    type Error = SegcoreError;

    fn try_from(s: String) -> SegcoreResult<Self> {
        s.parse()
    }
}

impl From<MetricType> for String {
    fn from(metric: MetricType) -> Self {
        metric.as_str().to_string()
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of the vector part of a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchInfo {
    /// Vector field searched
    pub field_id: FieldId,
    /// Unset means "use the index's metric"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<MetricType>,
    pub topk: usize,
    /// Decimal places distances are rounded to, at most `MAX_ROUND_DECIMAL`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_decimal: Option<u32>,
}

impl SearchInfo {
    pub fn new(field_id: FieldId, topk: usize) -> Self {
        Self {
            field_id,
            metric_type: None,
            topk,
            round_decimal: None,
        }
    }

    pub fn with_metric(mut self, metric: MetricType) -> Self {
        self.metric_type = Some(metric);
        self
    }
}

/// Vector search node: filtered top-k over one vector field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPlanNode {
    pub search_info: SearchInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Expr>,
}

/// Parsed search plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    /// Absent node is an invalid plan
    #[serde(default)]
    pub plan_node: Option<VectorPlanNode>,
    /// Output fields filled by `fill_target_entry`
    #[serde(default)]
    pub target_entries: Vec<FieldId>,
}

impl SearchPlan {
    pub fn new(search_info: SearchInfo) -> Self {
        Self {
            plan_node: Some(VectorPlanNode {
                search_info,
                predicate: None,
            }),
            target_entries: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: Expr) -> Self {
        if let Some(node) = self.plan_node.as_mut() {
            node.predicate = Some(predicate);
        }
        self
    }

    pub fn with_target_entries(mut self, fields: Vec<FieldId>) -> Self {
        self.target_entries = fields;
        self
    }

    /// Returns the plan node or an invalid plan error
    pub fn node(&self) -> SegcoreResult<&VectorPlanNode> {
        self.plan_node
            .as_ref()
            .ok_or_else(|| SegcoreError::invalid_plan("search plan has no plan node"))
    }

    /// Structural checks against the segment schema.
    ///
    /// The search field must be a vector field, top-k must be within
    /// `[1, max_topk]`, `round_decimal` at most `MAX_ROUND_DECIMAL`, and
    /// every output field must exist.
    pub fn validate(&self, schema: &Schema, max_topk: usize) -> SegcoreResult<()> {
        let node = self.node()?;
        let info = &node.search_info;
        let meta = schema.get(info.field_id).ok_or_else(|| {
            SegcoreError::invalid_plan(format!("search field {} not in schema", info.field_id))
        })?;
        if !meta.data_type.is_vector() {
            return Err(SegcoreError::invalid_plan(format!(
                "search field {} is {}, not a vector field",
                info.field_id, meta.data_type
            )));
        }
        if info.topk == 0 || info.topk > max_topk {
            return Err(SegcoreError::invalid_plan(format!(
                "topk {} outside [1, {}]",
                info.topk, max_topk
            )));
        }
        if let Some(decimals) = info.round_decimal.filter(|&d| d > MAX_ROUND_DECIMAL) {
            return Err(SegcoreError::invalid_plan(format!(
                "round_decimal {} outside [0, {}]",
                decimals, MAX_ROUND_DECIMAL
            )));
        }
        if let Some(predicate) = &node.predicate {
            predicate.validate(schema)?;
        }
        for field_id in &self.target_entries {
            if !schema.contains(*field_id) {
                return Err(SegcoreError::field_id_invalid(
                    *field_id,
                    "output field not in schema",
                ));
            }
        }
        Ok(())
    }
}

/// Query vectors of one search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderGroup {
    pub queries: Vec<Vec<f32>>,
}

impl PlaceholderGroup {
    pub fn new(queries: Vec<Vec<f32>>) -> Self {
        Self { queries }
    }

    /// Number of queries
    pub fn nq(&self) -> usize {
        self.queries.len()
    }

    /// Every query must have exactly `dim` components
    pub fn validate(&self, dim: usize) -> SegcoreResult<()> {
        if self.queries.is_empty() {
            return Err(SegcoreError::invalid_plan("placeholder group is empty"));
        }
        if let Some(bad) = self.queries.iter().find(|q| q.len() != dim) {
            return Err(SegcoreError::invalid_plan(format!(
                "query vector has dimension {}, field expects {}",
                bad.len(),
                dim
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldMeta};

    #[test]
    fn test_metric_parse_is_case_insensitive() {
        assert_eq!("cosine".parse::<MetricType>().unwrap(), MetricType::Cosine);
        assert_eq!("L2".parse::<MetricType>().unwrap(), MetricType::L2);
        assert!("HAMMING".parse::<MetricType>().is_err());

        let metric: MetricType = serde_json::from_str("\"ip\"").unwrap();
        assert_eq!(metric, MetricType::Ip);
        assert_eq!(serde_json::to_string(&metric).unwrap(), "\"IP\"");
    }

    #[test]
    fn test_distances() {
        let a = [1.0, 0.0];
        let b = [0.0, 2.0];
        assert_eq!(MetricType::L2.distance(&a, &b), 5.0);
        assert_eq!(MetricType::Ip.distance(&a, &b), 0.0);
        assert!((MetricType::Cosine.distance(&a, &[3.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(MetricType::Cosine.distance(&a, &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_plan_validation() {
        let schema = Schema::new(vec![
            FieldMeta::primary(100, "pk", DataType::Int64),
            FieldMeta::vector(101, "v", 2),
        ])
        .unwrap();

        let plan = SearchPlan::new(SearchInfo::new(FieldId::new(101), 10));
        assert!(plan.validate(&schema, 100).is_ok());
        assert!(plan.validate(&schema, 5).is_err());

        let plan = SearchPlan::new(SearchInfo::new(FieldId::new(100), 10));
        assert!(plan.validate(&schema, 100).is_err());

        let plan = SearchPlan::default();
        assert!(plan.validate(&schema, 100).is_err());

        let mut info = SearchInfo::new(FieldId::new(101), 1);
        info.round_decimal = Some(MAX_ROUND_DECIMAL);
        assert!(SearchPlan::new(info.clone()).validate(&schema, 100).is_ok());
        info.round_decimal = Some(MAX_ROUND_DECIMAL + 1);
        assert!(SearchPlan::new(info.clone()).validate(&schema, 100).is_err());
        info.round_decimal = Some(u32::MAX);
        assert!(SearchPlan::new(info).validate(&schema, 100).is_err());

        let plan = SearchPlan::new(SearchInfo::new(FieldId::new(101), 1))
            .with_target_entries(vec![FieldId::new(555)]);
        assert!(plan.validate(&schema, 100).is_err());
    }

    #[test]
    fn test_placeholder_dimension() {
        let group = PlaceholderGroup::new(vec![vec![0.0, 1.0], vec![1.0]]);
        assert!(group.validate(2).is_err());
        assert!(PlaceholderGroup::default().validate(2).is_err());
    }
}
