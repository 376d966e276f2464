//! Retrieve (scalar query) plans

use serde::{Deserialize, Serialize};

use crate::errors::{SegcoreError, SegcoreResult};
use crate::schema::{FieldId, Schema, SystemFieldType};

use super::expr::Expr;

/// Row selection of a retrieve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievePlanNode {
    /// Unset matches every visible row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Expr>,
    /// Return only the number of matching rows
    #[serde(default)]
    pub is_count: bool,
    /// Keep at most this many rows, lowest offsets first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Parsed retrieve plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievePlan {
    /// Absent node is an invalid plan
    #[serde(default)]
    pub plan_node: Option<RetrievePlanNode>,
    /// Output fields, system pseudo-fields allowed
    #[serde(default)]
    pub field_ids: Vec<FieldId>,
}

impl RetrievePlan {
    pub fn new(node: RetrievePlanNode, field_ids: Vec<FieldId>) -> Self {
        Self {
            plan_node: Some(node),
            field_ids,
        }
    }

    /// Count-only plan over every row
    pub fn count() -> Self {
        Self::new(
            RetrievePlanNode {
                is_count: true,
                ..RetrievePlanNode::default()
            },
            Vec::new(),
        )
    }

    /// Returns the plan node or an invalid plan error
    pub fn node(&self) -> SegcoreResult<&RetrievePlanNode> {
        self.plan_node
            .as_ref()
            .ok_or_else(|| SegcoreError::invalid_plan("retrieve plan has no plan node"))
    }

    pub fn is_count(&self) -> bool {
        self.plan_node.as_ref().map_or(false, |n| n.is_count)
    }

    /// Checks the predicate and every output field id.
    ///
    /// Output ids must be declared schema fields or one of the supported
    /// system pseudo-fields.
    pub fn validate(&self, schema: &Schema) -> SegcoreResult<()> {
        let node = self.node()?;
        if let Some(predicate) = &node.predicate {
            predicate.validate(schema)?;
        }
        for &field_id in &self.field_ids {
            if field_id.get() < 0 {
                return Err(SegcoreError::field_id_invalid(field_id, "negative field id"));
            }
            if field_id.is_system() {
                if SystemFieldType::of(field_id).is_none() {
                    return Err(SegcoreError::field_id_invalid(
                        field_id,
                        "unsupported system field id",
                    ));
                }
            } else if !schema.contains(field_id) {
                return Err(SegcoreError::field_id_invalid(
                    field_id,
                    "output field not in schema",
                ));
            }
        }
        Ok(())
    }
}
