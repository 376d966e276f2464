//! Scalar predicate tree
//!
//! Produced by the external plan parser and evaluated per row by the plan
//! executor. Leaves compare one field against literals; JSON, ARRAY and
//! vector fields cannot appear in a leaf.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::errors::{SegcoreError, SegcoreResult};
use crate::schema::{DataType, FieldId, Schema};
use crate::storage::{ScalarValue, ValueRef};

/// Comparison operators of unary range leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    /// String starts with the literal
    PrefixMatch,
}

impl OpType {
    /// Returns the operator name for log output
    pub fn op_name(&self) -> &'static str {
        match self {
            OpType::Equal => "eq",
            OpType::NotEqual => "ne",
            OpType::GreaterThan => "gt",
            OpType::GreaterEqual => "ge",
            OpType::LessThan => "lt",
            OpType::LessEqual => "le",
            OpType::PrefixMatch => "prefix",
        }
    }

    /// Applies the operator to `cell OP value`. Incomparable operands
    /// never match.
    pub fn matches(&self, cell: ValueRef<'_>, value: ValueRef<'_>) -> bool {
        if let OpType::PrefixMatch = self {
            return match (cell, value) {
                (ValueRef::Str(cell), ValueRef::Str(prefix)) => cell.starts_with(prefix),
                _ => false,
            };
        }

        let Some(ord) = cell.compare(&value) else {
            // NaN is unequal to everything
            return *self == OpType::NotEqual && (cell.is_nan() || value.is_nan());
        };
        match self {
            OpType::Equal => ord == Ordering::Equal,
            OpType::NotEqual => ord != Ordering::Equal,
            OpType::GreaterThan => ord == Ordering::Greater,
            OpType::GreaterEqual => ord != Ordering::Less,
            OpType::LessThan => ord == Ordering::Less,
            OpType::LessEqual => ord != Ordering::Greater,
            OpType::PrefixMatch => false,
        }
    }
}

/// Row predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    /// Matches every row
    AlwaysTrue,
    /// field IN (values)
    Term {
        field_id: FieldId,
        values: Vec<ScalarValue>,
    },
    /// field OP value
    UnaryRange {
        field_id: FieldId,
        op: OpType,
        value: ScalarValue,
    },
    /// lower <(=) field <(=) upper
    BinaryRange {
        field_id: FieldId,
        lower: ScalarValue,
        upper: ScalarValue,
        #[serde(default = "inclusive")]
        lower_inclusive: bool,
        #[serde(default = "inclusive")]
        upper_inclusive: bool,
    },
    And {
        children: Vec<Expr>,
    },
    Or {
        children: Vec<Expr>,
    },
    Not {
        child: Box<Expr>,
    },
}

fn inclusive() -> bool {
    true
}

impl Expr {
    /// Create a term predicate
    pub fn term(field_id: FieldId, values: Vec<ScalarValue>) -> Self {
        Expr::Term { field_id, values }
    }

    /// Create an equality predicate
    pub fn eq(field_id: FieldId, value: ScalarValue) -> Self {
        Self::unary(field_id, OpType::Equal, value)
    }

    pub fn unary(field_id: FieldId, op: OpType, value: ScalarValue) -> Self {
        Expr::UnaryRange {
            field_id,
            op,
            value,
        }
    }

    /// Create an inclusive range predicate
    pub fn between(field_id: FieldId, lower: ScalarValue, upper: ScalarValue) -> Self {
        Expr::BinaryRange {
            field_id,
            lower,
            upper,
            lower_inclusive: true,
            upper_inclusive: true,
        }
    }

    pub fn and(children: Vec<Expr>) -> Self {
        Expr::And { children }
    }

    pub fn or(children: Vec<Expr>) -> Self {
        Expr::Or { children }
    }

    pub fn not(child: Expr) -> Self {
        Expr::Not {
            child: Box::new(child),
        }
    }

    /// Every field id referenced by a leaf, in first-seen order
    pub fn field_ids(&self) -> Vec<FieldId> {
        let mut out = Vec::new();
        self.collect_field_ids(&mut out);
        out
    }

    fn collect_field_ids(&self, out: &mut Vec<FieldId>) {
        match self {
            Expr::AlwaysTrue => {}
            Expr::Term { field_id, .. }
            | Expr::UnaryRange { field_id, .. }
            | Expr::BinaryRange { field_id, .. } => {
                if !out.contains(field_id) {
                    out.push(*field_id);
                }
            }
            Expr::And { children } | Expr::Or { children } => {
                children.iter().for_each(|c| c.collect_field_ids(out))
            }
            Expr::Not { child } => child.collect_field_ids(out),
        }
    }

    /// Checks that every leaf names a comparable schema field and that
    /// boolean nodes are non-empty
    pub fn validate(&self, schema: &Schema) -> SegcoreResult<()> {
        match self {
            Expr::AlwaysTrue => Ok(()),
            Expr::Term { field_id, .. }
            | Expr::UnaryRange { field_id, .. }
            | Expr::BinaryRange { field_id, .. } => {
                let meta = schema.get(*field_id).ok_or_else(|| {
                    SegcoreError::invalid_plan(format!(
                        "predicate references unknown field {}",
                        field_id
                    ))
                })?;
                match meta.data_type {
                    DataType::Json | DataType::Array | DataType::FloatVector => {
                        Err(SegcoreError::invalid_plan(format!(
                            "field {} of type {} cannot be used in a predicate",
                            field_id, meta.data_type
                        )))
                    }
                    _ => Ok(()),
                }
            }
            Expr::And { children } | Expr::Or { children } => {
                if children.is_empty() {
                    return Err(SegcoreError::invalid_plan(
                        "boolean predicate node has no children",
                    ));
                }
                children.iter().try_for_each(|c| c.validate(schema))
            }
            Expr::Not { child } => child.validate(schema),
        }
    }

    /// Evaluates the predicate for one row. `cell` resolves a field id to
    /// the row's value; a missing value fails the leaf.
    pub fn evaluate<'a, F>(&self, cell: &F) -> bool
    where
        F: Fn(FieldId) -> Option<ValueRef<'a>>,
    {
        match self {
            Expr::AlwaysTrue => true,
            Expr::Term { field_id, values } => cell(*field_id).map_or(false, |v| {
                values
                    .iter()
                    .any(|lit| OpType::Equal.matches(v, lit.as_value_ref()))
            }),
            Expr::UnaryRange {
                field_id,
                op,
                value,
            } => cell(*field_id).map_or(false, |v| op.matches(v, value.as_value_ref())),
            Expr::BinaryRange {
                field_id,
                lower,
                upper,
                lower_inclusive,
                upper_inclusive,
            } => cell(*field_id).map_or(false, |v| {
                let lower_op = if *lower_inclusive {
                    OpType::GreaterEqual
                } else {
                    OpType::GreaterThan
                };
                let upper_op = if *upper_inclusive {
                    OpType::LessEqual
                } else {
                    OpType::LessThan
                };
                lower_op.matches(v, lower.as_value_ref()) && upper_op.matches(v, upper.as_value_ref())
            }),
            Expr::And { children } => children.iter().all(|c| c.evaluate(cell)),
            Expr::Or { children } => children.iter().any(|c| c.evaluate(cell)),
            Expr::Not { child } => !child.evaluate(cell),
        }
    }

    /// Extracts an explicit key list when the predicate is a plain term or
    /// equality on `pk_field`. Anything else needs a query to resolve.
    pub fn primary_keys_for(&self, pk_field: FieldId) -> Option<Vec<ScalarValue>> {
        match self {
            Expr::Term { field_id, values } if *field_id == pk_field => Some(values.clone()),
            Expr::UnaryRange {
                field_id,
                op: OpType::Equal,
                value,
            } if *field_id == pk_field => Some(vec![value.clone()]),
            _ => None,
        }
    }
}
