//! Query plans
//!
//! Plans arrive already parsed; this module defines their shape and the
//! structural checks a segment performs before executing one:
//! - `Expr` - Row predicate tree
//! - `SearchPlan` / `PlaceholderGroup` - Filtered vector top-k
//! - `RetrievePlan` - Scalar selection and projection
//! - `IndexMeta` - Metric the vector index was built with

mod expr;
mod index_meta;
mod retrieve;
mod search;

pub use expr::{Expr, OpType};
pub use index_meta::{FieldIndexMeta, IndexMeta};
pub use retrieve::{RetrievePlan, RetrievePlanNode};
pub use search::{MetricType, MAX_ROUND_DECIMAL, PlaceholderGroup, SearchInfo, SearchPlan, VectorPlanNode};
