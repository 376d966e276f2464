//! Skip-index chunk pruning
//!
//! Maps a predicate to a per-chunk skip mask. A chunk is skipped only when
//! the skip index proves no row in it can satisfy the predicate:
//! - leaf: the index excludes the literal(s)
//! - AND: any child is skippable
//! - OR: every child is skippable
//! - NOT: never (min/max cannot prove a complement empty)

use bitvec::prelude::{BitVec, Lsb0};

use crate::plan::{Expr, OpType};
use crate::skip_index::SkipIndex;
use crate::storage::ValueRef;

pub struct ChunkPruner;

impl ChunkPruner {
    /// Whether `chunk_id` holds no row satisfying `expr`
    pub fn can_skip(expr: &Expr, index: &SkipIndex, chunk_id: usize) -> bool {
        match expr {
            Expr::AlwaysTrue => false,
            Expr::Term { field_id, values } => index.can_skip_term(*field_id, chunk_id, values),
            Expr::UnaryRange {
                field_id,
                op: OpType::PrefixMatch,
                value,
            } => match value.as_value_ref() {
                ValueRef::Str(prefix) => {
                    index.can_skip_prefix(*field_id, chunk_id, prefix)
                }
                _ => false,
            },
            Expr::UnaryRange {
                field_id,
                op,
                value,
            } => index.can_skip_unary_range(*field_id, chunk_id, *op, value),
            Expr::BinaryRange {
                field_id,
                lower,
                upper,
                lower_inclusive,
                upper_inclusive,
            } => index.can_skip_binary_range(
                *field_id,
                chunk_id,
                lower,
                upper,
                *lower_inclusive,
                *upper_inclusive,
            ),
            Expr::And { children } => children.iter().any(|c| Self::can_skip(c, index, chunk_id)),
            Expr::Or { children } => {
                !children.is_empty() && children.iter().all(|c| Self::can_skip(c, index, chunk_id))
            }
            Expr::Not { .. } => false,
        }
    }

    /// Skip mask over `num_chunks` chunks, `true` = skip
    pub fn chunk_mask(expr: &Expr, index: &SkipIndex, num_chunks: usize) -> BitVec<usize, Lsb0> {
        (0..num_chunks)
            .map(|chunk_id| Self::can_skip(expr, index, chunk_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldId};
    use crate::storage::{FieldData, ScalarField, ScalarValue};

    fn index() -> SkipIndex {
        let mut index = SkipIndex::new();
        let age = FieldId::new(101);
        let name = FieldId::new(102);
        index
            .load_primitive(age, 0, DataType::Int64, &FieldData::Scalars(ScalarField::Long(vec![1, 10])))
            .unwrap();
        index
            .load_primitive(age, 1, DataType::Int64, &FieldData::Scalars(ScalarField::Long(vec![20, 30])))
            .unwrap();
        index
            .load_string(name, 0, &FieldData::Scalars(ScalarField::String(vec!["a".into(), "c".into()])))
            .unwrap();
        index
            .load_string(name, 1, &FieldData::Scalars(ScalarField::String(vec!["x".into(), "z".into()])))
            .unwrap();
        index
    }

    #[test]
    fn test_leaf_mask() {
        let expr = Expr::unary(FieldId::new(101), OpType::GreaterThan, ScalarValue::Int(15));
        let mask = ChunkPruner::chunk_mask(&expr, &index(), 2);
        assert_eq!(mask.iter_ones().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_and_or_not() {
        let index = index();
        let age_low = Expr::unary(FieldId::new(101), OpType::LessThan, ScalarValue::Int(5));
        let name_x = Expr::unary(
            FieldId::new(102),
            OpType::PrefixMatch,
            ScalarValue::String("x".into()),
        );

        // chunk 0 fails name_x, chunk 1 fails age_low
        let and = Expr::and(vec![age_low.clone(), name_x.clone()]);
        assert!(ChunkPruner::can_skip(&and, &index, 0));
        assert!(ChunkPruner::can_skip(&and, &index, 1));

        let or = Expr::or(vec![age_low.clone(), name_x]);
        assert!(!ChunkPruner::can_skip(&or, &index, 0));
        assert!(!ChunkPruner::can_skip(&or, &index, 1));

        assert!(!ChunkPruner::can_skip(&Expr::not(age_low), &index, 1));
    }

    #[test]
    fn test_unknown_chunk_is_kept() {
        let expr = Expr::eq(FieldId::new(101), ScalarValue::Int(999));
        assert!(!ChunkPruner::can_skip(&expr, &index(), 7));
    }
}
