//! Skip Index Pruning Tests
//!
//! - Pruning never drops a matching row
//! - Chunks ruled out by min/max are counted as skipped
//! - Chunks without metrics are always scanned

use proptest::prelude::*;

use segcore::config::SegcoreConfig;
use segcore::mvcc::MAX_TIMESTAMP;
use segcore::plan::{Expr, OpType, RetrievePlan, RetrievePlanNode};
use segcore::schema::{DataType, FieldId, FieldMeta, Schema};
use segcore::segment::Segment;
use segcore::storage::{FieldData, InsertBatch, ScalarField, ScalarValue, SegmentKind, VectorField};

// =============================================================================
// Helper Functions
// =============================================================================

const PK: FieldId = FieldId::new(100);
const V: FieldId = FieldId::new(101);
const F: FieldId = FieldId::new(102);
const S: FieldId = FieldId::new(103);
const VEC: FieldId = FieldId::new(104);

const CHUNK_ROWS: usize = 8;

fn schema() -> Schema {
    Schema::new(vec![
        FieldMeta::primary(100, "pk", DataType::Int64),
        FieldMeta::scalar(101, "v", DataType::Int64),
        FieldMeta::scalar(102, "f", DataType::Float),
        FieldMeta::scalar(103, "s", DataType::VarChar),
        FieldMeta::vector(104, "vec", 1),
    ])
    .unwrap()
}

fn segment(skip_index_enabled: bool) -> Segment {
    let config = SegcoreConfig {
        chunk_rows: CHUNK_ROWS,
        skip_index_enabled,
        ..SegcoreConfig::default()
    };
    Segment::new(SegmentKind::Growing, schema(), config)
}

/// One row per value; `f` mirrors `v`, `s` is `v` zero-padded
fn batch(values: &[i64]) -> InsertBatch {
    let n = values.len() as i64;
    let rows: Vec<i64> = (0..n).collect();
    InsertBatch::new(rows.clone(), vec![1; values.len()])
        .with_column(PK, FieldData::Scalars(ScalarField::Long(rows)))
        .with_column(V, FieldData::Scalars(ScalarField::Long(values.to_vec())))
        .with_column(
            F,
            FieldData::Scalars(ScalarField::Float(values.iter().map(|&v| v as f32).collect())),
        )
        .with_column(
            S,
            FieldData::Scalars(ScalarField::String(
                values.iter().map(|v| format!("{:04}", v)).collect(),
            )),
        )
        .with_column(
            VEC,
            FieldData::Vectors(VectorField {
                dim: 1,
                data: values.iter().map(|&v| v as f32).collect(),
            }),
        )
}

fn matching_offsets(segment: &Segment, expr: &Expr) -> Vec<i64> {
    let plan = RetrievePlan::new(
        RetrievePlanNode {
            predicate: Some(expr.clone()),
            ..RetrievePlanNode::default()
        },
        vec![PK],
    );
    segment
        .retrieve(&plan, MAX_TIMESTAMP, i64::MAX)
        .unwrap()
        .offsets
}

fn leaf() -> impl Strategy<Value = Expr> {
    let op = prop_oneof![
        Just(OpType::Equal),
        Just(OpType::NotEqual),
        Just(OpType::GreaterThan),
        Just(OpType::GreaterEqual),
        Just(OpType::LessThan),
        Just(OpType::LessEqual),
    ];
    prop_oneof![
        (op, -60i64..60).prop_map(|(op, v)| Expr::unary(V, op, ScalarValue::Int(v))),
        (-60i64..60, 0i64..30).prop_map(|(lo, width)| {
            Expr::between(V, ScalarValue::Int(lo), ScalarValue::Int(lo + width))
        }),
        prop::collection::vec(-60i64..60, 1..4)
            .prop_map(|vs| Expr::term(V, vs.into_iter().map(ScalarValue::Int).collect())),
    ]
}

fn expr() -> impl Strategy<Value = Expr> {
    leaf().prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(Expr::and),
            prop::collection::vec(inner.clone(), 1..3).prop_map(Expr::or),
            inner.prop_map(Expr::not),
        ]
    })
}

// =============================================================================
// No False Negatives
// =============================================================================

proptest! {
    /// With or without the skip index, the same rows match.
    #[test]
    fn prop_pruning_keeps_every_match(
        values in prop::collection::vec(-50i64..50, 1..80),
        predicate in expr(),
    ) {
        let pruned = segment(true);
        pruned.insert(batch(&values)).unwrap();
        let scanned = segment(false);
        scanned.insert(batch(&values)).unwrap();

        prop_assert_eq!(
            matching_offsets(&pruned, &predicate),
            matching_offsets(&scanned, &predicate)
        );
        prop_assert_eq!(scanned.metrics().chunks_skipped(), 0);
    }
}

// =============================================================================
// Skipped Chunks
// =============================================================================

/// Sorted values: only the last chunk can hold v >= 60.
#[test]
fn test_sorted_column_skips_leading_chunks() {
    let values: Vec<i64> = (0..64).collect();
    let segment = segment(true);
    segment.insert(batch(&values)).unwrap();
    assert_eq!(segment.num_chunks(), 8);

    let ge = Expr::unary(V, OpType::GreaterEqual, ScalarValue::Int(60));
    assert_eq!(matching_offsets(&segment, &ge), vec![60, 61, 62, 63]);
    assert_eq!(segment.metrics().chunks_skipped(), 7);
}

/// NOT is never pruned; the answer is unchanged.
#[test]
fn test_not_is_never_pruned() {
    let values: Vec<i64> = (0..64).collect();
    let segment = segment(true);
    segment.insert(batch(&values)).unwrap();

    let not_lt = Expr::not(Expr::unary(V, OpType::LessThan, ScalarValue::Int(60)));
    assert_eq!(matching_offsets(&segment, &not_lt), vec![60, 61, 62, 63]);
    assert_eq!(segment.metrics().chunks_skipped(), 0);
}

#[test]
fn test_and_or_pruning() {
    let values: Vec<i64> = (0..32).collect();
    let segment = segment(true);
    segment.insert(batch(&values)).unwrap();

    // AND: one impossible child rules out every chunk
    let impossible = Expr::and(vec![
        Expr::unary(V, OpType::GreaterEqual, ScalarValue::Int(0)),
        Expr::unary(V, OpType::GreaterThan, ScalarValue::Int(100)),
    ]);
    assert!(matching_offsets(&segment, &impossible).is_empty());
    assert_eq!(segment.metrics().chunks_skipped(), 4);

    // OR: a chunk is skipped only when every branch rules it out
    let either = Expr::or(vec![
        Expr::eq(V, ScalarValue::Int(3)),
        Expr::eq(V, ScalarValue::Int(27)),
    ]);
    assert_eq!(matching_offsets(&segment, &either), vec![3, 27]);
    assert_eq!(segment.metrics().chunks_skipped(), 4 + 2);
}

#[test]
fn test_string_prefix_pruning() {
    let values: Vec<i64> = (0..32).collect();
    let segment = segment(true);
    segment.insert(batch(&values)).unwrap();

    let prefix = Expr::unary(S, OpType::PrefixMatch, ScalarValue::String("002".into()));
    assert_eq!(
        matching_offsets(&segment, &prefix),
        (20..30).collect::<Vec<i64>>()
    );
    // rows 16..24 and 24..32 may hold the prefix
    assert_eq!(segment.metrics().chunks_skipped(), 2);
}

// =============================================================================
// Missing Metrics
// =============================================================================

#[test]
fn test_nan_chunk_has_no_metrics() {
    let values: Vec<i64> = (0..16).collect();
    let mut data = batch(&values);
    let mut floats: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    floats[2] = f32::NAN;
    data.columns
        .insert(F, FieldData::Scalars(ScalarField::Float(floats)));

    let segment = segment(true);
    segment.insert(data).unwrap();

    {
        let index = segment.skip_index();
        assert!(index.get(F, 0).is_none());
        assert!(index.get(F, 1).is_some());
        assert!(index.get(V, 0).is_some());
    }

    let ne = Expr::unary(F, OpType::NotEqual, ScalarValue::Float(5.0));
    let hits = matching_offsets(&segment, &ne);
    assert!(hits.contains(&2));
    assert_eq!(hits.len(), 15);
}

#[test]
fn test_disabled_index_stays_empty() {
    let segment = segment(false);
    segment.insert(batch(&[1, 2, 3])).unwrap();
    assert!(segment.skip_index().is_empty());

    // explicit loads still work
    let chunk = FieldData::Scalars(ScalarField::Long(vec![1, 2, 3]));
    segment
        .load_primitive_skip_index(V, 0, DataType::Int64, &chunk)
        .unwrap();
    let index = segment.skip_index();
    let metrics = index.get(V, 0).unwrap();
    assert_eq!(metrics.min, ScalarValue::Int(1));
    assert_eq!(metrics.max, ScalarValue::Int(3));
}

#[test]
fn test_load_string_skip_index_rejects_numbers() {
    let segment = segment(true);
    let chunk = FieldData::Scalars(ScalarField::Long(vec![1]));
    assert!(segment.load_string_skip_index(S, 0, &chunk).is_err());
}
