//! Segment Query Interface Tests
//!
//! - Search delegates to the executor and respects visibility and deletes
//! - FillPrimaryKeys keeps keys aligned with offsets
//! - FillTargetEntry materializes output fields per hit
//! - Metric resolution fails before any row is scanned

use std::sync::Arc;

use segcore::config::SegcoreConfig;
use segcore::errors::SegcoreErrorCode;
use segcore::mvcc::{Timestamp, MAX_TIMESTAMP};
use segcore::observability::MetricsRegistry;
use segcore::plan::{
    Expr, IndexMeta, MetricType, OpType, PlaceholderGroup, SearchInfo, SearchPlan,
    MAX_ROUND_DECIMAL,
};
use segcore::result::PrimaryKey;
use segcore::schema::{DataType, FieldId, FieldMeta, Schema};
use segcore::segment::Segment;
use segcore::storage::{FieldData, InsertBatch, ScalarField, ScalarValue, SegmentKind, VectorField};

// =============================================================================
// Helper Functions
// =============================================================================

const PK: FieldId = FieldId::new(100);
const AGE: FieldId = FieldId::new(101);
const VEC: FieldId = FieldId::new(102);
const TAGS: FieldId = FieldId::new(103);

fn schema() -> Schema {
    Schema::new(vec![
        FieldMeta::primary(100, "pk", DataType::VarChar),
        FieldMeta::scalar(101, "age", DataType::Int64),
        FieldMeta::vector(102, "vec", 2),
        FieldMeta::array(103, "tags", DataType::Int32),
    ])
    .unwrap()
}

fn config() -> SegcoreConfig {
    SegcoreConfig {
        chunk_rows: 4,
        ..SegcoreConfig::default()
    }
}

/// Rows `start..start + n`: pk "k{i}", age i, vector [i, 0], timestamp i
fn batch(start: usize, n: usize) -> InsertBatch {
    let rows = start..start + n;
    InsertBatch::new(
        rows.clone().map(|i| i as i64).collect(),
        rows.clone().map(|i| i as Timestamp).collect(),
    )
    .with_column(
        PK,
        FieldData::Scalars(ScalarField::String(rows.clone().map(|i| format!("k{}", i)).collect())),
    )
    .with_column(
        AGE,
        FieldData::Scalars(ScalarField::Long(rows.clone().map(|i| i as i64).collect())),
    )
    .with_column(
        VEC,
        FieldData::Vectors(VectorField {
            dim: 2,
            data: rows.clone().flat_map(|i| [i as f32, 0.0]).collect(),
        }),
    )
    .with_column(
        TAGS,
        FieldData::Scalars(ScalarField::Array {
            element_type: None,
            data: rows.map(|i| ScalarField::Int(vec![i as i32, 0])).collect(),
        }),
    )
}

fn segment_with_rows(n: usize) -> Segment {
    let segment = Segment::new(SegmentKind::Growing, schema(), config())
        .with_index_meta(IndexMeta::single(VEC, "FLAT", MetricType::L2));
    segment.insert(batch(0, n)).unwrap();
    segment
}

fn plan(topk: usize) -> SearchPlan {
    SearchPlan::new(SearchInfo::new(VEC, topk))
}

fn origin() -> PlaceholderGroup {
    PlaceholderGroup::new(vec![vec![0.0, 0.0]])
}

// =============================================================================
// Search
// =============================================================================

/// Closest rows first, distances aligned with offsets.
#[test]
fn test_search_ranks_by_distance() {
    let segment = segment_with_rows(10);
    let result = segment
        .search(&plan(3), &PlaceholderGroup::new(vec![vec![4.2, 0.0]]), MAX_TIMESTAMP)
        .unwrap();

    assert_eq!(result.seg_offsets, vec![4, 5, 3]);
    assert_eq!(result.distances.len(), result.seg_offsets.len());
    assert_eq!(result.metric_type, Some(MetricType::L2));
    assert_eq!(result.segment, Some(segment.id()));
    assert!(result.primary_keys.is_empty());
}

/// Each query owns a slice recoverable from the prefix sum.
#[test]
fn test_search_multiple_queries() {
    let segment = segment_with_rows(6);
    let queries = PlaceholderGroup::new(vec![vec![0.0, 0.0], vec![5.0, 0.0]]);
    let result = segment.search(&plan(2), &queries, MAX_TIMESTAMP).unwrap();

    assert_eq!(result.total_nq, 2);
    assert_eq!(result.unity_topk, 2);
    assert_eq!(result.topk_per_nq_prefix_sum, vec![0, 2, 4]);
    let second = result.query_range(1).unwrap();
    assert_eq!(&result.seg_offsets[second], &[5, 4]);
}

/// Equal distances come out in ascending offset order.
#[test]
fn test_search_ties_are_deterministic() {
    let segment = segment_with_rows(5);
    let result = segment
        .search(&plan(2), &PlaceholderGroup::new(vec![vec![2.0, 0.0]]), MAX_TIMESTAMP)
        .unwrap();
    assert_eq!(result.seg_offsets, vec![2, 1]);

    let result = segment
        .search(&plan(3), &PlaceholderGroup::new(vec![vec![2.0, 0.0]]), MAX_TIMESTAMP)
        .unwrap();
    assert_eq!(result.seg_offsets, vec![2, 1, 3]);
}

/// Rows written after the query timestamp never show up.
#[test]
fn test_search_respects_timestamp() {
    let segment = segment_with_rows(10);
    let result = segment
        .search(&plan(5), &PlaceholderGroup::new(vec![vec![9.0, 0.0]]), 6)
        .unwrap();
    assert_eq!(result.seg_offsets, vec![6, 5, 4, 3, 2]);
}

/// Fewer visible rows than top-k yields a short result.
#[test]
fn test_search_short_result() {
    let segment = segment_with_rows(3);
    let result = segment.search(&plan(10), &origin(), MAX_TIMESTAMP).unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result.topk_per_nq_prefix_sum, vec![0, 3]);
}

/// Deleted keys disappear from snapshots at or after the delete.
#[test]
fn test_search_hides_deleted_rows() {
    let segment = segment_with_rows(6);
    segment
        .delete(&[PrimaryKey::VarChar("k0".into())], 20)
        .unwrap();

    let now = segment.search(&plan(2), &origin(), MAX_TIMESTAMP).unwrap();
    assert_eq!(now.seg_offsets, vec![1, 2]);

    let before = segment.search(&plan(2), &origin(), 10).unwrap();
    assert_eq!(before.seg_offsets, vec![0, 1]);
}

/// Scalar predicates restrict the candidate rows.
#[test]
fn test_search_with_predicate() {
    let segment = segment_with_rows(10);
    let filtered = plan(3).with_predicate(Expr::unary(AGE, OpType::GreaterEqual, ScalarValue::Int(7)));
    let result = segment.search(&filtered, &origin(), MAX_TIMESTAMP).unwrap();
    assert_eq!(result.seg_offsets, vec![7, 8, 9]);
}

/// Distances are rounded when requested.
#[test]
fn test_search_round_decimal() {
    let segment = segment_with_rows(3);
    let mut info = SearchInfo::new(VEC, 1);
    info.round_decimal = Some(1);
    let result = segment
        .search(&SearchPlan::new(info), &PlaceholderGroup::new(vec![vec![0.333, 0.0]]), MAX_TIMESTAMP)
        .unwrap();
    assert_eq!(result.distances, vec![0.1]);
}

/// Rounding beyond the supported precision is rejected, not computed.
#[test]
fn test_search_rejects_excessive_round_decimal() {
    let segment = segment_with_rows(3);
    for decimals in [MAX_ROUND_DECIMAL + 1, 40, u32::MAX] {
        let mut info = SearchInfo::new(VEC, 2);
        info.round_decimal = Some(decimals);
        let err = segment
            .search(&SearchPlan::new(info), &origin(), MAX_TIMESTAMP)
            .unwrap_err();
        assert_eq!(err.code(), SegcoreErrorCode::InvalidPlan);
    }
}

// =============================================================================
// Plan Validation
// =============================================================================

#[test]
fn test_search_without_plan_node_is_invalid() {
    let segment = segment_with_rows(3);
    let err = segment
        .search(&SearchPlan::default(), &origin(), MAX_TIMESTAMP)
        .unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::InvalidPlan);
}

#[test]
fn test_search_rejects_bad_dimension_and_topk() {
    let segment = segment_with_rows(3);
    let err = segment
        .search(&plan(1), &PlaceholderGroup::new(vec![vec![1.0]]), MAX_TIMESTAMP)
        .unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::InvalidPlan);

    let err = segment.search(&plan(0), &origin(), MAX_TIMESTAMP).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::InvalidPlan);
}

/// Without index metadata the plan must name a metric.
#[test]
fn test_search_needs_some_metric() {
    let segment = Segment::new(SegmentKind::Growing, schema(), config());
    segment.insert(batch(0, 3)).unwrap();

    let err = segment.search(&plan(1), &origin(), MAX_TIMESTAMP).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::InvalidPlan);

    let explicit = SearchPlan::new(SearchInfo::new(VEC, 1).with_metric(MetricType::Ip));
    let result = segment.search(&explicit, &origin(), MAX_TIMESTAMP).unwrap();
    assert_eq!(result.metric_type, Some(MetricType::Ip));
}

// =============================================================================
// Metric Type
// =============================================================================

/// Cosine index, explicit L2 request: rejected before scanning.
#[test]
fn test_metric_mismatch_fails_before_scan() {
    let metrics = Arc::new(MetricsRegistry::new());
    let segment = Segment::new(SegmentKind::Growing, schema(), config())
        .with_index_meta(IndexMeta::single(VEC, "HNSW", MetricType::Cosine))
        .with_metrics(Arc::clone(&metrics));
    segment.insert(batch(0, 8)).unwrap();

    let l2 = SearchPlan::new(SearchInfo::new(VEC, 3).with_metric(MetricType::L2))
        .with_predicate(Expr::unary(AGE, OpType::GreaterThan, ScalarValue::Int(100)));
    let err = segment.search(&l2, &origin(), MAX_TIMESTAMP).unwrap_err();

    assert_eq!(err.code(), SegcoreErrorCode::MetricMismatch);
    assert_eq!(
        err.message(),
        "metric type not match, expected COSINE, actual L2"
    );
    let snap = metrics.snapshot();
    assert_eq!(snap.searches_executed, 0);
    assert_eq!(snap.chunks_skipped, 0);
}

#[test]
fn test_check_metric_type() {
    let index = IndexMeta::single(VEC, "HNSW", MetricType::Cosine);

    let mut unset = plan(1);
    Segment::check_metric_type(&mut unset, &index).unwrap();
    assert_eq!(
        unset.node().unwrap().search_info.metric_type,
        Some(MetricType::Cosine)
    );

    let mut l2 = SearchPlan::new(SearchInfo::new(VEC, 1).with_metric(MetricType::L2));
    let err = Segment::check_metric_type(&mut l2, &index).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::MetricMismatch);

    let mut empty = SearchPlan::default();
    let err = Segment::check_metric_type(&mut empty, &index).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::InvalidPlan);
}

// =============================================================================
// FillPrimaryKeys
// =============================================================================

/// String primary key: five hits, five string keys in offset order.
#[test]
fn test_fill_primary_keys_string_pk() {
    let segment = segment_with_rows(12);
    let search_plan = plan(5);
    let mut result = segment
        .search(&search_plan, &PlaceholderGroup::new(vec![vec![7.1, 0.0]]), MAX_TIMESTAMP)
        .unwrap();
    assert_eq!(result.len(), 5);

    segment.fill_primary_keys(&search_plan, &mut result).unwrap();

    assert_eq!(result.pk_type, Some(DataType::VarChar));
    assert_eq!(result.primary_keys.len(), result.distances.len());
    let expected: Vec<PrimaryKey> = result
        .seg_offsets
        .iter()
        .map(|o| PrimaryKey::VarChar(format!("k{}", o)))
        .collect();
    assert_eq!(result.primary_keys, expected);
}

#[test]
fn test_fill_primary_keys_twice_fails() {
    let segment = segment_with_rows(4);
    let search_plan = plan(2);
    let mut result = segment.search(&search_plan, &origin(), MAX_TIMESTAMP).unwrap();
    segment.fill_primary_keys(&search_plan, &mut result).unwrap();

    let err = segment.fill_primary_keys(&search_plan, &mut result).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::Internal);
    assert_eq!(result.primary_keys.len(), 2);
}

#[test]
fn test_fill_primary_keys_without_pk_is_fatal() {
    let schema = Schema::new(vec![FieldMeta::vector(102, "vec", 2)]).unwrap();
    let segment = Segment::new(SegmentKind::Growing, schema, config());
    segment
        .insert(
            InsertBatch::new(vec![0], vec![1]).with_column(
                VEC,
                FieldData::Vectors(VectorField {
                    dim: 2,
                    data: vec![1.0, 1.0],
                }),
            ),
        )
        .unwrap();
    let search_plan = SearchPlan::new(SearchInfo::new(VEC, 1).with_metric(MetricType::L2));
    let mut result = segment.search(&search_plan, &origin(), MAX_TIMESTAMP).unwrap();

    let err = segment.fill_primary_keys(&search_plan, &mut result).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::SchemaInconsistency);
    assert!(err.is_fatal());
    assert!(result.primary_keys.is_empty());
}

#[test]
fn test_fill_primary_keys_rejects_unsupported_pk_type() {
    let schema = Schema::new(vec![
        FieldMeta::primary(100, "pk", DataType::Int32),
        FieldMeta::vector(102, "vec", 2),
    ])
    .unwrap();
    let segment = Segment::new(SegmentKind::Growing, schema, config());
    segment
        .insert(
            InsertBatch::new(vec![0], vec![1])
                .with_column(PK, FieldData::Scalars(ScalarField::Int(vec![5])))
                .with_column(
                    VEC,
                    FieldData::Vectors(VectorField {
                        dim: 2,
                        data: vec![1.0, 1.0],
                    }),
                ),
        )
        .unwrap();
    let search_plan = SearchPlan::new(SearchInfo::new(VEC, 1).with_metric(MetricType::L2));
    let mut result = segment.search(&search_plan, &origin(), MAX_TIMESTAMP).unwrap();

    let err = segment.fill_primary_keys(&search_plan, &mut result).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::SchemaInconsistency);
}

// =============================================================================
// FillTargetEntry
// =============================================================================

#[test]
fn test_fill_target_entry() {
    let segment = segment_with_rows(8);
    let search_plan = plan(3).with_target_entries(vec![AGE, TAGS]);
    let mut result = segment
        .search(&search_plan, &PlaceholderGroup::new(vec![vec![6.0, 0.0]]), MAX_TIMESTAMP)
        .unwrap();

    segment.fill_target_entry(&search_plan, &mut result).unwrap();

    let ages = &result.output_fields_data[&AGE];
    assert_eq!(ages.as_longs(), Some(&[6, 5, 7][..]));
    match &result.output_fields_data[&TAGS].field {
        FieldData::Scalars(ScalarField::Array { element_type, data }) => {
            assert_eq!(*element_type, Some(DataType::Int32));
            assert_eq!(data[0], ScalarField::Int(vec![6, 0]));
            assert_eq!(data.len(), 3);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_fill_target_entry_unknown_field() {
    let segment = segment_with_rows(2);
    let search_plan = plan(1);
    let mut result = segment.search(&search_plan, &origin(), MAX_TIMESTAMP).unwrap();

    let bad = plan(1).with_target_entries(vec![FieldId::new(999)]);
    let err = segment.fill_target_entry(&bad, &mut result).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::FieldIdInvalid);
}

// =============================================================================
// Deletes
// =============================================================================

#[test]
fn test_delete_by_expr() {
    let segment = segment_with_rows(10);

    // primary key term: applied directly
    let by_pk = Expr::term(
        PK,
        vec![ScalarValue::String("k1".into()), ScalarValue::String("k2".into())],
    );
    assert_eq!(segment.delete_by_expr(&by_pk, 50).unwrap(), 2);

    // anything else: resolved by a retrieve first
    let by_age = Expr::unary(AGE, OpType::GreaterEqual, ScalarValue::Int(8));
    assert_eq!(segment.delete_by_expr(&by_age, 50).unwrap(), 2);

    assert_eq!(segment.get_real_count().unwrap(), 6);
    assert_eq!(segment.get_real_count_at(49).unwrap(), 10);
}

/// A key re-inserted after its delete is live again; older copies stay gone.
#[test]
fn test_reinsert_after_delete() {
    let segment = segment_with_rows(1);
    assert_eq!(segment.delete(&[PrimaryKey::VarChar("k0".into())], 5).unwrap(), 1);

    let mut again = batch(0, 1);
    again.row_ids = vec![1];
    again.timestamps = vec![10];
    segment.insert(again).unwrap();

    assert_eq!(segment.get_real_count_at(4).unwrap(), 1);
    assert_eq!(segment.get_real_count_at(7).unwrap(), 0);
    assert_eq!(segment.get_real_count_at(20).unwrap(), 1);

    let hits = segment.search(&plan(5), &origin(), 20).unwrap();
    assert_eq!(hits.seg_offsets, vec![1]);

    // a second delete hides the re-inserted row from its timestamp on
    assert_eq!(segment.delete(&[PrimaryKey::VarChar("k0".into())], 15).unwrap(), 1);
    assert_eq!(segment.get_real_count_at(12).unwrap(), 1);
    assert_eq!(segment.get_real_count_at(20).unwrap(), 0);

    // repeating a delete at the same timestamp changes nothing
    assert_eq!(segment.delete(&[PrimaryKey::VarChar("k0".into())], 15).unwrap(), 0);
}

#[test]
fn test_delete_rejects_mismatched_key_type() {
    let segment = segment_with_rows(2);
    let err = segment.delete(&[PrimaryKey::Int64(1)], 5).unwrap_err();
    assert_eq!(err.code(), SegcoreErrorCode::InvalidInsert);
}
