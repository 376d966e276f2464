//! Concurrency Tests
//!
//! - Readers and a writer share one segment through `Arc`
//! - A reader never sees the live row count go backwards
//! - Every query observes a consistent snapshot of its chunks

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use segcore::config::SegcoreConfig;
use segcore::errors::SegcoreResult;
use segcore::executor::{BruteForceExecutor, PlanExecutor, SegmentView};
use segcore::mvcc::{Timestamp, MAX_TIMESTAMP};
use segcore::plan::{
    MetricType, PlaceholderGroup, RetrievePlan, RetrievePlanNode, SearchInfo, SearchPlan,
    VectorPlanNode,
};
use segcore::result::{PrimaryKey, RetrieveResult, SearchResult};
use segcore::schema::{DataType, FieldId, FieldMeta, Schema};
use segcore::segment::Segment;
use segcore::storage::{FieldData, InsertBatch, ScalarField, SegmentKind, VectorField};

// =============================================================================
// Helper Functions
// =============================================================================

const PK: FieldId = FieldId::new(100);
const VEC: FieldId = FieldId::new(101);

const BATCHES: i64 = 40;
const BATCH_ROWS: i64 = 25;

fn schema() -> Schema {
    Schema::new(vec![
        FieldMeta::primary(100, "pk", DataType::Int64),
        FieldMeta::vector(101, "vec", 2),
    ])
    .unwrap()
}

fn config() -> SegcoreConfig {
    SegcoreConfig {
        chunk_rows: 16,
        ..SegcoreConfig::default()
    }
}

/// Batch `b` holds pks `b * BATCH_ROWS ..`, all written at timestamp `b + 1`
fn batch(b: i64) -> InsertBatch {
    let rows: Vec<i64> = (b * BATCH_ROWS..(b + 1) * BATCH_ROWS).collect();
    InsertBatch::new(rows.clone(), vec![(b + 1) as Timestamp; rows.len()])
        .with_column(PK, FieldData::Scalars(ScalarField::Long(rows.clone())))
        .with_column(
            VEC,
            FieldData::Vectors(VectorField {
                dim: 2,
                data: rows.iter().flat_map(|&r| [r as f32, 1.0]).collect(),
            }),
        )
}

fn search_plan() -> SearchPlan {
    SearchPlan::new(SearchInfo::new(VEC, 5).with_metric(MetricType::L2))
}

// =============================================================================
// Readers Against a Writer
// =============================================================================

#[test]
fn test_counts_are_monotonic_under_inserts() {
    let segment = Arc::new(Segment::new(SegmentKind::Growing, schema(), config()));
    let start = Arc::new(Barrier::new(5));

    let writer = {
        let segment = Arc::clone(&segment);
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            for b in 0..BATCHES {
                segment.insert(batch(b)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let segment = Arc::clone(&segment);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut last = 0;
                loop {
                    let count = segment.get_real_count().unwrap();
                    assert!(count >= last, "count went from {} to {}", last, count);
                    // whole batches only
                    assert_eq!(count % BATCH_ROWS, 0);
                    last = count;
                    if count == BATCHES * BATCH_ROWS {
                        break;
                    }
                    thread::yield_now();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(segment.row_count(), (BATCHES * BATCH_ROWS) as usize);
}

/// A fixed query timestamp keeps returning the same answer while later
/// batches land.
#[test]
fn test_snapshot_reads_are_stable() {
    let segment = Arc::new(Segment::new(SegmentKind::Growing, schema(), config()));
    for b in 0..4 {
        segment.insert(batch(b)).unwrap();
    }
    let query = PlaceholderGroup::new(vec![vec![0.0, 1.0]]);
    let pinned_ts: Timestamp = 2;
    let expected = segment.search(&search_plan(), &query, pinned_ts).unwrap();

    let writer = {
        let segment = Arc::clone(&segment);
        thread::spawn(move || {
            for b in 4..BATCHES {
                segment.insert(batch(b)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let segment = Arc::clone(&segment);
            let query = query.clone();
            let expected = expected.seg_offsets.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let result = segment.search(&search_plan(), &query, pinned_ts).unwrap();
                    assert_eq!(result.seg_offsets, expected);
                    assert_eq!(
                        segment.get_real_count_at(pinned_ts).unwrap(),
                        2 * BATCH_ROWS
                    );
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_deletes_race_with_reads() {
    let segment = Arc::new(Segment::new(SegmentKind::Growing, schema(), config()));
    for b in 0..BATCHES {
        segment.insert(batch(b)).unwrap();
    }
    let total = BATCHES * BATCH_ROWS;
    let delete_ts = BATCHES as Timestamp + 10;

    let deleter = {
        let segment = Arc::clone(&segment);
        thread::spawn(move || {
            for pk in (0..total).step_by(2) {
                segment.delete(&[PrimaryKey::Int64(pk)], delete_ts).unwrap();
            }
        })
    };

    let reader = {
        let segment = Arc::clone(&segment);
        thread::spawn(move || {
            let mut last = total;
            for _ in 0..500 {
                // before the delete timestamp nothing is gone
                assert_eq!(segment.get_real_count_at(delete_ts - 1).unwrap(), total);
                let now = segment.get_real_count().unwrap();
                assert!(now <= last);
                last = now;
            }
        })
    };

    deleter.join().unwrap();
    reader.join().unwrap();
    assert_eq!(segment.get_real_count().unwrap(), total / 2);
}

// =============================================================================
// Executor Seam
// =============================================================================

/// Delegating executor that counts how often it runs
#[derive(Debug, Default)]
struct CountingExecutor {
    inner: BruteForceExecutor,
    searches: AtomicUsize,
    retrieves: AtomicUsize,
}

impl PlanExecutor for CountingExecutor {
    fn execute_search(
        &self,
        view: &dyn SegmentView,
        node: &VectorPlanNode,
        metric: MetricType,
        placeholders: &PlaceholderGroup,
        ts: Timestamp,
    ) -> SegcoreResult<SearchResult> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner
            .execute_search(view, node, metric, placeholders, ts)
    }

    fn execute_retrieve(
        &self,
        view: &dyn SegmentView,
        node: &RetrievePlanNode,
        ts: Timestamp,
    ) -> SegcoreResult<RetrieveResult> {
        self.retrieves.fetch_add(1, Ordering::SeqCst);
        self.inner.execute_retrieve(view, node, ts)
    }
}

#[test]
fn test_custom_executor_shared_across_threads() {
    let executor = Arc::new(CountingExecutor::default());
    let segment = Arc::new(
        Segment::new(SegmentKind::Growing, schema(), config())
            .with_executor(Arc::clone(&executor) as Arc<dyn PlanExecutor>),
    );
    segment.insert(batch(0)).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let segment = Arc::clone(&segment);
            thread::spawn(move || {
                let query = PlaceholderGroup::new(vec![vec![3.0, 1.0]]);
                for _ in 0..10 {
                    let hits = segment.search(&search_plan(), &query, MAX_TIMESTAMP).unwrap();
                    assert_eq!(hits.seg_offsets[0], 3);
                    let plan = RetrievePlan::new(RetrievePlanNode::default(), vec![PK]);
                    segment.retrieve(&plan, MAX_TIMESTAMP, i64::MAX).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(executor.searches.load(Ordering::SeqCst), 40);
    assert_eq!(executor.retrieves.load(Ordering::SeqCst), 40);
    assert_eq!(segment.metrics().snapshot().searches_executed, 40);
}
