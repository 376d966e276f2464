//! Deterministic top-k selection
//!
//! Order is by score under the metric's direction, then by ascending row
//! offset, so equal scores always come out the same way.

use std::cmp::Ordering;

use crate::plan::{MetricType, MAX_ROUND_DECIMAL};

/// Keeps the best `k` (offset, score) pairs
pub struct TopK;

impl TopK {
    pub fn select(mut hits: Vec<(i64, f32)>, k: usize, metric: MetricType) -> Vec<(i64, f32)> {
        hits.sort_by(|a, b| Self::compare(a, b, metric));
        hits.truncate(k);
        hits
    }

    fn compare(a: &(i64, f32), b: &(i64, f32), metric: MetricType) -> Ordering {
        let by_score = if metric.positively_related() {
            b.1.total_cmp(&a.1)
        } else {
            a.1.total_cmp(&b.1)
        };
        by_score.then(a.0.cmp(&b.0))
    }

    /// Rounds to `decimals` places, capped at `MAX_ROUND_DECIMAL`
    pub fn round(value: f32, decimals: u32) -> f32 {
        let factor = 10f32.powi(decimals.min(MAX_ROUND_DECIMAL) as i32);
        (value * factor).round() / factor
    }
}
